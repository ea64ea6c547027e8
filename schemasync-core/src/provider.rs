//! Dialect dispatch: which database a plan targets, and what that database can express.
//!
//! SQLite's feature surface is a strict subset of PostgreSQL's. Rather than let a declared
//! schema silently lose features during planning, every declared `SchemaModel` is checked
//! against the target provider's feature matrix up front — every violation is collected and
//! reported together, matching the "full error surface in one pass" requirement for
//! declarative tooling.

use crate::error::{Result, SchemaSyncError};
use crate::model::{IndexMethod, SchemaModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Postgres,
    Sqlite,
}

impl Provider {
    /// Infer the provider from a connection string's scheme, falling back to
    /// treating a bare filesystem path as SQLite.
    pub fn from_connection_string(s: &str) -> Self {
        if s.starts_with("postgres://") || s.starts_with("postgresql://") || s.starts_with("host=") {
            Provider::Postgres
        } else {
            Provider::Sqlite
        }
    }

    pub fn feature_matrix(&self) -> FeatureMatrix {
        match self {
            Provider::Postgres => FeatureMatrix {
                schemas: true,
                sequences: true,
                enums: true,
                extensions: true,
                concurrent_indexes: true,
                advisory_locks: true,
                stored_functions: true,
                stored_procedures: true,
                materialized_views: true,
                index_methods: &[IndexMethod::Btree, IndexMethod::Hash, IndexMethod::Gin, IndexMethod::Gist, IndexMethod::Spgist, IndexMethod::Brin],
            },
            Provider::Sqlite => FeatureMatrix {
                schemas: false,
                sequences: false,
                enums: false,
                extensions: false,
                concurrent_indexes: false,
                advisory_locks: false,
                stored_functions: false,
                stored_procedures: false,
                materialized_views: false,
                index_methods: &[IndexMethod::Btree],
            },
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Postgres => write!(f, "postgres"),
            Provider::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Per-provider boolean capability set, per SPEC_FULL.md §6/§10's "feature matrix".
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub schemas: bool,
    pub sequences: bool,
    pub enums: bool,
    pub extensions: bool,
    pub concurrent_indexes: bool,
    pub advisory_locks: bool,
    pub stored_functions: bool,
    pub stored_procedures: bool,
    pub materialized_views: bool,
    pub index_methods: &'static [IndexMethod],
}

/// Validate a declared `SchemaModel` against a provider's feature matrix.
/// Every violation is collected; the caller gets the full surface in one pass
/// rather than failing on the first unsupported construct.
pub fn validate_schema(model: &SchemaModel, provider: Provider) -> Result<()> {
    let matrix = provider.feature_matrix();
    let mut violations = Vec::new();

    if !matrix.schemas && !model.schemas.is_empty() {
        violations.push(SchemaSyncError::validation(
            "E-SCHEMA-001",
            format!("{} does not support named schemas", provider),
            None,
            Some("remove CREATE SCHEMA statements".to_string()),
        ));
    }
    if !matrix.sequences && !model.sequences.is_empty() {
        for name in model.sequences.keys() {
            violations.push(SchemaSyncError::validation(
                "E-SEQ-001",
                format!("{} does not support standalone sequences", provider),
                Some(name.clone()),
                Some("use an INTEGER PRIMARY KEY column instead".to_string()),
            ));
        }
    }
    if !matrix.enums && !model.enums.is_empty() {
        for name in model.enums.keys() {
            violations.push(SchemaSyncError::validation(
                "E-ENUM-001",
                format!("{} does not support enum types", provider),
                Some(name.clone()),
                Some("use a TEXT column with a CHECK constraint instead".to_string()),
            ));
        }
    }
    if !matrix.extensions && !model.extensions.is_empty() {
        for name in model.extensions.keys() {
            violations.push(SchemaSyncError::validation(
                "E-EXT-001",
                format!("{} does not support extensions", provider),
                Some(name.clone()),
                None,
            ));
        }
    }
    if !matrix.stored_functions && !model.functions.is_empty() {
        for name in model.functions.keys() {
            violations.push(SchemaSyncError::validation(
                "E-FUNC-001",
                format!("{} does not support stored functions", provider),
                Some(name.clone()),
                None,
            ));
        }
    }
    if !matrix.stored_procedures && !model.procedures.is_empty() {
        for name in model.procedures.keys() {
            violations.push(SchemaSyncError::validation(
                "E-PROC-001",
                format!("{} does not support stored procedures", provider),
                Some(name.clone()),
                None,
            ));
        }
    }
    if !model.triggers.is_empty() && provider == Provider::Sqlite {
        // SQLite does support triggers, but only `FOR EACH ROW` — reject statement triggers.
        for (name, trigger) in &model.triggers {
            if trigger.for_each == crate::model::TriggerForEach::Statement {
                violations.push(SchemaSyncError::validation(
                    "E-TRIGGER-001",
                    "sqlite triggers only support FOR EACH ROW",
                    Some(name.clone()),
                    Some("change FOR EACH STATEMENT to FOR EACH ROW".to_string()),
                ));
            }
        }
    }

    for view in model.views.values() {
        if view.materialized && !matrix.materialized_views {
            violations.push(SchemaSyncError::validation(
                "E-VIEW-001",
                format!("{} does not support materialized views", provider),
                Some(view.name.clone()),
                Some("use a plain VIEW and re-run the query directly".to_string()),
            ));
        }
    }

    for table in model.tables.values() {
        for idx in &table.indexes {
            if idx.concurrent && !matrix.concurrent_indexes {
                violations.push(SchemaSyncError::validation(
                    "E-INDEX-001",
                    format!("{} does not support concurrent index creation", provider),
                    Some(idx.name.clone()),
                    None,
                ));
            }
            if !matrix.index_methods.contains(&idx.method) {
                violations.push(SchemaSyncError::validation(
                    "E-INDEX-002",
                    format!("{} does not support the {} index access method", provider, idx.method),
                    Some(idx.name.clone()),
                    Some("use a btree index instead".to_string()),
                ));
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(SchemaSyncError::ValidationFailed(violations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EnumType, Extension, Index, IndexColumn, Sequence, SchemaDefinition, Table};

    #[test]
    fn test_postgres_accepts_everything_this_model_declares() {
        let mut model = SchemaModel::new();
        model.schemas.insert("app".to_string(), SchemaDefinition { name: "app".to_string() });
        model.sequences.insert(
            "s".to_string(),
            Sequence { name: "s".to_string(), data_type: "BIGINT".to_string(), increment: 1, min_value: None, max_value: None, start: 1, cache: 1, cycle: false, owned_by: None },
        );
        assert!(validate_schema(&model, Provider::Postgres).is_ok());
    }

    #[test]
    fn test_sqlite_rejects_sequences_and_schemas() {
        let mut model = SchemaModel::new();
        model.schemas.insert("app".to_string(), SchemaDefinition { name: "app".to_string() });
        model.sequences.insert(
            "s".to_string(),
            Sequence { name: "s".to_string(), data_type: "BIGINT".to_string(), increment: 1, min_value: None, max_value: None, start: 1, cache: 1, cycle: false, owned_by: None },
        );
        model.enums.insert("mood".to_string(), EnumType { name: "mood".to_string(), values: vec!["sad".to_string()] });
        model.extensions.insert("postgis".to_string(), Extension { name: "postgis".to_string(), version: None });

        let err = validate_schema(&model, Provider::Sqlite).unwrap_err();
        match err {
            SchemaSyncError::ValidationFailed(violations) => assert_eq!(violations.len(), 4),
            _ => panic!("expected ValidationFailed"),
        }
    }

    #[test]
    fn test_sqlite_rejects_non_btree_index_method() {
        let mut model = SchemaModel::new();
        let mut table = Table::new("t");
        table.indexes.push(Index {
            name: "idx".to_string(),
            table: "t".to_string(),
            columns: vec![IndexColumn { name: "a".to_string(), descending: false, opclass: None }],
            expression: None,
            method: IndexMethod::Gin,
            unique: false,
            concurrent: false,
            predicate: None,
            storage_params: Default::default(),
            tablespace: None,
            owner: Default::default(),
        });
        model.tables.insert("t".to_string(), table);

        let err = validate_schema(&model, Provider::Sqlite).unwrap_err();
        assert!(matches!(err, SchemaSyncError::ValidationFailed(v) if v.len() == 1));
    }

    #[test]
    fn test_provider_inferred_from_connection_string() {
        assert_eq!(Provider::from_connection_string("postgres://localhost/db"), Provider::Postgres);
        assert_eq!(Provider::from_connection_string("/tmp/data.sqlite3"), Provider::Sqlite);
    }
}
