//! Compare a declared schema against a live database and produce a plan.

use serde::Serialize;

use crate::config::SchemaSyncConfig;
use crate::error::Result;
use crate::model::SchemaModel;
use crate::parser::parse_schema;
use crate::plan::{self, Plan};
use crate::provider::{self, Provider};

/// Result of the `plan` command: the declared model, the live model, and the
/// resulting `Plan`.
#[derive(Debug, Serialize)]
pub struct PlanReport {
    pub plan: Plan,
}

/// Read and parse every declared schema file, merging them into one model.
///
/// Later files win on exact-name collisions only for entities absent from
/// earlier files; callers are expected to keep one canonical definition per
/// object across the declared file set, same as the declared-SQL parser's
/// own duplicate-definition rule.
pub fn load_declared_schema(paths: &[String]) -> Result<SchemaModel> {
    let mut combined = SchemaModel::new();
    for path in paths {
        let text = std::fs::read_to_string(path)?;
        let parsed = parse_schema(&text)?;
        merge_into(&mut combined, parsed);
    }
    Ok(combined)
}

fn merge_into(base: &mut SchemaModel, other: SchemaModel) {
    base.tables.extend(other.tables);
    base.views.extend(other.views);
    base.enums.extend(other.enums);
    base.functions.extend(other.functions);
    base.procedures.extend(other.procedures);
    base.triggers.extend(other.triggers);
    base.sequences.extend(other.sequences);
    base.extensions.extend(other.extensions);
    base.schemas.extend(other.schemas);
    base.comments.extend(other.comments);
}

/// Introspect the live database identified by `config`, returning its `SchemaModel`.
pub async fn introspect_live(config: &SchemaSyncConfig) -> Result<(SchemaModel, Provider)> {
    let provider = config.provider();
    match provider {
        Provider::Postgres => {
            let conn_string = config.connection_string()?;
            let client = crate::db::connect_with_full_config(
                &conn_string,
                &config.database.ssl_mode,
                config.database.connect_retries,
                config.database.connect_timeout_secs,
                config.database.statement_timeout_secs,
                config.database.keepalive_secs,
            )
            .await?;
            let model = crate::introspect::postgres::introspect_postgres(&client, &config.schema_name).await?;
            Ok((model, provider))
        }
        Provider::Sqlite => {
            let path = config.database.url.clone().unwrap_or_default();
            let conn = rusqlite::Connection::open(&path)?;
            let model = crate::introspect::sqlite::introspect_sqlite(&conn)?;
            Ok((model, provider))
        }
    }
}

/// Build a plan bringing the live database in line with the declared schema.
pub async fn execute(config: &SchemaSyncConfig) -> Result<PlanReport> {
    let declared = load_declared_schema(&config.schema_paths)?;
    let (live, target_provider) = introspect_live(config).await?;

    provider::validate_schema(&declared, target_provider)?;

    let built = plan::build_plan(&declared, &live, target_provider);
    Ok(PlanReport { plan: built })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_declared_schema_parses_single_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let model = load_declared_schema(&[path]).unwrap();
        assert!(model.tables.contains_key("users"));
    }

    #[test]
    fn test_load_declared_schema_merges_multiple_files() {
        let mut file1 = tempfile::NamedTempFile::new().unwrap();
        writeln!(file1, "CREATE TABLE users (id INTEGER PRIMARY KEY);").unwrap();
        let mut file2 = tempfile::NamedTempFile::new().unwrap();
        writeln!(file2, "CREATE TABLE orders (id INTEGER PRIMARY KEY);").unwrap();

        let model = load_declared_schema(&[
            file1.path().to_str().unwrap().to_string(),
            file2.path().to_str().unwrap().to_string(),
        ])
        .unwrap();
        assert!(model.tables.contains_key("users"));
        assert!(model.tables.contains_key("orders"));
    }
}
