//! The normalized, dialect-neutral schema representation.
//!
//! Every entity here is built once — by the declared-SQL parser or by the live
//! database introspector — and never mutated afterward. The diff engine only
//! ever reads two `SchemaModel`s; it never writes into either one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Referential action for a foreign key's `ON DELETE` / `ON UPDATE` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferentialAction {
    Cascade,
    Restrict,
    SetNull,
    SetDefault,
    NoAction,
}

impl std::fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
            ReferentialAction::NoAction => "NO ACTION",
        };
        write!(f, "{}", s)
    }
}

impl Default for ReferentialAction {
    fn default() -> Self {
        ReferentialAction::NoAction
    }
}

/// A `Generated` column descriptor (`GENERATED ALWAYS AS (...) STORED`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generated {
    pub always: bool,
    pub expression: String,
    pub stored: bool,
}

/// A single table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Canonical type string, e.g. `CHARACTER VARYING(255)`, `NUMERIC(10,2)`.
    pub canonical_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub generated: Option<Generated>,
}

impl Column {
    pub fn new(name: impl Into<String>, canonical_type: impl Into<String>) -> Self {
        Column {
            name: name.into(),
            canonical_type: canonical_type.into(),
            nullable: true,
            default: None,
            generated: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKey {
    pub name: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: String,
    pub columns: Vec<String>,
    pub ref_table: String,
    pub ref_columns: Vec<String>,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConstraint {
    pub name: String,
    /// Canonicalized boolean expression, matching PostgreSQL's `pg_get_constraintdef` deparse form.
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    pub name: String,
    pub columns: Vec<String>,
    pub deferrable: bool,
    pub initially_deferred: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexMethod {
    Btree,
    Hash,
    Gin,
    Gist,
    Spgist,
    Brin,
}

impl std::fmt::Display for IndexMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IndexMethod::Btree => "btree",
            IndexMethod::Hash => "hash",
            IndexMethod::Gin => "gin",
            IndexMethod::Gist => "gist",
            IndexMethod::Spgist => "spgist",
            IndexMethod::Brin => "brin",
        };
        write!(f, "{}", s)
    }
}

impl Default for IndexMethod {
    fn default() -> Self {
        IndexMethod::Btree
    }
}

/// Which constraint (if any) an index exists solely to back. Such indexes are
/// owned by the constraint and never surfaced as independent objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexOwner {
    None,
    Primary,
    Unique,
}

impl Default for IndexOwner {
    fn default() -> Self {
        IndexOwner::None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    pub name: String,
    pub descending: bool,
    pub opclass: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub table: String,
    pub columns: Vec<IndexColumn>,
    /// Set instead of `columns` when the index is a pure expression index.
    pub expression: Option<String>,
    pub method: IndexMethod,
    pub unique: bool,
    pub concurrent: bool,
    pub predicate: Option<String>,
    pub storage_params: BTreeMap<String, String>,
    pub tablespace: Option<String>,
    pub owner: IndexOwner,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub schema: Option<String>,
    pub columns: Vec<Column>,
    pub primary_key: Option<PrimaryKey>,
    pub foreign_keys: Vec<ForeignKey>,
    pub checks: Vec<CheckConstraint>,
    pub uniques: Vec<UniqueConstraint>,
    pub indexes: Vec<Index>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Table {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(s) => format!("{}.{}", s, self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumType {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub name: String,
    /// Whitespace-normalized `SELECT` text.
    pub definition: String,
    pub check_option: Option<String>,
    pub materialized: bool,
    pub indexes: Vec<Index>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamMode {
    In,
    Out,
    InOut,
    Variadic,
}

impl Default for ParamMode {
    fn default() -> Self {
        ParamMode::In
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: Option<String>,
    pub canonical_type: String,
    pub mode: ParamMode,
    pub default: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Volatility {
    Volatile,
    Stable,
    Immutable,
}

impl Default for Volatility {
    fn default() -> Self {
        Volatility::Volatile
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parallel {
    Safe,
    Unsafe,
    Restricted,
}

impl Default for Parallel {
    fn default() -> Self {
        Parallel::Unsafe
    }
}

/// Shared shape for `Function` and `Procedure` — a procedure simply omits `return_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
    pub language: String,
    /// Whitespace-normalized body text.
    pub body: String,
    pub volatility: Volatility,
    pub parallel: Parallel,
    pub security_definer: bool,
    pub strict: bool,
    pub cost: Option<f64>,
    pub rows: Option<f64>,
    pub is_procedure: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TriggerTiming {
    Before,
    After,
    InsteadOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
    Truncate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerForEach {
    Row,
    Statement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub name: String,
    pub table: String,
    pub timing: TriggerTiming,
    /// Canonicalized as a sorted set: event order is not semantically significant
    /// (resolved design decision, see DESIGN.md).
    pub events: std::collections::BTreeSet<TriggerEvent>,
    pub for_each: TriggerForEach,
    pub when: Option<String>,
    pub function: String,
    pub function_args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    pub name: String,
    pub data_type: String,
    pub increment: i64,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    pub start: i64,
    pub cache: i64,
    pub cycle: bool,
    pub owned_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    pub name: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub object_kind: String,
    pub object_name: String,
    pub text: String,
}

/// The root container: every entity known about one logical database (or, for
/// the declared side, one parsed schema text).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaModel {
    pub tables: BTreeMap<String, Table>,
    pub views: BTreeMap<String, View>,
    pub enums: BTreeMap<String, EnumType>,
    pub functions: BTreeMap<String, Routine>,
    pub procedures: BTreeMap<String, Routine>,
    pub triggers: BTreeMap<String, Trigger>,
    pub sequences: BTreeMap<String, Sequence>,
    pub extensions: BTreeMap<String, Extension>,
    pub schemas: BTreeMap<String, SchemaDefinition>,
    pub comments: Vec<Comment>,
}

impl SchemaModel {
    pub fn new() -> Self {
        SchemaModel::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
            && self.views.is_empty()
            && self.enums.is_empty()
            && self.functions.is_empty()
            && self.procedures.is_empty()
            && self.triggers.is_empty()
            && self.sequences.is_empty()
            && self.extensions.is_empty()
            && self.schemas.is_empty()
            && self.comments.is_empty()
    }
}

/// Fold an unquoted identifier to its comparison key, per the case-folding rule
/// in the data model: quoted identifiers keep their case, unquoted ones fold to
/// lower case. Callers that already stripped quoting pass the bare name here.
pub fn fold_identifier(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].replace("\"\"", "\"")
    } else {
        trimmed.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_identifier_unquoted_lowercases() {
        assert_eq!(fold_identifier("Users"), "users");
    }

    #[test]
    fn test_fold_identifier_quoted_preserves_case() {
        assert_eq!(fold_identifier("\"Users\""), "Users");
    }

    #[test]
    fn test_fold_identifier_quoted_unescapes_doubled_quotes() {
        assert_eq!(fold_identifier("\"my\"\"table\""), "my\"table");
    }

    #[test]
    fn test_table_qualified_name_with_schema() {
        let mut t = Table::new("users");
        t.schema = Some("app".to_string());
        assert_eq!(t.qualified_name(), "app.users");
    }

    #[test]
    fn test_table_qualified_name_without_schema() {
        let t = Table::new("users");
        assert_eq!(t.qualified_name(), "users");
    }

    #[test]
    fn test_schema_model_is_empty() {
        let model = SchemaModel::new();
        assert!(model.is_empty());
    }
}
