//! The declared-SQL parser: turns a schema text into a `SchemaModel`.
//!
//! Statements are split by [`lexer::split_statements`], classified by their
//! head keyword, and routed to a per-kind sub-parser. Anything describing a
//! state *transition* rather than a target state (`ALTER TABLE`, `DROP ...`)
//! is explicitly rejected — this tool is declarative, the user expresses the
//! target schema and the diff engine derives the transition.

mod enum_type;
mod index;
mod lexer;
mod misc;
mod routine;
mod sequence;
mod table;
mod trigger;
mod view;

use crate::error::{ParserErrorKind, Result, SchemaSyncError};
use crate::model::SchemaModel;

const REJECTED_PREFIXES: &[&str] = &[
    "ALTER TABLE",
    "ALTER INDEX",
    "ALTER SEQUENCE",
    "ALTER VIEW",
    "ALTER FUNCTION",
    "ALTER TYPE",
    "DROP TABLE",
    "DROP INDEX",
    "DROP VIEW",
    "DROP FUNCTION",
    "DROP PROCEDURE",
    "DROP TYPE",
    "DROP SEQUENCE",
    "DROP TRIGGER",
    "DROP SCHEMA",
    "DROP EXTENSION",
    "TRUNCATE",
];

/// Parse a complete declared-schema text into a [`SchemaModel`].
///
/// On the first unparseable or explicitly-rejected statement, parsing stops
/// and returns a structured [`SchemaSyncError::ParserError`] naming the
/// statement's line number — declared schema is small enough, and wrong often
/// enough during authoring, that fail-fast beats collecting every error.
pub fn parse_schema(sql_text: &str) -> Result<SchemaModel> {
    let mut model = SchemaModel::new();

    for stmt in lexer::split_statements(sql_text) {
        let line = lexer::line_number_at(sql_text, offset_of(sql_text, stmt));
        let upper = stmt.trim_start().to_uppercase();

        if let Some(prefix) = REJECTED_PREFIXES.iter().find(|p| upper.starts_with(**p)) {
            return Err(SchemaSyncError::parser(
                ParserErrorKind::UnsupportedStatement,
                format!(
                    "'{}' describes a schema transition, not a target state; declare the desired end state instead",
                    prefix
                ),
                Some(line),
            ));
        }

        if upper.starts_with("CREATE TABLE") {
            let table = table::parse_create_table(stmt, line)?;
            model.tables.insert(table.qualified_name(), table);
        } else if upper.starts_with("CREATE UNIQUE INDEX") || upper.starts_with("CREATE INDEX") {
            let idx = index::parse_create_index(stmt, line)?;
            attach_index_to_table(&mut model, idx, line)?;
        } else if upper.starts_with("CREATE MATERIALIZED VIEW") || upper.starts_with("CREATE VIEW") {
            let view = view::parse_create_view(stmt, line)?;
            model.views.insert(view.name.clone(), view);
        } else if upper.starts_with("CREATE TYPE") {
            let e = enum_type::parse_create_enum(stmt, line)?;
            model.enums.insert(e.name.clone(), e);
        } else if upper.starts_with("CREATE SEQUENCE") {
            let seq = sequence::parse_create_sequence(stmt, line)?;
            model.sequences.insert(seq.name.clone(), seq);
        } else if upper.starts_with("CREATE FUNCTION") || upper.starts_with("CREATE OR REPLACE FUNCTION") {
            let routine = routine::parse_create_routine(stmt, line)?;
            model.functions.insert(routine.name.clone(), routine);
        } else if upper.starts_with("CREATE PROCEDURE") || upper.starts_with("CREATE OR REPLACE PROCEDURE") {
            let routine = routine::parse_create_routine(stmt, line)?;
            model.procedures.insert(routine.name.clone(), routine);
        } else if upper.starts_with("CREATE TRIGGER") {
            let trg = trigger::parse_create_trigger(stmt, line)?;
            model.triggers.insert(trg.name.clone(), trg);
        } else if upper.starts_with("CREATE SCHEMA") {
            let s = misc::parse_create_schema(stmt, line)?;
            model.schemas.insert(s.name.clone(), s);
        } else if upper.starts_with("CREATE EXTENSION") {
            let ext = misc::parse_create_extension(stmt, line)?;
            model.extensions.insert(ext.name.clone(), ext);
        } else if upper.starts_with("COMMENT ON") {
            let comment = misc::parse_comment_on(stmt, line)?;
            model.comments.push(comment);
        } else {
            return Err(SchemaSyncError::parser(
                ParserErrorKind::UnsupportedStatement,
                format!("unrecognized statement: '{}'", first_words(stmt)),
                Some(line),
            ));
        }
    }

    Ok(model)
}

/// Attach a standalone `CREATE INDEX` to the table it targets, or record it
/// against a materialized view's index list when no matching table exists.
fn attach_index_to_table(model: &mut SchemaModel, idx: crate::model::Index, line: usize) -> Result<()> {
    if let Some(table) = model
        .tables
        .values_mut()
        .find(|t| t.name == idx.table || t.qualified_name() == idx.table)
    {
        table.indexes.push(idx);
        return Ok(());
    }
    if let Some(view) = model.views.values_mut().find(|v| v.name == idx.table) {
        view.indexes.push(idx);
        return Ok(());
    }
    Err(SchemaSyncError::parser(
        ParserErrorKind::AmbiguousConstraint,
        format!(
            "index '{}' targets '{}', which is not declared before it",
            idx.name, idx.table
        ),
        Some(line),
    ))
}

fn offset_of(haystack: &str, needle: &str) -> usize {
    let haystack_ptr = haystack.as_ptr() as usize;
    let needle_ptr = needle.as_ptr() as usize;
    needle_ptr.saturating_sub(haystack_ptr)
}

fn first_words(stmt: &str) -> String {
    stmt.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_schema_requires_tables_before_indexes() {
        let sql = "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT);\nCREATE INDEX idx_email ON users (email);";
        let model = parse_schema(sql).unwrap();
        assert_eq!(model.tables["users"].indexes.len(), 1);
    }

    #[test]
    fn test_parse_schema_rejects_alter_table() {
        let err = parse_schema("ALTER TABLE users ADD COLUMN age INTEGER;").unwrap_err();
        match err {
            SchemaSyncError::ParserError { kind, .. } => {
                assert_eq!(kind, ParserErrorKind::UnsupportedStatement)
            }
            other => panic!("expected ParserError, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_schema_rejects_drop_table() {
        let err = parse_schema("DROP TABLE users;").unwrap_err();
        assert!(err.to_string().contains("target state"));
    }

    #[test]
    fn test_parse_schema_index_before_table_is_ambiguous() {
        let err = parse_schema("CREATE INDEX idx ON ghost (a);").unwrap_err();
        assert!(matches!(
            err,
            SchemaSyncError::ParserError {
                kind: ParserErrorKind::AmbiguousConstraint,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_schema_multiple_statement_kinds() {
        let sql = r#"
            CREATE SCHEMA app;
            CREATE TYPE status AS ENUM ('on', 'off');
            CREATE TABLE app.widgets (id INTEGER PRIMARY KEY, state status NOT NULL DEFAULT 'on');
            CREATE SEQUENCE app.widgets_serial_seq OWNED BY app.widgets.id;
        "#;
        let model = parse_schema(sql).unwrap();
        assert!(model.schemas.contains_key("app"));
        assert!(model.enums.contains_key("status"));
        assert!(model.tables.contains_key("app.widgets"));
        assert!(model.sequences.contains_key("widgets_serial_seq"));
    }

    #[test]
    fn test_parse_schema_rejects_unrecognized_statement() {
        let err = parse_schema("GRANT SELECT ON users TO app_role;").unwrap_err();
        assert!(matches!(
            err,
            SchemaSyncError::ParserError {
                kind: ParserErrorKind::UnsupportedStatement,
                ..
            }
        ));
    }
}
