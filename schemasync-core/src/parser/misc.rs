//! `CREATE SCHEMA`, `CREATE EXTENSION`, and `COMMENT ON` parsing.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::canon::canonicalize_identifier;
use crate::error::{ParserErrorKind, Result, SchemaSyncError};
use crate::model::{Comment, Extension, SchemaDefinition};

static CREATE_SCHEMA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^CREATE\s+SCHEMA\s+(?:IF\s+NOT\s+EXISTS\s+)?([A-Za-z_"][A-Za-z0-9_"]*)\s*$"#).unwrap()
});
static CREATE_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)^CREATE\s+EXTENSION\s+(?:IF\s+NOT\s+EXISTS\s+)?([A-Za-z_"][A-Za-z0-9_"]*)\s*(?:WITH\s+)?(?:SCHEMA\s+\S+\s*)?(?:VERSION\s+'?([^'\s]+)'?)?\s*$"#,
    )
    .unwrap()
});
static COMMENT_ON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^COMMENT\s+ON\s+(\w+(?:\s+\w+)?)\s+([A-Za-z_"][A-Za-z0-9_".]*)\s+IS\s+(NULL|'(?:[^']|'')*')\s*$"#)
        .unwrap()
});

/// Parse `CREATE SCHEMA [IF NOT EXISTS] name`.
pub fn parse_create_schema(stmt: &str, line: usize) -> Result<SchemaDefinition> {
    let caps = CREATE_SCHEMA.captures(stmt).ok_or_else(|| {
        SchemaSyncError::parser(
            ParserErrorKind::SyntaxError,
            "malformed CREATE SCHEMA statement",
            Some(line),
        )
    })?;
    Ok(SchemaDefinition {
        name: canonicalize_identifier(caps.get(1).unwrap().as_str()),
    })
}

/// Parse `CREATE EXTENSION [IF NOT EXISTS] name [WITH] [SCHEMA s] [VERSION v]`.
pub fn parse_create_extension(stmt: &str, line: usize) -> Result<Extension> {
    let caps = CREATE_EXTENSION.captures(stmt).ok_or_else(|| {
        SchemaSyncError::parser(
            ParserErrorKind::SyntaxError,
            "malformed CREATE EXTENSION statement",
            Some(line),
        )
    })?;
    Ok(Extension {
        name: canonicalize_identifier(caps.get(1).unwrap().as_str()),
        version: caps.get(2).map(|m| m.as_str().to_string()),
    })
}

/// Parse `COMMENT ON {kind} {name} IS {'text' | NULL}`.
///
/// A `NULL` comment text is represented as an empty-string comment rather than
/// omitted, since declaring `COMMENT ON ... IS NULL` is itself meaningful
/// against a live database that carries a non-null comment.
pub fn parse_comment_on(stmt: &str, line: usize) -> Result<Comment> {
    let caps = COMMENT_ON.captures(stmt).ok_or_else(|| {
        SchemaSyncError::parser(
            ParserErrorKind::SyntaxError,
            "malformed COMMENT ON statement",
            Some(line),
        )
    })?;

    let object_kind = caps.get(1).unwrap().as_str().to_uppercase();
    let object_name = canonicalize_identifier(caps.get(2).unwrap().as_str());
    let raw_text = caps.get(3).unwrap().as_str();
    let text = if raw_text.eq_ignore_ascii_case("NULL") {
        String::new()
    } else {
        raw_text
            .trim_matches('\'')
            .replace("''", "'")
    };

    Ok(Comment {
        object_kind,
        object_name,
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create_schema() {
        let s = parse_create_schema("CREATE SCHEMA IF NOT EXISTS app", 1).unwrap();
        assert_eq!(s.name, "app");
    }

    #[test]
    fn test_parse_create_extension_with_version() {
        let e = parse_create_extension("CREATE EXTENSION IF NOT EXISTS postgis VERSION '3.1'", 1).unwrap();
        assert_eq!(e.name, "postgis");
        assert_eq!(e.version.as_deref(), Some("3.1"));
    }

    #[test]
    fn test_parse_create_extension_no_version() {
        let e = parse_create_extension("CREATE EXTENSION pgcrypto", 1).unwrap();
        assert_eq!(e.version, None);
    }

    #[test]
    fn test_parse_comment_on_table() {
        let c = parse_comment_on("COMMENT ON TABLE users IS 'stores accounts'", 1).unwrap();
        assert_eq!(c.object_kind, "TABLE");
        assert_eq!(c.object_name, "users");
        assert_eq!(c.text, "stores accounts");
    }

    #[test]
    fn test_parse_comment_on_null() {
        let c = parse_comment_on("COMMENT ON COLUMN users.email IS NULL", 1).unwrap();
        assert_eq!(c.text, "");
    }
}
