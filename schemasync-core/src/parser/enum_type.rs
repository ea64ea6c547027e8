//! `CREATE TYPE ... AS ENUM (...)` parsing.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::canon::canonicalize_identifier;
use crate::error::{ParserErrorKind, Result, SchemaSyncError};
use crate::model::EnumType;

static CREATE_ENUM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^CREATE\s+TYPE\s+([A-Za-z_"][A-Za-z0-9_".]*)\s+AS\s+ENUM\s*\(([^)]*)\)\s*$"#)
        .unwrap()
});

/// Parse `CREATE TYPE name AS ENUM ('a', 'b', ...)`.
pub fn parse_create_enum(stmt: &str, line: usize) -> Result<EnumType> {
    let caps = CREATE_ENUM.captures(stmt).ok_or_else(|| {
        SchemaSyncError::parser(
            ParserErrorKind::InvalidEnumType,
            "malformed CREATE TYPE ... AS ENUM statement",
            Some(line),
        )
    })?;

    let raw_name = caps.get(1).unwrap().as_str();
    let name = canonicalize_identifier(raw_name.rsplit('.').next().unwrap_or(raw_name));
    let values = caps
        .get(2)
        .unwrap()
        .as_str()
        .split(',')
        .map(|v| v.trim().trim_matches('\'').replace("''", "'"))
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>();

    if values.is_empty() {
        return Err(SchemaSyncError::parser(
            ParserErrorKind::InvalidEnumType,
            format!("enum type '{}' declares no values", name),
            Some(line),
        ));
    }

    Ok(EnumType { name, values })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_enum() {
        let e = parse_create_enum("CREATE TYPE status AS ENUM ('pending', 'active', 'closed')", 1).unwrap();
        assert_eq!(e.name, "status");
        assert_eq!(e.values, vec!["pending", "active", "closed"]);
    }

    #[test]
    fn test_parse_enum_value_order_preserved() {
        let e = parse_create_enum("CREATE TYPE t AS ENUM ('z', 'a', 'm')", 1).unwrap();
        assert_eq!(e.values, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_parse_enum_with_embedded_quote() {
        let e = parse_create_enum("CREATE TYPE t AS ENUM ('it''s', 'ok')", 1).unwrap();
        assert_eq!(e.values[0], "it's");
    }

    #[test]
    fn test_parse_enum_rejects_empty_value_list() {
        let err = parse_create_enum("CREATE TYPE t AS ENUM ()", 1).unwrap_err();
        assert!(err.to_string().contains("invalid enum type"));
    }
}
