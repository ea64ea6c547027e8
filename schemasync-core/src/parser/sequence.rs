//! `CREATE SEQUENCE` parsing, including `OWNED BY`.
//!
//! Sequences are parsed in full rather than stubbed: every clause PostgreSQL
//! accepts on `CREATE SEQUENCE` is recognized here (see DESIGN.md's resolution
//! of the procedures/sequences Open Question).

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::canon::canonicalize_identifier;
use crate::error::{ParserErrorKind, Result, SchemaSyncError};
use crate::model::Sequence;

static CREATE_SEQUENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^CREATE\s+SEQUENCE\s+(?:IF\s+NOT\s+EXISTS\s+)?([A-Za-z_"][A-Za-z0-9_".]*)\s*(.*)$"#)
        .unwrap()
});
static AS_TYPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bAS\s+(\w+)").unwrap());
static INCREMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bINCREMENT\s+(?:BY\s+)?(-?\d+)").unwrap());
static MINVALUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bMINVALUE\s+(-?\d+)").unwrap());
static MAXVALUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bMAXVALUE\s+(-?\d+)").unwrap());
static START: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bSTART\s+(?:WITH\s+)?(-?\d+)").unwrap());
static CACHE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bCACHE\s+(\d+)").unwrap());
static OWNED_BY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bOWNED\s+BY\s+([A-Za-z_"][A-Za-z0-9_".]*)"#).unwrap());

/// Parse `CREATE SEQUENCE name [AS type] [INCREMENT [BY] n] [MINVALUE n | NO MINVALUE]
/// [MAXVALUE n | NO MAXVALUE] [START [WITH] n] [CACHE n] [[NO] CYCLE] [OWNED BY col]`.
pub fn parse_create_sequence(stmt: &str, line: usize) -> Result<Sequence> {
    let caps = CREATE_SEQUENCE.captures(stmt).ok_or_else(|| {
        SchemaSyncError::parser(
            ParserErrorKind::SyntaxError,
            "malformed CREATE SEQUENCE statement",
            Some(line),
        )
    })?;

    let raw_name = caps.get(1).unwrap().as_str();
    let name = canonicalize_identifier(raw_name.rsplit('.').next().unwrap_or(raw_name));
    let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let upper = rest.to_uppercase();

    let data_type = AS_TYPE
        .captures(rest)
        .map(|c| c.get(1).unwrap().as_str().to_uppercase())
        .unwrap_or_else(|| "BIGINT".to_string());
    let increment = INCREMENT
        .captures(rest)
        .and_then(|c| c.get(1).unwrap().as_str().parse().ok())
        .unwrap_or(1);
    let min_value = if upper.contains("NO MINVALUE") {
        None
    } else {
        MINVALUE.captures(rest).and_then(|c| c.get(1).unwrap().as_str().parse().ok())
    };
    let max_value = if upper.contains("NO MAXVALUE") {
        None
    } else {
        MAXVALUE.captures(rest).and_then(|c| c.get(1).unwrap().as_str().parse().ok())
    };
    let default_start = if increment > 0 { 1 } else { -1 };
    let start = START
        .captures(rest)
        .and_then(|c| c.get(1).unwrap().as_str().parse().ok())
        .unwrap_or(default_start);
    let cache = CACHE
        .captures(rest)
        .and_then(|c| c.get(1).unwrap().as_str().parse().ok())
        .unwrap_or(1);
    let cycle = upper.contains("CYCLE") && !upper.contains("NO CYCLE");
    let owned_by = OWNED_BY.captures(rest).map(|c| {
        let raw = c.get(1).unwrap().as_str();
        canonicalize_identifier(raw.rsplit('.').next().unwrap_or(raw))
    });

    Ok(Sequence {
        name,
        data_type,
        increment,
        min_value,
        max_value,
        start,
        cache,
        cycle,
        owned_by,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_sequence_defaults() {
        let s = parse_create_sequence("CREATE SEQUENCE users_id_seq", 1).unwrap();
        assert_eq!(s.data_type, "BIGINT");
        assert_eq!(s.increment, 1);
        assert_eq!(s.start, 1);
        assert_eq!(s.cache, 1);
        assert!(!s.cycle);
        assert_eq!(s.owned_by, None);
    }

    #[test]
    fn test_parse_sequence_full_clauses() {
        let s = parse_create_sequence(
            "CREATE SEQUENCE seq AS INTEGER INCREMENT BY 2 MINVALUE 0 MAXVALUE 1000 START WITH 10 CACHE 5 CYCLE OWNED BY orders.id",
            1,
        )
        .unwrap();
        assert_eq!(s.data_type, "INTEGER");
        assert_eq!(s.increment, 2);
        assert_eq!(s.min_value, Some(0));
        assert_eq!(s.max_value, Some(1000));
        assert_eq!(s.start, 10);
        assert_eq!(s.cache, 5);
        assert!(s.cycle);
        assert_eq!(s.owned_by.as_deref(), Some("id"));
    }

    #[test]
    fn test_parse_sequence_descending_default_start() {
        let s = parse_create_sequence("CREATE SEQUENCE seq INCREMENT -1", 1).unwrap();
        assert_eq!(s.start, -1);
    }

    #[test]
    fn test_parse_sequence_no_minvalue() {
        let s = parse_create_sequence("CREATE SEQUENCE seq NO MINVALUE", 1).unwrap();
        assert_eq!(s.min_value, None);
    }
}
