//! `CREATE INDEX` parsing and the standalone-index-to-table association pass.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex_lite::Regex;

use crate::canon::canonicalize_identifier;
use crate::error::{ParserErrorKind, Result, SchemaSyncError};
use crate::model::{Index, IndexColumn, IndexMethod, IndexOwner};

// Clause order after the column list matches PostgreSQL's grammar: an
// optional `WITH (storage_params)`, then an optional `TABLESPACE name`, then
// an optional `WHERE predicate`.
static CREATE_INDEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)^CREATE\s+(UNIQUE\s+)?INDEX\s+(CONCURRENTLY\s+)?(?:IF\s+NOT\s+EXISTS\s+)?([A-Za-z_"][A-Za-z0-9_"]*)\s+ON\s+(?:ONLY\s+)?([A-Za-z_"][A-Za-z0-9_".]*)\s*(?:USING\s+(\w+)\s*)?\(([^)]*(?:\([^)]*\)[^)]*)*)\)\s*(?:WITH\s*\(([^)]*)\)\s*)?(?:TABLESPACE\s+([A-Za-z_"][A-Za-z0-9_"]*)\s*)?(?:WHERE\s+(.*))?$"#,
    )
    .unwrap()
});

/// Parse a `WITH (fillfactor = 70, fastupdate = off)` clause body into its
/// individual key/value storage parameters.
fn parse_storage_params(raw: &str) -> BTreeMap<String, String> {
    split_commas(raw)
        .into_iter()
        .filter_map(|entry| {
            let (key, value) = entry.split_once('=')?;
            Some((key.trim().to_lowercase(), value.trim().to_string()))
        })
        .collect()
}

fn parse_method(raw: Option<&str>) -> IndexMethod {
    match raw.map(|s| s.to_uppercase()).as_deref() {
        Some("HASH") => IndexMethod::Hash,
        Some("GIN") => IndexMethod::Gin,
        Some("GIST") => IndexMethod::Gist,
        Some("SPGIST") => IndexMethod::Spgist,
        Some("BRIN") => IndexMethod::Brin,
        _ => IndexMethod::Btree,
    }
}

fn parse_columns_or_expression(raw: &str) -> (Vec<IndexColumn>, Option<String>) {
    // A single bare expression containing no top-level comma and that isn't a
    // plain identifier list is an expression index.
    let parts = split_commas(raw);
    let mut columns = Vec::new();
    for part in &parts {
        let trimmed = part.trim();
        let is_plain_ident = trimmed
            .split_whitespace()
            .next()
            .map(|head| {
                head.chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '"')
            })
            .unwrap_or(false)
            && !trimmed.contains('(');
        if !is_plain_ident {
            return (Vec::new(), Some(raw.trim().to_string()));
        }
        let descending = trimmed.to_uppercase().contains(" DESC");
        let name_part = trimmed.split_whitespace().next().unwrap_or(trimmed);
        columns.push(IndexColumn {
            name: canonicalize_identifier(name_part),
            descending,
            opclass: None,
        });
    }
    (columns, None)
}

fn split_commas(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in s.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                out.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        out.push(current.trim().to_string());
    }
    out
}

/// Parse `CREATE [UNIQUE] INDEX [CONCURRENTLY] name ON table [USING method] (...)`.
pub fn parse_create_index(stmt: &str, line: usize) -> Result<Index> {
    let caps = CREATE_INDEX.captures(stmt).ok_or_else(|| {
        SchemaSyncError::parser(
            ParserErrorKind::SyntaxError,
            "malformed CREATE INDEX statement",
            Some(line),
        )
    })?;

    let unique = caps.get(1).is_some();
    let concurrent = caps.get(2).is_some();
    let name = canonicalize_identifier(caps.get(3).unwrap().as_str());
    let table_raw = caps.get(4).unwrap().as_str();
    let table = canonicalize_identifier(table_raw.rsplit('.').next().unwrap_or(table_raw));
    let method = parse_method(caps.get(5).map(|m| m.as_str()));
    let (columns, expression) = parse_columns_or_expression(caps.get(6).unwrap().as_str());
    let storage_params = caps.get(7).map(|m| parse_storage_params(m.as_str())).unwrap_or_default();
    let tablespace = caps.get(8).map(|m| canonicalize_identifier(m.as_str()));
    let predicate = caps.get(9).map(|m| m.as_str().trim().to_string());

    Ok(Index {
        name,
        table,
        columns,
        expression,
        method,
        unique,
        concurrent,
        predicate,
        storage_params,
        tablespace,
        owner: IndexOwner::None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_index() {
        let idx = parse_create_index("CREATE INDEX idx_users_email ON users (email)", 1).unwrap();
        assert_eq!(idx.name, "idx_users_email");
        assert_eq!(idx.table, "users");
        assert_eq!(idx.columns[0].name, "email");
        assert!(!idx.unique);
    }

    #[test]
    fn test_parse_unique_concurrent_index() {
        let idx = parse_create_index(
            "CREATE UNIQUE INDEX CONCURRENTLY idx_u ON t (a, b)",
            1,
        )
        .unwrap();
        assert!(idx.unique);
        assert!(idx.concurrent);
        assert_eq!(idx.columns.len(), 2);
    }

    #[test]
    fn test_parse_index_with_method_and_predicate() {
        let idx = parse_create_index(
            "CREATE INDEX idx_g ON t USING gin (data) WHERE deleted_at IS NULL",
            1,
        )
        .unwrap();
        assert_eq!(idx.method, IndexMethod::Gin);
        assert_eq!(idx.predicate.as_deref(), Some("deleted_at IS NULL"));
    }

    #[test]
    fn test_parse_expression_index() {
        let idx = parse_create_index("CREATE INDEX idx_lower ON t (lower(email))", 1).unwrap();
        assert!(idx.columns.is_empty());
        assert_eq!(idx.expression.as_deref(), Some("lower(email)"));
    }

    #[test]
    fn test_parse_descending_column() {
        let idx = parse_create_index("CREATE INDEX idx_d ON t (created_at DESC)", 1).unwrap();
        assert!(idx.columns[0].descending);
    }

    #[test]
    fn test_parse_index_with_storage_params() {
        let idx = parse_create_index(
            "CREATE INDEX idx_w ON t (email) WITH (fillfactor = 70, fastupdate = off)",
            1,
        )
        .unwrap();
        assert_eq!(idx.storage_params.get("fillfactor").map(String::as_str), Some("70"));
        assert_eq!(idx.storage_params.get("fastupdate").map(String::as_str), Some("off"));
    }

    #[test]
    fn test_parse_index_with_tablespace() {
        let idx = parse_create_index("CREATE INDEX idx_ts ON t (email) TABLESPACE fast_ssd", 1).unwrap();
        assert_eq!(idx.tablespace.as_deref(), Some("fast_ssd"));
    }

    #[test]
    fn test_parse_index_with_storage_params_tablespace_and_predicate() {
        let idx = parse_create_index(
            "CREATE INDEX idx_full ON t (email) WITH (fillfactor = 90) TABLESPACE fast_ssd WHERE deleted_at IS NULL",
            1,
        )
        .unwrap();
        assert_eq!(idx.storage_params.get("fillfactor").map(String::as_str), Some("90"));
        assert_eq!(idx.tablespace.as_deref(), Some("fast_ssd"));
        assert_eq!(idx.predicate.as_deref(), Some("deleted_at IS NULL"));
    }
}
