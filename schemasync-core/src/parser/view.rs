//! `CREATE [MATERIALIZED] VIEW` parsing.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::canon::canonicalize_identifier;
use crate::error::{ParserErrorKind, Result, SchemaSyncError};
use crate::model::View;

static CREATE_VIEW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)^CREATE\s+(MATERIALIZED\s+)?VIEW\s+(?:IF\s+NOT\s+EXISTS\s+)?([A-Za-z_"][A-Za-z0-9_".]*)\s+AS\s+(.*?)(?:\s+WITH\s+(CASCADED|LOCAL)\s+CHECK\s+OPTION)?\s*$"#,
    )
    .unwrap()
});
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Parse `CREATE [MATERIALIZED] VIEW name AS SELECT ...`.
pub fn parse_create_view(stmt: &str, line: usize) -> Result<View> {
    let caps = CREATE_VIEW.captures(stmt).ok_or_else(|| {
        SchemaSyncError::parser(
            ParserErrorKind::SyntaxError,
            "malformed CREATE VIEW statement",
            Some(line),
        )
    })?;

    let materialized = caps.get(1).is_some();
    let raw_name = caps.get(2).unwrap().as_str();
    let name = canonicalize_identifier(raw_name.rsplit('.').next().unwrap_or(raw_name));
    let definition = WHITESPACE
        .replace_all(caps.get(3).unwrap().as_str().trim(), " ")
        .to_string();
    let check_option = caps.get(4).map(|m| m.as_str().to_uppercase());

    Ok(View {
        name,
        definition,
        check_option,
        materialized,
        indexes: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_view() {
        let v = parse_create_view("CREATE VIEW active_users AS SELECT * FROM users WHERE active = true", 1).unwrap();
        assert_eq!(v.name, "active_users");
        assert!(!v.materialized);
        assert!(v.definition.starts_with("SELECT"));
    }

    #[test]
    fn test_parse_materialized_view() {
        let v = parse_create_view("CREATE MATERIALIZED VIEW mv AS SELECT 1", 1).unwrap();
        assert!(v.materialized);
    }

    #[test]
    fn test_parse_view_with_check_option() {
        let v = parse_create_view(
            "CREATE VIEW v AS SELECT * FROM t WITH LOCAL CHECK OPTION",
            1,
        )
        .unwrap();
        assert_eq!(v.check_option.as_deref(), Some("LOCAL"));
    }

    #[test]
    fn test_definition_whitespace_normalized() {
        let v = parse_create_view("CREATE VIEW v AS SELECT  1,\n  2", 1).unwrap();
        assert_eq!(v.definition, "SELECT 1, 2");
    }
}
