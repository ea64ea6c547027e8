//! `CREATE TABLE` parsing: column definitions plus inline-constraint hoisting.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::canon::{canonicalize_default, canonicalize_identifier, parse_type};
use crate::error::{ParserErrorKind, Result, SchemaSyncError};
use crate::expr::canonicalize_check_expression;
use crate::model::{
    CheckConstraint, Column, ForeignKey, Generated, PrimaryKey, ReferentialAction, Table,
    UniqueConstraint,
};

static CREATE_TABLE_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:([A-Za-z_][A-Za-z0-9_]*)\.)?([A-Za-z_"][A-Za-z0-9_"]*)\s*\((.*)\)\s*$"#).unwrap()
});

/// Split a `CREATE TABLE (...)` body into top-level comma-separated items,
/// respecting nested parentheses and string literals.
fn split_top_level(body: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                current.push(c);
            }
            '\'' => {
                current.push(c);
                for c2 in chars.by_ref() {
                    current.push(c2);
                    if c2 == '\'' {
                        break;
                    }
                }
            }
            ',' if depth == 0 => {
                items.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        items.push(current.trim().to_string());
    }
    items
}

fn parse_action(s: &str) -> ReferentialAction {
    match s.trim().to_uppercase().as_str() {
        "CASCADE" => ReferentialAction::Cascade,
        "RESTRICT" => ReferentialAction::Restrict,
        "SET NULL" => ReferentialAction::SetNull,
        "SET DEFAULT" => ReferentialAction::SetDefault,
        _ => ReferentialAction::NoAction,
    }
}

static ON_DELETE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)ON\s+DELETE\s+(CASCADE|RESTRICT|SET\s+NULL|SET\s+DEFAULT|NO\s+ACTION)").unwrap()
});
static ON_UPDATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)ON\s+UPDATE\s+(CASCADE|RESTRICT|SET\s+NULL|SET\s+DEFAULT|NO\s+ACTION)").unwrap()
});
static REFERENCES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)REFERENCES\s+([A-Za-z_][A-Za-z0-9_]*)\s*(?:\(([^)]*)\))?").unwrap()
});
static COLUMN_CHECK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)CHECK\s*\(([^)]*(?:\([^)]*\)[^)]*)*)\)").unwrap());
static DEFAULT_EXPR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)DEFAULT\s+('(?:[^']|'')*'|\([^)]*\)|[^\s,]+(?:\([^)]*\))?)").unwrap()
});
static GENERATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)GENERATED\s+ALWAYS\s+AS\s*\(([^)]*(?:\([^)]*\)[^)]*)*)\)\s*STORED").unwrap()
});
static CONSTRAINT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^CONSTRAINT\s+([A-Za-z_][A-Za-z0-9_]*)\s+").unwrap());

/// Parse `CREATE TABLE name (col ..., ...)` into a `Table`.
///
/// Column-level `REFERENCES`, `CHECK`, `UNIQUE`, and `PRIMARY KEY` are hoisted
/// into named table-level constraints, matching the inline-constraint-hoisting
/// algorithm this tool uses everywhere else.
pub fn parse_create_table(stmt: &str, line: usize) -> Result<Table> {
    let caps = CREATE_TABLE_HEAD.captures(stmt).ok_or_else(|| {
        SchemaSyncError::parser(
            ParserErrorKind::SyntaxError,
            "malformed CREATE TABLE statement",
            Some(line),
        )
    })?;

    let schema = caps.get(1).map(|m| canonicalize_identifier(m.as_str()));
    let name = canonicalize_identifier(caps.get(2).unwrap().as_str());
    let body = caps.get(3).unwrap().as_str();

    let mut table = Table::new(name.clone());
    table.schema = schema;

    for item in split_top_level(body) {
        let upper = item.trim_start().to_uppercase();

        if upper.starts_with("PRIMARY KEY") {
            hoist_table_primary_key(&mut table, &item);
        } else if upper.starts_with("FOREIGN KEY") || upper.starts_with("CONSTRAINT") && item.to_uppercase().contains("FOREIGN KEY") {
            hoist_table_foreign_key(&mut table, &item);
        } else if upper.starts_with("UNIQUE") || (upper.starts_with("CONSTRAINT") && upper.contains("UNIQUE")) {
            hoist_table_unique(&mut table, &item);
        } else if upper.starts_with("CHECK") || (upper.starts_with("CONSTRAINT") && upper.contains("CHECK")) {
            hoist_table_check(&mut table, &item);
        } else {
            parse_column(&mut table, &item, line)?;
        }
    }

    Ok(table)
}

fn explicit_name(item: &str) -> Option<String> {
    CONSTRAINT_NAME
        .captures(item)
        .map(|c| canonicalize_identifier(c.get(1).unwrap().as_str()))
}

fn hoist_table_primary_key(table: &mut Table, item: &str) {
    let cols = extract_paren_list(item, "PRIMARY KEY");
    let name = explicit_name(item).unwrap_or_else(|| format!("pk_{}", table.name));
    table.primary_key = Some(PrimaryKey { name, columns: cols.clone() });
    for col in &mut table.columns {
        if cols.contains(&col.name) {
            col.nullable = false;
        }
    }
}

fn hoist_table_foreign_key(table: &mut Table, item: &str) {
    let cols = extract_paren_list(item, "FOREIGN KEY");
    let refs = REFERENCES.captures(item);
    let (ref_table, ref_cols) = match refs {
        Some(c) => (
            canonicalize_identifier(c.get(1).unwrap().as_str()),
            c.get(2)
                .map(|m| split_ident_list(m.as_str()))
                .unwrap_or_default(),
        ),
        None => (String::new(), Vec::new()),
    };
    let on_delete = ON_DELETE
        .captures(item)
        .map(|c| parse_action(c.get(1).unwrap().as_str()))
        .unwrap_or_default();
    let on_update = ON_UPDATE
        .captures(item)
        .map(|c| parse_action(c.get(1).unwrap().as_str()))
        .unwrap_or_default();
    let name = explicit_name(item)
        .unwrap_or_else(|| format!("fk_{}_{}", table.name, cols.join("_")));
    table.foreign_keys.push(ForeignKey {
        name,
        columns: cols,
        ref_table,
        ref_columns: ref_cols,
        on_delete,
        on_update,
    });
}

fn hoist_table_unique(table: &mut Table, item: &str) {
    let cols = extract_paren_list(item, "UNIQUE");
    let name = explicit_name(item).unwrap_or_else(|| format!("uq_{}_{}", table.name, cols.join("_")));
    let deferrable = item.to_uppercase().contains("DEFERRABLE") && !item.to_uppercase().contains("NOT DEFERRABLE");
    let initially_deferred = item.to_uppercase().contains("INITIALLY DEFERRED");
    table.uniques.push(UniqueConstraint {
        name,
        columns: cols,
        deferrable,
        initially_deferred,
    });
}

fn hoist_table_check(table: &mut Table, item: &str) {
    let expr = COLUMN_CHECK
        .captures(item)
        .map(|c| canonicalize_check_expression(c.get(1).unwrap().as_str()))
        .unwrap_or_default();
    let name = explicit_name(item).unwrap_or_else(|| format!("ck_{}_{}", table.name, table.checks.len() + 1));
    table.checks.push(CheckConstraint { name, expression: expr });
}

fn extract_paren_list(item: &str, keyword: &str) -> Vec<String> {
    let upper = item.to_uppercase();
    let kw_pos = match upper.find(keyword) {
        Some(p) => p,
        None => return Vec::new(),
    };
    let rest = &item[kw_pos + keyword.len()..];
    match rest.find('(') {
        Some(open) => {
            if let Some(close_rel) = rest[open..].find(')') {
                split_ident_list(&rest[open + 1..open + close_rel])
            } else {
                Vec::new()
            }
        }
        None => Vec::new(),
    }
}

fn split_ident_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|p| canonicalize_identifier(p.trim()))
        .filter(|p| !p.is_empty())
        .collect()
}

/// Parse a single column definition, hoisting any inline constraints it carries.
fn parse_column(table: &mut Table, item: &str, line: usize) -> Result<()> {
    let mut chars = item.trim().char_indices();
    let name_end = loop {
        match chars.next() {
            Some((i, c)) if c.is_whitespace() => break i,
            Some(_) => continue,
            None => break item.len(),
        }
    };
    let raw_name = &item[..name_end];
    if raw_name.is_empty() {
        return Err(SchemaSyncError::parser(
            ParserErrorKind::SyntaxError,
            format!("could not determine column name in '{}'", item),
            Some(line),
        ));
    }
    let name = canonicalize_identifier(raw_name);
    let rest = item[name_end..].trim();

    // The type token is everything up to the first constraint keyword or the
    // end of the item; it may itself contain parens (e.g. NUMERIC(10,2)).
    let type_str = extract_type_token(rest);
    let remainder = rest[type_str.len()..].trim();

    let (base_type, is_serial) = expand_serial(&type_str);
    let canonical = parse_type(&base_type).to_string();

    let mut column = Column::new(name.clone(), canonical.clone());

    let upper_remainder = remainder.to_uppercase();
    column.nullable = !upper_remainder.contains("NOT NULL");

    if let Some(caps) = GENERATED.captures(remainder) {
        column.generated = Some(Generated {
            always: true,
            expression: caps.get(1).unwrap().as_str().trim().to_string(),
            stored: true,
        });
    } else if let Some(caps) = DEFAULT_EXPR.captures(remainder) {
        column.default = Some(canonicalize_default(caps.get(1).unwrap().as_str(), &canonical));
    }

    if is_serial {
        column.default = Some(format!("nextval('{}_{}_seq'::regclass)", table.name, name));
        column.nullable = false;
    }

    if upper_remainder.contains("PRIMARY KEY") {
        table.primary_key = Some(PrimaryKey {
            name: format!("pk_{}", table.name),
            columns: vec![name.clone()],
        });
        column.nullable = false;
    }

    if upper_remainder.contains("UNIQUE") {
        table.uniques.push(UniqueConstraint {
            name: format!("uq_{}_{}", table.name, name),
            columns: vec![name.clone()],
            deferrable: false,
            initially_deferred: false,
        });
    }

    if let Some(caps) = COLUMN_CHECK.captures(remainder) {
        table.checks.push(CheckConstraint {
            name: format!("ck_{}_{}", table.name, name),
            expression: canonicalize_check_expression(caps.get(1).unwrap().as_str()),
        });
    }

    if let Some(caps) = REFERENCES.captures(remainder) {
        let ref_table = canonicalize_identifier(caps.get(1).unwrap().as_str());
        let ref_cols = caps
            .get(2)
            .map(|m| split_ident_list(m.as_str()))
            .unwrap_or_default();
        let on_delete = ON_DELETE
            .captures(remainder)
            .map(|c| parse_action(c.get(1).unwrap().as_str()))
            .unwrap_or_default();
        let on_update = ON_UPDATE
            .captures(remainder)
            .map(|c| parse_action(c.get(1).unwrap().as_str()))
            .unwrap_or_default();
        table.foreign_keys.push(ForeignKey {
            name: format!("fk_{}_{}", table.name, name),
            columns: vec![name.clone()],
            ref_table,
            ref_columns: ref_cols,
            on_delete,
            on_update,
        });
    }

    table.columns.push(column);
    Ok(())
}

fn extract_type_token(rest: &str) -> &str {
    let bytes = rest.as_bytes();
    let mut i = 0;
    let mut depth = 0i32;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth -= 1,
            b' ' | b'\t' if depth == 0 => break,
            _ => {}
        }
        i += 1;
    }
    // Greedily absorb a following "WITH TIME ZONE" / "WITHOUT TIME ZONE" / "VARYING"
    let head = &rest[..i];
    let after = rest[i..].trim_start();
    let after_upper = after.to_uppercase();
    for suffix in ["WITH TIME ZONE", "WITHOUT TIME ZONE", "VARYING"] {
        if after_upper.starts_with(suffix) {
            let end = i + (rest[i..].len() - rest[i..].trim_start().len()) + suffix.len();
            return &rest[..end];
        }
    }
    head
}

fn expand_serial(type_str: &str) -> (String, bool) {
    match type_str.trim().to_uppercase().as_str() {
        "SERIAL" | "SERIAL4" => ("INTEGER".to_string(), true),
        "SMALLSERIAL" | "SERIAL2" => ("SMALLINT".to_string(), true),
        "BIGSERIAL" | "SERIAL8" => ("BIGINT".to_string(), true),
        _ => (type_str.to_string(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_table() {
        let t = parse_create_table(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, email VARCHAR(255))",
            1,
        )
        .unwrap();
        assert_eq!(t.name, "users");
        assert_eq!(t.columns.len(), 2);
        assert_eq!(t.columns[0].name, "id");
        assert_eq!(t.columns[1].name, "email");
        assert_eq!(t.primary_key.as_ref().unwrap().columns, vec!["id"]);
    }

    #[test]
    fn test_column_order_preserved() {
        let t = parse_create_table(
            "CREATE TABLE t (c INTEGER, a INTEGER, b INTEGER)",
            1,
        )
        .unwrap();
        let names: Vec<_> = t.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_serial_expands_to_integer_plus_default() {
        let t = parse_create_table("CREATE TABLE t (id SERIAL PRIMARY KEY)", 1).unwrap();
        assert_eq!(t.columns[0].canonical_type, "INTEGER");
        assert!(t.columns[0].default.as_ref().unwrap().starts_with("nextval"));
        assert!(!t.columns[0].nullable);
    }

    #[test]
    fn test_inline_foreign_key_hoisted() {
        let t = parse_create_table(
            "CREATE TABLE orders (id INTEGER PRIMARY KEY, user_id INTEGER REFERENCES users(id) ON DELETE CASCADE)",
            1,
        )
        .unwrap();
        assert_eq!(t.foreign_keys.len(), 1);
        let fk = &t.foreign_keys[0];
        assert_eq!(fk.ref_table, "users");
        assert_eq!(fk.columns, vec!["user_id"]);
        assert_eq!(fk.on_delete, ReferentialAction::Cascade);
        assert_eq!(fk.name, "fk_orders_user_id");
    }

    #[test]
    fn test_table_level_composite_primary_key() {
        let t = parse_create_table(
            "CREATE TABLE sessions (user_id INTEGER, session_token TEXT, PRIMARY KEY (user_id, session_token))",
            1,
        )
        .unwrap();
        let pk = t.primary_key.unwrap();
        assert_eq!(pk.columns, vec!["user_id", "session_token"]);
    }

    #[test]
    fn test_table_level_named_foreign_key() {
        let t = parse_create_table(
            "CREATE TABLE a (id INTEGER PRIMARY KEY, b_id INTEGER, CONSTRAINT fk_a_b FOREIGN KEY (b_id) REFERENCES b (id))",
            1,
        )
        .unwrap();
        assert_eq!(t.foreign_keys[0].name, "fk_a_b");
        assert_eq!(t.foreign_keys[0].ref_table, "b");
    }

    #[test]
    fn test_unique_column_order_significant() {
        let t1 = parse_create_table("CREATE TABLE t (a INTEGER, b INTEGER, UNIQUE (a, b))", 1).unwrap();
        let t2 = parse_create_table("CREATE TABLE t (a INTEGER, b INTEGER, UNIQUE (b, a))", 1).unwrap();
        assert_ne!(t1.uniques[0].columns, t2.uniques[0].columns);
    }

    #[test]
    fn test_check_constraint_hoisted() {
        let t = parse_create_table(
            "CREATE TABLE t (age INTEGER CHECK (age >= 0))",
            1,
        )
        .unwrap();
        assert_eq!(t.checks.len(), 1);
        assert!(t.checks[0].expression.contains("age"));
    }

    #[test]
    fn test_default_with_cast_canonicalized() {
        let t = parse_create_table(
            "CREATE TABLE t (label TEXT DEFAULT 'x'::text)",
            1,
        )
        .unwrap();
        assert_eq!(t.columns[0].default.as_deref(), Some("'x'"));
    }

    #[test]
    fn test_schema_qualified_table_name() {
        let t = parse_create_table("CREATE TABLE app.users (id INTEGER)", 1).unwrap();
        assert_eq!(t.schema.as_deref(), Some("app"));
        assert_eq!(t.qualified_name(), "app.users");
    }
}
