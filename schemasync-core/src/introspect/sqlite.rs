//! SQLite catalog introspection via `PRAGMA` queries.
//!
//! SQLite's feature surface is a strict subset of PostgreSQL's (no schemas,
//! enums, routines, or sequences as first-class objects), so this introspector
//! only ever populates `tables`, `views`, and the subset of each `Table`'s
//! constraint fields SQLite itself supports. See [`crate::provider`] for the
//! feature matrix that rejects a declared schema using anything wider.

use rusqlite::Connection;

use crate::canon::{canonicalize_default, canonicalize_identifier, parse_type};
use crate::error::Result;
use crate::expr::canonicalize_check_expression;
use crate::model::{
    CheckConstraint, Column, ForeignKey, Index, IndexColumn, IndexOwner, PrimaryKey,
    ReferentialAction, SchemaModel, Table, View,
};

/// Introspect a SQLite database's tables, views, and indexes.
pub fn introspect_sqlite(conn: &Connection) -> Result<SchemaModel> {
    let mut model = SchemaModel::new();

    let table_names = list_names(conn, "table")?;
    for name in &table_names {
        let table = introspect_table(conn, name)?;
        model.tables.insert(table.qualified_name(), table);
    }

    for name in list_names(conn, "view")? {
        let definition = conn.query_row(
            "SELECT sql FROM sqlite_master WHERE type = 'view' AND name = ?1",
            [&name],
            |row| row.get::<_, String>(0),
        )?;
        model.views.insert(
            canonicalize_identifier(&name),
            View {
                name: canonicalize_identifier(&name),
                definition: normalize_view_body(&definition),
                check_option: None,
                materialized: false,
                indexes: Vec::new(),
            },
        );
    }

    Ok(model)
}

fn list_names(conn: &Connection, kind: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = ?1 AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let names = stmt
        .query_map([kind], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}

fn normalize_view_body(sql: &str) -> String {
    let upper = sql.to_uppercase();
    let as_pos = upper.find(" AS ").map(|p| p + 4).unwrap_or(0);
    sql[as_pos..].split_whitespace().collect::<Vec<_>>().join(" ")
}

fn introspect_table(conn: &Connection, name: &str) -> Result<Table> {
    let mut table = Table::new(canonicalize_identifier(name));

    let mut col_stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_sqlite_ident(name)))?;
    let mut pk_columns: Vec<(i64, String)> = Vec::new();
    let col_rows = col_stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>("name")?,
            row.get::<_, String>("type")?,
            row.get::<_, i64>("notnull")?,
            row.get::<_, Option<String>>("dflt_value")?,
            row.get::<_, i64>("pk")?,
        ))
    })?;

    for r in col_rows {
        let (col_name, col_type, notnull, default, pk_index) = r?;
        let canonical = parse_type(if col_type.trim().is_empty() { "TEXT" } else { &col_type }).to_string();
        let mut column = Column::new(canonicalize_identifier(&col_name), canonical.clone());
        column.nullable = notnull == 0;
        if let Some(d) = default {
            column.default = Some(canonicalize_default(&d, &canonical));
        }
        if pk_index > 0 {
            pk_columns.push((pk_index, column.name.clone()));
        }
        table.columns.push(column);
    }

    if !pk_columns.is_empty() {
        pk_columns.sort_by_key(|(idx, _)| *idx);
        table.primary_key = Some(PrimaryKey {
            name: format!("pk_{}", table.name),
            columns: pk_columns.into_iter().map(|(_, n)| n).collect(),
        });
    }

    let mut fk_stmt = conn.prepare(&format!("PRAGMA foreign_key_list({})", quote_sqlite_ident(name)))?;
    let mut fk_groups: std::collections::BTreeMap<i64, (String, Vec<String>, Vec<String>, String, String)> =
        std::collections::BTreeMap::new();
    let fk_rows = fk_stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>("id")?,
            row.get::<_, String>("table")?,
            row.get::<_, String>("from")?,
            row.get::<_, String>("to")?,
            row.get::<_, String>("on_delete")?,
            row.get::<_, String>("on_update")?,
        ))
    })?;
    for r in fk_rows {
        let (id, ref_table, from_col, to_col, on_delete, on_update) = r?;
        let entry = fk_groups.entry(id).or_insert_with(|| {
            (ref_table.clone(), Vec::new(), Vec::new(), on_delete.clone(), on_update.clone())
        });
        entry.1.push(canonicalize_identifier(&from_col));
        entry.2.push(canonicalize_identifier(&to_col));
    }
    for (id, (ref_table, columns, ref_columns, on_delete, on_update)) in fk_groups {
        table.foreign_keys.push(ForeignKey {
            name: format!("fk_{}_{}", table.name, id),
            columns,
            ref_table: canonicalize_identifier(&ref_table),
            ref_columns,
            on_delete: parse_action(&on_delete),
            on_update: parse_action(&on_update),
        });
    }

    // SQLite doesn't expose CHECK constraint text via PRAGMA; recover it from
    // the original CREATE TABLE text it still stores verbatim.
    let create_sql: Option<String> = conn
        .query_row(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )
        .ok();
    if let Some(sql) = create_sql {
        table.checks = extract_check_constraints(&sql, &table.name);
    }

    let mut idx_stmt = conn.prepare(&format!("PRAGMA index_list({})", quote_sqlite_ident(name)))?;
    let idx_rows = idx_stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>("name")?,
            row.get::<_, i64>("unique")?,
            row.get::<_, String>("origin")?,
        ))
    })?;
    for r in idx_rows {
        let (idx_name, unique, origin) = r?;
        // origin 'pk'/'u' indexes are auto-created to back a constraint.
        if origin == "pk" || origin == "u" {
            continue;
        }
        let mut cols_stmt = conn.prepare(&format!("PRAGMA index_info({})", quote_sqlite_ident(&idx_name)))?;
        let columns = cols_stmt
            .query_map([], |row| row.get::<_, String>("name"))?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .map(|c| IndexColumn {
                name: canonicalize_identifier(&c),
                descending: false,
                opclass: None,
            })
            .collect();

        table.indexes.push(Index {
            name: canonicalize_identifier(&idx_name),
            table: table.name.clone(),
            columns,
            expression: None,
            method: Default::default(),
            unique: unique != 0,
            concurrent: false,
            predicate: None,
            storage_params: Default::default(),
            tablespace: None,
            owner: IndexOwner::None,
        });
    }

    Ok(table)
}

fn parse_action(s: &str) -> ReferentialAction {
    match s.to_uppercase().as_str() {
        "CASCADE" => ReferentialAction::Cascade,
        "RESTRICT" => ReferentialAction::Restrict,
        "SET NULL" => ReferentialAction::SetNull,
        "SET DEFAULT" => ReferentialAction::SetDefault,
        _ => ReferentialAction::NoAction,
    }
}

fn quote_sqlite_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn extract_check_constraints(create_sql: &str, table_name: &str) -> Vec<CheckConstraint> {
    let mut checks = Vec::new();
    let upper = create_sql.to_uppercase();
    let mut search_from = 0;
    let mut idx = 0;
    while let Some(pos) = upper[search_from..].find("CHECK") {
        let abs = search_from + pos;
        if let Some(open_rel) = create_sql[abs..].find('(') {
            let open = abs + open_rel;
            if let Some(close_rel) = find_matching_paren(&create_sql[open + 1..]) {
                let expr = canonicalize_check_expression(&create_sql[open + 1..open + 1 + close_rel]);
                idx += 1;
                checks.push(CheckConstraint {
                    name: format!("ck_{}_{}", table_name, idx),
                    expression: expr,
                });
                search_from = open + 1 + close_rel;
                continue;
            }
        }
        search_from = abs + 5;
    }
    checks
}

fn find_matching_paren(s: &str) -> Option<usize> {
    let mut depth = 1i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_memory_db() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_introspect_simple_table() {
        let conn = open_memory_db();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL);",
        )
        .unwrap();
        let model = introspect_sqlite(&conn).unwrap();
        let table = &model.tables["users"];
        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.primary_key.as_ref().unwrap().columns, vec!["id"]);
    }

    #[test]
    fn test_introspect_foreign_key() {
        let conn = open_memory_db();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY);
             CREATE TABLE orders (id INTEGER PRIMARY KEY, user_id INTEGER REFERENCES users(id) ON DELETE CASCADE);",
        )
        .unwrap();
        let model = introspect_sqlite(&conn).unwrap();
        let orders = &model.tables["orders"];
        assert_eq!(orders.foreign_keys.len(), 1);
        assert_eq!(orders.foreign_keys[0].ref_table, "users");
        assert_eq!(orders.foreign_keys[0].on_delete, ReferentialAction::Cascade);
    }

    #[test]
    fn test_introspect_check_constraint() {
        let conn = open_memory_db();
        conn.execute_batch("CREATE TABLE t (age INTEGER CHECK (age >= 0));").unwrap();
        let model = introspect_sqlite(&conn).unwrap();
        assert_eq!(model.tables["t"].checks.len(), 1);
        assert!(model.tables["t"].checks[0].expression.contains("age"));
    }

    #[test]
    fn test_introspect_view() {
        let conn = open_memory_db();
        conn.execute_batch(
            "CREATE TABLE t (a INTEGER); CREATE VIEW v AS SELECT a FROM t;",
        )
        .unwrap();
        let model = introspect_sqlite(&conn).unwrap();
        assert!(model.views.contains_key("v"));
    }

    #[test]
    fn test_introspect_index_excludes_pk_backing_index() {
        let conn = open_memory_db();
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT);
             CREATE INDEX idx_name ON t (name);",
        )
        .unwrap();
        let model = introspect_sqlite(&conn).unwrap();
        assert_eq!(model.tables["t"].indexes.len(), 1);
        assert_eq!(model.tables["t"].indexes[0].name, "idx_name");
    }
}
