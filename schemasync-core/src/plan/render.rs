//! Renders a [`ChangeSet`] into the three ordered buckets of a [`MigrationPlan`].
//!
//! A flat diff-to-statement mapping (one statement per change), extended with
//! dependency-aware table ordering, concurrent-bucket routing for statements
//! that cannot run inside a transaction, and a deferred validation pass for
//! foreign keys so a schema with circular table references still produces a
//! valid, applyable plan.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::db::quote_ident;
use crate::diff::{Change, ChangeSet};
use crate::model::{Column, ForeignKey, IndexColumn, Table};
use crate::plan::ordering::{self, TableGroup};
use crate::provider::Provider;

/// One DDL statement in an execution plan, with the banner section it belongs
/// to (used by the CLI to print a human-readable, grouped plan).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStatement {
    pub section: &'static str,
    pub sql: String,
}

/// A `ChangeSet` lowered into the three buckets a plan executor runs in order:
/// statements safe inside one transaction, statements that must run outside
/// any transaction, and post-creation validation steps.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationPlan {
    pub transactional: Vec<PlanStatement>,
    pub concurrent: Vec<PlanStatement>,
    pub deferred: Vec<PlanStatement>,
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.transactional.is_empty() && self.concurrent.is_empty() && self.deferred.is_empty()
    }

    /// Render the plan as the ordered, banner-delimited SQL text a dry-run
    /// preview or `apply` log would show.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for (banner, bucket) in [
            ("transactional", &self.transactional),
            ("concurrent", &self.concurrent),
            ("deferred", &self.deferred),
        ] {
            if bucket.is_empty() {
                continue;
            }
            out.push_str(&format!("-- {}\n", banner));
            for stmt in bucket {
                out.push_str(&stmt.sql);
                out.push('\n');
            }
        }
        out
    }
}

struct Buckets {
    transactional: Vec<PlanStatement>,
    concurrent: Vec<PlanStatement>,
    deferred: Vec<PlanStatement>,
}

impl Buckets {
    fn new() -> Self {
        Buckets { transactional: Vec::new(), concurrent: Vec::new(), deferred: Vec::new() }
    }

    fn tx(&mut self, section: &'static str, sql: String) {
        self.transactional.push(PlanStatement { section, sql });
    }

    fn concurrent(&mut self, section: &'static str, sql: String) {
        self.concurrent.push(PlanStatement { section, sql });
    }

    fn deferred(&mut self, section: &'static str, sql: String) {
        self.deferred.push(PlanStatement { section, sql });
    }
}

/// Render a [`ChangeSet`] into the ordered, bucketed statements that would
/// bring the live database to match the declared schema, using `provider`'s
/// dialect for anything that renders differently across PostgreSQL and SQLite
/// (table/constraint creation shape, `Recreate` sequencing).
pub fn render_plan(changeset: &ChangeSet, provider: Provider) -> MigrationPlan {
    let mut b = Buckets::new();

    let mut tables_to_add: BTreeMap<String, Table> = BTreeMap::new();
    let mut pending_fks: Vec<(String, ForeignKey)> = Vec::new();

    for change in &changeset.changes {
        match change {
            Change::SchemaAdded(name) => {
                b.tx("schemas", format!("CREATE SCHEMA IF NOT EXISTS {};", quote_ident(name)))
            }
            Change::ExtensionAdded(ext) => b.tx(
                "extensions",
                match &ext.version {
                    Some(v) => format!(
                        "CREATE EXTENSION IF NOT EXISTS {} VERSION '{}';",
                        quote_ident(&ext.name),
                        v
                    ),
                    None => format!("CREATE EXTENSION IF NOT EXISTS {};", quote_ident(&ext.name)),
                },
            ),
            Change::ExtensionDropped(name) => {
                b.tx("extensions", format!("DROP EXTENSION IF EXISTS {};", quote_ident(name)))
            }
            Change::EnumAdded(e) => b.tx(
                "types",
                format!(
                    "CREATE TYPE {} AS ENUM ({});",
                    quote_ident(&e.name),
                    e.values.iter().map(|v| format!("'{}'", v.replace('\'', "''"))).collect::<Vec<_>>().join(", ")
                ),
            ),
            Change::EnumDropped(name) => {
                b.tx("types", format!("DROP TYPE IF EXISTS {} CASCADE;", quote_ident(name)))
            }
            Change::EnumValuesAppended { name, added } => {
                // PostgreSQL forbids using a freshly added enum value in the same
                // transaction that added it, so this always runs outside one.
                for value in added {
                    b.concurrent(
                        "types",
                        format!("ALTER TYPE {} ADD VALUE IF NOT EXISTS '{}';", quote_ident(name), value.replace('\'', "''")),
                    );
                }
            }
            Change::SequenceAdded(seq) => b.tx("sequences", render_create_sequence(seq)),
            Change::SequenceDropped(name) => {
                b.tx("sequences", format!("DROP SEQUENCE IF EXISTS {};", quote_ident(name)))
            }
            Change::TableAdded(table) => {
                tables_to_add.insert(table.name.clone(), table.clone());
            }
            Change::TableDropped(name) => {
                b.tx("tables", format!("DROP TABLE IF EXISTS {} CASCADE;", quote_ident(name)))
            }
            Change::ColumnAdded { table, column } => b.tx(
                "tables",
                format!("ALTER TABLE {} ADD COLUMN {};", quote_ident(table), render_column(column)),
            ),
            Change::ColumnDropped { table, column } => b.tx(
                "tables",
                format!("ALTER TABLE {} DROP COLUMN {};", quote_ident(table), quote_ident(column)),
            ),
            Change::ColumnAltered { table, column, from, to } => {
                // Only ever reaches here as a lossless cast or a non-type change:
                // `compute_diff` routes any other type change (and every SQLite
                // column alteration, which has no `ALTER COLUMN ... TYPE` at all)
                // through `Change::Recreate` instead.
                if from.canonical_type != to.canonical_type {
                    b.tx(
                        "tables",
                        format!(
                            "ALTER TABLE {} ALTER COLUMN {} TYPE {};",
                            quote_ident(table),
                            quote_ident(column),
                            to.canonical_type
                        ),
                    );
                }
                b.tx(
                    "tables",
                    format!(
                        "ALTER TABLE {} ALTER COLUMN {} {};",
                        quote_ident(table),
                        quote_ident(column),
                        if to.nullable { "DROP NOT NULL" } else { "SET NOT NULL" }
                    ),
                );
                b.tx(
                    "tables",
                    match &to.default {
                        Some(default) => format!(
                            "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {};",
                            quote_ident(table),
                            quote_ident(column),
                            default
                        ),
                        None => format!("ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT;", quote_ident(table), quote_ident(column)),
                    },
                );
            }
            Change::PrimaryKeyChanged { table, from, to } => {
                let drop_name = from.as_ref().map(|pk| pk.name.clone()).unwrap_or_else(|| format!("pk_{}", table));
                b.tx(
                    "tables",
                    format!("ALTER TABLE {} DROP CONSTRAINT IF EXISTS {};", quote_ident(table), quote_ident(&drop_name)),
                );
                if let Some(pk) = to {
                    b.tx(
                        "tables",
                        format!(
                            "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({});",
                            quote_ident(table),
                            quote_ident(&pk.name),
                            pk.columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
                        ),
                    );
                }
            }
            Change::ForeignKeyAdded { table, fk } => pending_fks.push((table.clone(), fk.clone())),
            Change::ForeignKeyDropped { table, name } => b.tx(
                "constraints",
                format!("ALTER TABLE {} DROP CONSTRAINT IF EXISTS {};", quote_ident(table), quote_ident(name)),
            ),
            Change::CheckAdded { table, check } => b.tx(
                "constraints",
                format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({});",
                    quote_ident(table),
                    quote_ident(&check.name),
                    check.expression
                ),
            ),
            Change::CheckDropped { table, name } => b.tx(
                "constraints",
                format!("ALTER TABLE {} DROP CONSTRAINT IF EXISTS {};", quote_ident(table), quote_ident(name)),
            ),
            Change::UniqueAdded { table, unique } => b.tx(
                "constraints",
                format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({});",
                    quote_ident(table),
                    quote_ident(&unique.name),
                    unique.columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
                ),
            ),
            Change::UniqueDropped { table, name } => b.tx(
                "constraints",
                format!("ALTER TABLE {} DROP CONSTRAINT IF EXISTS {};", quote_ident(table), quote_ident(name)),
            ),
            Change::IndexAdded(idx) => {
                if idx.concurrent {
                    b.concurrent("indexes", render_create_index(idx));
                } else {
                    b.tx("indexes", render_create_index(idx));
                }
            }
            Change::IndexDropped(name) => b.tx("indexes", format!("DROP INDEX IF EXISTS {};", quote_ident(name))),
            Change::ViewAdded(v) => b.tx(
                "views",
                format!(
                    "CREATE {} {} AS {};",
                    if v.materialized { "MATERIALIZED VIEW" } else { "VIEW" },
                    quote_ident(&v.name),
                    v.definition
                ),
            ),
            Change::ViewDropped(name) => b.tx("views", format!("DROP VIEW IF EXISTS {} CASCADE;", quote_ident(name))),
            Change::ViewAltered { name, to, .. } => {
                b.tx("views", format!("CREATE OR REPLACE VIEW {} AS {};", quote_ident(name), to))
            }
            Change::RoutineAdded { is_procedure, routine } => {
                b.tx("routines", render_create_routine(routine, *is_procedure))
            }
            Change::RoutineDropped { is_procedure, name } => b.tx(
                "routines",
                format!("DROP {} IF EXISTS {};", if *is_procedure { "PROCEDURE" } else { "FUNCTION" }, quote_ident(name)),
            ),
            Change::RoutineAltered { .. } => {
                // Full definition carried by the caller's declared model, not the
                // diff record itself; the CLI re-renders from the declared schema
                // when replaying this change.
            }
            Change::TriggerAdded(trg) => b.tx("triggers", render_create_trigger(trg)),
            Change::TriggerDropped { table, name } => {
                b.tx("triggers", format!("DROP TRIGGER IF EXISTS {} ON {};", quote_ident(name), quote_ident(table)))
            }
            Change::Recreate { table, live_columns } => {
                render_recreate(&mut b, table, live_columns, provider, &mut pending_fks);
            }
        }
    }

    render_tables_in_order(&tables_to_add, &mut b, &mut pending_fks, provider);

    for (table, fk) in &pending_fks {
        add_foreign_key_validated(&mut b, table, fk);
    }

    MigrationPlan { transactional: b.transactional, concurrent: b.concurrent, deferred: b.deferred }
}

fn render_tables_in_order(
    tables: &BTreeMap<String, Table>,
    b: &mut Buckets,
    pending_fks: &mut Vec<(String, ForeignKey)>,
    provider: Provider,
) {
    let groups = ordering::order_tables(tables);

    for group in groups {
        let names = match group {
            TableGroup::Single(n) => vec![n],
            TableGroup::Cycle(ns) => ns,
        };
        for name in names {
            let table = &tables[&name];
            match provider {
                Provider::Sqlite => {
                    // SQLite has no `ALTER TABLE ... ADD CONSTRAINT`, so every
                    // constraint has to be declared inline in the `CREATE TABLE`
                    // body, and a forward-referencing foreign key is fine since
                    // SQLite never validates a referenced table's existence at
                    // creation time.
                    b.tx("tables", render_create_table_inline(table, &table.name));
                }
                Provider::Postgres => {
                    b.tx("tables", render_create_table(table));
                    for pk in &table.primary_key {
                        b.tx(
                            "tables",
                            format!(
                                "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({});",
                                quote_ident(&table.name),
                                quote_ident(&pk.name),
                                pk.columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
                            ),
                        );
                    }
                    for check in &table.checks {
                        b.tx(
                            "constraints",
                            format!(
                                "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({});",
                                quote_ident(&table.name),
                                quote_ident(&check.name),
                                check.expression
                            ),
                        );
                    }
                    for unique in &table.uniques {
                        b.tx(
                            "constraints",
                            format!(
                                "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({});",
                                quote_ident(&table.name),
                                quote_ident(&unique.name),
                                unique.columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
                            ),
                        );
                    }
                    for fk in &table.foreign_keys {
                        pending_fks.push((table.name.clone(), fk.clone()));
                    }
                }
            }
            for idx in &table.indexes {
                if idx.concurrent {
                    b.concurrent("indexes", render_create_index(idx));
                } else {
                    b.tx("indexes", render_create_index(idx));
                }
            }
        }
    }
}

/// Render the `CREATE new -> INSERT SELECT -> DROP old -> RENAME` sequence for
/// a table whose differences can't be expressed as in-place `ALTER`
/// statements. `live_columns` is the set of columns the existing table
/// actually has; only the columns present on both sides carry data forward,
/// matching `INSERT ... SELECT`'s column-list semantics.
fn render_recreate(b: &mut Buckets, table: &Table, live_columns: &[String], provider: Provider, pending_fks: &mut Vec<(String, ForeignKey)>) {
    let new_name = format!("_{}_new", table.name);

    match provider {
        Provider::Sqlite => {
            b.tx("tables", render_create_table_inline(table, &new_name));
        }
        Provider::Postgres => {
            let mut new_table = table.clone();
            new_table.name = new_name.clone();
            b.tx("tables", render_create_table(&new_table));
            for pk in &table.primary_key {
                b.tx(
                    "tables",
                    format!(
                        "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({});",
                        quote_ident(&new_name),
                        quote_ident(&pk.name),
                        pk.columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
                    ),
                );
            }
            for check in &table.checks {
                b.tx(
                    "constraints",
                    format!(
                        "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({});",
                        quote_ident(&new_name),
                        quote_ident(&check.name),
                        check.expression
                    ),
                );
            }
            for unique in &table.uniques {
                b.tx(
                    "constraints",
                    format!(
                        "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({});",
                        quote_ident(&new_name),
                        quote_ident(&unique.name),
                        unique.columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
                    ),
                );
            }
            for fk in &table.foreign_keys {
                pending_fks.push((new_name.clone(), fk.clone()));
            }
        }
    }

    let common: Vec<String> = table
        .columns
        .iter()
        .map(|c| c.name.clone())
        .filter(|name| live_columns.contains(name))
        .collect();
    if !common.is_empty() {
        let col_list = common.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
        b.tx(
            "tables",
            format!(
                "INSERT INTO {} ({}) SELECT {} FROM {};",
                quote_ident(&new_name),
                col_list,
                col_list,
                quote_ident(&table.name)
            ),
        );
    }

    b.tx("tables", format!("DROP TABLE {};", quote_ident(&table.name)));
    b.tx("tables", format!("ALTER TABLE {} RENAME TO {};", quote_ident(&new_name), quote_ident(&table.name)));

    for idx in &table.indexes {
        if idx.concurrent {
            b.concurrent("indexes", render_create_index(idx));
        } else {
            b.tx("indexes", render_create_index(idx));
        }
    }
}

/// Render `CREATE TABLE name (...)` with every primary-key/check/unique/
/// foreign-key constraint declared inline in the column list, the only form
/// SQLite accepts (it has no `ALTER TABLE ... ADD CONSTRAINT`).
fn render_create_table_inline(table: &Table, name_override: &str) -> String {
    let mut parts: Vec<String> = table.columns.iter().map(render_column).collect();

    if let Some(pk) = &table.primary_key {
        parts.push(format!(
            "PRIMARY KEY ({})",
            pk.columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
        ));
    }
    for check in &table.checks {
        parts.push(format!("CONSTRAINT {} CHECK ({})", quote_ident(&check.name), check.expression));
    }
    for unique in &table.uniques {
        parts.push(format!(
            "CONSTRAINT {} UNIQUE ({})",
            quote_ident(&unique.name),
            unique.columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
        ));
    }
    for fk in &table.foreign_keys {
        let mut clause = format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            quote_ident(&fk.name),
            fk.columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
            quote_ident(&fk.ref_table),
            fk.ref_columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
        );
        if fk.on_delete != Default::default() {
            clause.push_str(&format!(" ON DELETE {}", fk.on_delete));
        }
        if fk.on_update != Default::default() {
            clause.push_str(&format!(" ON UPDATE {}", fk.on_update));
        }
        parts.push(clause);
    }

    format!("CREATE TABLE {} (\n    {}\n);", quote_ident(name_override), parts.join(",\n    "))
}

/// Add a foreign key as `NOT VALID` inside the transactional bucket (cheap,
/// takes no full-table scan) and validate it in the deferred bucket
/// afterward — the same two-phase pattern the planner uses to break FK
/// cycles, applied uniformly so a single table's worth of constraints never
/// blocks on another table's creation order.
fn add_foreign_key_validated(b: &mut Buckets, table: &str, fk: &ForeignKey) {
    b.tx("constraints", render_add_foreign_key(table, fk, true));
    b.deferred(
        "constraints",
        format!("ALTER TABLE {} VALIDATE CONSTRAINT {};", quote_ident(table), quote_ident(&fk.name)),
    );
}

fn render_create_table(table: &Table) -> String {
    let cols: Vec<String> = table.columns.iter().map(render_column).collect();
    format!("CREATE TABLE {} (\n    {}\n);", quote_ident(&table.qualified_name()), cols.join(",\n    "))
}

fn render_column(column: &Column) -> String {
    let mut s = format!("{} {}", quote_ident(&column.name), column.canonical_type);
    if let Some(gen) = &column.generated {
        s.push_str(&format!(" GENERATED ALWAYS AS ({}) STORED", gen.expression));
        return s;
    }
    if !column.nullable {
        s.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        s.push_str(&format!(" DEFAULT {}", default));
    }
    s
}

fn render_add_foreign_key(table: &str, fk: &ForeignKey, not_valid: bool) -> String {
    let mut sql = format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        quote_ident(table),
        quote_ident(&fk.name),
        fk.columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
        quote_ident(&fk.ref_table),
        fk.ref_columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
    );
    if fk.on_delete != Default::default() {
        sql.push_str(&format!(" ON DELETE {}", fk.on_delete));
    }
    if fk.on_update != Default::default() {
        sql.push_str(&format!(" ON UPDATE {}", fk.on_update));
    }
    if not_valid {
        sql.push_str(" NOT VALID");
    }
    sql.push(';');
    sql
}

fn render_create_index(idx: &crate::model::Index) -> String {
    let target = idx
        .expression
        .clone()
        .unwrap_or_else(|| idx.columns.iter().map(render_index_column).collect::<Vec<_>>().join(", "));
    let mut sql = format!(
        "CREATE {}INDEX {}{} ON {} USING {} ({})",
        if idx.unique { "UNIQUE " } else { "" },
        if idx.concurrent { "CONCURRENTLY " } else { "" },
        quote_ident(&idx.name),
        quote_ident(&idx.table),
        idx.method,
        target
    );
    if let Some(pred) = &idx.predicate {
        sql.push_str(&format!(" WHERE {}", pred));
    }
    sql.push(';');
    sql
}

fn render_index_column(col: &IndexColumn) -> String {
    let mut s = quote_ident(&col.name);
    if col.descending {
        s.push_str(" DESC");
    }
    s
}

fn render_create_sequence(seq: &crate::model::Sequence) -> String {
    let mut sql = format!("CREATE SEQUENCE {} AS {}", quote_ident(&seq.name), seq.data_type);
    sql.push_str(&format!(" INCREMENT BY {}", seq.increment));
    match seq.min_value {
        Some(v) => sql.push_str(&format!(" MINVALUE {}", v)),
        None => sql.push_str(" NO MINVALUE"),
    }
    match seq.max_value {
        Some(v) => sql.push_str(&format!(" MAXVALUE {}", v)),
        None => sql.push_str(" NO MAXVALUE"),
    }
    sql.push_str(&format!(" START WITH {} CACHE {}", seq.start, seq.cache));
    if seq.cycle {
        sql.push_str(" CYCLE");
    }
    sql.push(';');
    sql
}

fn render_create_trigger(trg: &crate::model::Trigger) -> String {
    use crate::model::{TriggerForEach, TriggerTiming};

    let timing = match trg.timing {
        TriggerTiming::Before => "BEFORE",
        TriggerTiming::After => "AFTER",
        TriggerTiming::InsteadOf => "INSTEAD OF",
    };
    let events = trg
        .events
        .iter()
        .map(|e| match e {
            crate::model::TriggerEvent::Insert => "INSERT",
            crate::model::TriggerEvent::Update => "UPDATE",
            crate::model::TriggerEvent::Delete => "DELETE",
            crate::model::TriggerEvent::Truncate => "TRUNCATE",
        })
        .collect::<Vec<_>>()
        .join(" OR ");
    let for_each = if trg.for_each == TriggerForEach::Row { "ROW" } else { "STATEMENT" };

    let mut sql = format!(
        "CREATE TRIGGER {} {} {} ON {} FOR EACH {}",
        quote_ident(&trg.name),
        timing,
        events,
        quote_ident(&trg.table),
        for_each
    );
    if let Some(when) = &trg.when {
        sql.push_str(&format!(" WHEN ({})", when));
    }
    sql.push_str(&format!(" EXECUTE FUNCTION {}({});", quote_ident(&trg.function), trg.function_args.join(", ")));
    sql
}

fn render_create_routine(routine: &crate::model::Routine, is_procedure: bool) -> String {
    let keyword = if is_procedure { "PROCEDURE" } else { "FUNCTION" };
    let params = routine
        .parameters
        .iter()
        .map(|p| match &p.name {
            Some(n) => format!("{} {}", quote_ident(n), p.canonical_type),
            None => p.canonical_type.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ");
    let returns = match &routine.return_type {
        Some(rt) => format!(" RETURNS {}", rt),
        None => String::new(),
    };
    format!(
        "CREATE OR REPLACE {} {}({}){} LANGUAGE {} AS $$ {} $$;",
        keyword,
        quote_ident(&routine.name),
        params,
        returns,
        routine.language,
        routine.body
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Column, Index, IndexColumn, PrimaryKey};

    #[test]
    fn test_render_create_table_basic() {
        let mut table = Table::new("users");
        table.columns.push(Column::new("id", "INTEGER"));
        let mut col = Column::new("email", "TEXT");
        col.nullable = false;
        table.columns.push(col);
        table.primary_key = Some(PrimaryKey { name: "pk_users".to_string(), columns: vec!["id".to_string()] });

        let sql = render_create_table(&table);
        assert!(sql.starts_with("CREATE TABLE"));
        assert!(sql.contains("email"));
    }

    #[test]
    fn test_foreign_keys_added_not_valid_then_validated_deferred() {
        use crate::model::ReferentialAction;
        let mut users = Table::new("users");
        users.columns.push(Column::new("id", "INTEGER"));
        let mut orders = Table::new("orders");
        orders.columns.push(Column::new("id", "INTEGER"));
        orders.foreign_keys.push(ForeignKey {
            name: "fk_orders_users".to_string(),
            columns: vec!["user_id".to_string()],
            ref_table: "users".to_string(),
            ref_columns: vec!["id".to_string()],
            on_delete: ReferentialAction::Cascade,
            on_update: ReferentialAction::NoAction,
        });

        let changeset = ChangeSet { changes: vec![Change::TableAdded(users), Change::TableAdded(orders)] };
        let plan = render_plan(&changeset, Provider::Postgres);

        assert!(plan.transactional.iter().any(|s| s.sql.contains("FOREIGN KEY") && s.sql.contains("NOT VALID")));
        assert!(plan.deferred.iter().any(|s| s.sql.contains("VALIDATE CONSTRAINT")));
        let last_table_pos = plan.transactional.iter().rposition(|s| s.sql.starts_with("CREATE TABLE")).unwrap();
        let fk_pos = plan.transactional.iter().position(|s| s.sql.contains("FOREIGN KEY")).unwrap();
        assert!(fk_pos > last_table_pos);
    }

    #[test]
    fn test_primary_key_changed_drops_the_live_constraint_by_its_actual_name() {
        let changeset = ChangeSet {
            changes: vec![Change::PrimaryKeyChanged {
                table: "users".to_string(),
                from: Some(PrimaryKey { name: "users_pkey".to_string(), columns: vec!["id".to_string()] }),
                to: Some(PrimaryKey { name: "users_pkey".to_string(), columns: vec!["id".to_string(), "tenant_id".to_string()] }),
            }],
        };
        let plan = render_plan(&changeset, Provider::Postgres);
        let drop_pos = plan.transactional.iter().position(|s| s.sql.contains("DROP CONSTRAINT") && s.sql.contains("users_pkey")).unwrap();
        let add_pos = plan.transactional.iter().position(|s| s.sql.contains("ADD CONSTRAINT") && s.sql.contains("PRIMARY KEY")).unwrap();
        assert!(drop_pos < add_pos);
        assert!(!plan.transactional[drop_pos].sql.contains("pk_users"));
    }

    #[test]
    fn test_enum_value_appended_goes_to_concurrent_bucket() {
        let changeset = ChangeSet {
            changes: vec![Change::EnumValuesAppended { name: "mood".to_string(), added: vec!["elated".to_string()] }],
        };
        let plan = render_plan(&changeset, Provider::Postgres);
        assert!(plan.transactional.is_empty());
        assert_eq!(plan.concurrent.len(), 1);
        assert!(plan.concurrent[0].sql.contains("ADD VALUE"));
    }

    #[test]
    fn test_concurrent_index_routed_to_concurrent_bucket() {
        let idx = Index {
            name: "idx_t".to_string(),
            table: "t".to_string(),
            columns: vec![IndexColumn { name: "created_at".to_string(), descending: true, opclass: None }],
            expression: None,
            method: Default::default(),
            unique: false,
            concurrent: true,
            predicate: None,
            storage_params: Default::default(),
            tablespace: None,
            owner: Default::default(),
        };
        let changeset = ChangeSet { changes: vec![Change::IndexAdded(idx)] };
        let plan = render_plan(&changeset, Provider::Postgres);
        assert!(plan.transactional.is_empty());
        assert_eq!(plan.concurrent.len(), 1);
        assert!(plan.concurrent[0].sql.contains("CONCURRENTLY"));
        assert!(plan.concurrent[0].sql.contains("created_at DESC"));
    }

    #[test]
    fn test_recreate_sqlite_uses_create_insert_drop_rename_sequence() {
        let mut table = Table::new("widgets");
        table.columns.push(Column::new("id", "INTEGER"));
        table.columns.push(Column::new("label", "TEXT"));
        table.primary_key = Some(PrimaryKey { name: "pk_widgets".to_string(), columns: vec!["id".to_string()] });

        let changeset = ChangeSet {
            changes: vec![Change::Recreate {
                table,
                live_columns: vec!["id".to_string(), "label".to_string()],
            }],
        };
        let plan = render_plan(&changeset, Provider::Sqlite);
        let statements: Vec<&str> = plan.transactional.iter().map(|s| s.sql.as_str()).collect();

        let create_pos = statements.iter().position(|s| s.contains("CREATE TABLE") && s.contains("_widgets_new")).unwrap();
        let insert_pos = statements.iter().position(|s| s.starts_with("INSERT INTO")).unwrap();
        let drop_pos = statements.iter().position(|s| s.starts_with("DROP TABLE")).unwrap();
        let rename_pos = statements.iter().position(|s| s.contains("RENAME TO")).unwrap();
        assert!(create_pos < insert_pos && insert_pos < drop_pos && drop_pos < rename_pos);
        assert!(statements[create_pos].contains("PRIMARY KEY (\"id\")"));
    }

    #[test]
    fn test_recreate_only_carries_forward_columns_present_on_both_sides() {
        let mut table = Table::new("widgets");
        table.columns.push(Column::new("id", "INTEGER"));
        table.columns.push(Column::new("label", "TEXT"));

        let changeset = ChangeSet {
            changes: vec![Change::Recreate { table, live_columns: vec!["id".to_string()] }],
        };
        let plan = render_plan(&changeset, Provider::Sqlite);
        let insert = plan.transactional.iter().find(|s| s.sql.starts_with("INSERT INTO")).unwrap();
        assert!(insert.sql.contains("\"id\""));
        assert!(!insert.sql.contains("\"label\""));
    }
}
