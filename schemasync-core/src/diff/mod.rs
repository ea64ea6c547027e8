//! Schema diffing: compares a declared [`SchemaModel`] against an introspected
//! one and produces an ordered [`ChangeSet`] of additive/destructive changes.
//!
//! A flat enum of before/after changes, computed by straightforward
//! comparison loops over the dialect-neutral [`SchemaModel`].

use std::collections::BTreeSet;

use serde::Serialize;

use crate::canon::is_lossless_type_change;
use crate::model::{
    CheckConstraint, Column, EnumType, Extension, ForeignKey, Index, PrimaryKey, Routine,
    SchemaModel, Sequence, Table, Trigger, UniqueConstraint, View,
};
use crate::provider::Provider;

/// One detected difference between the declared schema and the live database.
#[derive(Debug, Clone, Serialize)]
pub enum Change {
    TableAdded(Table),
    TableDropped(String),
    ColumnAdded { table: String, column: Column },
    ColumnDropped { table: String, column: String },
    ColumnAltered { table: String, column: String, from: Column, to: Column },
    PrimaryKeyChanged { table: String, from: Option<PrimaryKey>, to: Option<PrimaryKey> },
    ForeignKeyAdded { table: String, fk: ForeignKey },
    ForeignKeyDropped { table: String, name: String },
    CheckAdded { table: String, check: CheckConstraint },
    CheckDropped { table: String, name: String },
    UniqueAdded { table: String, unique: UniqueConstraint },
    UniqueDropped { table: String, name: String },
    IndexAdded(Index),
    IndexDropped(String),
    ViewAdded(View),
    ViewDropped(String),
    ViewAltered { name: String, from: String, to: String },
    EnumAdded(EnumType),
    EnumDropped(String),
    EnumValuesAppended { name: String, added: Vec<String> },
    SequenceAdded(Sequence),
    SequenceDropped(String),
    RoutineAdded { is_procedure: bool, routine: Routine },
    RoutineDropped { is_procedure: bool, name: String },
    RoutineAltered { is_procedure: bool, name: String },
    TriggerAdded(Trigger),
    TriggerDropped { table: String, name: String },
    ExtensionAdded(Extension),
    ExtensionDropped(String),
    SchemaAdded(String),
    /// A table whose column/constraint/primary-key differences can't be
    /// expressed as in-place `ALTER` statements and instead requires the
    /// `CREATE new -> INSERT SELECT -> DROP old -> RENAME` sequence:
    /// always the case for SQLite (which has no `ALTER COLUMN` and no
    /// post-creation `ADD CONSTRAINT`), and the Postgres case when a column's
    /// type change isn't a lossless cast.
    Recreate { table: Table, live_columns: Vec<String> },
}

/// The complete, ordered result of comparing declared schema to live database.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChangeSet {
    pub changes: Vec<Change>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// True when every change is additive (no `*Dropped`/`*Altered` variant) —
    /// used by `verify` to decide whether applying the plan could be destructive.
    pub fn is_additive_only(&self) -> bool {
        self.changes.iter().all(|c| {
            !matches!(
                c,
                Change::TableDropped(_)
                    | Change::ColumnDropped { .. }
                    | Change::ColumnAltered { .. }
                    | Change::ForeignKeyDropped { .. }
                    | Change::CheckDropped { .. }
                    | Change::UniqueDropped { .. }
                    | Change::IndexDropped(_)
                    | Change::ViewDropped(_)
                    | Change::ViewAltered { .. }
                    | Change::EnumDropped(_)
                    | Change::SequenceDropped(_)
                    | Change::RoutineDropped { .. }
                    | Change::RoutineAltered { .. }
                    | Change::TriggerDropped { .. }
                    | Change::ExtensionDropped(_)
                    | Change::PrimaryKeyChanged { .. }
                    | Change::Recreate { .. }
            )
        })
    }
}

/// Compare `declared` (the target state) against `live` (the introspected
/// current state) and return every change needed to bring `live` to match
/// `declared`. A schema with no differences produces an empty [`ChangeSet`] —
/// the idempotence property the whole tool is built around.
pub fn compute_diff(declared: &SchemaModel, live: &SchemaModel, provider: Provider) -> ChangeSet {
    let mut changes = Vec::new();

    for (name, schema_def) in &declared.schemas {
        if !live.schemas.contains_key(name) {
            changes.push(Change::SchemaAdded(schema_def.name.clone()));
        }
    }

    for (name, ext) in &declared.extensions {
        if !live.extensions.contains_key(name) {
            changes.push(Change::ExtensionAdded(ext.clone()));
        }
    }
    for (name, ext) in &live.extensions {
        if !declared.extensions.contains_key(name) {
            changes.push(Change::ExtensionDropped(ext.name.clone()));
        }
    }

    for (name, e) in &declared.enums {
        match live.enums.get(name) {
            None => changes.push(Change::EnumAdded(e.clone())),
            Some(live_e) if live_e.values != e.values => {
                let added: Vec<String> = e
                    .values
                    .iter()
                    .filter(|v| !live_e.values.contains(v))
                    .cloned()
                    .collect();
                // Only additive (ADD VALUE) changes are representable; reordering or
                // removing a value is an unsupported destructive enum change, surfaced
                // by the validator rather than silently dropped here.
                if live_e.values.iter().all(|v| e.values.contains(v)) {
                    changes.push(Change::EnumValuesAppended { name: name.clone(), added });
                }
            }
            Some(_) => {}
        }
    }
    for (name, e) in &live.enums {
        if !declared.enums.contains_key(name) {
            changes.push(Change::EnumDropped(e.name.clone()));
        }
    }

    for (name, table) in &declared.tables {
        match live.tables.get(name) {
            None => changes.push(Change::TableAdded(table.clone())),
            Some(live_table) => diff_table(&mut changes, table, live_table),
        }
    }
    for (name, table) in &live.tables {
        if !declared.tables.contains_key(name) {
            changes.push(Change::TableDropped(table.name.clone()));
        }
    }

    for (name, seq) in &declared.sequences {
        if !live.sequences.contains_key(name) {
            changes.push(Change::SequenceAdded(seq.clone()));
        }
    }
    for (name, seq) in &live.sequences {
        if !declared.sequences.contains_key(name) {
            changes.push(Change::SequenceDropped(seq.name.clone()));
        }
    }

    for (name, routine) in &declared.functions {
        diff_routine(&mut changes, name, routine, live.functions.get(name), false);
    }
    for (name, routine) in &live.functions {
        if !declared.functions.contains_key(name) {
            changes.push(Change::RoutineDropped { is_procedure: false, name: routine.name.clone() });
        }
    }
    for (name, routine) in &declared.procedures {
        diff_routine(&mut changes, name, routine, live.procedures.get(name), true);
    }
    for (name, routine) in &live.procedures {
        if !declared.procedures.contains_key(name) {
            changes.push(Change::RoutineDropped { is_procedure: true, name: routine.name.clone() });
        }
    }

    for (name, view) in &declared.views {
        match live.views.get(name) {
            None => changes.push(Change::ViewAdded(view.clone())),
            Some(live_view) if live_view.definition != view.definition => {
                changes.push(Change::ViewAltered {
                    name: name.clone(),
                    from: live_view.definition.clone(),
                    to: view.definition.clone(),
                });
            }
            Some(_) => {}
        }
    }
    for (name, view) in &live.views {
        if !declared.views.contains_key(name) {
            changes.push(Change::ViewDropped(view.name.clone()));
        }
    }

    for (name, trigger) in &declared.triggers {
        if !live.triggers.contains_key(name) {
            changes.push(Change::TriggerAdded(trigger.clone()));
        }
    }
    for (name, trigger) in &live.triggers {
        if !declared.triggers.contains_key(name) {
            changes.push(Change::TriggerDropped {
                table: trigger.table.clone(),
                name: trigger.name.clone(),
            });
        }
    }

    reclassify_for_provider(&mut changes, declared, live, provider);

    ChangeSet { changes }
}

/// Fold every table-scoped change a dialect can't express in place into a
/// single [`Change::Recreate`] for that table.
///
/// SQLite has no `ALTER COLUMN` and no way to attach a constraint to an
/// existing table, so any column add/drop/alter, primary-key change, or
/// constraint add/drop against an existing table always recreates it.
/// PostgreSQL can express all of those as `ALTER TABLE` statements except a
/// column type change that isn't a lossless cast — only that case recreates.
fn reclassify_for_provider(changes: &mut Vec<Change>, declared: &SchemaModel, live: &SchemaModel, provider: Provider) {
    let mut recreate_tables: BTreeSet<String> = BTreeSet::new();

    for change in changes.iter() {
        match (provider, change) {
            (Provider::Sqlite, Change::ColumnAdded { table, .. })
            | (Provider::Sqlite, Change::ColumnDropped { table, .. })
            | (Provider::Sqlite, Change::ColumnAltered { table, .. })
            | (Provider::Sqlite, Change::PrimaryKeyChanged { table, .. })
            | (Provider::Sqlite, Change::ForeignKeyAdded { table, .. })
            | (Provider::Sqlite, Change::ForeignKeyDropped { table, .. })
            | (Provider::Sqlite, Change::CheckAdded { table, .. })
            | (Provider::Sqlite, Change::CheckDropped { table, .. })
            | (Provider::Sqlite, Change::UniqueAdded { table, .. })
            | (Provider::Sqlite, Change::UniqueDropped { table, .. }) => {
                recreate_tables.insert(table.clone());
            }
            (Provider::Postgres, Change::ColumnAltered { table, from, to, .. })
                if from.canonical_type != to.canonical_type
                    && !is_lossless_type_change(&from.canonical_type, &to.canonical_type) =>
            {
                recreate_tables.insert(table.clone());
            }
            _ => {}
        }
    }

    if recreate_tables.is_empty() {
        return;
    }

    changes.retain(|change| {
        let table_name = match change {
            Change::ColumnAdded { table, .. }
            | Change::ColumnDropped { table, .. }
            | Change::ColumnAltered { table, .. }
            | Change::PrimaryKeyChanged { table, .. }
            | Change::ForeignKeyAdded { table, .. }
            | Change::ForeignKeyDropped { table, .. }
            | Change::CheckAdded { table, .. }
            | Change::CheckDropped { table, .. }
            | Change::UniqueAdded { table, .. }
            | Change::UniqueDropped { table, .. } => Some(table),
            _ => None,
        };
        match table_name {
            Some(name) => !recreate_tables.contains(name),
            None => true,
        }
    });

    for name in &recreate_tables {
        let Some(declared_table) = declared.tables.get(name) else { continue };
        let Some(live_table) = live.tables.get(name) else { continue };
        changes.push(Change::Recreate {
            table: declared_table.clone(),
            live_columns: live_table.columns.iter().map(|c| c.name.clone()).collect(),
        });
    }
}

fn diff_routine(
    changes: &mut Vec<Change>,
    name: &str,
    declared: &Routine,
    live: Option<&Routine>,
    is_procedure: bool,
) {
    match live {
        None => changes.push(Change::RoutineAdded { is_procedure, routine: declared.clone() }),
        Some(live_routine) if live_routine.body != declared.body || live_routine.parameters != declared.parameters => {
            changes.push(Change::RoutineAltered { is_procedure, name: name.to_string() });
        }
        Some(_) => {}
    }
}

fn diff_table(changes: &mut Vec<Change>, declared: &Table, live: &Table) {
    for dc in &declared.columns {
        match live.columns.iter().find(|c| c.name == dc.name) {
            None => changes.push(Change::ColumnAdded { table: declared.name.clone(), column: dc.clone() }),
            Some(lc) if lc != dc => changes.push(Change::ColumnAltered {
                table: declared.name.clone(),
                column: dc.name.clone(),
                from: lc.clone(),
                to: dc.clone(),
            }),
            Some(_) => {}
        }
    }
    for lc in &live.columns {
        if !declared.columns.iter().any(|c| c.name == lc.name) {
            changes.push(Change::ColumnDropped { table: declared.name.clone(), column: lc.name.clone() });
        }
    }

    if declared.primary_key != live.primary_key {
        changes.push(Change::PrimaryKeyChanged {
            table: declared.name.clone(),
            from: live.primary_key.clone(),
            to: declared.primary_key.clone(),
        });
    }

    // A same-named constraint whose definition differs is dropped and
    // recreated rather than left as an Added with no matching Dropped, which
    // would otherwise collide with the still-present live constraint.
    for fk in &declared.foreign_keys {
        match live.foreign_keys.iter().find(|f| f.name == fk.name) {
            None => changes.push(Change::ForeignKeyAdded { table: declared.name.clone(), fk: fk.clone() }),
            Some(live_fk) if live_fk != fk => {
                changes.push(Change::ForeignKeyDropped { table: declared.name.clone(), name: fk.name.clone() });
                changes.push(Change::ForeignKeyAdded { table: declared.name.clone(), fk: fk.clone() });
            }
            Some(_) => {}
        }
    }
    for fk in &live.foreign_keys {
        if !declared.foreign_keys.iter().any(|f| f.name == fk.name) {
            changes.push(Change::ForeignKeyDropped { table: declared.name.clone(), name: fk.name.clone() });
        }
    }

    for c in &declared.checks {
        match live.checks.iter().find(|lc| lc.name == c.name) {
            None => changes.push(Change::CheckAdded { table: declared.name.clone(), check: c.clone() }),
            Some(live_check) if live_check != c => {
                changes.push(Change::CheckDropped { table: declared.name.clone(), name: c.name.clone() });
                changes.push(Change::CheckAdded { table: declared.name.clone(), check: c.clone() });
            }
            Some(_) => {}
        }
    }
    for c in &live.checks {
        if !declared.checks.iter().any(|dc| dc.name == c.name) {
            changes.push(Change::CheckDropped { table: declared.name.clone(), name: c.name.clone() });
        }
    }

    for u in &declared.uniques {
        match live.uniques.iter().find(|lu| lu.name == u.name) {
            None => changes.push(Change::UniqueAdded { table: declared.name.clone(), unique: u.clone() }),
            Some(live_unique) if live_unique != u => {
                changes.push(Change::UniqueDropped { table: declared.name.clone(), name: u.name.clone() });
                changes.push(Change::UniqueAdded { table: declared.name.clone(), unique: u.clone() });
            }
            Some(_) => {}
        }
    }
    for u in &live.uniques {
        if !declared.uniques.iter().any(|du| du.name == u.name) {
            changes.push(Change::UniqueDropped { table: declared.name.clone(), name: u.name.clone() });
        }
    }

    // A same-named index whose definition differs in any attribute (columns,
    // method, predicate, storage parameters, tablespace) has no in-place
    // `ALTER INDEX` equivalent in either dialect, so it's dropped and
    // recreated rather than left as a silent no-op.
    for idx in &declared.indexes {
        match live.indexes.iter().find(|li| li.name == idx.name) {
            None => changes.push(Change::IndexAdded(idx.clone())),
            Some(live_idx) if live_idx != idx => {
                changes.push(Change::IndexDropped(idx.name.clone()));
                changes.push(Change::IndexAdded(idx.clone()));
            }
            Some(_) => {}
        }
    }
    for idx in &live.indexes {
        if !declared.indexes.iter().any(|di| di.name == idx.name) {
            changes.push(Change::IndexDropped(idx.name.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Column;

    #[test]
    fn test_identical_models_produce_empty_changeset() {
        let mut model = SchemaModel::new();
        let mut t = Table::new("users");
        t.columns.push(Column::new("id", "INTEGER"));
        model.tables.insert(t.name.clone(), t);

        let changeset = compute_diff(&model, &model.clone(), Provider::Postgres);
        assert!(changeset.is_empty());
    }

    #[test]
    fn test_new_table_detected_as_added() {
        let mut declared = SchemaModel::new();
        declared.tables.insert("users".to_string(), Table::new("users"));
        let live = SchemaModel::new();

        let changeset = compute_diff(&declared, &live, Provider::Postgres);
        assert_eq!(changeset.changes.len(), 1);
        assert!(matches!(changeset.changes[0], Change::TableAdded(_)));
    }

    #[test]
    fn test_extra_live_table_detected_as_dropped() {
        let declared = SchemaModel::new();
        let mut live = SchemaModel::new();
        live.tables.insert("ghost".to_string(), Table::new("ghost"));

        let changeset = compute_diff(&declared, &live, Provider::Postgres);
        assert!(matches!(changeset.changes[0], Change::TableDropped(_)));
        assert!(!changeset.is_additive_only());
    }

    #[test]
    fn test_column_added_to_existing_table() {
        let mut t1 = Table::new("users");
        t1.columns.push(Column::new("id", "INTEGER"));
        let mut t2 = t1.clone();
        t2.columns.push(Column::new("email", "TEXT"));

        let mut declared = SchemaModel::new();
        declared.tables.insert("users".to_string(), t2);
        let mut live = SchemaModel::new();
        live.tables.insert("users".to_string(), t1);

        let changeset = compute_diff(&declared, &live, Provider::Postgres);
        assert!(matches!(
            changeset.changes[0],
            Change::ColumnAdded { ref column, .. } if column.name == "email"
        ));
        assert!(changeset.is_additive_only());
    }

    #[test]
    fn test_enum_value_appended_is_additive() {
        let mut declared = SchemaModel::new();
        declared.enums.insert(
            "status".to_string(),
            EnumType { name: "status".to_string(), values: vec!["a".into(), "b".into()] },
        );
        let mut live = SchemaModel::new();
        live.enums.insert(
            "status".to_string(),
            EnumType { name: "status".to_string(), values: vec!["a".into()] },
        );

        let changeset = compute_diff(&declared, &live, Provider::Postgres);
        assert!(matches!(changeset.changes[0], Change::EnumValuesAppended { .. }));
    }

    #[test]
    fn test_sqlite_column_added_to_existing_table_is_reclassified_as_recreate() {
        let mut t1 = Table::new("users");
        t1.columns.push(Column::new("id", "INTEGER"));
        let mut t2 = t1.clone();
        t2.columns.push(Column::new("email", "TEXT"));

        let mut declared = SchemaModel::new();
        declared.tables.insert("users".to_string(), t2);
        let mut live = SchemaModel::new();
        live.tables.insert("users".to_string(), t1);

        let changeset = compute_diff(&declared, &live, Provider::Sqlite);
        assert_eq!(changeset.changes.len(), 1);
        assert!(matches!(
            changeset.changes[0],
            Change::Recreate { ref live_columns, .. } if live_columns == &vec!["id".to_string()]
        ));
        assert!(!changeset.is_additive_only());
    }

    #[test]
    fn test_postgres_lossy_type_change_is_reclassified_as_recreate() {
        let mut t1 = Table::new("users");
        t1.columns.push(Column::new("id", "TEXT"));
        let mut t2 = Table::new("users");
        t2.columns.push(Column::new("id", "INTEGER"));

        let mut declared = SchemaModel::new();
        declared.tables.insert("users".to_string(), t2);
        let mut live = SchemaModel::new();
        live.tables.insert("users".to_string(), t1);

        let changeset = compute_diff(&declared, &live, Provider::Postgres);
        assert!(matches!(changeset.changes[0], Change::Recreate { .. }));
    }

    #[test]
    fn test_postgres_lossless_widening_stays_in_place() {
        let mut t1 = Table::new("users");
        t1.columns.push(Column::new("balance", "SMALLINT"));
        let mut t2 = Table::new("users");
        t2.columns.push(Column::new("balance", "INTEGER"));

        let mut declared = SchemaModel::new();
        declared.tables.insert("users".to_string(), t2);
        let mut live = SchemaModel::new();
        live.tables.insert("users".to_string(), t1);

        let changeset = compute_diff(&declared, &live, Provider::Postgres);
        assert!(matches!(changeset.changes[0], Change::ColumnAltered { .. }));
    }

    #[test]
    fn test_foreign_key_redefinition_under_the_same_name_drops_then_adds() {
        let mut t1 = Table::new("orders");
        t1.foreign_keys.push(ForeignKey {
            name: "fk_orders_users".to_string(),
            columns: vec!["user_id".to_string()],
            ref_table: "users".to_string(),
            ref_columns: vec!["id".to_string()],
            on_delete: Default::default(),
            on_update: Default::default(),
        });
        let mut t2 = Table::new("orders");
        t2.foreign_keys.push(ForeignKey {
            name: "fk_orders_users".to_string(),
            columns: vec!["user_id".to_string()],
            ref_table: "accounts".to_string(),
            ref_columns: vec!["id".to_string()],
            on_delete: Default::default(),
            on_update: Default::default(),
        });

        let mut declared = SchemaModel::new();
        declared.tables.insert("orders".to_string(), t2);
        let mut live = SchemaModel::new();
        live.tables.insert("orders".to_string(), t1);

        let changeset = compute_diff(&declared, &live, Provider::Postgres);
        let dropped = changeset.changes.iter().any(|c| matches!(c, Change::ForeignKeyDropped { name, .. } if name == "fk_orders_users"));
        let added = changeset
            .changes
            .iter()
            .any(|c| matches!(c, Change::ForeignKeyAdded { fk, .. } if fk.name == "fk_orders_users" && fk.ref_table == "accounts"));
        assert!(dropped, "expected a ForeignKeyDropped for the redefined constraint, got {:?}", changeset.changes);
        assert!(added, "expected a ForeignKeyAdded with the new definition, got {:?}", changeset.changes);
    }
}
