//! Turns a [`ChangeSet`] into an ordered, human-presentable execution plan.

pub mod ordering;
pub mod render;

use serde::Serialize;

use crate::diff::{compute_diff, ChangeSet};
use crate::model::SchemaModel;
use crate::provider::Provider;
pub use render::{MigrationPlan, PlanStatement};

/// The result of comparing a declared schema against a live database: the raw
/// diff plus the `MigrationPlan` that would apply it.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub changeset: ChangeSet,
    pub migration: MigrationPlan,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.changeset.is_empty()
    }

    pub fn is_additive_only(&self) -> bool {
        self.changeset.is_additive_only()
    }
}

/// Build a plan bringing `live` to match `declared`, rendered for `provider`'s dialect.
pub fn build_plan(declared: &SchemaModel, live: &SchemaModel, provider: Provider) -> Plan {
    let changeset = compute_diff(declared, live, provider);
    let migration = render::render_plan(&changeset, provider);
    Plan { changeset, migration }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Column, Table};

    #[test]
    fn test_build_plan_empty_for_identical_models() {
        let mut model = SchemaModel::new();
        let mut t = Table::new("users");
        t.columns.push(Column::new("id", "INTEGER"));
        model.tables.insert(t.name.clone(), t);

        let plan = build_plan(&model, &model.clone(), Provider::Postgres);
        assert!(plan.is_empty());
        assert!(plan.migration.is_empty());
    }

    #[test]
    fn test_build_plan_new_table_produces_create_statement() {
        let mut declared = SchemaModel::new();
        let mut t = Table::new("users");
        t.columns.push(Column::new("id", "INTEGER"));
        declared.tables.insert(t.name.clone(), t);
        let live = SchemaModel::new();

        let plan = build_plan(&declared, &live, Provider::Postgres);
        assert!(!plan.is_empty());
        assert!(plan.is_additive_only());
        assert!(plan.migration.transactional.iter().any(|s| s.sql.starts_with("CREATE TABLE")));
    }
}
