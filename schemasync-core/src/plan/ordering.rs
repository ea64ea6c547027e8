//! Table creation ordering via dependency-graph topological sort.
//!
//! Extends the Kahn's-algorithm sort used for migration-file dependencies:
//! foreign keys between declared tables form the dependency edges instead of
//! explicit directives, and instead of rejecting a cycle outright, every
//! table caught in one is grouped together and emitted as a single unit with
//! its foreign keys deferred to `ALTER TABLE ... ADD CONSTRAINT` statements
//! issued after all of a plan's `CREATE TABLE`s.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use crate::model::Table;

/// One step of the table creation order: either a single table with no cyclic
/// foreign keys, or a set of mutually dependent tables that must be created
/// together with their cross-references deferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableGroup {
    Single(String),
    Cycle(Vec<String>),
}

/// Compute the order tables should be created in, grouping any foreign-key
/// cycles together. Self-references (a table referencing itself) are not
/// cycles for this purpose — they always need their own constraint deferred
/// but never block another table's ordering.
pub fn order_tables(tables: &BTreeMap<String, Table>) -> Vec<TableGroup> {
    let names: BTreeSet<&String> = tables.keys().collect();

    let mut edges: HashMap<String, HashSet<String>> = HashMap::new();
    let mut reverse_edges: HashMap<String, HashSet<String>> = HashMap::new();
    for name in &names {
        edges.entry((*name).clone()).or_default();
        reverse_edges.entry((*name).clone()).or_default();
    }
    for (name, table) in tables {
        for fk in &table.foreign_keys {
            if fk.ref_table == *name {
                continue; // self-reference: never an ordering dependency
            }
            if names.contains(&fk.ref_table) {
                edges.get_mut(name).unwrap().insert(fk.ref_table.clone());
                reverse_edges.get_mut(&fk.ref_table).unwrap().insert(name.clone());
            }
        }
    }

    let mut in_degree: HashMap<String, usize> = HashMap::new();
    for name in &names {
        in_degree.insert((*name).clone(), edges[*name].len());
    }

    let mut queue: VecDeque<String> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(n, _)| n.clone())
        .collect::<Vec<_>>()
        .into_iter()
        .collect();
    // Deterministic iteration order for ties.
    let mut initial: Vec<String> = queue.into_iter().collect();
    initial.sort();
    queue = initial.into();

    let mut groups = Vec::new();
    let mut resolved: HashSet<String> = HashSet::new();

    while let Some(node) = queue.pop_front() {
        if resolved.contains(&node) {
            continue;
        }
        groups.push(TableGroup::Single(node.clone()));
        resolved.insert(node.clone());

        let mut newly_ready: Vec<String> = Vec::new();
        if let Some(dependents) = reverse_edges.get(&node) {
            for dep in dependents {
                if resolved.contains(dep) {
                    continue;
                }
                let deg = in_degree.get_mut(dep).unwrap();
                *deg = deg.saturating_sub(1);
                if *deg == 0 {
                    newly_ready.push(dep.clone());
                }
            }
        }
        newly_ready.sort();
        for n in newly_ready {
            queue.push_back(n);
        }
    }

    // Anything left is part of one or more foreign-key cycles. Group the
    // remainder together deterministically rather than rejecting the schema.
    let mut leftover: Vec<String> = names
        .iter()
        .filter(|n| !resolved.contains(**n))
        .map(|n| (*n).clone())
        .collect();
    if !leftover.is_empty() {
        leftover.sort();
        groups.push(TableGroup::Cycle(leftover));
    }

    groups
}

/// Flatten a table-group order into a single table-name sequence, for
/// callers that only need "tables before the ones that reference them"
/// ordering and don't need to distinguish cycle membership.
pub fn flatten(groups: &[TableGroup]) -> Vec<String> {
    groups
        .iter()
        .flat_map(|g| match g {
            TableGroup::Single(n) => vec![n.clone()],
            TableGroup::Cycle(names) => names.clone(),
        })
        .collect()
}
