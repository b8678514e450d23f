//! Row deduplication for dimension-like tables
//!
//! Identical rows are merged into their first occurrence. Every redirect is
//! computed before anything is rewritten, so foreign keys never point at a
//! removed row.

use serde_json::Value;
use std::collections::HashMap;

use crate::schema::types::{GeneratedTable, TableSet};

/// Disjoint sets over the rows of one table, rooted at the smallest key
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (keep, merge) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[merge] = keep;
        }
    }
}

fn is_eligible(table: &GeneratedTable, only: Option<&[String]>) -> bool {
    match only {
        Some(names) => names.iter().any(|n| n.eq_ignore_ascii_case(table.name())),
        None => !table.spec.is_root(),
    }
}

/// Row identity over data columns in table order; missing reads as null
fn row_identity(table: &GeneratedTable, row: usize) -> String {
    let values: Vec<&Value> = table
        .spec
        .data_columns()
        .map(|c| table.rows[row].get(&c.name).unwrap_or(&Value::Null))
        .collect();
    serde_json::to_string(&values).unwrap_or_default()
}

/// Surrogate key redirects for one table; absent keys survive
fn table_remap(table: &GeneratedTable) -> HashMap<u64, u64> {
    let mut sets = DisjointSet::new(table.rows.len());
    let mut first_seen: HashMap<String, usize> = HashMap::new();

    for index in 0..table.rows.len() {
        let identity = row_identity(table, index);
        match first_seen.get(&identity) {
            Some(&first) => sets.union(first, index),
            None => {
                first_seen.insert(identity, index);
            }
        }
    }

    let mut remap = HashMap::new();
    for index in 0..table.rows.len() {
        let root = sets.find(index);
        if root != index {
            remap.insert(table.rows[index].key, table.rows[root].key);
        }
    }
    remap
}

/// Merge identical rows of eligible tables
///
/// `only` names the dimension-like tables; `None` selects every non-root
/// table. Returns the number of rows removed.
pub fn deduplicate(tables: &mut TableSet, only: Option<&[String]>) -> usize {
    let remaps: HashMap<String, HashMap<u64, u64>> = tables
        .tables
        .iter()
        .filter(|t| is_eligible(t, only))
        .map(|t| (t.name().to_string(), table_remap(t)))
        .filter(|(_, remap)| !remap.is_empty())
        .collect();

    if remaps.is_empty() {
        return 0;
    }

    // Redirect foreign keys first, then drop merged rows
    for table in tables.tables.iter_mut() {
        let (Some(parent), Some(fk)) = (&table.spec.parent, &table.spec.foreign_key) else {
            continue;
        };
        let Some(remap) = remaps.get(parent) else {
            continue;
        };
        for row in table.rows.iter_mut() {
            let target = row
                .get(fk)
                .and_then(Value::as_u64)
                .and_then(|key| remap.get(&key).copied());
            if let Some(target) = target {
                row.set(fk, Value::from(target));
            }
        }
    }

    let mut removed = 0;
    for table in tables.tables.iter_mut() {
        if let Some(remap) = remaps.get(table.name()) {
            let before = table.rows.len();
            table.rows.retain(|row| !remap.contains_key(&row.key));
            removed += before - table.rows.len();
            tracing::debug!(table = %table.spec.name, merged = before - table.rows.len(), "Merged duplicate rows");
        }
    }

    removed
}
