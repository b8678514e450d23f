//! Row-level comparison of matched tables

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::compare::primary_key::PrimaryKeyCandidate;
use crate::compare::values::{canonical, canonical_key, values_equal};
use crate::config::ComparisonConfig;
use crate::schema::types::{GeneratedTable, Row};

/// Classification of one row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiffKind {
    Added,
    Removed,
    Modified,
    Unchanged,
}

/// One differing column of a modified row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub column: String,
    pub old: Value,
    pub new: Value,
}

/// One enumerated row difference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowDiff {
    pub kind: DiffKind,
    /// Key value; `None` in degraded mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<Value>,
    /// Data columns of the added or removed row
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<IndexMap<String, Value>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<FieldChange>,
}

/// Outcome of comparing the rows of two tables
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableDiff {
    pub key_column: Option<String>,
    /// Rows were compared by content instead of by key
    pub degraded: bool,
    /// Why a requested key could not be used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    pub rows_a: usize,
    pub rows_b: usize,
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    pub unchanged: usize,
    /// Enumerated rows stopped at the row limit
    pub truncated: bool,
    pub rows: Vec<RowDiff>,
}

impl TableDiff {
    pub fn has_differences(&self) -> bool {
        self.added + self.removed + self.modified > 0
    }

    fn record(&mut self, diff: RowDiff, limit: Option<usize>) {
        match diff.kind {
            DiffKind::Added => self.added += 1,
            DiffKind::Removed => self.removed += 1,
            DiffKind::Modified => self.modified += 1,
            DiffKind::Unchanged => {
                self.unchanged += 1;
                return;
            }
        }
        if limit.map_or(true, |limit| self.rows.len() < limit) {
            self.rows.push(diff);
        } else {
            self.truncated = true;
        }
    }
}

/// Compares the rows of two matched tables
#[derive(Debug, Clone)]
pub struct DataComparer {
    null_equals_missing: bool,
    row_limit: Option<usize>,
}

impl Default for DataComparer {
    fn default() -> Self {
        Self {
            null_equals_missing: true,
            row_limit: None,
        }
    }
}

impl DataComparer {
    pub fn new(config: &ComparisonConfig) -> Self {
        Self {
            null_equals_missing: config.null_equals_missing,
            row_limit: config.row_diff_limit_per_table,
        }
    }

    /// Set the cap on enumerated rows
    pub fn with_row_limit(mut self, limit: Option<usize>) -> Self {
        self.row_limit = limit;
        self
    }

    /// Compare two tables, by `key` when it is usable
    ///
    /// A key missing from either table, or holding nulls or duplicates on
    /// either side, is dropped in favor of content comparison.
    pub fn compare(&self, table_a: &GeneratedTable, table_b: &GeneratedTable, key: Option<&str>) -> TableDiff {
        self.compare_tables(table_a, table_b, key, false)
    }

    /// Compare two tables by a detected key
    ///
    /// With a weak rule, a removed and an added row at the same position
    /// (parent key and row index) are reported as one modified row.
    pub fn compare_with_candidate(
        &self,
        table_a: &GeneratedTable,
        table_b: &GeneratedTable,
        candidate: &PrimaryKeyCandidate,
    ) -> TableDiff {
        let pair_positions = candidate.rule().map_or(false, |rule| rule.is_weak());
        self.compare_tables(table_a, table_b, candidate.column(), pair_positions)
    }

    fn compare_tables(
        &self,
        table_a: &GeneratedTable,
        table_b: &GeneratedTable,
        key: Option<&str>,
        pair_positions: bool,
    ) -> TableDiff {
        let columns = comparison_columns(table_a, table_b);
        let mut diff = TableDiff {
            rows_a: table_a.rows.len(),
            rows_b: table_b.rows.len(),
            ..TableDiff::default()
        };

        match key {
            Some(key) => match key_problem(table_a, table_b, key) {
                None => {
                    diff.key_column = Some(key.to_string());
                    self.compare_by_key(table_a, table_b, key, pair_positions, &columns, &mut diff);
                }
                Some(reason) => {
                    tracing::warn!(table = %table_a.name(), key, reason = %reason, "Key unusable, comparing by content");
                    diff.fallback_reason = Some(reason);
                    self.compare_by_content(table_a, table_b, &columns, &mut diff);
                }
            },
            None => self.compare_by_content(table_a, table_b, &columns, &mut diff),
        }

        if diff.truncated {
            tracing::debug!(table = %table_a.name(), limit = ?self.row_limit, "Row diffs truncated");
        }
        diff
    }

    fn compare_by_key(
        &self,
        table_a: &GeneratedTable,
        table_b: &GeneratedTable,
        key: &str,
        pair_positions: bool,
        columns: &[String],
        diff: &mut TableDiff,
    ) {
        let rows_b: HashMap<String, &Row> = table_b
            .rows
            .iter()
            .filter_map(|row| row.get(key).map(|v| (canonical_key(v), row)))
            .collect();
        let keys_a: HashSet<String> = table_a
            .rows
            .iter()
            .filter_map(|row| row.get(key).map(canonical_key))
            .collect();
        let only_b: Vec<&Row> = table_b
            .rows
            .iter()
            .filter(|row| row.get(key).map_or(false, |v| !keys_a.contains(&canonical_key(v))))
            .collect();
        let mut pool = PositionPool::new(table_b, only_b);

        for row_a in &table_a.rows {
            let Some(key_value) = row_a.get(key) else {
                continue;
            };

            let record = match rows_b.get(&canonical_key(key_value)) {
                Some(row_b) => {
                    let changes = self.field_changes(row_a, row_b, columns, Some(key));
                    RowDiff {
                        kind: if changes.is_empty() {
                            DiffKind::Unchanged
                        } else {
                            DiffKind::Modified
                        },
                        key: Some(key_value.clone()),
                        row: None,
                        changes,
                    }
                }
                None => match pair_positions.then(|| pool.claim(table_a, row_a)).flatten() {
                    Some(row_b) => RowDiff {
                        kind: DiffKind::Modified,
                        key: Some(key_value.clone()),
                        row: None,
                        changes: self.field_changes(row_a, row_b, columns, None),
                    },
                    None => removed(Some(key_value.clone()), row_a, columns),
                },
            };
            diff.record(record, self.row_limit);
        }

        for row_b in pool.unclaimed() {
            let key_value = row_b.get(key).cloned();
            diff.record(added(key_value, row_b, columns), self.row_limit);
        }
    }

    /// Multiset comparison of row contents
    ///
    /// Rows left over on both sides at the same position (parent key and row
    /// index) are reported as modified rather than as a removal plus an addition.
    fn compare_by_content(
        &self,
        table_a: &GeneratedTable,
        table_b: &GeneratedTable,
        columns: &[String],
        diff: &mut TableDiff,
    ) {
        diff.degraded = true;

        let contents_b: Vec<String> = table_b
            .rows
            .iter()
            .map(|row| self.content_key(row, columns))
            .collect();
        let mut available: HashMap<&str, usize> = HashMap::new();
        for content in &contents_b {
            *available.entry(content.as_str()).or_insert(0) += 1;
        }

        // Matched B rows per content, claimed in B order below
        let mut matched: HashMap<String, usize> = HashMap::new();
        let mut leftover_a: Vec<&Row> = Vec::new();
        for row in &table_a.rows {
            let content = self.content_key(row, columns);
            match available.get_mut(content.as_str()) {
                Some(count) if *count > 0 => {
                    *count -= 1;
                    *matched.entry(content).or_insert(0) += 1;
                    diff.record(unchanged(), self.row_limit);
                }
                _ => leftover_a.push(row),
            }
        }

        let mut leftover_b: Vec<&Row> = Vec::new();
        for (row, content) in table_b.rows.iter().zip(&contents_b) {
            match matched.get_mut(content.as_str()) {
                Some(count) if *count > 0 => *count -= 1,
                _ => leftover_b.push(row),
            }
        }

        let mut pool = PositionPool::new(table_b, leftover_b);
        for row_a in leftover_a {
            let record = match pool.claim(table_a, row_a) {
                Some(row_b) => RowDiff {
                    kind: DiffKind::Modified,
                    key: None,
                    row: None,
                    changes: self.field_changes(row_a, row_b, columns, None),
                },
                None => removed(None, row_a, columns),
            };
            diff.record(record, self.row_limit);
        }

        for row_b in pool.unclaimed() {
            diff.record(added(None, row_b, columns), self.row_limit);
        }
    }

    fn cell<'r>(&self, row: &'r Row, column: &str) -> Option<&'r Value> {
        match row.get(column) {
            None if self.null_equals_missing => Some(&Value::Null),
            other => other,
        }
    }

    fn field_changes(&self, row_a: &Row, row_b: &Row, columns: &[String], key: Option<&str>) -> Vec<FieldChange> {
        columns
            .iter()
            .filter(|c| Some(c.as_str()) != key)
            .filter_map(|column| {
                let (a, b) = (self.cell(row_a, column), self.cell(row_b, column));
                let equal = match (a, b) {
                    (Some(a), Some(b)) => values_equal(a, b),
                    (None, None) => true,
                    _ => false,
                };
                if equal {
                    None
                } else {
                    Some(FieldChange {
                        column: column.clone(),
                        old: a.cloned().unwrap_or(Value::Null),
                        new: b.cloned().unwrap_or(Value::Null),
                    })
                }
            })
            .collect()
    }

    /// Hashable content of the data columns
    fn content_key(&self, row: &Row, columns: &[String]) -> String {
        let cells: Vec<(bool, Value)> = columns
            .iter()
            .map(|c| match self.cell(row, c) {
                Some(value) => (true, canonical(value)),
                None => (false, Value::Null),
            })
            .collect();
        serde_json::to_string(&cells).unwrap_or_default()
    }
}

fn removed(key: Option<Value>, row: &Row, columns: &[String]) -> RowDiff {
    RowDiff {
        kind: DiffKind::Removed,
        key,
        row: Some(data_values(row, columns)),
        changes: Vec::new(),
    }
}

fn added(key: Option<Value>, row: &Row, columns: &[String]) -> RowDiff {
    RowDiff {
        kind: DiffKind::Added,
        key,
        row: Some(data_values(row, columns)),
        changes: Vec::new(),
    }
}

fn unchanged() -> RowDiff {
    RowDiff {
        kind: DiffKind::Unchanged,
        key: None,
        row: None,
        changes: Vec::new(),
    }
}

/// Data columns of A, then those only B has
fn comparison_columns(table_a: &GeneratedTable, table_b: &GeneratedTable) -> Vec<String> {
    let mut columns = table_a.spec.data_column_names();
    for column in table_b.spec.data_columns() {
        if !columns.contains(&column.name) {
            columns.push(column.name.clone());
        }
    }
    columns
}

fn data_values(row: &Row, columns: &[String]) -> IndexMap<String, Value> {
    columns
        .iter()
        .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
        .collect()
}

/// Parent key and element index of a row, as text
fn position(table: &GeneratedTable, row: &Row) -> (String, String) {
    let read = |column: &Option<String>| {
        column
            .as_deref()
            .and_then(|c| row.get(c))
            .map(Value::to_string)
            .unwrap_or_default()
    };
    (read(&table.spec.foreign_key), read(&table.spec.row_index))
}

/// Unclaimed rows of one side, looked up by position
struct PositionPool<'r> {
    rows: Vec<&'r Row>,
    by_position: HashMap<(String, String), usize>,
    claimed: Vec<bool>,
}

impl<'r> PositionPool<'r> {
    fn new(table: &GeneratedTable, rows: Vec<&'r Row>) -> Self {
        let by_position = rows
            .iter()
            .enumerate()
            .map(|(i, row)| (position(table, row), i))
            .collect();
        Self {
            claimed: vec![false; rows.len()],
            rows,
            by_position,
        }
    }

    /// Take the row at the same position as `row` of `table`, if still free
    fn claim(&mut self, table: &GeneratedTable, row: &Row) -> Option<&'r Row> {
        let i = *self.by_position.get(&position(table, row))?;
        if self.claimed[i] {
            return None;
        }
        self.claimed[i] = true;
        Some(self.rows[i])
    }

    fn unclaimed(&self) -> impl Iterator<Item = &'r Row> + '_ {
        self.rows
            .iter()
            .zip(&self.claimed)
            .filter(|(_, claimed)| !**claimed)
            .map(|(row, _)| *row)
    }
}

/// Why `key` cannot identify rows, if it cannot
fn key_problem(table_a: &GeneratedTable, table_b: &GeneratedTable, key: &str) -> Option<String> {
    for (side, table) in [("A", table_a), ("B", table_b)] {
        if !table.spec.data_columns().any(|c| c.name == key) {
            return Some(format!("key column '{}' missing in {}", key, side));
        }
        let mut seen = HashSet::with_capacity(table.rows.len());
        for row in &table.rows {
            match row.get(key) {
                None | Some(Value::Null) => {
                    return Some(format!("key column '{}' has nulls in {}", key, side));
                }
                Some(value) => {
                    if !seen.insert(canonical_key(value)) {
                        return Some(format!("key column '{}' has duplicates in {}", key, side));
                    }
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::schema::tables::TableGenerator;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn table(rows: Value) -> GeneratedTable {
        let tables = TableGenerator::new(&GenerationConfig::default())
            .generate(&rows)
            .unwrap();
        tables.tables.into_iter().next().unwrap()
    }

    #[test]
    fn test_modified_and_added_by_key() {
        let a = table(json!([{"id": 1, "name": "x"}]));
        let b = table(json!([{"id": 1, "name": "y"}, {"id": 2, "name": "z"}]));

        let diff = DataComparer::default().compare(&a, &b, Some("id"));

        assert!(!diff.degraded);
        assert_eq!((diff.added, diff.removed, diff.modified, diff.unchanged), (1, 0, 1, 0));
        assert_eq!(
            diff.rows[0],
            RowDiff {
                kind: DiffKind::Modified,
                key: Some(json!(1)),
                row: None,
                changes: vec![FieldChange {
                    column: "name".to_string(),
                    old: json!("x"),
                    new: json!("y"),
                }],
            }
        );
        assert_eq!(diff.rows[1].kind, DiffKind::Added);
        assert_eq!(diff.rows[1].key, Some(json!(2)));
    }

    #[test]
    fn test_numeric_tolerance_and_null_missing() {
        let a = table(json!([{"id": 1, "amount": 10, "note": null}]));
        let b = table(json!([{"id": 1.0, "amount": 10.0}]));

        let diff = DataComparer::default().compare(&a, &b, Some("id"));
        assert_eq!(diff.unchanged, 1);
        assert!(!diff.has_differences());

        let strict = DataComparer::new(&ComparisonConfig {
            null_equals_missing: false,
            ..ComparisonConfig::default()
        });
        let diff = strict.compare(&a, &b, Some("id"));
        assert_eq!(diff.modified, 1);
        assert_eq!(diff.rows[0].changes[0].column, "note");
    }

    #[test]
    fn test_weak_key_pairs_rows_at_same_position() {
        let a = table(json!([{"host": "a", "port": 1}, {"host": "b", "port": 2}]));
        let b = table(json!([{"host": "a", "port": 1}, {"host": "c", "port": 2}]));
        let candidate = PrimaryKeyCandidate::Column {
            column: "host".to_string(),
            rule: crate::compare::primary_key::KeyRule::UniqueValues,
        };

        let diff = DataComparer::default().compare_with_candidate(&a, &b, &candidate);
        assert_eq!((diff.added, diff.removed, diff.modified, diff.unchanged), (0, 0, 1, 1));
        assert_eq!(diff.rows[0].key, Some(json!("b")));
        assert_eq!(
            diff.rows[0].changes,
            vec![FieldChange {
                column: "host".to_string(),
                old: json!("b"),
                new: json!("c"),
            }]
        );

        // An explicit key keeps identity strict
        let diff = DataComparer::default().compare(&a, &b, Some("host"));
        assert_eq!((diff.added, diff.removed, diff.modified), (1, 1, 0));
    }

    #[test]
    fn test_content_mode_without_key() {
        let a = table(json!(["a", "b", "a", "c"]));
        let b = table(json!(["a", "b", "a"]));

        let diff = DataComparer::default().compare(&a, &b, None);
        assert!(diff.degraded);
        assert_eq!((diff.added, diff.removed, diff.modified, diff.unchanged), (0, 1, 0, 3));
        assert_eq!(diff.rows[0].row.as_ref().unwrap().get("value"), Some(&json!("c")));
    }

    #[test]
    fn test_content_mode_pairs_same_position() {
        let a = table(json!(["a", "b"]));
        let b = table(json!(["a", "c"]));

        let diff = DataComparer::default().compare(&a, &b, None);
        assert_eq!((diff.added, diff.removed, diff.modified), (0, 0, 1));
        assert_eq!(
            diff.rows[0].changes,
            vec![FieldChange {
                column: "value".to_string(),
                old: json!("b"),
                new: json!("c"),
            }]
        );
    }

    #[test]
    fn test_duplicate_key_falls_back() {
        let a = table(json!([{"id": 1, "v": "x"}, {"id": 1, "v": "y"}]));
        let b = table(json!([{"id": 1, "v": "x"}]));

        let diff = DataComparer::default().compare(&a, &b, Some("id"));
        assert!(diff.degraded);
        assert!(diff.key_column.is_none());
        assert!(diff.fallback_reason.unwrap().contains("duplicates"));
        assert_eq!(diff.removed, 1);
    }

    #[test]
    fn test_row_limit_truncates_but_counts() {
        let a = table(json!([{"id": 1}, {"id": 2}, {"id": 3}]));
        let b = table(json!([{"id": 9}]));

        let diff = DataComparer::default()
            .with_row_limit(Some(2))
            .compare(&a, &b, Some("id"));

        assert_eq!(diff.removed, 3);
        assert_eq!(diff.added, 1);
        assert_eq!(diff.rows.len(), 2);
        assert!(diff.truncated);
    }
}
