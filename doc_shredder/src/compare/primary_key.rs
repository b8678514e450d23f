//! Primary key detection
//!
//! Keys are picked by an ordered list of named rules. Each rule is a plain
//! predicate on the column name, so the order alone decides precedence.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

use crate::compare::values::canonical_key;
use crate::schema::types::{Row, TableSpec};

static ID_AFFIX_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.+_id|id_.+)$").expect("valid id affix pattern"));

/// Rows inspected for uniqueness checks
pub const DEFAULT_SAMPLE_SIZE: usize = 10_000;

/// Fewest sampled rows for which unique values say anything about identity
pub const MIN_UNIQUE_VALUE_ROWS: usize = 2;

/// Rule that selected a key column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyRule {
    /// Named in `primary_key_override`
    Override,
    ExactId,
    /// `*_id` or `id_*`
    IdAffix,
    Code,
    Uuid,
    Name,
    /// First column whose sampled values are unique and non-null
    UniqueValues,
}

impl KeyRule {
    /// Name-based rules in precedence order
    pub const NAMING_RULES: [KeyRule; 5] = [
        KeyRule::ExactId,
        KeyRule::IdAffix,
        KeyRule::Code,
        KeyRule::Uuid,
        KeyRule::Name,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyRule::Override => "override",
            KeyRule::ExactId => "exact_id",
            KeyRule::IdAffix => "id_affix",
            KeyRule::Code => "code",
            KeyRule::Uuid => "uuid",
            KeyRule::Name => "name",
            KeyRule::UniqueValues => "unique_values",
        }
    }

    /// Rule that may pick an ordinary data column
    ///
    /// Rows keyed this way that disappear on one side and appear on the other
    /// at the same position are treated as one modified row.
    pub fn is_weak(&self) -> bool {
        matches!(self, KeyRule::Name | KeyRule::UniqueValues)
    }

    /// Whether a column name satisfies this rule
    pub fn matches_name(&self, column: &str) -> bool {
        match self {
            KeyRule::ExactId => column.eq_ignore_ascii_case("id"),
            KeyRule::IdAffix => ID_AFFIX_REGEX.is_match(column),
            KeyRule::Code => column.eq_ignore_ascii_case("code"),
            KeyRule::Uuid => column.eq_ignore_ascii_case("uuid"),
            KeyRule::Name => column.eq_ignore_ascii_case("name"),
            KeyRule::Override | KeyRule::UniqueValues => false,
        }
    }
}

impl fmt::Display for KeyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of key detection for one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrimaryKeyCandidate {
    Column { column: String, rule: KeyRule },
    NoKey,
}

impl PrimaryKeyCandidate {
    pub fn column(&self) -> Option<&str> {
        match self {
            PrimaryKeyCandidate::Column { column, .. } => Some(column),
            PrimaryKeyCandidate::NoKey => None,
        }
    }

    pub fn rule(&self) -> Option<KeyRule> {
        match self {
            PrimaryKeyCandidate::Column { rule, .. } => Some(*rule),
            PrimaryKeyCandidate::NoKey => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, PrimaryKeyCandidate::NoKey)
    }
}

/// Primary key detector
#[derive(Debug, Clone)]
pub struct PrimaryKeyDetector {
    sample_size: usize,
}

impl Default for PrimaryKeyDetector {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

impl PrimaryKeyDetector {
    pub fn new(sample_size: usize) -> Self {
        Self { sample_size }
    }

    /// Pick a key from column names alone
    ///
    /// Without samples the uniqueness fallback cannot apply.
    pub fn detect_from_names<S: AsRef<str>>(&self, columns: &[S]) -> PrimaryKeyCandidate {
        for rule in KeyRule::NAMING_RULES {
            if let Some(column) = columns.iter().find(|c| rule.matches_name(c.as_ref())) {
                return PrimaryKeyCandidate::Column {
                    column: column.as_ref().to_string(),
                    rule,
                };
            }
        }
        PrimaryKeyCandidate::NoKey
    }

    /// Pick a key for a generated table, checking uniqueness on sampled rows
    ///
    /// Synthetic columns are never candidates. A table without rows falls back
    /// to the naming rules.
    pub fn detect(&self, spec: &TableSpec, rows: &[Row]) -> PrimaryKeyCandidate {
        let columns = spec.data_column_names();
        if rows.is_empty() {
            return self.detect_from_names(&columns);
        }

        let sample = &rows[..rows.len().min(self.sample_size)];

        let detected = KeyRule::NAMING_RULES
            .iter()
            .find_map(|rule| {
                columns
                    .iter()
                    .filter(|c| rule.matches_name(c))
                    .find(|c| is_unique_non_null(sample, c))
                    .map(|c| PrimaryKeyCandidate::Column {
                        column: c.clone(),
                        rule: *rule,
                    })
            })
            .or_else(|| {
                if sample.len() < MIN_UNIQUE_VALUE_ROWS {
                    return None;
                }
                columns
                    .iter()
                    .find(|c| is_unique_non_null(sample, c))
                    .map(|c| PrimaryKeyCandidate::Column {
                        column: c.clone(),
                        rule: KeyRule::UniqueValues,
                    })
            })
            .unwrap_or(PrimaryKeyCandidate::NoKey);

        match &detected {
            PrimaryKeyCandidate::Column { column, rule } => {
                tracing::debug!(table = %spec.name, column = %column, rule = %rule, "Detected primary key");
            }
            PrimaryKeyCandidate::NoKey => {
                tracing::debug!(table = %spec.name, "No primary key detected");
            }
        }

        detected
    }
}

/// Every sampled row holds a distinct non-null value in `column`
pub fn is_unique_non_null(rows: &[Row], column: &str) -> bool {
    let mut seen = HashSet::with_capacity(rows.len());
    rows.iter().all(|row| match row.get(column) {
        None | Some(Value::Null) => false,
        Some(value) => seen.insert(canonical_key(value)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::schema::tables::TableGenerator;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(&["id", "name", "value"], Some("id"))]
    #[case(&["code", "description"], Some("code"))]
    #[case(&["description", "amount"], None)]
    #[case(&["name", "customer_id"], Some("customer_id"))]
    #[case(&["ID_REF", "uuid"], Some("ID_REF"))]
    #[case(&["label", "UUID", "name"], Some("UUID"))]
    #[case(&["valid", "idea"], None)]
    fn test_detect_from_names(#[case] columns: &[&str], #[case] expected: Option<&str>) {
        let detected = PrimaryKeyDetector::default().detect_from_names(columns);
        assert_eq!(detected.column(), expected);
    }

    #[test]
    fn test_rule_is_reported() {
        let detected = PrimaryKeyDetector::default().detect_from_names(&["code"]);
        assert_eq!(detected.rule(), Some(KeyRule::Code));
        assert!(PrimaryKeyDetector::default()
            .detect_from_names(&["amount"])
            .is_none());
    }

    #[test]
    fn test_samples_reject_duplicate_name_candidates() {
        let tables = TableGenerator::new(&GenerationConfig::default())
            .generate(&json!([
                {"name": "a", "sku": "x1", "qty": 1},
                {"name": "a", "sku": "x2", "qty": 1}
            ]))
            .unwrap();
        let root = tables.get("ROOT").unwrap();

        let detected = PrimaryKeyDetector::default().detect(&root.spec, &root.rows);
        assert_eq!(
            detected,
            PrimaryKeyCandidate::Column {
                column: "sku".to_string(),
                rule: KeyRule::UniqueValues,
            }
        );
    }

    #[test]
    fn test_single_row_has_no_unique_values_key() {
        let tables = TableGenerator::new(&GenerationConfig::default())
            .generate(&json!({"warehouse": "north", "region": "eu"}))
            .unwrap();
        let root = tables.get("ROOT").unwrap();

        let detected = PrimaryKeyDetector::default().detect(&root.spec, &root.rows);
        assert_eq!(detected, PrimaryKeyCandidate::NoKey);
        assert!(KeyRule::UniqueValues.is_weak());
        assert!(!KeyRule::ExactId.is_weak());
    }

    #[test]
    fn test_synthetic_columns_are_never_keys() {
        let tables = TableGenerator::new(&GenerationConfig::default())
            .generate(&json!({"tags": ["a", "a"]}))
            .unwrap();
        let tags = tables.get("TAGS").unwrap();

        let detected = PrimaryKeyDetector::default().detect(&tags.spec, &tags.rows);
        assert!(detected.is_none());
    }
}
