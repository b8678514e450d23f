//! Cross-document comparison
//!
//! Matches the tables generated from two documents, detects their keys and
//! diffs both their columns and their rows.

pub mod data;
pub mod matcher;
pub mod nodes;
pub mod primary_key;
pub mod values;

use serde::Serialize;
use serde_json::Value;

use crate::config::{ComparisonConfig, Config};
use crate::error::Result;
use crate::schema::diff::SchemaDrift;
use crate::schema::tables::TableGenerator;
use crate::schema::types::{GeneratedTable, TableSet};

pub use data::{DataComparer, DiffKind, FieldChange, RowDiff, TableDiff};
pub use matcher::{MatchKind, MatchResult, TableMatch, TableMatcher};
pub use nodes::{
    collect_discrepancies, ensure_same_schema, schema_signature, DocumentComparison, MissingNode,
    NodeDiscrepancies, SchemaSignature, ValueDifference,
};
pub use primary_key::{KeyRule, PrimaryKeyCandidate, PrimaryKeyDetector};

/// Document side of a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    A,
    B,
}

/// Non-fatal finding recorded in a report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum Warning {
    UnmatchedTable { table: String, side: Side },
    NoKeyDetected { table: String },
    RowLimitExceeded { table: String, limit: usize },
    AmbiguousMatch { table: String, chosen: String, candidates: Vec<String> },
    KeyFallback { table: String, key: String, reason: String },
}

/// Comparison of one matched table pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableComparison {
    pub table_a: String,
    pub table_b: String,
    pub match_kind: MatchKind,
    pub primary_key: PrimaryKeyCandidate,
    pub drift: SchemaDrift,
    pub data: TableDiff,
}

impl TableComparison {
    pub fn has_differences(&self) -> bool {
        !self.drift.is_empty() || self.data.has_differences()
    }
}

/// Headline counts of a report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComparisonSummary {
    pub tables_matched: usize,
    pub tables_only_in_a: usize,
    pub tables_only_in_b: usize,
    pub tables_with_differences: usize,
}

/// Full result of comparing two table sets
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub summary: ComparisonSummary,
    pub matches: Vec<TableMatch>,
    pub only_in_a: Vec<String>,
    pub only_in_b: Vec<String>,
    pub tables: Vec<TableComparison>,
    pub warnings: Vec<Warning>,
    /// Node-level discrepancies, present when built from documents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentComparison>,
}

impl ComparisonReport {
    pub fn table(&self, name_a: &str) -> Option<&TableComparison> {
        self.tables.iter().find(|t| t.table_a == name_a)
    }

    /// Table-level differences only; `document` is informational
    pub fn has_differences(&self) -> bool {
        self.summary.tables_with_differences > 0
            || !self.only_in_a.is_empty()
            || !self.only_in_b.is_empty()
    }
}

/// Generate tables for two documents and compare them
pub fn compare_documents(document_a: &Value, document_b: &Value, config: &Config) -> Result<ComparisonReport> {
    let generator = TableGenerator::new(&config.generation);
    let tables_a = generator.generate(document_a)?;
    let tables_b = generator.generate(document_b)?;

    let mut report = compare_table_sets(&tables_a, &tables_b, &config.comparison);
    let document = DocumentComparison::between(document_a, document_b);
    tracing::debug!(
        same_schema = document.same_schema,
        discrepancies = document.discrepancies.len(),
        "Node comparison complete"
    );
    report.document = Some(document);
    Ok(report)
}

/// Compare two generated table sets
pub fn compare_table_sets(tables_a: &TableSet, tables_b: &TableSet, config: &ComparisonConfig) -> ComparisonReport {
    let matching = TableMatcher::new().match_tables(&tables_a.table_names(), &tables_b.table_names());
    let detector = PrimaryKeyDetector::default();
    let comparer = DataComparer::new(config);

    let mut report = ComparisonReport {
        only_in_a: matching.only_in_a(),
        only_in_b: matching.only_in_b(),
        ..ComparisonReport::default()
    };

    for table in &report.only_in_a {
        report.warnings.push(Warning::UnmatchedTable {
            table: table.clone(),
            side: Side::A,
        });
    }
    for table in &report.only_in_b {
        report.warnings.push(Warning::UnmatchedTable {
            table: table.clone(),
            side: Side::B,
        });
    }

    for table_match in matching.paired() {
        let Some((name_a, name_b)) = table_match.pair() else {
            continue;
        };
        let (Some(table_a), Some(table_b)) = (tables_a.get(name_a), tables_b.get(name_b)) else {
            continue;
        };

        if table_match.is_ambiguous() {
            report.warnings.push(Warning::AmbiguousMatch {
                table: name_a.to_string(),
                chosen: name_b.to_string(),
                candidates: table_match.candidates.clone(),
            });
        }

        let primary_key = select_key(&detector, config, table_a, table_b);
        if primary_key.is_none() {
            tracing::warn!(table = name_a, "No primary key detected, comparing by content");
            report.warnings.push(Warning::NoKeyDetected {
                table: name_a.to_string(),
            });
        }

        let data = comparer.compare_with_candidate(table_a, table_b, &primary_key);
        if let (Some(key), Some(reason)) = (primary_key.column(), &data.fallback_reason) {
            report.warnings.push(Warning::KeyFallback {
                table: name_a.to_string(),
                key: key.to_string(),
                reason: reason.clone(),
            });
        }
        if data.truncated {
            report.warnings.push(Warning::RowLimitExceeded {
                table: name_a.to_string(),
                limit: config.row_diff_limit_per_table.unwrap_or_default(),
            });
        }

        report.tables.push(TableComparison {
            table_a: name_a.to_string(),
            table_b: name_b.to_string(),
            match_kind: table_match.kind,
            primary_key,
            drift: SchemaDrift::between(&table_a.spec, &table_b.spec),
            data,
        });
    }

    report.summary = ComparisonSummary {
        tables_matched: report.tables.len(),
        tables_only_in_a: report.only_in_a.len(),
        tables_only_in_b: report.only_in_b.len(),
        tables_with_differences: report.tables.iter().filter(|t| t.has_differences()).count(),
    };
    report.matches = matching.matches;

    tracing::info!(
        matched = report.summary.tables_matched,
        only_in_a = report.summary.tables_only_in_a,
        only_in_b = report.summary.tables_only_in_b,
        with_differences = report.summary.tables_with_differences,
        warnings = report.warnings.len(),
        "Comparison complete"
    );

    report
}

/// Override first, then detection on A, then detection on B
fn select_key(
    detector: &PrimaryKeyDetector,
    config: &ComparisonConfig,
    table_a: &GeneratedTable,
    table_b: &GeneratedTable,
) -> PrimaryKeyCandidate {
    let overridden = config.primary_key_override.iter().find(|(table, _)| {
        table.eq_ignore_ascii_case(table_a.name()) || table.eq_ignore_ascii_case(table_b.name())
    });
    if let Some((_, column)) = overridden {
        return PrimaryKeyCandidate::Column {
            column: column.clone(),
            rule: KeyRule::Override,
        };
    }

    match detector.detect(&table_a.spec, &table_a.rows) {
        PrimaryKeyCandidate::NoKey => detector.detect(&table_b.spec, &table_b.rows),
        found => found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_compare_documents_reports_unmatched_and_drift() {
        let a = json!({"name": "svc", "owners": ["ann"], "items": [{"id": 1, "qty": 2}]});
        let b = json!({"name": "svc", "items": [{"id": 1, "qty": 2.5, "color": "red"}], "labels": ["x"]});

        let report = compare_documents(&a, &b, &Config::default()).unwrap();

        assert_eq!(report.only_in_a, vec!["OWNERS"]);
        assert_eq!(report.only_in_b, vec!["LABELS"]);
        assert_eq!(report.summary.tables_matched, 2);

        let items = report.table("ITEMS").unwrap();
        assert_eq!(items.primary_key.column(), Some("id"));
        assert_eq!(items.drift.columns_only_in_b, vec!["color"]);
        assert_eq!(items.data.modified, 1);
        assert!(report.warnings.contains(&Warning::UnmatchedTable {
            table: "OWNERS".to_string(),
            side: Side::A,
        }));
    }

    #[test]
    fn test_override_key_takes_precedence() {
        let mut config = Config::default();
        config
            .comparison
            .primary_key_override
            .insert("root".to_string(), "sku".to_string());

        let a = json!([{"id": 1, "sku": "a", "n": 1}, {"id": 2, "sku": "b", "n": 1}]);
        let b = json!([{"id": 2, "sku": "a", "n": 1}, {"id": 1, "sku": "b", "n": 1}]);
        let report = compare_documents(&a, &b, &config).unwrap();

        let root = report.table("ROOT").unwrap();
        assert_eq!(root.primary_key.rule(), Some(KeyRule::Override));
        assert_eq!(root.data.modified, 2);
    }

    #[test]
    fn test_identical_documents_have_no_differences() {
        let doc = json!({"env": "prod", "servers": [{"host": "a"}, {"host": "b"}]});
        let report = compare_documents(&doc, &doc, &Config::default()).unwrap();

        assert!(!report.has_differences());
        assert_eq!(report.summary.tables_with_differences, 0);
        let document = report.document.unwrap();
        assert!(document.same_schema);
        assert!(document.discrepancies.is_empty());
    }

    #[test]
    fn test_table_set_reports_have_no_node_view() {
        let config = Config::default();
        let tables = TableGenerator::new(&config.generation)
            .generate(&json!({"env": "prod"}))
            .unwrap();
        let report = compare_table_sets(&tables, &tables, &config.comparison);

        assert!(report.document.is_none());
        assert!(serde_json::to_value(&report).unwrap().get("document").is_none());
    }
}
