//! Table matching across two generated schemas

use serde::Serialize;
use std::collections::BTreeSet;

use crate::utils::naming::singular_forms;

/// How a pair of tables was matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    CaseInsensitive,
    PluralTolerant,
    Unmatched,
}

/// Pairing (or non-pairing) of one table name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableMatch {
    pub table_a: Option<String>,
    pub table_b: Option<String>,
    pub kind: MatchKind,
    /// Equally ranked candidates when more than one fit; the first was chosen
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<String>,
}

impl TableMatch {
    pub fn is_ambiguous(&self) -> bool {
        self.candidates.len() > 1
    }

    /// Both names when the tables were paired
    pub fn pair(&self) -> Option<(&str, &str)> {
        match (&self.table_a, &self.table_b) {
            (Some(a), Some(b)) => Some((a.as_str(), b.as_str())),
            _ => None,
        }
    }
}

/// Result of matching two name sets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    /// Paired tables first in left-name order, then A-only, then B-only
    pub matches: Vec<TableMatch>,
}

impl MatchResult {
    pub fn paired(&self) -> impl Iterator<Item = &TableMatch> {
        self.matches.iter().filter(|m| m.kind != MatchKind::Unmatched)
    }

    pub fn only_in_a(&self) -> Vec<String> {
        self.matches
            .iter()
            .filter(|m| m.kind == MatchKind::Unmatched)
            .filter_map(|m| m.table_a.clone())
            .collect()
    }

    pub fn only_in_b(&self) -> Vec<String> {
        self.matches
            .iter()
            .filter(|m| m.kind == MatchKind::Unmatched)
            .filter_map(|m| m.table_b.clone())
            .collect()
    }
}

/// Pairs table names from schema A with schema B
#[derive(Debug, Clone, Default)]
pub struct TableMatcher;

impl TableMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Match two name sets
    ///
    /// Passes run from strictest to loosest; each name is paired at most once.
    pub fn match_tables<S: AsRef<str>>(&self, names_a: &[S], names_b: &[S]) -> MatchResult {
        let mut left: BTreeSet<String> = names_a.iter().map(|s| s.as_ref().to_string()).collect();
        let mut right: BTreeSet<String> = names_b.iter().map(|s| s.as_ref().to_string()).collect();
        let mut paired: Vec<TableMatch> = Vec::new();

        let passes: [(MatchKind, fn(&str, &str) -> bool); 3] = [
            (MatchKind::Exact, |a, b| a == b),
            (MatchKind::CaseInsensitive, |a, b| a.to_lowercase() == b.to_lowercase()),
            (MatchKind::PluralTolerant, plural_tolerant_eq),
        ];

        for (kind, matches) in passes {
            let pending: Vec<String> = left.iter().cloned().collect();
            for name_a in pending {
                // BTreeSet iteration keeps candidates sorted
                let candidates: Vec<String> = right
                    .iter()
                    .filter(|name_b| matches(&name_a, name_b))
                    .cloned()
                    .collect();

                let Some(chosen) = candidates.first().cloned() else {
                    continue;
                };
                if candidates.len() > 1 {
                    tracing::warn!(
                        table = %name_a,
                        chosen = %chosen,
                        candidates = ?candidates,
                        "Ambiguous table match"
                    );
                }

                left.remove(&name_a);
                right.remove(&chosen);
                paired.push(TableMatch {
                    table_a: Some(name_a),
                    table_b: Some(chosen),
                    kind,
                    candidates: if candidates.len() > 1 { candidates } else { Vec::new() },
                });
            }
        }

        paired.sort_by(|x, y| x.table_a.cmp(&y.table_a));

        let mut matches = paired;
        matches.extend(left.into_iter().map(|name| TableMatch {
            table_a: Some(name),
            table_b: None,
            kind: MatchKind::Unmatched,
            candidates: Vec::new(),
        }));
        matches.extend(right.into_iter().map(|name| TableMatch {
            table_a: None,
            table_b: Some(name),
            kind: MatchKind::Unmatched,
            candidates: Vec::new(),
        }));

        MatchResult { matches }
    }
}

/// Names equal once a plural ending is dropped from either side
fn plural_tolerant_eq(a: &str, b: &str) -> bool {
    let forms_b = singular_forms(b);
    singular_forms(a).iter().any(|f| forms_b.contains(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pair(a: &str, b: &str, kind: MatchKind) -> TableMatch {
        TableMatch {
            table_a: Some(a.to_string()),
            table_b: Some(b.to_string()),
            kind,
            candidates: Vec::new(),
        }
    }

    #[test]
    fn test_match_passes_in_order() {
        let result = TableMatcher::new().match_tables(
            &["ITEMS", "Tags", "BOXES", "CATEGORIES", "ORPHAN"],
            &["ITEMS", "TAGS", "BOX", "category", "NEWCOMER"],
        );

        assert_eq!(
            result.paired().cloned().collect::<Vec<_>>(),
            vec![
                pair("BOXES", "BOX", MatchKind::PluralTolerant),
                pair("CATEGORIES", "category", MatchKind::PluralTolerant),
                pair("ITEMS", "ITEMS", MatchKind::Exact),
                pair("Tags", "TAGS", MatchKind::CaseInsensitive),
            ]
        );
        assert_eq!(result.only_in_a(), vec!["ORPHAN"]);
        assert_eq!(result.only_in_b(), vec!["NEWCOMER"]);
    }

    #[test]
    fn test_exact_match_wins_over_fuzzy() {
        let result = TableMatcher::new().match_tables(&["TAG", "TAGS"], &["TAGS"]);

        let paired: Vec<_> = result.paired().cloned().collect();
        assert_eq!(paired, vec![pair("TAGS", "TAGS", MatchKind::Exact)]);
        assert_eq!(result.only_in_a(), vec!["TAG"]);
    }

    #[test]
    fn test_ties_pick_smallest_and_flag() {
        let result = TableMatcher::new().match_tables(&["ITEM"], &["ITEMS", "ITEMES"]);
        let chosen = result.paired().next().unwrap();

        assert_eq!(chosen.pair(), Some(("ITEM", "ITEMES")));
        assert!(chosen.is_ambiguous());
        assert_eq!(chosen.candidates, vec!["ITEMES", "ITEMS"]);
        assert!(result.only_in_b().contains(&"ITEMS".to_string()));
    }
}
