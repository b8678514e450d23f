//! Type definitions for generated tables

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Cheap gate before handing a string to chrono
static DATE_PREFIX_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("valid date prefix pattern")
});

/// Semantic column type inferred from observed values
///
/// The variants form a join lattice: `Integer` widens to `Float`, and any
/// other disagreement widens to `Text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Integer,
    Float,
    Boolean,
    Text,
    Timestamp,
    Json,
}

impl SemanticType {
    /// Semantic type of one value; `None` for null
    pub fn of_value(value: &Value) -> Option<SemanticType> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(SemanticType::Boolean),
            Value::Number(n) => {
                if n.is_f64() {
                    Some(SemanticType::Float)
                } else {
                    Some(SemanticType::Integer)
                }
            }
            Value::String(s) => {
                if looks_like_timestamp(s) {
                    Some(SemanticType::Timestamp)
                } else {
                    Some(SemanticType::Text)
                }
            }
            Value::Array(_) | Value::Object(_) => Some(SemanticType::Json),
        }
    }

    /// Least type able to hold values of both `self` and `other`
    pub fn widen(self, other: SemanticType) -> SemanticType {
        use SemanticType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Integer, Float) | (Float, Integer) => Float,
            _ => Text,
        }
    }

    /// Widen an optional observation into an optional accumulated type
    pub fn join(acc: Option<SemanticType>, observed: Option<SemanticType>) -> Option<SemanticType> {
        match (acc, observed) {
            (None, x) | (x, None) => x,
            (Some(a), Some(b)) => Some(a.widen(b)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Integer => "integer",
            SemanticType::Float => "float",
            SemanticType::Boolean => "boolean",
            SemanticType::Text => "text",
            SemanticType::Timestamp => "timestamp",
            SemanticType::Json => "json",
        }
    }
}

/// Whether a string reads as an ISO date or date-time
pub fn looks_like_timestamp(s: &str) -> bool {
    if !DATE_PREFIX_REGEX.is_match(s) {
        return false;
    }

    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_ok()
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// What a column holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    /// Content taken from the document
    Data,
    SurrogateKey,
    ForeignKey,
    RowIndex,
}

/// Represents a generated column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    /// `None` until a non-null value has been observed
    pub semantic_type: Option<SemanticType>,
    pub nullable: bool,
    pub role: ColumnRole,
}

impl ColumnSpec {
    /// Create a data column that has not observed any value yet
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            semantic_type: None,
            nullable: false,
            role: ColumnRole::Data,
        }
    }

    /// Create a non-nullable integer column for generated keys and positions
    pub fn synthetic(name: &str, role: ColumnRole) -> Self {
        Self {
            name: name.to_string(),
            semantic_type: Some(SemanticType::Integer),
            nullable: false,
            role,
        }
    }

    /// Set whether the column is nullable
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Record one observed type; `None` records a null
    pub fn observe(&mut self, observed: Option<SemanticType>) {
        if observed.is_none() {
            self.nullable = true;
        }
        self.semantic_type = SemanticType::join(self.semantic_type, observed);
    }

    /// Final type used for DDL; all-null columns become text
    pub fn resolved_type(&self) -> SemanticType {
        self.semantic_type.unwrap_or(SemanticType::Text)
    }

    pub fn is_synthetic(&self) -> bool {
        self.role != ColumnRole::Data
    }
}

/// Represents a generated table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    /// Dotted path of the document node the table was built from
    pub source_path: String,
    pub columns: Vec<ColumnSpec>,
    pub surrogate_key: String,
    /// Column referencing the parent's surrogate key; `None` only for the root
    pub foreign_key: Option<String>,
    pub parent: Option<String>,
    /// Column recording the element position; `None` for one-row root tables
    pub row_index: Option<String>,
}

impl TableSpec {
    /// Create a table holding only its surrogate key column
    pub fn new(name: &str, source_path: &str, surrogate_key: &str) -> Self {
        Self {
            name: name.to_string(),
            source_path: source_path.to_string(),
            columns: vec![ColumnSpec::synthetic(surrogate_key, ColumnRole::SurrogateKey)],
            surrogate_key: surrogate_key.to_string(),
            foreign_key: None,
            parent: None,
            row_index: None,
        }
    }

    /// Attach the foreign key column pointing at `parent`
    pub fn with_parent(mut self, parent: &str, foreign_key: &str) -> Self {
        self.columns
            .push(ColumnSpec::synthetic(foreign_key, ColumnRole::ForeignKey));
        self.foreign_key = Some(foreign_key.to_string());
        self.parent = Some(parent.to_string());
        self
    }

    /// Attach the row index column
    pub fn with_row_index(mut self, row_index: &str) -> Self {
        self.columns
            .push(ColumnSpec::synthetic(row_index, ColumnRole::RowIndex));
        self.row_index = Some(row_index.to_string());
        self
    }

    /// Add a column to the table
    pub fn add_column(&mut self, column: ColumnSpec) {
        self.columns.push(column);
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut ColumnSpec> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Columns carrying document content, in table order
    pub fn data_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(|c| !c.is_synthetic())
    }

    pub fn data_column_names(&self) -> Vec<String> {
        self.data_columns().map(|c| c.name.clone()).collect()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// One generated row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Surrogate key, sequential per table starting at 1
    pub key: u64,
    /// Data, foreign key and row index values by column name
    pub values: IndexMap<String, Value>,
}

impl Row {
    pub fn new(key: u64) -> Self {
        Self {
            key,
            values: IndexMap::new(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn set(&mut self, column: &str, value: Value) {
        self.values.insert(column.to_string(), value);
    }
}

/// Parent/child link between two generated tables
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relationship {
    pub parent: String,
    pub child: String,
    pub foreign_key: String,
}

/// A table specification together with its rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedTable {
    pub spec: TableSpec,
    pub rows: Vec<Row>,
}

impl GeneratedTable {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Result of one generation run: tables in creation order and their links
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableSet {
    pub tables: Vec<GeneratedTable>,
    pub relationships: Vec<Relationship>,
}

impl TableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn get(&self, name: &str) -> Option<&GeneratedTable> {
        self.tables.iter().find(|t| t.spec.name == name)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.spec.name.clone()).collect()
    }

    pub fn specs(&self) -> impl Iterator<Item = &TableSpec> {
        self.tables.iter().map(|t| &t.spec)
    }

    /// Ordered `(TableSpec, rows)` pairs for a persistence layer
    pub fn into_pairs(self) -> Vec<(TableSpec, Vec<Row>)> {
        self.tables.into_iter().map(|t| (t.spec, t.rows)).collect()
    }
}
