//! Node-level comparison of two decoded documents
//!
//! Walks both trees in step and lists every node present on one side only
//! and every leaf whose value differs. Also computes a structural signature
//! used to check that two documents share the same shape.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::compare::values::values_equal;
use crate::error::{Error, Result};

/// A node present on only one side
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingNode {
    pub path: String,
    pub node: Value,
}

/// A leaf whose value differs between the two sides
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueDifference {
    pub path: String,
    pub left: Value,
    pub right: Value,
    pub left_type: &'static str,
    pub right_type: &'static str,
}

/// Every node-level discrepancy between two documents
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeDiscrepancies {
    /// Nodes only in the right document
    pub missing_in_left: Vec<MissingNode>,
    /// Nodes only in the left document
    pub missing_in_right: Vec<MissingNode>,
    pub different_values: Vec<ValueDifference>,
}

impl NodeDiscrepancies {
    pub fn is_empty(&self) -> bool {
        self.missing_in_left.is_empty() && self.missing_in_right.is_empty() && self.different_values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.missing_in_left.len() + self.missing_in_right.len() + self.different_values.len()
    }
}

/// Structural shape of a value, ignoring its leaf values
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchemaSignature {
    Object { keys: BTreeMap<String, SchemaSignature> },
    Array { items: BTreeSet<SchemaSignature> },
    Scalar { name: &'static str },
}

/// Node-level view of a document comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentComparison {
    pub same_schema: bool,
    pub discrepancies: NodeDiscrepancies,
}

impl DocumentComparison {
    pub fn between(left: &Value, right: &Value) -> Self {
        Self {
            same_schema: schema_signature(left) == schema_signature(right),
            discrepancies: collect_discrepancies(left, right),
        }
    }
}

/// JSON type name of a value
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// List every node-level discrepancy between two documents
///
/// Object keys are visited in sorted order. Arrays are compared index by
/// index. Paths read `$`, `$.a.b[0]`.
pub fn collect_discrepancies(left: &Value, right: &Value) -> NodeDiscrepancies {
    let mut found = NodeDiscrepancies::default();
    walk(left, right, &mut Vec::new(), &mut found);
    found
}

enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

fn render_path(segments: &[Segment<'_>]) -> String {
    let mut path = String::from("$");
    for segment in segments {
        match segment {
            Segment::Key(key) => {
                path.push('.');
                path.push_str(key);
            }
            Segment::Index(index) => path.push_str(&format!("[{}]", index)),
        }
    }
    path
}

// Nesting is bounded by the decoders' recursion limit
fn walk<'a>(left: &'a Value, right: &'a Value, path: &mut Vec<Segment<'a>>, found: &mut NodeDiscrepancies) {
    match (left, right) {
        (Value::Object(l), Value::Object(r)) => {
            let keys: BTreeSet<&String> = l.keys().chain(r.keys()).collect();
            for key in keys {
                path.push(Segment::Key(key));
                match (l.get(key), r.get(key)) {
                    (Some(lv), Some(rv)) => walk(lv, rv, path, found),
                    (Some(lv), None) => found.missing_in_right.push(MissingNode {
                        path: render_path(path),
                        node: lv.clone(),
                    }),
                    (None, Some(rv)) => found.missing_in_left.push(MissingNode {
                        path: render_path(path),
                        node: rv.clone(),
                    }),
                    (None, None) => {}
                }
                path.pop();
            }
        }
        (Value::Array(l), Value::Array(r)) => {
            for index in 0..l.len().max(r.len()) {
                path.push(Segment::Index(index));
                match (l.get(index), r.get(index)) {
                    (Some(lv), Some(rv)) => walk(lv, rv, path, found),
                    (Some(lv), None) => found.missing_in_right.push(MissingNode {
                        path: render_path(path),
                        node: lv.clone(),
                    }),
                    (None, Some(rv)) => found.missing_in_left.push(MissingNode {
                        path: render_path(path),
                        node: rv.clone(),
                    }),
                    (None, None) => {}
                }
                path.pop();
            }
        }
        _ => {
            if !values_equal(left, right) {
                found.different_values.push(ValueDifference {
                    path: render_path(path),
                    left: left.clone(),
                    right: right.clone(),
                    left_type: type_name(left),
                    right_type: type_name(right),
                });
            }
        }
    }
}

/// Shape of a value: object keys, distinct array item shapes, scalar types
pub fn schema_signature(value: &Value) -> SchemaSignature {
    match value {
        Value::Object(map) => SchemaSignature::Object {
            keys: map.iter().map(|(k, v)| (k.clone(), schema_signature(v))).collect(),
        },
        Value::Array(items) => SchemaSignature::Array {
            items: items.iter().map(schema_signature).collect(),
        },
        scalar => SchemaSignature::Scalar {
            name: type_name(scalar),
        },
    }
}

/// Fail with a `StructureError` unless both documents share one shape
pub fn ensure_same_schema(left: &Value, right: &Value) -> Result<()> {
    if schema_signature(left) == schema_signature(right) {
        return Ok(());
    }
    let mismatched: Vec<String> = collect_discrepancies(left, right)
        .different_values
        .into_iter()
        .filter(|d| d.left_type != d.right_type)
        .map(|d| format!("{} ({} vs {})", d.path, d.left_type, d.right_type))
        .collect();
    Err(Error::StructureError(if mismatched.is_empty() {
        "Documents have different structures".to_string()
    } else {
        format!("Documents have different structures: {}", mismatched.join(", "))
    }))
}
