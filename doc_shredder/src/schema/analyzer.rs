//! Document structure analyzer
//!
//! Classifies every node of a decoded document and collects the arrays that
//! will become tables. The walk uses an explicit stack, so nesting depth is
//! bounded only by `max_nesting`.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Error, Result};
use crate::utils::naming::table_name_for_field;

/// Classification of one document node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    Scalar,
    Mapping,
    ArrayOfScalars,
    ArrayOfMappings,
    /// Mixed element kinds, nested arrays, or mappings sharing no key
    MixedArray,
}

impl NodeKind {
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            NodeKind::ArrayOfScalars | NodeKind::ArrayOfMappings | NodeKind::MixedArray
        )
    }

    /// Combined kind of two instances of the same array location
    fn merge(self, other: NodeKind) -> NodeKind {
        if self == other {
            self
        } else {
            NodeKind::MixedArray
        }
    }
}

/// One step of a node path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// Ordered field/index segments from the document root
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct NodePath(pub Vec<PathSegment>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child_field(&self, field: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Field(field.to_string()));
        Self(segments)
    }

    pub fn child_index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    /// Path with element indices erased, shared by every instance of an array location
    pub fn location(&self) -> String {
        let mut out = String::new();
        for segment in &self.0 {
            match segment {
                PathSegment::Field(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(name);
                }
                PathSegment::Index(_) => out.push_str("[]"),
            }
        }
        out
    }

    /// Field names only, joined with `_`
    fn field_names(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter_map(|s| match s {
                PathSegment::Field(name) => Some(name.as_str()),
                PathSegment::Index(_) => None,
            })
            .collect()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.0 {
            match segment {
                PathSegment::Field(name) => {
                    if !first {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                PathSegment::Index(i) => write!(f, "[{}]", i)?,
            }
            first = false;
        }
        Ok(())
    }
}

/// A classified document node
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub path: NodePath,
    pub depth: usize,
    pub kind: NodeKind,
    /// Element count for arrays
    pub length: Option<usize>,
}

/// A document location whose arrays will become one table
#[derive(Debug, Clone, Serialize)]
pub struct TableCandidate {
    /// Index-free location, e.g. `items[].tags`
    pub path: String,
    pub table_name: String,
    /// Kind over all instances together; instances of different kinds give `MixedArray`
    pub kind: NodeKind,
    /// Distinct kinds of the individual instances, in first-seen order
    ///
    /// The generator stores each instance by its own kind, so a `MixedArray`
    /// location may still yield record columns for some rows and a `value`
    /// column for others.
    pub instance_kinds: Vec<NodeKind>,
    /// Elements summed over every instance of the location
    pub row_count: usize,
    pub columns: Vec<String>,
    pub required_columns: Vec<String>,
    pub optional_columns: Vec<String>,
    /// Every mapping element had the same key set
    pub is_homogeneous: bool,
}

/// Output of one analyzer run
#[derive(Debug, Clone, Serialize)]
pub struct StructureAnalysis {
    pub nodes: Vec<Node>,
    pub candidates: Vec<TableCandidate>,
}

impl StructureAnalysis {
    pub fn arrays(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.kind.is_array())
    }

    pub fn total_arrays(&self) -> usize {
        self.arrays().count()
    }

    /// Arrays with at least one element; each one backs a generated table
    pub fn table_candidates(&self) -> &[TableCandidate] {
        &self.candidates
    }

    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }
}

/// Per-location accumulator for candidates
struct CandidateBuilder {
    kind: NodeKind,
    instance_kinds: IndexSet<NodeKind>,
    row_count: usize,
    all_keys: IndexSet<String>,
    common_keys: Option<BTreeSet<String>>,
    key_sets: BTreeSet<Vec<String>>,
}

impl CandidateBuilder {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            instance_kinds: IndexSet::new(),
            row_count: 0,
            all_keys: IndexSet::new(),
            common_keys: None,
            key_sets: BTreeSet::new(),
        }
    }

    fn add_instance(&mut self, kind: NodeKind, items: &[Value]) {
        self.kind = self.kind.merge(kind);
        self.instance_kinds.insert(kind);
        self.row_count += items.len();

        for item in items {
            if let Value::Object(map) = item {
                let keys: BTreeSet<String> = map.keys().cloned().collect();
                self.all_keys.extend(map.keys().cloned());
                self.common_keys = Some(match self.common_keys.take() {
                    None => keys.clone(),
                    Some(common) => common.intersection(&keys).cloned().collect(),
                });
                self.key_sets.insert(keys.into_iter().collect());
            }
        }
    }

    fn build(self, path: String, table_name: String) -> TableCandidate {
        let common = self.common_keys.unwrap_or_default();
        let columns: Vec<String> = self.all_keys.into_iter().collect();
        let required_columns: Vec<String> =
            columns.iter().filter(|c| common.contains(*c)).cloned().collect();
        let optional_columns: Vec<String> =
            columns.iter().filter(|c| !common.contains(*c)).cloned().collect();

        TableCandidate {
            path,
            table_name,
            kind: self.kind,
            instance_kinds: self.instance_kinds.into_iter().collect(),
            row_count: self.row_count,
            columns,
            required_columns,
            optional_columns,
            is_homogeneous: self.key_sets.len() <= 1,
        }
    }
}

/// Structure analyzer for decoded documents
#[derive(Debug, Clone)]
pub struct StructureAnalyzer {
    max_nesting: usize,
}

impl Default for StructureAnalyzer {
    fn default() -> Self {
        Self { max_nesting: 10_000 }
    }
}

impl StructureAnalyzer {
    /// Create an analyzer rejecting documents nested deeper than `max_nesting`
    pub fn new(max_nesting: usize) -> Self {
        Self { max_nesting }
    }

    /// Classify a single value without looking below its direct children
    pub fn classify(value: &Value) -> NodeKind {
        match value {
            Value::Object(_) => NodeKind::Mapping,
            Value::Array(items) => Self::classify_array(items),
            _ => NodeKind::Scalar,
        }
    }

    /// Classify an array by its elements
    ///
    /// Empty arrays count as arrays of scalars. Null elements count as scalars.
    pub fn classify_array(items: &[Value]) -> NodeKind {
        if items.iter().all(|v| !v.is_array() && !v.is_object()) {
            return NodeKind::ArrayOfScalars;
        }

        let maps: Vec<&Map<String, Value>> = items.iter().filter_map(Value::as_object).collect();
        if maps.len() != items.len() {
            return NodeKind::MixedArray;
        }

        if Self::has_heterogeneous_shapes(&maps) {
            NodeKind::MixedArray
        } else {
            NodeKind::ArrayOfMappings
        }
    }

    /// Non-empty mappings with at least two distinct key sets and no shared key
    fn has_heterogeneous_shapes(maps: &[&Map<String, Value>]) -> bool {
        let key_sets: BTreeSet<BTreeSet<&str>> = maps
            .iter()
            .filter(|m| !m.is_empty())
            .map(|m| m.keys().map(String::as_str).collect())
            .collect();

        if key_sets.len() < 2 {
            return false;
        }

        let mut sets = key_sets.iter();
        let mut common: BTreeSet<&str> = sets.next().cloned().unwrap_or_default();
        for set in sets {
            common = common.intersection(set).copied().collect();
        }
        common.is_empty()
    }

    /// Analyze a document
    pub fn analyze(&self, document: &Value) -> Result<StructureAnalysis> {
        let mut nodes = Vec::new();
        let mut candidates: IndexMap<String, (CandidateBuilder, String)> = IndexMap::new();
        // The flag marks nodes below a mixed array, which are stored as JSON text
        let mut stack: Vec<(&Value, NodePath, usize, bool)> =
            vec![(document, NodePath::root(), 0, false)];

        while let Some((value, path, depth, opaque)) = stack.pop() {
            if depth > self.max_nesting {
                return Err(Error::StructureError(format!(
                    "document nesting exceeds {} levels at '{}'",
                    self.max_nesting, path
                )));
            }

            let kind = Self::classify(value);
            let length = value.as_array().map(Vec::len);

            match value {
                Value::Object(map) => {
                    // Reverse push keeps document order on pop
                    for (key, child) in map.iter().rev() {
                        stack.push((child, path.child_field(key), depth + 1, opaque));
                    }
                }
                Value::Array(items) => {
                    if !items.is_empty() && !opaque {
                        let location = path.location();
                        let fields = path.field_names();
                        let suggested = if fields.is_empty() {
                            "ROOT".to_string()
                        } else {
                            table_name_for_field(&fields.join("_"))
                        };
                        candidates
                            .entry(location)
                            .or_insert_with(|| (CandidateBuilder::new(kind), suggested))
                            .0
                            .add_instance(kind, items);
                    }
                    let opaque = opaque || kind == NodeKind::MixedArray;
                    for (index, child) in items.iter().enumerate().rev() {
                        stack.push((child, path.child_index(index), depth + 1, opaque));
                    }
                }
                _ => {}
            }

            nodes.push(Node {
                path,
                depth,
                kind,
                length,
            });
        }

        let candidates: Vec<TableCandidate> = candidates
            .into_iter()
            .map(|(location, (builder, name))| builder.build(location, name))
            .collect();

        tracing::debug!(
            nodes = nodes.len(),
            candidates = candidates.len(),
            "Structure analysis complete"
        );

        Ok(StructureAnalysis { nodes, candidates })
    }
}
