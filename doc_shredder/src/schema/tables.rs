//! Table generator
//!
//! Flattens a decoded document into tables, rows and a parent/child
//! relationship graph. The walk is driven by an arena of frames consumed with
//! an index cursor; mapping flattening inside one frame uses a local stack.
//! Neither path recurses natively, so deeply nested input cannot exhaust the
//! call stack.

use serde_json::{map, Map, Value};
use std::collections::{HashMap, HashSet};

use crate::config::GenerationConfig;
use crate::error::{Error, Result};
use crate::schema::analyzer::{NodeKind, StructureAnalyzer};
use crate::schema::dedup::deduplicate;
use crate::schema::types::{
    ColumnSpec, GeneratedTable, Relationship, Row, SemanticType, TableSet, TableSpec,
};
use crate::utils::naming::{
    generate_unique_name_ignoring_case, sanitize_identifier, surrogate_key_name,
    table_name_for_field,
};

/// Column holding scalar array elements and scalar roots
pub const VALUE_COLUMN: &str = "value";

/// Column holding the original element position
pub const ROW_INDEX_COLUMN: &str = "row_index";

/// Source of a column within its table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum FieldKey {
    /// Raw key segments below the row's mapping
    Path(Vec<String>),
    /// Scalar element or scalar root
    Value,
}

impl FieldKey {
    fn from_path(path: &[&str]) -> Self {
        FieldKey::Path(path.iter().map(|s| s.to_string()).collect())
    }
}

/// Remaining mapping levels that may still be flattened; `None` is unlimited
type Budget = Option<usize>;

fn can_flatten(budget: Budget) -> bool {
    budget.map_or(true, |n| n > 0)
}

fn spend(budget: Budget) -> Budget {
    budget.map(|n| n.saturating_sub(1))
}

/// Unit of pending work
enum Frame<'a> {
    /// Fill an existing row from a mapping
    Record {
        table: usize,
        row: usize,
        map: &'a Map<String, Value>,
        depth: usize,
    },
    /// Turn array elements into rows of `table`
    Elements {
        table: usize,
        parent_key: Option<u64>,
        items: &'a [Value],
        depth: usize,
    },
}

/// One open mapping while flattening a record
struct Level<'a> {
    path: Vec<&'a str>,
    budget: Budget,
    /// False below a mapping already stored as JSON; only arrays are collected there
    columns: bool,
    entries: map::Iter<'a>,
    depth: usize,
}

/// Per-table registry entry owned by one run
struct TableState {
    spec: TableSpec,
    rows: Vec<Row>,
    next_key: u64,
    columns_by_field: HashMap<FieldKey, String>,
    children: HashMap<Vec<String>, usize>,
}

/// Registries scoped to a single generation run
struct GenerationContext<'c> {
    config: &'c GenerationConfig,
    tables: Vec<TableState>,
    relationships: Vec<Relationship>,
    taken_names: HashSet<String>,
}

impl<'c> GenerationContext<'c> {
    fn new(config: &'c GenerationConfig) -> Self {
        Self {
            config,
            tables: Vec::new(),
            relationships: Vec::new(),
            taken_names: HashSet::new(),
        }
    }

    fn check_depth(&self, depth: usize, path: &str) -> Result<()> {
        if depth > self.config.max_nesting {
            return Err(Error::StructureError(format!(
                "document nesting exceeds {} levels at '{}'",
                self.config.max_nesting, path
            )));
        }
        Ok(())
    }

    /// Reserve a table name, unique without regard to case
    fn reserve_name(&mut self, base: &str) -> Result<String> {
        let (name, lower) = generate_unique_name_ignoring_case(base, &self.taken_names)?;
        self.taken_names.insert(lower);
        Ok(name)
    }

    fn create_table(
        &mut self,
        base_name: &str,
        source_path: &str,
        parent: Option<usize>,
        with_row_index: bool,
    ) -> Result<usize> {
        let name = self.reserve_name(base_name)?;
        let mut spec = TableSpec::new(&name, source_path, &surrogate_key_name(&name));

        if let Some(parent) = parent {
            let parent_spec = &self.tables[parent].spec;
            let foreign_key = parent_spec.surrogate_key.clone();
            self.relationships.push(Relationship {
                parent: parent_spec.name.clone(),
                child: name.clone(),
                foreign_key: foreign_key.clone(),
            });
            spec = spec.with_parent(&parent_spec.name, &foreign_key);
        }
        if with_row_index {
            spec = spec.with_row_index(ROW_INDEX_COLUMN);
        }

        tracing::debug!(table = %name, source = source_path, "Created table");

        self.tables.push(TableState {
            spec,
            rows: Vec::new(),
            next_key: 1,
            columns_by_field: HashMap::new(),
            children: HashMap::new(),
        });
        Ok(self.tables.len() - 1)
    }

    /// Child table for an array field, shared by every row of `parent`
    fn child_table(&mut self, parent: usize, path: &[&str]) -> Result<usize> {
        let field_key: Vec<String> = path.iter().map(|s| s.to_string()).collect();
        if let Some(&existing) = self.tables[parent].children.get(&field_key) {
            return Ok(existing);
        }

        let parent_spec = &self.tables[parent].spec;
        let mut source_path = parent_spec.source_path.clone();
        if parent_spec.row_index.is_some() {
            source_path.push_str("[]");
        }
        if !source_path.is_empty() {
            source_path.push('.');
        }
        source_path.push_str(&path.join("."));

        let base_name = table_name_for_field(&path.join(self.config.name_separator.as_str()));
        let child = self.create_table(&base_name, &source_path, Some(parent), true)?;
        self.tables[parent].children.insert(field_key, child);
        Ok(child)
    }

    /// Append a row, filling the foreign key and row index
    fn push_row(&mut self, table: usize, parent_key: Option<u64>, index: Option<usize>) -> (usize, u64) {
        let state = &mut self.tables[table];
        let key = state.next_key;
        state.next_key += 1;

        let mut row = Row::new(key);
        if let (Some(fk), Some(parent_key)) = (&state.spec.foreign_key, parent_key) {
            row.set(fk, Value::from(parent_key));
        }
        if let (Some(column), Some(index)) = (&state.spec.row_index, index) {
            row.set(column, Value::from(index as u64));
        }

        state.rows.push(row);
        (state.rows.len() - 1, key)
    }

    /// Column for a field, created on first sight
    ///
    /// Column names are unique without regard to case, since MySQL and SQLite
    /// fold identifier case.
    fn column_for(&mut self, table: usize, field_key: &FieldKey, field_name: &str) -> Result<String> {
        let state = &mut self.tables[table];
        if let Some(name) = state.columns_by_field.get(field_key) {
            return Ok(name.clone());
        }

        let taken: HashSet<String> = state
            .spec
            .columns
            .iter()
            .map(|c| c.name.to_lowercase())
            .collect();
        let (name, _) = generate_unique_name_ignoring_case(field_name, &taken)?;
        state.spec.add_column(ColumnSpec::new(&name));
        state.columns_by_field.insert(field_key.clone(), name.clone());
        Ok(name)
    }

    fn set_value(
        &mut self,
        table: usize,
        row: usize,
        field_key: &FieldKey,
        field_name: &str,
        value: Value,
        observed: Option<SemanticType>,
    ) -> Result<()> {
        let column = self.column_for(table, field_key, field_name)?;
        let state = &mut self.tables[table];
        if let Some(spec) = state.spec.column_mut(&column) {
            spec.observe(observed);
        }
        state.rows[row].set(&column, value);
        Ok(())
    }

    fn set_scalar(&mut self, table: usize, row: usize, field_key: &FieldKey, field_name: &str, value: &Value) -> Result<()> {
        self.set_value(table, row, field_key, field_name, value.clone(), SemanticType::of_value(value))
    }

    fn set_json(&mut self, table: usize, row: usize, field_key: &FieldKey, field_name: &str, value: &Value) -> Result<()> {
        let text = serde_json::to_string(value)?;
        self.set_value(
            table,
            row,
            field_key,
            field_name,
            Value::String(text),
            Some(SemanticType::Json),
        )
    }

    /// Flatten one mapping into `row`, queueing child arrays
    fn fill_record<'a>(
        &mut self,
        frames: &mut Vec<Frame<'a>>,
        table: usize,
        row: usize,
        record: &'a Map<String, Value>,
        depth: usize,
    ) -> Result<()> {
        let row_key = self.tables[table].rows[row].key;
        let mut stack = vec![Level {
            path: Vec::new(),
            budget: self.config.max_depth,
            columns: true,
            entries: record.iter(),
            depth,
        }];

        while let Some(level) = stack.last_mut() {
            let Some((key, value)) = level.entries.next() else {
                stack.pop();
                continue;
            };

            let mut path = level.path.clone();
            path.push(key.as_str());
            let (budget, columns, depth) = (level.budget, level.columns, level.depth + 1);
            let field_key = FieldKey::from_path(&path);
            let field_name = path.join(self.config.name_separator.as_str());

            match value {
                Value::Object(inner) => {
                    self.check_depth(depth, &field_name)?;
                    let flatten = columns && can_flatten(budget);
                    if columns && !flatten {
                        self.set_json(table, row, &field_key, &field_name, value)?;
                    }
                    stack.push(Level {
                        path,
                        budget: spend(budget),
                        columns: flatten,
                        entries: inner.iter(),
                        depth,
                    });
                }
                Value::Array(items) => {
                    if items.is_empty() {
                        continue;
                    }
                    self.check_depth(depth, &field_name)?;
                    let child = self.child_table(table, &path)?;
                    frames.push(Frame::Elements {
                        table: child,
                        parent_key: Some(row_key),
                        items,
                        depth,
                    });
                }
                scalar => {
                    if columns {
                        self.set_scalar(table, row, &field_key, &field_name, scalar)?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Turn each element into a row of `table`
    fn fill_elements<'a>(
        &mut self,
        frames: &mut Vec<Frame<'a>>,
        table: usize,
        parent_key: Option<u64>,
        items: &'a [Value],
        depth: usize,
    ) -> Result<()> {
        let kind = StructureAnalyzer::classify_array(items);

        for (index, item) in items.iter().enumerate() {
            let (row, _) = self.push_row(table, parent_key, Some(index));
            match (kind, item) {
                (NodeKind::ArrayOfMappings, Value::Object(record)) => {
                    frames.push(Frame::Record {
                        table,
                        row,
                        map: record,
                        depth: depth + 1,
                    });
                }
                (NodeKind::ArrayOfScalars, scalar) => {
                    self.set_scalar(table, row, &FieldKey::Value, VALUE_COLUMN, scalar)?;
                }
                (_, opaque) => {
                    self.set_json(table, row, &FieldKey::Value, VALUE_COLUMN, opaque)?;
                }
            }
        }

        Ok(())
    }

    fn finish(self) -> TableSet {
        let tables = self
            .tables
            .into_iter()
            .map(|state| {
                let TableState { mut spec, rows, .. } = state;
                for column in spec.columns.iter_mut().filter(|c| !c.is_synthetic()) {
                    if rows.iter().any(|r| r.get(&column.name).is_none()) {
                        column.nullable = true;
                    }
                }
                GeneratedTable { spec, rows }
            })
            .collect();

        TableSet {
            tables,
            relationships: self.relationships,
        }
    }
}

/// Flattens decoded documents into relational tables
pub struct TableGenerator<'a> {
    config: &'a GenerationConfig,
}

impl<'a> TableGenerator<'a> {
    /// Create a new table generator
    pub fn new(config: &'a GenerationConfig) -> Self {
        Self { config }
    }

    /// Generate the tables for one document
    ///
    /// Null, empty mapping and empty sequence roots give an empty table set.
    pub fn generate(&self, document: &Value) -> Result<TableSet> {
        let mut ctx = GenerationContext::new(self.config);
        let mut frames: Vec<Frame<'_>> = Vec::new();
        let root_name = sanitize_identifier(&self.config.root_name);

        match document {
            Value::Null => {}
            Value::Object(record) if record.is_empty() => {}
            Value::Array(items) if items.is_empty() => {}
            Value::Object(record) => {
                let table = ctx.create_table(&root_name, "", None, false)?;
                let (row, _) = ctx.push_row(table, None, None);
                frames.push(Frame::Record {
                    table,
                    row,
                    map: record,
                    depth: 0,
                });
            }
            Value::Array(items) => {
                let table = ctx.create_table(&root_name, "", None, true)?;
                frames.push(Frame::Elements {
                    table,
                    parent_key: None,
                    items,
                    depth: 0,
                });
            }
            scalar => {
                let table = ctx.create_table(&root_name, "", None, false)?;
                let (row, _) = ctx.push_row(table, None, None);
                ctx.set_scalar(table, row, &FieldKey::Value, VALUE_COLUMN, scalar)?;
            }
        }

        let mut cursor = 0;
        while cursor < frames.len() {
            match frames[cursor] {
                Frame::Record {
                    table,
                    row,
                    map,
                    depth,
                } => ctx.fill_record(&mut frames, table, row, map, depth)?,
                Frame::Elements {
                    table,
                    parent_key,
                    items,
                    depth,
                } => ctx.fill_elements(&mut frames, table, parent_key, items, depth)?,
            }
            cursor += 1;
        }

        let mut tables = ctx.finish();

        if self.config.dedup_enabled {
            let removed = deduplicate(&mut tables, self.config.dedup_tables.as_deref());
            tracing::debug!(removed, "Deduplication pass complete");
        }

        tracing::info!(
            tables = tables.len(),
            relationships = tables.relationships.len(),
            rows = tables.tables.iter().map(|t| t.rows.len()).sum::<usize>(),
            "Generated tables"
        );

        Ok(tables)
    }
}
