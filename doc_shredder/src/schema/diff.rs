//! Schema drift calculator
//!
//! This module compares the columns of two matched tables

use serde::Serialize;
use std::collections::HashMap;

use crate::schema::types::{ColumnSpec, SemanticType, TableSpec};

/// Column-level differences between two versions of one table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaDrift {
    pub columns_only_in_a: Vec<String>,
    pub columns_only_in_b: Vec<String>,
    pub type_changes: Vec<ColumnChange>,
}

impl SchemaDrift {
    /// Compare the data columns of two table specs
    ///
    /// Synthetic columns are ignored; their names follow the table name and
    /// would differ whenever the tables matched only fuzzily.
    pub fn between(table_a: &TableSpec, table_b: &TableSpec) -> Self {
        let columns_a: HashMap<&str, &ColumnSpec> =
            table_a.data_columns().map(|c| (c.name.as_str(), c)).collect();
        let columns_b: HashMap<&str, &ColumnSpec> =
            table_b.data_columns().map(|c| (c.name.as_str(), c)).collect();

        let columns_only_in_a = table_a
            .data_columns()
            .filter(|c| !columns_b.contains_key(c.name.as_str()))
            .map(|c| c.name.clone())
            .collect();

        let columns_only_in_b = table_b
            .data_columns()
            .filter(|c| !columns_a.contains_key(c.name.as_str()))
            .map(|c| c.name.clone())
            .collect();

        let type_changes = table_a
            .data_columns()
            .filter_map(|col_a| {
                let col_b = columns_b.get(col_a.name.as_str())?;
                let (from, to) = (col_a.resolved_type(), col_b.resolved_type());
                if from != to {
                    Some(ColumnChange {
                        column_name: col_a.name.clone(),
                        from,
                        to,
                    })
                } else {
                    None
                }
            })
            .collect();

        Self {
            columns_only_in_a,
            columns_only_in_b,
            type_changes,
        }
    }

    /// Check if the drift is empty (same columns, same types)
    pub fn is_empty(&self) -> bool {
        self.columns_only_in_a.is_empty()
            && self.columns_only_in_b.is_empty()
            && self.type_changes.is_empty()
    }
}

/// Represents a column type change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnChange {
    pub column_name: String,
    pub from: SemanticType,
    pub to: SemanticType,
}
