//! DDL generator
//!
//! This module generates CREATE TABLE statements for generated tables

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::config::Dialect;
use crate::error::{Error, Result};
use crate::schema::types::{ColumnSpec, Relationship, SemanticType, TableSet, TableSpec};
use crate::utils::naming::format_sql_identifier;

/// One CREATE TABLE statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DdlStatement {
    pub table: String,
    pub sql: String,
}

/// Dialect type name for a semantic type
pub fn sql_type(semantic_type: SemanticType, dialect: Dialect) -> &'static str {
    use SemanticType::*;
    match dialect {
        Dialect::Snowflake => match semantic_type {
            Integer => "NUMBER",
            Float => "FLOAT",
            Boolean => "BOOLEAN",
            Text => "VARCHAR",
            Timestamp => "TIMESTAMP_NTZ",
            Json => "VARIANT",
        },
        Dialect::Postgres => match semantic_type {
            Integer => "BIGINT",
            Float => "DOUBLE PRECISION",
            Boolean => "BOOLEAN",
            Text => "TEXT",
            Timestamp => "TIMESTAMP",
            Json => "JSONB",
        },
        Dialect::MySql => match semantic_type {
            Integer => "BIGINT",
            Float => "DOUBLE",
            Boolean => "BOOLEAN",
            Text => "TEXT",
            Timestamp => "DATETIME",
            Json => "JSON",
        },
        // SQLite stores booleans as 0/1 and dates as text
        Dialect::Sqlite => match semantic_type {
            Integer | Boolean => "INTEGER",
            Float => "REAL",
            Text | Timestamp | Json => "TEXT",
        },
    }
}

/// Order tables parents first; ties keep generation order
///
/// Returns indices into `specs`. A cycle or a relationship naming an unknown
/// table is a `StructureError`.
pub fn topological_order(specs: &[TableSpec], relationships: &[Relationship]) -> Result<Vec<usize>> {
    let index_of: HashMap<&str, usize> = specs
        .iter()
        .enumerate()
        .map(|(i, spec)| (spec.name.as_str(), i))
        .collect();

    let mut in_degree = vec![0usize; specs.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); specs.len()];

    for rel in relationships {
        let (Some(&parent), Some(&child)) = (
            index_of.get(rel.parent.as_str()),
            index_of.get(rel.child.as_str()),
        ) else {
            return Err(Error::StructureError(format!(
                "Relationship {} -> {} references an unknown table",
                rel.parent, rel.child
            )));
        };
        children[parent].push(child);
        in_degree[child] += 1;
    }

    let mut ready: BTreeSet<usize> = (0..specs.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(specs.len());

    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &child in &children[next] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                ready.insert(child);
            }
        }
    }

    if order.len() < specs.len() {
        let stuck: Vec<&str> = (0..specs.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| specs[i].name.as_str())
            .collect();
        return Err(Error::StructureError(format!(
            "Relationship cycle between tables: {}",
            stuck.join(", ")
        )));
    }

    Ok(order)
}

/// DDL generator for one dialect
pub struct DdlGenerator {
    dialect: Dialect,
}

impl DdlGenerator {
    /// Create a new DDL generator
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Generate one statement per table, parents before children
    pub fn generate(&self, tables: &TableSet) -> Result<Vec<DdlStatement>> {
        let specs: Vec<TableSpec> = tables.specs().cloned().collect();
        self.generate_for_specs(&specs, &tables.relationships)
    }

    /// Generate statements for table specs and relationships built elsewhere
    pub fn generate_for_specs(
        &self,
        specs: &[TableSpec],
        relationships: &[Relationship],
    ) -> Result<Vec<DdlStatement>> {
        let order = topological_order(specs, relationships)?;

        let statements: Vec<DdlStatement> = order
            .into_iter()
            .map(|i| {
                let spec = &specs[i];
                let parent = spec
                    .parent
                    .as_deref()
                    .and_then(|name| specs.iter().find(|s| s.name == name));
                DdlStatement {
                    table: spec.name.clone(),
                    sql: self.create_table_sql(spec, parent),
                }
            })
            .collect();

        tracing::debug!(
            dialect = %self.dialect,
            statements = statements.len(),
            "Generated DDL"
        );

        Ok(statements)
    }

    /// Generate SQL to create a table
    ///
    /// `parent` supplies the referenced key column; without it the foreign
    /// key column name is assumed to match the parent's surrogate key.
    pub fn create_table_sql(&self, spec: &TableSpec, parent: Option<&TableSpec>) -> String {
        let quote = |name: &str| format_sql_identifier(name, self.dialect);

        let mut column_defs: Vec<String> = spec
            .columns
            .iter()
            .map(|column| self.column_definition(column))
            .collect();

        column_defs.push(format!("    PRIMARY KEY ({})", quote(&spec.surrogate_key)));

        if let (Some(parent_name), Some(fk)) = (&spec.parent, &spec.foreign_key) {
            let referenced = parent.map_or(fk.as_str(), |p| p.surrogate_key.as_str());
            column_defs.push(format!(
                "    FOREIGN KEY ({}) REFERENCES {} ({})",
                quote(fk),
                quote(parent_name),
                quote(referenced)
            ));
        }

        format!(
            "CREATE TABLE {} (\n{}\n);",
            quote(&spec.name),
            column_defs.join(",\n")
        )
    }

    fn column_definition(&self, column: &ColumnSpec) -> String {
        let mut def = format!(
            "    {} {}",
            format_sql_identifier(&column.name, self.dialect),
            sql_type(column.resolved_type(), self.dialect)
        );
        if !column.nullable {
            def.push_str(" NOT NULL");
        }
        def
    }

    /// Join statements into one script with a header comment
    pub fn ddl_script(&self, statements: &[DdlStatement]) -> String {
        let mut script = format!(
            "-- DDL generated by doc_shredder\n-- Dialect: {}\n-- Tables: {}\n\n",
            self.dialect.as_str().to_uppercase(),
            statements.len()
        );

        for statement in statements {
            script.push_str(&format!("-- Table: {}\n{}\n\n", statement.table, statement.sql));
        }

        script
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::schema::tables::TableGenerator;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn tags_tables() -> TableSet {
        TableGenerator::new(&GenerationConfig::default())
            .generate(&json!({"tags": ["a", "b"], "name": "x"}))
            .unwrap()
    }

    #[test]
    fn test_postgres_create_table() {
        let statements = DdlGenerator::new(Dialect::Postgres)
            .generate(&tags_tables())
            .unwrap();

        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[1].sql,
            "CREATE TABLE \"TAGS\" (\n    \"tags_id\" BIGINT NOT NULL,\n    \"root_id\" BIGINT NOT NULL,\n    \"row_index\" BIGINT NOT NULL,\n    \"value\" TEXT NOT NULL,\n    PRIMARY KEY (\"tags_id\"),\n    FOREIGN KEY (\"root_id\") REFERENCES \"ROOT\" (\"root_id\")\n);"
        );
    }

    #[test]
    fn test_dialect_types_and_quoting() {
        let tables = tags_tables();

        let mysql = DdlGenerator::new(Dialect::MySql).generate(&tables).unwrap();
        assert!(mysql[0].sql.starts_with("CREATE TABLE `ROOT` ("));
        assert!(mysql[0].sql.contains("`name` TEXT NOT NULL"));

        let snowflake = DdlGenerator::new(Dialect::Snowflake).generate(&tables).unwrap();
        assert!(snowflake[0].sql.contains("\"root_id\" NUMBER NOT NULL"));

        assert_eq!(sql_type(SemanticType::Boolean, Dialect::Sqlite), "INTEGER");
        assert_eq!(sql_type(SemanticType::Json, Dialect::Snowflake), "VARIANT");
        assert_eq!(sql_type(SemanticType::Timestamp, Dialect::MySql), "DATETIME");
    }

    #[test]
    fn test_parents_precede_children() {
        let specs = vec![
            TableSpec::new("C", "c", "c_id").with_parent("B", "b_id"),
            TableSpec::new("B", "b", "b_id").with_parent("A", "a_id"),
            TableSpec::new("A", "", "a_id"),
            TableSpec::new("D", "d", "d_id"),
        ];
        let relationships = vec![
            Relationship {
                parent: "B".to_string(),
                child: "C".to_string(),
                foreign_key: "b_id".to_string(),
            },
            Relationship {
                parent: "A".to_string(),
                child: "B".to_string(),
                foreign_key: "a_id".to_string(),
            },
        ];

        let order = topological_order(&specs, &relationships).unwrap();
        assert_eq!(order, vec![2, 1, 0, 3]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let specs = vec![TableSpec::new("A", "", "a_id"), TableSpec::new("B", "", "b_id")];
        let relationships = vec![
            Relationship {
                parent: "A".to_string(),
                child: "B".to_string(),
                foreign_key: "a_id".to_string(),
            },
            Relationship {
                parent: "B".to_string(),
                child: "A".to_string(),
                foreign_key: "b_id".to_string(),
            },
        ];

        let err = topological_order(&specs, &relationships).unwrap_err();
        assert!(matches!(err, Error::StructureError(_)));
    }

    #[test]
    fn test_ddl_script_header() {
        let generator = DdlGenerator::new(Dialect::Sqlite);
        let statements = generator.generate(&tags_tables()).unwrap();
        let script = generator.ddl_script(&statements);

        assert!(script.starts_with("-- DDL generated by doc_shredder\n-- Dialect: SQLITE\n-- Tables: 2\n"));
        assert!(script.contains("-- Table: TAGS\nCREATE TABLE \"TAGS\""));
    }
}
