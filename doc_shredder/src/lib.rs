//! doc_shredder: normalizes nested YAML/JSON documents into relational tables
//!
//! A decoded document is analyzed, flattened into tables linked by surrogate
//! and foreign keys, rendered as CREATE TABLE statements for a SQL dialect,
//! and compared against another document row by row.

pub mod compare;
pub mod config;
pub mod document;
pub mod error;
pub mod schema;
pub mod utils;

use serde_json::Value;
use std::path::Path;

// Re-export main types for easier access
pub use compare::{
    compare_documents, compare_table_sets, ComparisonReport, DataComparer, DocumentComparison, PrimaryKeyCandidate,
    PrimaryKeyDetector, TableMatcher, Warning,
};
pub use config::{Config, Dialect};
pub use error::{Error, Result};
pub use schema::analyzer::{StructureAnalysis, StructureAnalyzer};
pub use schema::generator::{DdlGenerator, DdlStatement};
pub use schema::tables::TableGenerator;
pub use schema::types::{Row, TableSet, TableSpec};

/// Initialize a shredder with the specified configuration file
pub fn init(config_path: &str) -> Result<Shredder> {
    let config = config::load_from_file(config_path)?;
    Ok(Shredder::new(config))
}

/// Runs every stage with one configuration
pub struct Shredder {
    config: Config,
    analyzer: StructureAnalyzer,
}

impl Shredder {
    /// Create a new shredder from configuration
    pub fn new(config: Config) -> Self {
        let analyzer = StructureAnalyzer::new(config.generation.max_nesting);
        Self { config, analyzer }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Classify the nodes of a document
    pub fn analyze(&self, document: &Value) -> Result<StructureAnalysis> {
        self.analyzer.analyze(document)
    }

    /// Flatten a document into tables
    pub fn generate_tables(&self, document: &Value) -> Result<TableSet> {
        TableGenerator::new(&self.config.generation).generate(document)
    }

    /// CREATE TABLE statements for the configured dialect
    pub fn generate_ddl(&self, tables: &TableSet) -> Result<Vec<DdlStatement>> {
        DdlGenerator::new(self.config.ddl.dialect).generate(tables)
    }

    /// Compare two documents
    pub fn compare(&self, document_a: &Value, document_b: &Value) -> Result<ComparisonReport> {
        compare_documents(document_a, document_b, &self.config)
    }

    /// Complete workflow for one file: decode, flatten, and render one DDL script
    pub fn shred_file<P: AsRef<Path>>(&self, path: P) -> Result<(TableSet, String)> {
        let document = document::load_document(path)?;
        let tables = self.generate_tables(&document)?;

        let generator = DdlGenerator::new(self.config.ddl.dialect);
        let statements = generator.generate(&tables)?;
        let script = generator.ddl_script(&statements);

        tracing::info!(tables = tables.len(), dialect = %self.config.ddl.dialect, "Shredded document");
        Ok((tables, script))
    }
}
