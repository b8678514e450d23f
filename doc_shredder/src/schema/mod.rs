//! Schema module for doc_shredder
//!
//! This module handles document structure analysis, table generation, drift
//! detection and DDL emission.

pub mod analyzer;
pub mod dedup;
pub mod diff;
pub mod generator;
pub mod tables;
pub mod types;

// Re-export key types
pub use analyzer::{NodeKind, StructureAnalysis, StructureAnalyzer, TableCandidate};
pub use diff::{ColumnChange, SchemaDrift};
pub use generator::{DdlGenerator, DdlStatement};
pub use tables::TableGenerator;
pub use types::{
    ColumnRole, ColumnSpec, GeneratedTable, Relationship, Row, SemanticType, TableSet, TableSpec,
};
