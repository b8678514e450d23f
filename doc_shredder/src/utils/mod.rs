//! Utilities for doc_shredder
//!
//! This module provides utility functions used across the library.

pub mod logging;
pub mod naming;

// Re-export key utility functions
pub use naming::{
    format_sql_identifier, generate_unique_name, generate_unique_name_ignoring_case,
    sanitize_identifier, singular_forms,
    surrogate_key_name, table_name_for_field,
};
