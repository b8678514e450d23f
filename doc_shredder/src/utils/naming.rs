//! Naming utilities for doc_shredder
//!
//! Identifier sanitizing, collision handling and dialect quoting shared by the
//! table generator, the DDL generator and the table matcher.

use inflector::Inflector;
use std::collections::HashSet;

use crate::config::Dialect;
use crate::error::{Error, Result};

/// Upper bound on suffix attempts before a collision is declared unresolvable
pub const MAX_NAME_SUFFIX: usize = 100_000;

/// Sanitize identifiers for SQL
pub fn sanitize_identifier(name: &str) -> String {
    // Remove or replace characters not allowed in SQL identifiers
    let mut sanitized = name.replace(|c: char| !c.is_ascii_alphanumeric() && c != '_', "_");

    if sanitized.is_empty() {
        sanitized.push('_');
    }

    // Ensure identifier doesn't start with a number
    if sanitized.chars().next().map_or(false, |c| c.is_ascii_digit()) {
        sanitized = format!("_{}", sanitized);
    }

    sanitized
}

/// Table name for an array found at `field_path` (already joined with the separator)
pub fn table_name_for_field(field_path: &str) -> String {
    sanitize_identifier(field_path).to_uppercase()
}

/// Name of the surrogate key column of `table_name`, reused as the FK name in its children
pub fn surrogate_key_name(table_name: &str) -> String {
    format!("{}_id", sanitize_identifier(table_name).to_lowercase())
}

/// Generate a unique name with a suffix if name exists in the set
///
/// The first free candidate among `name`, `name_2`, `name_3`, ... is returned.
pub fn generate_unique_name(name: &str, existing_names: &HashSet<String>) -> Result<String> {
    if !existing_names.contains(name) {
        return Ok(name.to_string());
    }

    for counter in 2..=MAX_NAME_SUFFIX {
        let new_name = format!("{}_{}", name, counter);
        if !existing_names.contains(&new_name) {
            return Ok(new_name);
        }
    }

    Err(Error::NamingCollisionExhausted(name.to_string()))
}

/// Unique name compared without regard to case
///
/// Returns the name in its original casing and the lowercased form to record
/// in `taken_lower`.
pub fn generate_unique_name_ignoring_case(name: &str, taken_lower: &HashSet<String>) -> Result<(String, String)> {
    let lower = name.to_lowercase();
    let unique_lower = generate_unique_name(&lower, taken_lower)?;
    let suffix = unique_lower.strip_prefix(lower.as_str()).unwrap_or_default();
    Ok((format!("{}{}", name, suffix), unique_lower))
}

/// Truncate an identifier to fit database limits
pub fn truncate_identifier(name: &str, max_length: usize) -> String {
    if name.len() <= max_length || max_length <= 9 {
        name.to_string()
    } else {
        // We need space for the hash (8 chars) and the underscore (1 char)
        let mut keep_length = max_length - 9;
        while !name.is_char_boundary(keep_length) {
            keep_length -= 1;
        }

        // Hash of the full name keeps truncated names distinct
        let hash = format!("{:x}", md5::compute(name.as_bytes()));

        format!("{}_{}", &name[..keep_length], &hash[0..8])
    }
}

/// Get maximum identifier length for a dialect
pub fn get_max_identifier_length(dialect: Dialect) -> usize {
    match dialect {
        Dialect::Postgres => 63,
        Dialect::MySql => 64,
        Dialect::Sqlite => 2048,
        Dialect::Snowflake => 255,
    }
}

/// Format SQL identifier according to dialect quoting rules
pub fn format_sql_identifier(name: &str, dialect: Dialect) -> String {
    let name = truncate_identifier(name, get_max_identifier_length(dialect));
    match dialect {
        Dialect::MySql => format!("`{}`", name.replace('`', "``")),
        Dialect::Postgres | Dialect::Sqlite | Dialect::Snowflake => {
            format!("\"{}\"", name.replace('"', "\"\""))
        }
    }
}

/// Convert a plural name to singular
pub fn singularize(name: &str) -> String {
    // Handle special cases first
    match name.to_lowercase().as_str() {
        "people" => "person".to_string(),
        "children" => "child".to_string(),
        "men" => "man".to_string(),
        "women" => "woman".to_string(),
        "feet" => "foot".to_string(),
        "teeth" => "tooth".to_string(),
        "geese" => "goose".to_string(),
        "mice" => "mouse".to_string(),
        _ => name.to_singular(),
    }
}

/// Lower-cased forms a table name may take once a plural ending is dropped
///
/// Always contains the lower-cased name itself.
pub fn singular_forms(name: &str) -> Vec<String> {
    let lower = name.to_lowercase();
    let mut forms = vec![lower.clone()];

    for suffix in ["es", "s"] {
        if let Some(stem) = lower.strip_suffix(suffix) {
            if !stem.is_empty() {
                forms.push(stem.to_string());
            }
        }
    }

    let singular = singularize(&lower);
    if !singular.is_empty() {
        forms.push(singular);
    }

    forms.sort();
    forms.dedup();
    forms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("user-name"), "user_name");
        assert_eq!(sanitize_identifier("123user"), "_123user");
        assert_eq!(sanitize_identifier("user.name"), "user_name");
        assert_eq!(sanitize_identifier("user@name"), "user_name");
        assert_eq!(sanitize_identifier(""), "_");
        assert_eq!(sanitize_identifier("café"), "caf_");
    }

    #[test]
    fn test_table_and_key_names() {
        assert_eq!(table_name_for_field("tags"), "TAGS");
        assert_eq!(table_name_for_field("deployment_servers"), "DEPLOYMENT_SERVERS");
        assert_eq!(table_name_for_field("query-ref"), "QUERY_REF");
        assert_eq!(surrogate_key_name("ROOT"), "root_id");
        assert_eq!(surrogate_key_name("TAGS"), "tags_id");
    }

    #[test]
    fn test_generate_unique_name() {
        let existing: HashSet<String> = ["user", "user_2", "customer"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        assert_eq!(generate_unique_name("profile", &existing).unwrap(), "profile");
        assert_eq!(generate_unique_name("user", &existing).unwrap(), "user_3");
        assert_eq!(generate_unique_name("customer", &existing).unwrap(), "customer_2");
    }

    #[test]
    fn test_unique_name_ignoring_case() {
        let taken: HashSet<String> = ["name", "tags_2"].iter().map(|s| s.to_string()).collect();

        let (name, lower) = generate_unique_name_ignoring_case("Name", &taken).unwrap();
        assert_eq!((name.as_str(), lower.as_str()), ("Name_2", "name_2"));

        let (name, _) = generate_unique_name_ignoring_case("TAGS", &taken).unwrap();
        assert_eq!(name, "TAGS");

        let (name, lower) = generate_unique_name_ignoring_case("İd", &taken).unwrap();
        assert_eq!(name, "İd");
        assert_eq!(lower, "İd".to_lowercase());
    }

    #[test]
    fn test_truncate_identifier() {
        let long_name = "this_is_a_very_long_identifier_that_exceeds_database_limits";
        let truncated = truncate_identifier(long_name, 30);

        assert_eq!(truncated.len(), 30);
        assert!(truncated.starts_with("this_is_a_very_long"));
        assert_eq!(truncate_identifier("short", 30), "short");
    }

    #[test]
    fn test_format_sql_identifier() {
        assert_eq!(format_sql_identifier("tags", Dialect::Postgres), "\"tags\"");
        assert_eq!(format_sql_identifier("tags", Dialect::MySql), "`tags`");
        assert_eq!(format_sql_identifier("a\"b", Dialect::Sqlite), "\"a\"\"b\"");
    }

    #[test]
    fn test_singular_forms() {
        let forms = singular_forms("BOXES");
        assert!(forms.contains(&"boxes".to_string()));
        assert!(forms.contains(&"box".to_string()));

        let forms = singular_forms("categories");
        assert!(forms.contains(&"category".to_string()));

        assert_eq!(singularize("people"), "person");
    }
}
