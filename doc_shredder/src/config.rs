//! Configuration handling for doc_shredder

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Load configuration from a TOML file
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let config_str = fs::read_to_string(path.as_ref())
        .map_err(|e| Error::ConfigError(format!("Failed to read config file: {}", e)))?;

    from_toml_str(&config_str)
}

/// Parse configuration from TOML text
pub fn from_toml_str(config_str: &str) -> Result<Config> {
    let config: Config = toml::from_str(config_str)
        .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?;

    config.validate()?;
    Ok(config)
}

/// Represents the complete doc_shredder configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub generation: GenerationConfig,
    pub comparison: ComparisonConfig,
    pub ddl: DdlConfig,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    /// Reject option combinations that cannot produce a meaningful run
    pub fn validate(&self) -> Result<()> {
        if self.generation.root_name.trim().is_empty() {
            return Err(Error::ConfigError("generation.root_name must not be empty".to_string()));
        }
        if self.generation.name_separator.is_empty() {
            return Err(Error::ConfigError(
                "generation.name_separator must not be empty".to_string(),
            ));
        }
        if self.generation.max_nesting == 0 {
            return Err(Error::ConfigError("generation.max_nesting must be positive".to_string()));
        }
        Ok(())
    }
}

/// Table generation behavior
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    /// Name of the table built from the document root
    pub root_name: String,
    /// Levels of mapping nesting merged into one table; `None` flattens everything
    pub max_depth: Option<usize>,
    /// Joins flattened field names, e.g. `deployment_region`
    pub name_separator: String,
    pub dedup_enabled: bool,
    /// Tables eligible for deduplication; `None` means every non-root table
    pub dedup_tables: Option<Vec<String>>,
    /// Documents nested deeper than this are rejected
    pub max_nesting: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            root_name: "ROOT".to_string(),
            max_depth: None,
            name_separator: "_".to_string(),
            dedup_enabled: false,
            dedup_tables: None,
            max_nesting: 10_000,
        }
    }
}

/// Cross-document comparison behavior
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Cap on enumerated row diffs per table; counts are never capped
    pub row_diff_limit_per_table: Option<usize>,
    /// Table name -> key column, bypassing detection
    pub primary_key_override: IndexMap<String, String>,
    pub null_equals_missing: bool,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            row_diff_limit_per_table: None,
            primary_key_override: IndexMap::new(),
            null_equals_missing: true,
        }
    }
}

/// DDL emission settings
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DdlConfig {
    pub dialect: Dialect,
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub format: String,
    pub stdout: bool,
}

/// Target SQL dialect for DDL output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Snowflake,
    #[serde(alias = "postgresql")]
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Snowflake => "snowflake",
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "snowflake" => Ok(Dialect::Snowflake),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::MySql),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(Error::ConfigError(format!("Unsupported dialect: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_file() {
        let config = from_toml_str("").unwrap();

        assert_eq!(config.generation.root_name, "ROOT");
        assert_eq!(config.generation.max_depth, None);
        assert_eq!(config.generation.name_separator, "_");
        assert!(!config.generation.dedup_enabled);
        assert!(config.comparison.null_equals_missing);
        assert_eq!(config.ddl.dialect, Dialect::Snowflake);
        assert!(config.logging.is_none());
    }

    #[test]
    fn test_sections_parse() {
        let config = from_toml_str(
            r#"
            [generation]
            root_name = "app"
            max_depth = 2
            dedup_enabled = true
            dedup_tables = ["TAGS"]

            [comparison]
            row_diff_limit_per_table = 50
            primary_key_override = { ACTIONS = "action_code" }

            [ddl]
            dialect = "mysql"

            [logging]
            level = "debug"
            format = "json"
            stdout = true
            "#,
        )
        .unwrap();

        assert_eq!(config.generation.root_name, "app");
        assert_eq!(config.generation.max_depth, Some(2));
        assert_eq!(config.generation.dedup_tables, Some(vec!["TAGS".to_string()]));
        assert_eq!(config.comparison.row_diff_limit_per_table, Some(50));
        assert_eq!(
            config.comparison.primary_key_override.get("ACTIONS").map(String::as_str),
            Some("action_code")
        );
        assert_eq!(config.ddl.dialect, Dialect::MySql);
        assert_eq!(config.logging.unwrap().level, "debug");
    }

    #[test]
    fn test_rejects_empty_separator() {
        let err = from_toml_str("[generation]\nname_separator = \"\"").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("PostgreSQL".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("sqlite".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert!("oracle".parse::<Dialect>().is_err());
    }
}
