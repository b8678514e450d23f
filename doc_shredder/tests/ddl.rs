//! End-to-end tests: config file, document file, DDL script

use pretty_assertions::assert_eq;
use rstest::*;
use serde_json::json;
use std::collections::HashSet;
use std::fs;
use tempfile::TempDir;

use doc_shredder::{init, Config, Dialect, Shredder};

const SERVICE_YAML: &str = r#"
name: billing
endpoints:
  - path: /a
    methods: [GET, POST]
  - path: /b
    methods: [GET]
"#;

#[fixture]
fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("service.yaml"), SERVICE_YAML).unwrap();
    dir
}

#[rstest]
fn test_shred_file_orders_parents_first(workspace: TempDir) {
    let (tables, script) = Shredder::new(Config::default())
        .shred_file(workspace.path().join("service.yaml"))
        .unwrap();

    assert_eq!(tables.table_names(), vec!["ROOT", "ENDPOINTS", "METHODS"]);

    let root = script.find("CREATE TABLE \"ROOT\"").unwrap();
    let endpoints = script.find("CREATE TABLE \"ENDPOINTS\"").unwrap();
    let methods = script.find("CREATE TABLE \"METHODS\"").unwrap();
    assert!(root < endpoints && endpoints < methods);

    assert!(script.starts_with("-- DDL generated by doc_shredder\n-- Dialect: SNOWFLAKE\n-- Tables: 3\n"));
    assert!(script.contains("FOREIGN KEY (\"endpoints_id\") REFERENCES \"ENDPOINTS\" (\"endpoints_id\")"));
}

#[rstest]
fn test_config_file_drives_generation(workspace: TempDir) {
    let config_path = workspace.path().join("shredder.toml");
    fs::write(
        &config_path,
        r#"
[generation]
root_name = "service"

[ddl]
dialect = "postgres"
"#,
    )
    .unwrap();

    let shredder = init(config_path.to_str().unwrap()).unwrap();
    assert_eq!(shredder.config().ddl.dialect, Dialect::Postgres);

    let (tables, script) = shredder.shred_file(workspace.path().join("service.yaml")).unwrap();

    assert_eq!(tables.table_names()[0], "service");
    assert!(script.contains("-- Dialect: POSTGRES"));
    assert!(script.contains("\"service_id\" BIGINT NOT NULL"));
    assert!(script.contains("\"value\" TEXT NOT NULL"));
}

#[rstest]
#[case("[ddl]\ndialect = \"oracle\"\n")]
#[case("[generation]\nroot_name = \"  \"\n")]
fn test_invalid_config_is_rejected(workspace: TempDir, #[case] text: &str) {
    let config_path = workspace.path().join("bad.toml");
    fs::write(&config_path, text).unwrap();

    assert!(init(config_path.to_str().unwrap()).is_err());
}

#[rstest]
#[case(Dialect::MySql)]
#[case(Dialect::Sqlite)]
fn test_columns_are_distinct_ignoring_case(#[case] dialect: Dialect) {
    let mut config = Config::default();
    config.ddl.dialect = dialect;
    let shredder = Shredder::new(config);

    let tables = shredder
        .generate_tables(&json!({"Name": "a", "name": "b", "items": [{"ID": 1, "id": 2}]}))
        .unwrap();
    let statements = shredder.generate_ddl(&tables).unwrap();

    for statement in &statements {
        let columns: Vec<String> = statement
            .sql
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .filter(|ident| ident.starts_with('`') || ident.starts_with('"'))
            .map(|ident| ident.to_lowercase())
            .collect();
        let distinct: HashSet<&String> = columns.iter().collect();
        assert_eq!(distinct.len(), columns.len(), "{}", statement.sql);
    }
    assert!(statements[0].sql.contains("name_2"));
}

#[test]
fn test_missing_document_is_an_error() {
    let result = Shredder::new(Config::default()).shred_file("/nonexistent/doc.json");
    assert!(result.is_err());
}
