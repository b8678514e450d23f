//! Integration tests for document analysis and table generation

use pretty_assertions::assert_eq;
use rstest::*;
use serde_json::{json, Value};
use std::collections::HashMap;

use doc_shredder::config::GenerationConfig;
use doc_shredder::schema::analyzer::NodeKind;
use doc_shredder::{StructureAnalyzer, TableGenerator, TableSet};

fn generate(document: &Value) -> TableSet {
    TableGenerator::new(&GenerationConfig::default())
        .generate(document)
        .expect("generation succeeds")
}

#[fixture]
fn service_document() -> Value {
    json!({
        "name": "billing",
        "deployment": {"region": "eu", "replicas": 3},
        "endpoints": [
            {"path": "/a", "methods": ["GET", "POST"], "auth": {"scopes": ["read"]}},
            {"path": "/b", "methods": ["GET"]},
            {"path": "/c", "methods": []}
        ],
        "owners": ["ann", "bob"],
        "matrix": [[1, 2], [3]]
    })
}

#[rstest]
#[case(json!({"tags": ["a", "b"], "name": "x"}))]
#[case(json!([{"a": [{"b": [{"c": [1]}]}]}]))]
#[case(json!({"x": {"y": {"z": [{"w": [1, 2]}]}}}))]
#[case(json!({"items": [{"tags": ["x"]}], "tags": ["y"]}))]
fn test_relationships_form_a_tree(#[case] document: Value) {
    let tables = generate(&document);

    let mut parents: HashMap<&str, usize> = HashMap::new();
    for rel in &tables.relationships {
        *parents.entry(rel.child.as_str()).or_insert(0) += 1;
    }

    for table in &tables.tables {
        let expected = if table.spec.is_root() { 0 } else { 1 };
        assert_eq!(parents.get(table.name()).copied().unwrap_or(0), expected, "{}", table.name());
    }

    // Parents are always created before their children
    let position: HashMap<&str, usize> = tables
        .tables
        .iter()
        .enumerate()
        .map(|(i, t)| (t.name(), i))
        .collect();
    for rel in &tables.relationships {
        assert!(position[rel.parent.as_str()] < position[rel.child.as_str()]);
    }
}

#[rstest]
fn test_generation_is_idempotent(service_document: Value) {
    let first = generate(&service_document);
    let second = generate(&service_document);

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[rstest]
fn test_row_counts_match_array_lengths(service_document: Value) {
    let tables = generate(&service_document);

    let counts: Vec<(String, usize)> = tables
        .tables
        .iter()
        .map(|t| (t.name().to_string(), t.row_count()))
        .collect();

    assert_eq!(
        counts,
        vec![
            ("ROOT".to_string(), 1),
            ("ENDPOINTS".to_string(), 3),
            ("OWNERS".to_string(), 2),
            ("MATRIX".to_string(), 2),
            ("METHODS".to_string(), 3),
            ("AUTH_SCOPES".to_string(), 1),
        ]
    );

    let root = tables.get("ROOT").unwrap();
    assert_eq!(
        root.spec.data_column_names(),
        vec!["name", "deployment_region", "deployment_replicas"]
    );
}

#[test]
fn test_tags_example() {
    let tables = generate(&json!({"tags": ["a", "b"], "name": "x"}));

    let root = tables.get("ROOT").unwrap();
    assert_eq!(root.rows.len(), 1);
    assert_eq!(root.rows[0].key, 1);
    assert_eq!(serde_json::to_value(&root.rows[0].values).unwrap(), json!({"name": "x"}));

    let tags = tables.get("TAGS").unwrap();
    let rows: Vec<Value> = tags
        .rows
        .iter()
        .map(|r| serde_json::to_value(&r.values).unwrap())
        .collect();
    assert_eq!(
        rows,
        vec![
            json!({"root_id": 1, "row_index": 0, "value": "a"}),
            json!({"root_id": 1, "row_index": 1, "value": "b"}),
        ]
    );
}

#[rstest]
#[case(None, vec!["name", "deployment_region", "deployment_replicas"])]
#[case(Some(0), vec!["name", "deployment"])]
fn test_max_depth_controls_flattening(
    service_document: Value,
    #[case] max_depth: Option<usize>,
    #[case] expected: Vec<&str>,
) {
    let config = GenerationConfig {
        max_depth,
        ..GenerationConfig::default()
    };
    let tables = TableGenerator::new(&config).generate(&service_document).unwrap();

    assert_eq!(tables.get("ROOT").unwrap().spec.data_column_names(), expected);
    // Arrays are tables at every depth setting
    assert!(tables.get("AUTH_SCOPES").is_some());
}

#[test]
fn test_custom_separator_and_root_name() {
    let config = GenerationConfig {
        root_name: "config".to_string(),
        name_separator: "__".to_string(),
        ..GenerationConfig::default()
    };
    let tables = TableGenerator::new(&config)
        .generate(&json!({"db": {"host": "h"}, "db_list": {"items": [1]}}))
        .unwrap();

    assert_eq!(tables.table_names(), vec!["config", "DB_LIST__ITEMS"]);
    assert_eq!(tables.get("config").unwrap().spec.data_column_names(), vec!["db__host"]);
    assert_eq!(tables.relationships[0].foreign_key, "config_id");
}

#[rstest]
fn test_analyzer_agrees_with_generator(service_document: Value) {
    let analysis = StructureAnalyzer::default().analyze(&service_document).unwrap();
    let candidates = analysis.table_candidates();

    let paths: Vec<&str> = candidates.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["endpoints", "endpoints[].methods", "endpoints[].auth.scopes", "owners", "matrix"]
    );
    assert_eq!(candidates[0].kind, NodeKind::ArrayOfMappings);
    assert_eq!(candidates[4].kind, NodeKind::MixedArray);
    assert_eq!(candidates[1].row_count, 3);
    // Empty and opaque nested arrays are recorded as nodes but back no table
    assert_eq!(analysis.total_arrays(), 9);
}

#[test]
fn test_dedup_repoints_children_of_merged_parents() {
    let config = GenerationConfig {
        dedup_enabled: true,
        ..GenerationConfig::default()
    };
    let document = json!({
        "orders": [
            {"status": "open", "lines": ["x", "y"]},
            {"status": "open", "lines": ["z"]}
        ]
    });
    let tables = TableGenerator::new(&config).generate(&document).unwrap();

    let orders = tables.get("ORDERS").unwrap();
    assert_eq!(orders.rows.len(), 1);
    let survivor = orders.rows[0].key;

    let lines = tables.get("LINES").unwrap();
    let values: Vec<Value> = lines.rows.iter().map(|r| r.get("value").cloned().unwrap()).collect();
    assert_eq!(values, vec![json!("x"), json!("y"), json!("z")]);
    for row in &lines.rows {
        assert_eq!(row.get("orders_id"), Some(&json!(survivor)));
    }
}
