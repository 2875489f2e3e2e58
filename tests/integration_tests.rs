//! Integration tests for the complete FragDB pipeline
//!
//! These tests verify end-to-end functionality across crates:
//! - Snapshot file → InMemoryFragmentStore
//! - Composite query document → CompositeQueryProcessor → DataNode forest
//!
//! Run with: cargo test --test integration_tests

use fragdb_query::{
    Anchor, CompositeQuery, CompositeQueryProcessor, DataNode, FetchDescendants, QueryError,
};
use fragdb_store::{InMemoryFragmentStore, StoreError};
use std::fs;
use tempfile::tempdir;

const NETWORK_SNAPSHOT: &str = r#"{
    "anchors": [{
        "dataspace": "inventory",
        "name": "network",
        "fragments": [
            { "id": 1, "xpath": "/network", "attributes": { "region": "eu" } },
            { "id": 2, "xpath": "/network/device[@name='r1']", "parentId": 1,
              "attributes": { "name": "r1", "role": "core" } },
            { "id": 3, "xpath": "/network/device[@name='r1']/interface[@name='eth0']", "parentId": 2,
              "attributes": { "name": "eth0", "status": "up" } },
            { "id": 4, "xpath": "/network/device[@name='r1']/interface[@name='eth1']", "parentId": 2,
              "attributes": { "name": "eth1", "status": "down" } },
            { "id": 5, "xpath": "/network/device[@name='r2']", "parentId": 1,
              "attributes": { "name": "r2", "role": "edge" } },
            { "id": 6, "xpath": "/network/device[@name='r2']/interface[@name='eth0']", "parentId": 5,
              "attributes": { "name": "eth0", "status": "up" } },
            { "id": 7, "xpath": "/network/device[@name='r2']/interface[@name='eth0']/counters", "parentId": 6,
              "attributes": { "rx": 10 } }
        ]
    }]
}"#;

const R1: &str = "/network/device[@name='r1']";
const R1_ETH0: &str = "/network/device[@name='r1']/interface[@name='eth0']";
const R1_ETH1: &str = "/network/device[@name='r1']/interface[@name='eth1']";
const R2: &str = "/network/device[@name='r2']";
const R2_COUNTERS: &str = "/network/device[@name='r2']/interface[@name='eth0']/counters";

fn load_network() -> (InMemoryFragmentStore, Anchor) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("network.json");
    fs::write(&path, NETWORK_SNAPSHOT).unwrap();
    let store = InMemoryFragmentStore::load_snapshot(&path).unwrap();
    (store, Anchor::new("inventory", "network"))
}

fn run(query: &CompositeQuery, fetch: FetchDescendants) -> Result<Vec<DataNode>, QueryError> {
    let (store, anchor) = load_network();
    CompositeQueryProcessor::new(&store).process_composite_query(&anchor, query, fetch)
}

// ============================================================================
// Snapshot → Query
// ============================================================================

#[test]
fn test_query_document_from_file_selects_edge_device_subtree() {
    let dir = tempdir().unwrap();
    let query_path = dir.path().join("query.json");
    fs::write(
        &query_path,
        r#"{ "path": "/network", "conditions": [{ "path": "//device[@role='edge']" }] }"#,
    )
    .unwrap();
    let query: CompositeQuery =
        serde_json::from_str(&fs::read_to_string(&query_path).unwrap()).unwrap();

    let out = run(&query, FetchDescendants::All).unwrap();

    assert_eq!(out.len(), 1);
    let network = &out[0];
    assert_eq!(network.xpath, "/network");
    assert_eq!(network.leaves["region"], "eu");
    assert_eq!(network.child_data_nodes.len(), 1);
    assert!(network.find(R1).is_none());
    assert!(network.find(R2_COUNTERS).is_some());
    assert_eq!(network.subtree_len(), 4);
}

#[test]
fn test_nested_condition_keeps_paths_to_deeper_matches_only() {
    let query = CompositeQuery::new("/network").with_condition(
        CompositeQuery::new("//device")
            .with_condition(CompositeQuery::new("//interface[@status='down']")),
    );

    let out = run(&query, FetchDescendants::All).unwrap();

    let network = &out[0];
    let r1 = network.find(R1).unwrap();
    assert_eq!(r1.child_data_nodes.len(), 1);
    assert_eq!(r1.child_data_nodes[0].xpath, R1_ETH1);
    assert!(network.find(R1_ETH0).is_none());
    // r2 has no deeper match, so its whole subtree comes along.
    assert_eq!(network.find(R2).unwrap().subtree_len(), 3);
    assert_eq!(network.subtree_len(), 6);
}

#[test]
fn test_plain_path_with_direct_children() {
    let out = run(&CompositeQuery::new("//device"), FetchDescendants::DIRECT).unwrap();

    let xpaths: Vec<_> = out.iter().map(|node| node.xpath.as_str()).collect();
    assert_eq!(xpaths, vec![R1, R2]);
    assert_eq!(out[0].child_data_nodes.len(), 2);
    assert_eq!(out[1].child_data_nodes.len(), 1);
    assert!(out[1].find(R2_COUNTERS).is_none());
}

#[test]
fn test_and_with_unmatched_condition_is_empty() {
    let query = CompositeQuery::new("/network")
        .with_operator("and")
        .with_condition(CompositeQuery::new("//device[@role='core']"))
        .with_condition(CompositeQuery::new("//device[@role='access']"));
    assert!(run(&query, FetchDescendants::All).unwrap().is_empty());

    let query = query.with_operator("or");
    let out = run(&query, FetchDescendants::All).unwrap();
    assert!(out[0].find(R1).is_some());
    assert!(out[0].find(R2).is_none());
}

// ============================================================================
// Output Format
// ============================================================================

#[test]
fn test_output_serializes_with_camel_case_keys() {
    let out = run(&CompositeQuery::new("//device[@name='r2']"), FetchDescendants::OMIT).unwrap();
    let value = serde_json::to_value(&out).unwrap();

    assert_eq!(value[0]["xpath"], R2);
    assert_eq!(value[0]["dataspace"], "inventory");
    assert_eq!(value[0]["anchorName"], "network");
    assert_eq!(value[0]["leaves"]["role"], "edge");
    assert_eq!(value[0]["childDataNodes"], serde_json::json!([]));
}

// ============================================================================
// Errors Across Crates
// ============================================================================

#[test]
fn test_unknown_anchor_surfaces_store_error() {
    let (store, _) = load_network();
    let err = CompositeQueryProcessor::new(&store)
        .process_composite_query(
            &Anchor::new("inventory", "missing"),
            &CompositeQuery::new("/network"),
            FetchDescendants::All,
        )
        .unwrap_err();
    assert!(matches!(err, QueryError::Store(StoreError::AnchorNotFound(_))));
}

#[test]
fn test_invalid_condition_path_surfaces_store_error() {
    let query = CompositeQuery::new("/network").with_condition(CompositeQuery::new("device"));
    let err = run(&query, FetchDescendants::All).unwrap_err();
    assert!(matches!(err, QueryError::Store(StoreError::InvalidPath { .. })));
}
