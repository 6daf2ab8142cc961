use std::sync::Arc;

use bson::{Document, doc};
use docket::{Client, Collection, CursorShape, Expression, MemStore, SortSpec};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Entry {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<bson::oid::ObjectId>,
    name: String,
    rank: i32,
}

fn setup() -> Collection {
    let client = Client::new(Arc::new(MemStore::new()));
    client.use_database("app");
    let entries = client.collection("entries").unwrap();
    entries
        .insert_batch(&[
            Entry { id: None, name: "bob".into(), rank: 2 },
            Entry { id: None, name: "billy".into(), rank: 1 },
            Entry { id: None, name: "bea".into(), rank: 3 },
        ])
        .unwrap();
    entries
}

#[test]
fn snapshot_supports_positional_protocol() {
    let entries = setup();
    let mut cached = entries.find_cached::<Entry>(Expression::new()).unwrap();
    assert_eq!(cached.len(), 3);
    assert_eq!(cached.first().unwrap().name, "bob");

    cached.next();
    cached.next();
    assert_eq!(cached.key(), 2);
    assert_eq!(cached.current().unwrap().name, "bea");
    assert!(cached.valid());
    cached.next();
    assert!(!cached.valid());

    // rewind resets the position over the snapshot, no new fetch
    cached.rewind();
    assert_eq!(cached.key(), 0);
    assert_eq!(cached.current().unwrap().name, "bob");
    // first() is position-independent
    cached.next();
    assert_eq!(cached.first().unwrap().name, "bob");
}

#[test]
fn snapshot_is_isolated_from_later_store_mutations() {
    let entries = setup();
    let cached = entries
        .find_cached::<Entry>(Expression::new().where_gt("rank", 0))
        .unwrap();
    assert_eq!(cached.len(), 3);

    entries.insert_batch(&[Entry { id: None, name: "blair".into(), rank: 4 }]).unwrap();

    // the existing snapshot does not see the new matching record
    assert_eq!(cached.len(), 3);
    assert!(cached.iter().all(|e| e.name != "blair"));

    // a freshly taken snapshot does
    let fresh = entries
        .find_cached::<Entry>(Expression::new().where_gt("rank", 0))
        .unwrap();
    assert_eq!(fresh.len(), 4);
}

#[test]
fn condition_restricts_the_snapshot() {
    let entries = setup();
    let cached = entries
        .find_cached::<Entry>(Expression::new().where_gte("rank", 2))
        .unwrap();
    assert_eq!(cached.len(), 2);
}

#[test]
fn to_documents_extracts_each_element() {
    let entries = setup();
    let cached = entries.find_cached::<Entry>(Expression::new()).unwrap();
    let docs = cached.to_documents().unwrap();
    assert_eq!(docs.len(), 3);
    assert_eq!(docs[0].get_str("name").unwrap(), "bob");
    assert_eq!(docs[0].get_i32("rank").unwrap(), 2);
}

#[test]
fn to_json_joins_per_element_forms() {
    let client = Client::new(Arc::new(MemStore::new()));
    client.use_database("app");
    let pairs = client.collection("pairs").unwrap();
    pairs.insert_batch(&[doc! { "_id": "a", "n": 1 }, doc! { "_id": "b", "n": 2 }]).unwrap();

    let cached = pairs.find_cached::<Document>(Expression::new()).unwrap();
    let json = cached.to_json().unwrap();
    assert!(json.starts_with('['));
    assert!(json.ends_with(']'));
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 2);
}

#[test]
fn forwarded_sort_builds_a_fresh_view_and_keeps_the_snapshot() {
    let entries = setup();
    let mut cached = entries.find_cached::<Entry>(Expression::new()).unwrap();
    cached.next();

    // forwarding goes to a new query seeded with the position as offset
    let mut sorted = CursorShape::sort(&cached, vec![SortSpec::asc("rank")]);
    assert_eq!(sorted.current_skip(), 1);
    let from_view: Vec<Entry> = sorted.find_all().unwrap();
    assert_eq!(from_view.len(), 2);
    assert_eq!(from_view[0].name, "bob");
    assert_eq!(from_view[1].name, "bea");

    // the snapshot itself is unaffected by the forwarded call
    assert_eq!(cached.key(), 1);
    assert_eq!(cached.current().unwrap().name, "billy");
    assert_eq!(cached.records().len(), 3);
}
