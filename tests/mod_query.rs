use std::sync::Arc;

use bson::{Bson, Document, doc, oid::ObjectId};
use docket::{Client, Collection, Expression, MemStore, Operator, SortSpec};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    name: String,
    age: i32,
}

impl User {
    fn new(name: &str, age: i32) -> Self {
        Self { id: None, name: name.into(), age }
    }
}

fn setup() -> (Client, Collection) {
    let client = Client::new(Arc::new(MemStore::new()));
    client.use_database("app");
    let users = client.collection("users").unwrap();
    users
        .insert_batch(&[User::new("alice", 30), User::new("bob", 40), User::new("carol", 35)])
        .unwrap();
    (client, users)
}

#[test]
fn find_all_honors_condition_sort_skip_limit() {
    let (_client, users) = setup();
    let found: Vec<User> = users
        .query()
        .query(&Expression::new().where_gt("age", 25))
        .sort(vec![SortSpec::desc("age")])
        .skip(1)
        .limit(2)
        .find_all()
        .unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].name, "carol");
    assert_eq!(found[1].name, "alice");
}

#[test]
fn projection_limits_returned_fields() {
    let (_client, users) = setup();
    let record: Option<Document> = users
        .query()
        .query(&Expression::new().where_eq("name", "alice"))
        .fields(&["age"])
        .find_one()
        .unwrap();
    let record = record.unwrap();
    assert!(record.get("name").is_none());
    assert_eq!(record.get_i32("age").unwrap(), 30);
    assert!(record.get("_id").is_some());
}

#[test]
fn count_ignores_paging_but_limited_count_respects_it() {
    let (_client, users) = setup();
    let query = users
        .query::<Document>()
        .query(&Expression::new().where_gt("age", 25))
        .limit_with_offset(2, 2);
    assert_eq!(query.count().unwrap(), 3);
    assert_eq!(query.limited_count().unwrap(), 1);
}

#[test]
fn find_one_returns_not_found_sentinel() {
    let (_client, users) = setup();
    let missing: Option<User> = users
        .query()
        .query(&Expression::new().where_eq("name", "nobody"))
        .find_one()
        .unwrap();
    assert!(missing.is_none());
}

#[test]
fn by_id_with_malformed_literal_matches_raw_value() {
    let (_client, users) = setup();
    // a record whose _id is a plain string, as a permissive store allows
    users.insert_batch(&[doc! { "_id": "not-a-valid-id-format", "name": "dana" }]).unwrap();

    let found: Option<Document> =
        users.query().by_id("not-a-valid-id-format").find_one().unwrap();
    assert_eq!(found.unwrap().get_str("name").unwrap(), "dana");

    // well-formed hex is normalized to an object id and simply misses
    let missing: Option<Document> =
        users.query().by_id("507f1f77bcf86cd799439011").find_one().unwrap();
    assert!(missing.is_none());
}

#[test]
fn by_id_list_builds_membership_condition() {
    let (_client, users) = setup();
    let all: Vec<User> = users.query().find_all().unwrap();
    let id = all[0].id.unwrap().to_hex();
    let query = users.query::<User>().by_id_list(&[id.as_str(), "stray-literal"]);
    assert_eq!(
        query.to_document(),
        doc! { "_id": { "$in": [all[0].id.unwrap(), "stray-literal"] } }
    );
    let found = query.count().unwrap();
    assert_eq!(found, 1);
}

#[test]
fn find_and_update_returns_post_update_record() {
    let (_client, users) = setup();
    let operator = Operator::new().increment("age", 1).set("seen", true);
    let updated: Option<Document> = users
        .query()
        .query(&Expression::new().where_eq("name", "alice"))
        .find_and_update(&operator, false)
        .unwrap();
    let updated = updated.unwrap();
    assert_eq!(updated.get_i64("age").unwrap(), 31);
    assert_eq!(updated.get_bool("seen").unwrap(), true);
    assert!(operator.is_reload_required());
}

#[test]
fn find_and_update_upserts_when_asked() {
    let (_client, users) = setup();
    let operator = Operator::new().set("age", 20);
    let created: Option<Document> = users
        .query()
        .query(&Expression::new().where_eq("name", "eve"))
        .find_and_update(&operator, true)
        .unwrap();
    let created = created.unwrap();
    assert_eq!(created.get_str("name").unwrap(), "eve");
    assert_eq!(created.get_i32("age").unwrap(), 20);
    assert_eq!(users.query::<Document>().count().unwrap(), 4);
}

#[test]
fn find_and_remove_deletes_by_sort_order() {
    let (_client, users) = setup();
    let removed: Option<User> = users
        .query()
        .sort(vec![SortSpec::asc("age")])
        .find_and_remove()
        .unwrap();
    assert_eq!(removed.unwrap().name, "alice");
    assert_eq!(users.query::<Document>().count().unwrap(), 2);
}

#[test]
fn map_and_filter_key_results_by_record_id() {
    let (_client, users) = setup();
    let names = users
        .query::<User>()
        .sort(vec![SortSpec::asc("age")])
        .map(|u| u.name)
        .unwrap();
    assert_eq!(names.len(), 3);
    assert_eq!(names[0].1, "alice");
    // keys are the hex ids of the records
    assert!(names.iter().all(|(key, _)| ObjectId::parse_str(key).is_ok()));

    let adults = users.query::<User>().filter(|u| u.age > 32).unwrap();
    assert_eq!(adults.len(), 2);
}

#[test]
fn find_random_edge_cases() {
    let client = Client::new(Arc::new(MemStore::new()));
    client.use_database("app");
    let rolls = client.collection("rolls").unwrap();

    let none: Option<Document> = rolls.query().find_random().unwrap();
    assert!(none.is_none());

    rolls.insert_batch(&[doc! { "k": 0 }]).unwrap();
    let sole: Option<Document> = rolls.query().find_random().unwrap();
    assert_eq!(sole.unwrap().get_i32("k").unwrap(), 0);

    let batch: Vec<Document> = (1..10).map(|k| doc! { "k": k }).collect();
    rolls.insert_batch(&batch).unwrap();
    let mut query = rolls.query::<Document>();
    let picked = query.find_random().unwrap().unwrap();
    let k = picked.get_i32("k").unwrap();
    assert!((0..10).contains(&k));
    assert!(query.current_skip() < 10);
    assert_eq!(query.current_limit(), 1);
}

#[test]
fn shaping_calls_reach_the_store_cursor_in_fixed_order() {
    let store = Arc::new(MemStore::new());
    let client = Client::new(store.clone());
    client.use_database("app");
    let users = client.collection("users").unwrap();
    users.insert_batch(&[doc! { "age": 1 }, doc! { "age": 2 }, doc! { "age": 3 }]).unwrap();

    let mem = store.get_collection("app", "users");
    mem.clear_shaping_log();

    let mut query = users
        .query::<Document>()
        .sort(vec![SortSpec::asc("age")])
        .limit(2)
        .skip(1)
        .read_nearest(None);
    let _ = query.find_all().unwrap();

    assert_eq!(
        mem.shaping_log(),
        vec!["skip(1)", "limit(2)", "sort(age)", "rewind", "read_preference(Nearest)"]
    );
}

#[test]
fn cursor_memoization_makes_later_configuration_inert() {
    let (_client, users) = setup();
    let mut query = users.query::<User>().sort(vec![SortSpec::asc("age")]);
    let first = query.next_record().unwrap().unwrap();
    assert_eq!(first.name, "alice");

    // the cursor is already open: a new skip is not applied to it
    let mut query = query.skip(2);
    let second = query.next_record().unwrap().unwrap();
    assert_eq!(second.name, "carol");

    // a clone starts clean and does see the configuration
    let mut fresh = query.clone();
    let from_fresh = fresh.next_record().unwrap().unwrap();
    assert_eq!(from_fresh.name, "bob");
}

#[test]
fn slice_spec_requires_limit_with_offset() {
    let (_client, users) = setup();
    let err = users.query::<Document>().slice_spec("tags", 0, 3).unwrap_err();
    assert!(matches!(err, docket::Error::InvalidArgument(_)));

    let query = users.query::<Document>().slice_spec("tags", 2, 3).unwrap();
    users
        .insert_batch(&[doc! { "name": "tagged", "tags": ["a", "b", "c", "d", "e", "f"] }])
        .unwrap();
    let record: Option<Document> = query
        .query(&Expression::new().where_eq("name", "tagged"))
        .find_one()
        .unwrap();
    assert_eq!(
        record.unwrap().get_array("tags").unwrap(),
        &vec![Bson::String("d".into()), Bson::String("e".into())]
    );
}

#[test]
fn merged_expressions_are_right_biased() {
    let (_client, users) = setup();
    let query = users
        .query::<Document>()
        .query(&Expression::new().where_eq("name", "alice").where_eq("age", 1))
        .query(&Expression::new().where_eq("age", 30));
    assert_eq!(query.to_document(), doc! { "name": "alice", "age": 30 });
    assert_eq!(query.count().unwrap(), 1);
}
