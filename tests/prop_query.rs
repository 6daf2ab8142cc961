use std::sync::Arc;

use bson::{Bson, Document, doc};
use docket::{Client, Expression, MemStore, Operator, SortSpec};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_merge_is_right_biased(
        left in proptest::collection::vec(("[a-e]", any::<i32>()), 0..8),
        right in proptest::collection::vec(("[a-e]", any::<i32>()), 0..8),
    ) {
        let mut lhs = Expression::new();
        for (field, value) in &left {
            lhs = lhs.where_eq(field, *value);
        }
        let mut rhs = Expression::new();
        for (field, value) in &right {
            rhs = rhs.where_eq(field, *value);
        }

        let merged = lhs.clone().merge(&rhs).to_document();
        let rhs_doc = rhs.to_document();
        let lhs_doc = lhs.to_document();

        for (field, condition) in rhs_doc.iter() {
            // every field present on the right wins
            prop_assert_eq!(merged.get(field), Some(condition));
        }
        for (field, condition) in lhs_doc.iter() {
            if !rhs_doc.contains_key(field) {
                // fields absent from the right are untouched
                prop_assert_eq!(merged.get(field), Some(condition));
            }
        }
    }

    #[test]
    fn prop_increment_accumulates(deltas in proptest::collection::vec(-1000i64..1000, 1..20)) {
        let mut operator = Operator::new();
        for delta in &deltas {
            operator = operator.increment("n", *delta);
        }
        let total: i64 = deltas.iter().sum();
        prop_assert_eq!(operator.get("$inc", "n"), Some(&Bson::Int64(total)));
    }

    #[test]
    fn prop_paginator_window_stays_in_bounds(
        rows in 0usize..60,
        page in 1u64..20,
        items in 1u64..15,
    ) {
        let client = Client::new(Arc::new(MemStore::new()));
        client.use_database("app");
        let numbers = client.collection("numbers").unwrap();
        if rows > 0 {
            let batch: Vec<Document> = (0..rows).map(|n| doc! { "n": n as i64 }).collect();
            numbers.insert_batch(&batch).unwrap();
        }

        let mut paginator = numbers
            .query::<Document>()
            .sort(vec![SortSpec::asc("n")])
            .paginate(page, items)
            .unwrap();

        let total_pages = (rows as u64).div_ceil(items);
        let current = paginator.current_page().unwrap();
        if total_pages == 0 {
            prop_assert_eq!(current, 1);
        } else {
            prop_assert!(current >= 1 && current <= total_pages);
        }

        let window: Vec<Document> = paginator.collect::<Result<_, _>>().unwrap();
        prop_assert!(window.len() as u64 <= items);
        if total_pages > 0 && page <= total_pages {
            // an in-range page is exactly the expected slice
            let start = (page - 1) * items;
            prop_assert_eq!(window.first().map(|d| d.get_i64("n").unwrap()), Some(start as i64));
        }
    }
}
