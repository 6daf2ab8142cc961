use bson::{Bson, Document};

use crate::errors::Error;

use super::eval;

/// Apply a canonical update document to a record. Returns whether the
/// record changed.
pub(crate) fn apply_update(record: &mut Document, update: &Document) -> Result<bool, Error> {
    let mut changed = false;
    for (kind, spec) in update {
        let fields = match spec {
            Bson::Document(fields) => fields,
            _ => {
                return Err(Error::StoreOperation(format!(
                    "update modifier {kind} requires a document"
                )));
            }
        };
        match kind.as_str() {
            "$set" => {
                for (path, value) in fields {
                    if set_path(record, path, value.clone()) {
                        changed = true;
                    }
                }
            }
            "$inc" => {
                for (path, delta) in fields {
                    let current = eval::get_path(record, path).cloned();
                    if let Some(ref value) = current
                        && !is_numeric(value)
                    {
                        return Err(Error::StoreOperation(format!(
                            "cannot increment non-numeric field {path}"
                        )));
                    }
                    let next = numeric_add(&current.unwrap_or(Bson::Int32(0)), delta);
                    if set_path(record, path, next) {
                        changed = true;
                    }
                }
            }
            "$unset" => {
                for (path, _) in fields {
                    if unset_path(record, path) {
                        changed = true;
                    }
                }
            }
            "$push" => {
                for (path, value) in fields {
                    let values = match value {
                        Bson::Document(spec) if spec.contains_key("$each") => {
                            match spec.get("$each") {
                                Some(Bson::Array(each)) => each.clone(),
                                _ => {
                                    return Err(Error::StoreOperation(
                                        "$each requires an array".into(),
                                    ));
                                }
                            }
                        }
                        single => vec![single.clone()],
                    };
                    if push_path(record, path, values)? {
                        changed = true;
                    }
                }
            }
            "$pull" => {
                for (path, spec) in fields {
                    if pull_path(record, path, spec)? {
                        changed = true;
                    }
                }
            }
            other => {
                return Err(Error::StoreOperation(format!("unsupported update operator: {other}")));
            }
        }
    }
    Ok(changed)
}

fn ensure_subdoc<'a>(root: &'a mut Document, key: &str) -> &'a mut Document {
    let needs_new = !matches!(root.get(key), Some(Bson::Document(_)));
    if needs_new {
        root.insert(key.to_string(), Bson::Document(Document::new()));
    }
    match root.get_mut(key) {
        Some(Bson::Document(d)) => d,
        _ => unreachable!(),
    }
}

fn traverse_to_parent<'a>(root: &'a mut Document, path: &str) -> (&'a mut Document, String) {
    let mut cur = root;
    let mut iter = path.split('.').peekable();
    let mut last = String::new();
    while let Some(seg) = iter.next() {
        if iter.peek().is_none() {
            last = seg.to_string();
            break;
        }
        cur = ensure_subdoc(cur, seg);
    }
    (cur, last)
}

pub(crate) fn set_path(root: &mut Document, path: &str, value: Bson) -> bool {
    let (parent, last) = traverse_to_parent(root, path);
    let old = parent.insert(last, value.clone());
    old.as_ref() != Some(&value)
}

fn unset_path(root: &mut Document, path: &str) -> bool {
    let (parent, last) = traverse_to_parent(root, path);
    parent.remove(&last).is_some()
}

fn push_path(root: &mut Document, path: &str, values: Vec<Bson>) -> Result<bool, Error> {
    let (parent, last) = traverse_to_parent(root, path);
    match parent.get_mut(&last) {
        None => {
            let pushed = !values.is_empty();
            parent.insert(last, Bson::Array(values));
            Ok(pushed)
        }
        Some(Bson::Array(items)) => {
            let pushed = !values.is_empty();
            items.extend(values);
            Ok(pushed)
        }
        Some(_) => Err(Error::StoreOperation(format!("cannot push to non-array field {path}"))),
    }
}

fn pull_path(root: &mut Document, path: &str, spec: &Bson) -> Result<bool, Error> {
    let (parent, last) = traverse_to_parent(root, path);
    match parent.get_mut(&last) {
        None => Ok(false),
        Some(Bson::Array(items)) => {
            let before = items.len();
            items.retain(|item| !pull_matches(item, spec));
            Ok(items.len() != before)
        }
        Some(_) => Err(Error::StoreOperation(format!("cannot pull from non-array field {path}"))),
    }
}

fn pull_matches(item: &Bson, spec: &Bson) -> bool {
    match spec {
        // operator sub-document applied to the element value itself
        Bson::Document(ops) if eval::is_operator_document(ops) => {
            ops.iter().all(|(op, value)| scalar_matches(item, op, value))
        }
        // condition document applied to document elements
        Bson::Document(condition) => match item {
            Bson::Document(element) => eval::matches(element, condition),
            _ => false,
        },
        literal => item == literal,
    }
}

fn scalar_matches(item: &Bson, op: &str, value: &Bson) -> bool {
    use std::cmp::Ordering;
    match op {
        "$ne" => item != value,
        "$gt" => eval::compare(item, value) == Ordering::Greater,
        "$gte" => eval::compare(item, value) != Ordering::Less,
        "$lt" => eval::compare(item, value) == Ordering::Less,
        "$lte" => eval::compare(item, value) != Ordering::Greater,
        "$in" => match value {
            Bson::Array(set) => eval::in_set(item, set),
            _ => false,
        },
        "$nin" => match value {
            Bson::Array(set) => !eval::in_set(item, set),
            _ => false,
        },
        _ => false,
    }
}

fn is_numeric(value: &Bson) -> bool {
    matches!(value, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

fn numeric_add(a: &Bson, b: &Bson) -> Bson {
    match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => Bson::Int64(i64::from(*x) + i64::from(*y)),
        (Bson::Int32(x), Bson::Int64(y)) => Bson::Int64(i64::from(*x) + y),
        (Bson::Int64(x), Bson::Int32(y)) => Bson::Int64(x + i64::from(*y)),
        (Bson::Int64(x), Bson::Int64(y)) => Bson::Int64(x + y),
        (x, y) => Bson::Double(as_f64(x) + as_f64(y)),
    }
}

fn as_f64(value: &Bson) -> f64 {
    match value {
        Bson::Double(f) => *f,
        Bson::Int32(i) => f64::from(*i),
        Bson::Int64(i) => *i as f64,
        _ => 0.0,
    }
}
