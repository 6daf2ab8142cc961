use std::cmp::Ordering;

use bson::{Bson, Document};

use crate::types::{Order, SortSpec};

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_IN_SET: usize = 1000;

/// Evaluate a condition document against a record: every field entry must
/// hold, where an entry is either a literal equality or an operator
/// sub-document.
pub(crate) fn matches(record: &Document, condition: &Document) -> bool {
    condition.iter().all(|(path, expected)| match expected {
        Bson::Document(sub) if is_operator_document(sub) => {
            sub.iter().all(|(op, value)| matches_operator(record, path, op, value))
        }
        literal => literal_matches(record, path, literal),
    })
}

pub(crate) fn is_operator_document(doc: &Document) -> bool {
    doc.keys().next().is_some_and(|k| k.starts_with('$'))
}

fn literal_matches(record: &Document, path: &str, literal: &Bson) -> bool {
    match get_path(record, path) {
        Some(value) if value == literal => true,
        // equality against an array field matches any contained element
        Some(Bson::Array(items)) => items.contains(literal),
        _ => false,
    }
}

fn matches_operator(record: &Document, path: &str, op: &str, value: &Bson) -> bool {
    let field = get_path(record, path);
    match op {
        "$in" => match (field, value) {
            (Some(v), Bson::Array(set)) => in_set(v, set),
            _ => false,
        },
        "$nin" => match value {
            Bson::Array(set) => !field.is_some_and(|v| in_set(v, set)),
            _ => false,
        },
        "$ne" => field.is_none_or(|v| v != value),
        "$gt" => field.is_some_and(|v| compare(v, value) == Ordering::Greater),
        "$gte" => field.is_some_and(|v| compare(v, value) != Ordering::Less),
        "$lt" => field.is_some_and(|v| compare(v, value) == Ordering::Less),
        "$lte" => field.is_some_and(|v| compare(v, value) != Ordering::Greater),
        "$exists" => field.is_some() == value.as_bool().unwrap_or(true),
        "$regex" => match (field, value) {
            (Some(Bson::String(s)), Bson::String(pattern)) => pattern_matches(s, pattern),
            _ => false,
        },
        other => {
            log::warn!("unsupported condition operator: {other}");
            false
        }
    }
}

#[cfg(feature = "regex")]
fn pattern_matches(value: &str, pattern: &str) -> bool {
    regex::Regex::new(pattern).is_ok_and(|re| re.is_match(value))
}

#[cfg(not(feature = "regex"))]
fn pattern_matches(value: &str, pattern: &str) -> bool {
    value.contains(pattern)
}

pub(crate) fn in_set(value: &Bson, set: &[Bson]) -> bool {
    let direct = set.iter().take(MAX_IN_SET).any(|x| x == value);
    if direct {
        return true;
    }
    // an array field is in the set when any of its elements is
    match value {
        Bson::Array(items) => items.iter().any(|item| set.iter().take(MAX_IN_SET).any(|x| x == item)),
        _ => false,
    }
}

pub(crate) fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut cur = doc;
    let mut segs = 0usize;
    let mut parts = path.split('.').peekable();
    while let Some(part) = parts.next() {
        segs += 1;
        if segs > MAX_PATH_DEPTH {
            return None;
        }
        if parts.peek().is_none() {
            return cur.get(part);
        }
        match cur.get(part) {
            Some(Bson::Document(d)) => cur = d,
            _ => return None,
        }
    }
    None
}

pub(crate) fn compare(a: &Bson, b: &Bson) -> Ordering {
    use bson::Bson as T;
    fn is_num(x: &T) -> bool {
        matches!(x, T::Int32(_) | T::Int64(_) | T::Double(_))
    }
    fn as_f64_num(x: &T) -> f64 {
        match x {
            T::Int32(i) => f64::from(*i),
            T::Int64(i) => *i as f64,
            T::Double(f) => *f,
            _ => f64::NAN,
        }
    }
    if is_num(a) && is_num(b) {
        return as_f64_num(a).total_cmp(&as_f64_num(b));
    }
    match (a, b) {
        (T::String(x), T::String(y)) => x.cmp(y),
        (T::Boolean(x), T::Boolean(y)) => x.cmp(y),
        (T::ObjectId(x), T::ObjectId(y)) => x.cmp(y),
        (T::DateTime(x), T::DateTime(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Bson) -> u8 {
    use bson::Bson as T;
    match v {
        T::Null => 0,
        T::Boolean(_) => 1,
        T::Int32(_) => 2,
        T::Int64(_) => 3,
        T::Double(_) => 4,
        T::String(_) => 5,
        T::Array(_) => 6,
        T::Document(_) => 7,
        T::ObjectId(_) => 8,
        T::DateTime(_) => 9,
        _ => 250,
    }
}

/// Multi-field record ordering. Missing fields sort before present ones.
pub(crate) fn compare_records(a: &Document, b: &Document, sort: &[SortSpec]) -> Ordering {
    for spec in sort {
        let va = get_path(a, &spec.field);
        let vb = get_path(b, &spec.field);
        let ord = match (va, vb) {
            (Some(x), Some(y)) => compare(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return if spec.order == Order::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

/// Apply a projection document: include-only, exclude-only, or `$slice`
/// windows over array fields. An empty projection returns the record whole.
pub(crate) fn project(record: &Document, projection: &Document) -> Document {
    if projection.is_empty() {
        return record.clone();
    }

    let include_mode = projection.iter().any(|(field, v)| field.as_str() != "_id" && is_truthy(v));
    let id_excluded =
        projection.get("_id").is_some_and(|v| !is_truthy(v) && !matches!(v, Bson::Document(_)));

    let mut out = Document::new();
    if include_mode {
        if !id_excluded && let Some(id) = record.get("_id") {
            out.insert("_id", id.clone());
        }
        for (field, directive) in projection {
            if field.as_str() == "_id" {
                continue;
            }
            match directive {
                Bson::Document(spec) if spec.contains_key("$slice") => {
                    if let Some(Bson::Array(items)) = record.get(field) {
                        out.insert(field.clone(), Bson::Array(slice_array(items, &spec["$slice"])));
                    }
                }
                v if is_truthy(v) => {
                    if let Some(value) = record.get(field) {
                        out.insert(field.clone(), value.clone());
                    }
                }
                _ => {}
            }
        }
    } else {
        for (field, value) in record {
            match projection.get(field) {
                Some(Bson::Document(spec)) if spec.contains_key("$slice") => {
                    if let Bson::Array(items) = value {
                        out.insert(field.clone(), Bson::Array(slice_array(items, &spec["$slice"])));
                    } else {
                        out.insert(field.clone(), value.clone());
                    }
                }
                Some(_) => {}
                None => {
                    out.insert(field.clone(), value.clone());
                }
            }
        }
        if id_excluded {
            out.remove("_id");
        }
    }
    out
}

fn is_truthy(v: &Bson) -> bool {
    match v {
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Boolean(b) => *b,
        _ => false,
    }
}

fn slice_array(items: &[Bson], spec: &Bson) -> Vec<Bson> {
    match spec {
        Bson::Int32(n) => slice_by_limit(items, i64::from(*n)),
        Bson::Int64(n) => slice_by_limit(items, *n),
        Bson::Array(pair) if pair.len() == 2 => {
            let skip = pair[0].as_i64().or_else(|| pair[0].as_i32().map(i64::from)).unwrap_or(0);
            let limit = pair[1].as_i64().or_else(|| pair[1].as_i32().map(i64::from)).unwrap_or(0);
            let len = items.len() as i64;
            let start = if skip < 0 { (len + skip).max(0) } else { skip.min(len) };
            let end = (start + limit.max(0)).min(len);
            items[start as usize..end as usize].to_vec()
        }
        _ => items.to_vec(),
    }
}

fn slice_by_limit(items: &[Bson], limit: i64) -> Vec<Bson> {
    let len = items.len() as i64;
    if limit >= 0 {
        items[..limit.min(len) as usize].to_vec()
    } else {
        items[(len + limit).max(0) as usize..].to_vec()
    }
}
