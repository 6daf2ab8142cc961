use bson::{Bson, Document, doc};

use crate::expression::Expression;

const SET: &str = "$set";
const INC: &str = "$inc";
const PUSH: &str = "$push";
const PULL: &str = "$pull";
const UNSET: &str = "$unset";
const EACH: &str = "$each";

/// Accumulates update modifiers, keyed by modifier kind and field path.
///
/// Built per logical update and discarded after send, or cleared with
/// [`reset`](Operator::reset) for reuse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Operator {
    operators: Document,
}

impl Operator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn kind_entry(&mut self, kind: &str) -> &mut Document {
        if !matches!(self.operators.get(kind), Some(Bson::Document(_))) {
            self.operators.insert(kind, Document::new());
        }
        match self.operators.get_mut(kind) {
            Some(Bson::Document(fields)) => fields,
            _ => unreachable!(),
        }
    }

    #[must_use]
    pub fn set(mut self, field: &str, value: impl Into<Bson>) -> Self {
        self.kind_entry(SET).insert(field, value.into());
        self
    }

    /// Append `value` to an array field. Repeated pushes to the same field
    /// escalate the stored form: a single raw value first, then an `$each`
    /// list holding every pushed value.
    #[must_use]
    pub fn push(mut self, field: &str, value: impl Into<Bson>) -> Self {
        let value = value.into();
        let push = self.kind_entry(PUSH);
        match push.get_mut(field) {
            None => {
                push.insert(field, value);
            }
            Some(Bson::Document(spec)) if spec.contains_key(EACH) => {
                if let Some(Bson::Array(each)) = spec.get_mut(EACH) {
                    each.push(value);
                }
            }
            Some(prior) => {
                let old = prior.clone();
                push.insert(field, doc! { EACH: [old, value] });
            }
        }
        self
    }

    /// Append every element of `values`, merging into the same `$each`
    /// escalation scheme as [`push`](Operator::push).
    #[must_use]
    pub fn push_each(mut self, field: &str, values: Vec<Bson>) -> Self {
        let push = self.kind_entry(PUSH);
        match push.get_mut(field) {
            None => {
                push.insert(field, doc! { EACH: values });
            }
            Some(Bson::Document(spec)) if spec.contains_key(EACH) => {
                if let Some(Bson::Array(each)) = spec.get_mut(EACH) {
                    each.extend(values);
                }
            }
            Some(prior) => {
                let mut each = vec![prior.clone()];
                each.extend(values);
                push.insert(field, doc! { EACH: each });
            }
        }
        self
    }

    /// Add `delta` to a numeric field. Repeated increments on the same field
    /// accumulate additively into one running delta.
    #[must_use]
    pub fn increment(mut self, field: &str, delta: impl Into<Bson>) -> Self {
        let delta = delta.into();
        let accumulated = match self.get(INC, field) {
            Some(prior) => add_numeric(prior, &delta),
            None => delta,
        };
        self.kind_entry(INC).insert(field, accumulated);
        self
    }

    /// Remove array elements equal to `value` (or matching it, when `value`
    /// is a condition sub-document).
    #[must_use]
    pub fn pull(mut self, field: &str, value: impl Into<Bson>) -> Self {
        self.kind_entry(PULL).insert(field, value.into());
        self
    }

    /// Remove array elements matching `expression`, flattened to its
    /// condition document.
    #[must_use]
    pub fn pull_expression(self, field: &str, expression: &Expression) -> Self {
        self.pull(field, expression.to_document())
    }

    #[must_use]
    pub fn unset_field(mut self, field: &str) -> Self {
        self.kind_entry(UNSET).insert(field, "");
        self
    }

    #[must_use]
    pub fn is_defined(&self) -> bool {
        !self.operators.is_empty()
    }

    /// Clears all recorded modifiers, enabling reuse.
    pub fn reset(&mut self) {
        self.operators = Document::new();
    }

    /// The value or spec recorded for `field` under the given modifier kind.
    #[must_use]
    pub fn get(&self, kind: &str, field: &str) -> Option<&Bson> {
        match self.operators.get(kind) {
            Some(Bson::Document(fields)) => fields.get(field),
            _ => None,
        }
    }

    /// The whole field mapping for a modifier kind.
    #[must_use]
    pub fn get_kind(&self, kind: &str) -> Option<&Document> {
        match self.operators.get(kind) {
            Some(Bson::Document(fields)) => Some(fields),
            _ => None,
        }
    }

    /// The canonical update document for wire use.
    #[must_use]
    pub fn to_document(&self) -> Document {
        self.operators.clone()
    }

    /// True when the modifier set contains server-computed deltas
    /// (`$inc` or `$pull`): a locally held copy of the document cannot
    /// predict the outcome and must be refetched to observe it.
    #[must_use]
    pub fn is_reload_required(&self) -> bool {
        self.operators.contains_key(INC) || self.operators.contains_key(PULL)
    }
}

fn add_numeric(a: &Bson, b: &Bson) -> Bson {
    match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => Bson::Int64(i64::from(*x) + i64::from(*y)),
        (Bson::Int32(x), Bson::Int64(y)) => Bson::Int64(i64::from(*x) + y),
        (Bson::Int64(x), Bson::Int32(y)) => Bson::Int64(x + i64::from(*y)),
        (Bson::Int64(x), Bson::Int64(y)) => Bson::Int64(x + y),
        _ => Bson::Double(as_f64(a) + as_f64(b)),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_escalates_to_each_list() {
        let op = Operator::new().push("tags", "a").push("tags", "b").push("tags", "c");
        assert_eq!(
            op.get(PUSH, "tags"),
            Some(&Bson::Document(doc! { "$each": ["a", "b", "c"] }))
        );
    }

    #[test]
    fn first_push_stores_raw_value() {
        let op = Operator::new().push("tags", "a");
        assert_eq!(op.get(PUSH, "tags"), Some(&Bson::String("a".into())));
    }

    #[test]
    fn push_each_merges_into_each_list() {
        let op = Operator::new()
            .push_each("tags", vec!["a".into()])
            .push_each("tags", vec!["b".into(), "c".into()]);
        assert_eq!(
            op.get(PUSH, "tags"),
            Some(&Bson::Document(doc! { "$each": ["a", "b", "c"] }))
        );
    }

    #[test]
    fn push_then_push_each_escalates_prior_value() {
        let op = Operator::new().push("tags", "a").push_each("tags", vec!["b".into()]);
        assert_eq!(
            op.get(PUSH, "tags"),
            Some(&Bson::Document(doc! { "$each": ["a", "b"] }))
        );
    }

    #[test]
    fn increment_accumulates_additively() {
        let op = Operator::new().increment("n", 5).increment("n", 3);
        assert_eq!(op.get(INC, "n"), Some(&Bson::Int64(8)));
    }

    #[test]
    fn increment_mixed_types_accumulate_as_double() {
        let op = Operator::new().increment("n", 5).increment("n", 0.5);
        assert_eq!(op.get(INC, "n"), Some(&Bson::Double(5.5)));
    }

    #[test]
    fn reload_required_after_increment_or_pull() {
        assert!(Operator::new().increment("n", 1).is_reload_required());
        assert!(Operator::new().pull("tags", "a").is_reload_required());
        assert!(
            !Operator::new()
                .set("a", 1)
                .push("tags", "x")
                .unset_field("b")
                .is_reload_required()
        );
    }

    #[test]
    fn reset_clears_state() {
        let mut op = Operator::new().set("a", 1).increment("n", 2);
        assert!(op.is_defined());
        op.reset();
        assert!(!op.is_defined());
        assert!(!op.is_reload_required());
    }

    #[test]
    fn pull_expression_flattens_to_condition_document() {
        let expr = Expression::new().where_gt("score", 5);
        let op = Operator::new().pull_expression("entries", &expr);
        assert_eq!(
            op.get(PULL, "entries"),
            Some(&Bson::Document(doc! { "score": { "$gt": 5 } }))
        );
    }

    #[test]
    fn unset_stores_empty_string() {
        let op = Operator::new().unset_field("stale");
        assert_eq!(op.get(UNSET, "stale"), Some(&Bson::String(String::new())));
        assert_eq!(op.to_document(), doc! { "$unset": { "stale": "" } });
    }
}
