use bson::{Bson, Document, doc};

/// Accumulates query conditions as an ordered mapping from field path to
/// condition. A condition is either a literal value (equality) or an
/// operator sub-document such as `$in` or `$regex`.
///
/// A field path carries exactly one current condition; setting it again
/// overwrites. Inputs are not validated against any schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expression {
    conditions: Document,
}

impl Expression {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Equality condition on `field`.
    #[must_use]
    pub fn where_eq(mut self, field: &str, value: impl Into<Bson>) -> Self {
        self.conditions.insert(field, value.into());
        self
    }

    /// Membership condition: the field's value must be one of `values`.
    #[must_use]
    pub fn where_in(mut self, field: &str, values: Vec<Bson>) -> Self {
        self.conditions.insert(field, doc! { "$in": values });
        self
    }

    #[must_use]
    pub fn where_not_in(mut self, field: &str, values: Vec<Bson>) -> Self {
        self.conditions.insert(field, doc! { "$nin": values });
        self
    }

    #[must_use]
    pub fn where_gt(mut self, field: &str, value: impl Into<Bson>) -> Self {
        self.conditions.insert(field, doc! { "$gt": value.into() });
        self
    }

    #[must_use]
    pub fn where_gte(mut self, field: &str, value: impl Into<Bson>) -> Self {
        self.conditions.insert(field, doc! { "$gte": value.into() });
        self
    }

    #[must_use]
    pub fn where_lt(mut self, field: &str, value: impl Into<Bson>) -> Self {
        self.conditions.insert(field, doc! { "$lt": value.into() });
        self
    }

    #[must_use]
    pub fn where_lte(mut self, field: &str, value: impl Into<Bson>) -> Self {
        self.conditions.insert(field, doc! { "$lte": value.into() });
        self
    }

    #[must_use]
    pub fn where_ne(mut self, field: &str, value: impl Into<Bson>) -> Self {
        self.conditions.insert(field, doc! { "$ne": value.into() });
        self
    }

    #[must_use]
    pub fn where_exists(mut self, field: &str, exists: bool) -> Self {
        self.conditions.insert(field, doc! { "$exists": exists });
        self
    }

    /// Pattern condition on a string field.
    #[must_use]
    pub fn where_regex(mut self, field: &str, pattern: &str) -> Self {
        self.conditions.insert(field, doc! { "$regex": pattern });
        self
    }

    /// Merge `other` into this expression. Right-biased: for every field
    /// present in `other`, the resulting condition is `other`'s; fields not
    /// present in `other` are untouched.
    #[must_use]
    pub fn merge(mut self, other: &Expression) -> Self {
        for (field, condition) in other.conditions.iter() {
            self.conditions.insert(field.clone(), condition.clone());
        }
        self
    }

    /// The canonical condition document for wire use.
    #[must_use]
    pub fn to_document(&self) -> Document {
        self.conditions.clone()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn where_eq_overwrites_prior_condition() {
        let expr = Expression::new().where_eq("a", 1).where_eq("a", 2);
        assert_eq!(expr.to_document(), doc! { "a": 2 });
    }

    #[test]
    fn merge_is_right_biased_per_field() {
        let left = Expression::new().where_eq("a", 1);
        let right = Expression::new().where_eq("a", 2).where_eq("b", 3);
        let merged = left.merge(&right);
        assert_eq!(merged.to_document(), doc! { "a": 2, "b": 3 });
    }

    #[test]
    fn merge_leaves_absent_fields_untouched() {
        let left = Expression::new().where_eq("a", 1).where_in("tags", vec!["x".into()]);
        let right = Expression::new().where_eq("a", 9);
        let merged = left.merge(&right);
        assert_eq!(merged.to_document(), doc! { "a": 9, "tags": { "$in": ["x"] } });
    }

    #[test]
    fn operator_conditions_build_subdocuments() {
        let expr = Expression::new().where_gt("age", 21).where_exists("email", true);
        assert_eq!(
            expr.to_document(),
            doc! { "age": { "$gt": 21 }, "email": { "$exists": true } }
        );
    }
}
