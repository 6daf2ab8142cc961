use bson::{Document, doc};

use crate::expression::Expression;
use crate::types::{SortSpec, sort_document};

/// Accumulates aggregation pipeline stages in issue order.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    stages: Vec<Document>,
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn match_expression(self, expression: &Expression) -> Self {
        self.match_document(expression.to_document())
    }

    #[must_use]
    pub fn match_document(mut self, condition: Document) -> Self {
        self.stages.push(doc! { "$match": condition });
        self
    }

    #[must_use]
    pub fn group(mut self, spec: Document) -> Self {
        self.stages.push(doc! { "$group": spec });
        self
    }

    #[must_use]
    pub fn project(mut self, spec: Document) -> Self {
        self.stages.push(doc! { "$project": spec });
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: &[SortSpec]) -> Self {
        self.stages.push(doc! { "$sort": sort_document(sort) });
        self
    }

    #[must_use]
    pub fn skip(mut self, n: u64) -> Self {
        self.stages.push(doc! { "$skip": n as i64 });
        self
    }

    #[must_use]
    pub fn limit(mut self, n: u64) -> Self {
        self.stages.push(doc! { "$limit": n as i64 });
        self
    }

    #[must_use]
    pub fn count(mut self, field: &str) -> Self {
        self.stages.push(doc! { "$count": field });
        self
    }

    #[must_use]
    pub fn to_documents(&self) -> Vec<Document> {
        self.stages.clone()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
