use std::sync::Arc;

use bson::{Bson, Document, doc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::Error;
use crate::expression::Expression;
use crate::handle::CollectionHandle;
use crate::operator::Operator;
use crate::pipeline::Pipeline;
use crate::query::{CachedResultSet, Query};
use crate::types::{ReadPreference, TagSet, WriteConcern};

/// Typed facade over a collection handle: builds queries and result sets,
/// and forwards bulk writes, aggregation and distinct to the store.
#[derive(Clone)]
pub struct Collection {
    handle: Arc<dyn CollectionHandle>,
}

impl Collection {
    #[must_use]
    pub fn new(handle: Arc<dyn CollectionHandle>) -> Self {
        Self { handle }
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.handle.name()
    }

    #[must_use]
    pub fn handle(&self) -> &Arc<dyn CollectionHandle> {
        &self.handle
    }

    /// A fresh expression for this collection's queries.
    #[must_use]
    pub fn expression(&self) -> Expression {
        Expression::new()
    }

    /// A query over this collection decoding records into `M`.
    #[must_use]
    pub fn query<M>(&self) -> Query<M> {
        Query::new(self.handle.clone())
    }

    /// Snapshot every record matching `expression` into an eager result
    /// set.
    ///
    /// # Errors
    /// Store-level failures and record decode failures.
    pub fn find_cached<M: DeserializeOwned>(
        &self,
        expression: Expression,
    ) -> Result<CachedResultSet<M>, Error> {
        CachedResultSet::new(self.handle.clone(), expression)
    }

    /// Distinct values of `field` across matching documents.
    ///
    /// # Errors
    /// Store-level failures propagate unmodified.
    pub fn distinct(
        &self,
        field: &str,
        expression: Option<&Expression>,
    ) -> Result<Vec<Bson>, Error> {
        let condition = expression.map(Expression::to_document);
        self.handle.distinct(field, condition.as_ref())
    }

    /// Serialize and insert a batch of records.
    ///
    /// # Errors
    /// `StoreOperation` on a non-ok insert status; encode failures.
    pub fn insert_batch<M: Serialize>(&self, records: &[M]) -> Result<(), Error> {
        let records = records
            .iter()
            .map(|record| bson::serialize_to_document(record).map_err(Error::from))
            .collect::<Result<Vec<_>, _>>()?;
        self.handle.insert_batch(&records)
    }

    /// Apply `operator` to every document matching `expression`; returns
    /// the match count.
    ///
    /// # Errors
    /// `StoreOperation` on a non-ok update status.
    pub fn update_many(&self, expression: &Expression, operator: &Operator) -> Result<u64, Error> {
        self.handle.update_many(&expression.to_document(), &operator.to_document())
    }

    /// Remove every document matching `expression`; returns the removal
    /// count.
    ///
    /// # Errors
    /// `StoreOperation` on a non-ok remove status.
    pub fn remove(&self, expression: &Expression) -> Result<u64, Error> {
        self.handle.remove(&expression.to_document())
    }

    /// Run an aggregation pipeline.
    ///
    /// # Errors
    /// `StoreOperation` on a non-ok aggregation status.
    pub fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Document>, Error> {
        self.aggregate_documents(&pipeline.to_documents())
    }

    /// Run an aggregation pipeline given as raw stage documents.
    ///
    /// # Errors
    /// `InvalidArgument` when a stage is not a single `$`-keyed document;
    /// `StoreOperation` on a non-ok aggregation status.
    pub fn aggregate_documents(&self, stages: &[Document]) -> Result<Vec<Document>, Error> {
        for stage in stages {
            let mut keys = stage.keys();
            let valid = matches!(keys.next(), Some(k) if k.starts_with('$')) && keys.next().is_none();
            if !valid {
                return Err(Error::InvalidArgument(format!(
                    "pipeline stage must be a single $-keyed document, got {stage}"
                )));
            }
        }

        let event = doc! {
            "collection": self.handle.name(),
            "pipeline": stages.to_vec(),
        };
        log::debug!(target: "docket::aggregate", "{event}");

        self.handle.aggregate(stages)
    }

    /// Drop this collection. A missing collection is not a failure.
    ///
    /// # Errors
    /// `StoreOperation` on any other non-ok drop status.
    pub fn drop_collection(&self) -> Result<(), Error> {
        self.handle.drop_collection()
    }

    /// # Errors
    /// Store-level failures propagate unmodified.
    pub fn read_primary_only(&self) -> Result<(), Error> {
        self.handle.set_read_preference(ReadPreference::Primary, None)
    }

    /// # Errors
    /// Store-level failures propagate unmodified.
    pub fn read_primary_preferred(&self, tags: Option<&TagSet>) -> Result<(), Error> {
        self.handle.set_read_preference(ReadPreference::PrimaryPreferred, tags.map(Vec::as_slice))
    }

    /// # Errors
    /// Store-level failures propagate unmodified.
    pub fn read_secondary_only(&self, tags: Option<&TagSet>) -> Result<(), Error> {
        self.handle.set_read_preference(ReadPreference::Secondary, tags.map(Vec::as_slice))
    }

    /// # Errors
    /// Store-level failures propagate unmodified.
    pub fn read_secondary_preferred(&self, tags: Option<&TagSet>) -> Result<(), Error> {
        self.handle.set_read_preference(ReadPreference::SecondaryPreferred, tags.map(Vec::as_slice))
    }

    /// # Errors
    /// Store-level failures propagate unmodified.
    pub fn read_nearest(&self, tags: Option<&TagSet>) -> Result<(), Error> {
        self.handle.set_read_preference(ReadPreference::Nearest, tags.map(Vec::as_slice))
    }

    /// # Errors
    /// `StoreOperation` when the concern cannot be applied.
    pub fn set_write_concern(&self, concern: WriteConcern) -> Result<(), Error> {
        self.handle.set_write_concern(concern)
    }

    /// # Errors
    /// `StoreOperation` when the concern cannot be applied.
    pub fn set_majority_write_concern(&self) -> Result<(), Error> {
        self.set_write_concern(WriteConcern::Majority)
    }

    /// # Errors
    /// `StoreOperation` when the concern cannot be applied.
    pub fn set_unacknowledged_write_concern(&self) -> Result<(), Error> {
        self.set_write_concern(WriteConcern::Unacknowledged)
    }
}
