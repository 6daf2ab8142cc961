use std::sync::Arc;

use bson::Document;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::Error;
use crate::expression::Expression;
use crate::handle::CollectionHandle;
use crate::query::builder::Query;
use crate::types::SortSpec;

/// Cursor-shaping operations a snapshot cannot answer locally. Every
/// forwardable operation is listed here explicitly; implementations hand
/// the call to a freshly built query view and never touch the snapshot.
pub trait CursorShape<M> {
    /// A fresh, independently iterable query over the same condition,
    /// ordered by `sort` and offset by the forwarding cursor's position.
    fn sort(&self, sort: Vec<SortSpec>) -> Query<M>;
}

/// Eager counterpart of [`Cursor`](crate::query::Cursor): snapshots every
/// matching record into memory at construction time. One round trip buys
/// unlimited cheap re-iteration; the snapshot does not observe store
/// mutations made after it was taken.
pub struct CachedResultSet<M> {
    handle: Arc<dyn CollectionHandle>,
    expression: Expression,
    records: Vec<M>,
    position: usize,
}

impl<M: DeserializeOwned> CachedResultSet<M> {
    /// Runs the query and snapshots all matching records.
    ///
    /// # Errors
    /// Store-level failures and record decode failures.
    pub fn new(handle: Arc<dyn CollectionHandle>, expression: Expression) -> Result<Self, Error> {
        let records = Query::new(handle.clone()).query(&expression).find_all()?;
        Ok(Self { handle, expression, records, position: 0 })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Element 0 of the snapshot, independent of the current position.
    #[must_use]
    pub fn first(&self) -> Option<&M> {
        self.records.first()
    }

    #[must_use]
    pub fn current(&self) -> Option<&M> {
        self.records.get(self.position)
    }

    #[must_use]
    pub fn key(&self) -> usize {
        self.position
    }

    pub fn next(&mut self) {
        self.position += 1;
    }

    #[must_use]
    pub fn valid(&self) -> bool {
        self.position < self.records.len()
    }

    /// Reset the position to 0. Purely local; no new fetch happens.
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    pub fn iter(&self) -> std::slice::Iter<'_, M> {
        self.records.iter()
    }

    /// The raw snapshot.
    #[must_use]
    pub fn records(&self) -> &[M] {
        &self.records
    }

    fn fresh_view(&self) -> Query<M> {
        let mut query = Query::new(self.handle.clone()).query(&self.expression);
        if self.position > 0 {
            query = query.skip(self.position as u64);
        }
        query
    }
}

impl<M: Serialize> CachedResultSet<M> {
    /// Each snapshot element run through its own structured-attribute
    /// extraction.
    ///
    /// # Errors
    /// Record encode failures.
    pub fn to_documents(&self) -> Result<Vec<Document>, Error> {
        self.records
            .iter()
            .map(|record| bson::serialize_to_document(record).map_err(Error::from))
            .collect()
    }

    /// JSON array assembled from each element's own serialized form,
    /// joined into a single array literal.
    ///
    /// # Errors
    /// Record encode failures.
    pub fn to_json(&self) -> Result<String, Error> {
        let mut parts = Vec::with_capacity(self.records.len());
        for record in &self.records {
            parts.push(serde_json::to_string(record)?);
        }
        Ok(format!("[{}]", parts.join(",")))
    }
}

impl<M: DeserializeOwned> CursorShape<M> for CachedResultSet<M> {
    fn sort(&self, sort: Vec<SortSpec>) -> Query<M> {
        self.fresh_view().sort(sort)
    }
}

impl<'a, M> IntoIterator for &'a CachedResultSet<M> {
    type Item = &'a M;
    type IntoIter = std::slice::Iter<'a, M>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
