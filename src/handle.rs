use bson::{Bson, Document};

use crate::errors::Error;
use crate::types::{ReadPreference, SortSpec, WriteConcern};

/// Options for the store's atomic find-and-modify command.
#[derive(Debug, Clone, Default)]
pub struct FindAndModifyOptions {
    /// Delete the matched document instead of updating it.
    pub remove: bool,
    /// Return the post-update document rather than the pre-update one.
    pub new: bool,
    /// Insert a new document when nothing matches.
    pub upsert: bool,
    /// Selects which document is modified when several match.
    pub sort: Vec<SortSpec>,
}

/// One open server-side cursor. Shaping calls must be applied in the order
/// they are issued; `rewind` performs the initial fetch and each `advance`
/// may fetch further batches as dictated by the underlying driver.
pub trait StoreCursor: Send {
    fn skip(&mut self, n: u64);
    fn limit(&mut self, n: u64);
    fn sort(&mut self, sort: &[SortSpec]);
    fn set_read_preference(&mut self, preference: ReadPreference, tags: Option<&[Document]>);
    fn rewind(&mut self);
    fn advance(&mut self) -> Option<Document>;
}

/// The narrow capability a store driver exposes per collection. Everything
/// this layer does goes through one of these; connection management,
/// retries and timeouts live behind it.
pub trait CollectionHandle: Send + Sync {
    fn name(&self) -> String;

    fn find(&self, condition: &Document, projection: &Document) -> Box<dyn StoreCursor>;

    fn count(
        &self,
        condition: &Document,
        limit: Option<u64>,
        skip: Option<u64>,
    ) -> Result<u64, Error>;

    fn find_one(
        &self,
        condition: &Document,
        projection: &Document,
    ) -> Result<Option<Document>, Error>;

    fn find_and_modify(
        &self,
        condition: &Document,
        update: Option<&Document>,
        projection: &Document,
        options: &FindAndModifyOptions,
    ) -> Result<Option<Document>, Error>;

    fn aggregate(&self, pipeline: &[Document]) -> Result<Vec<Document>, Error>;

    fn distinct(&self, field: &str, condition: Option<&Document>) -> Result<Vec<Bson>, Error>;

    fn insert_batch(&self, records: &[Document]) -> Result<(), Error>;

    /// Applies `update` to every matching document; returns the match count.
    fn update_many(&self, condition: &Document, update: &Document) -> Result<u64, Error>;

    /// Removes every matching document; returns the removal count.
    fn remove(&self, condition: &Document) -> Result<u64, Error>;

    fn drop_collection(&self) -> Result<(), Error>;

    fn set_read_preference(
        &self,
        preference: ReadPreference,
        tags: Option<&[Document]>,
    ) -> Result<(), Error>;

    fn set_write_concern(&self, concern: WriteConcern) -> Result<(), Error>;
}
