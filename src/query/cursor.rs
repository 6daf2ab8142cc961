use std::marker::PhantomData;

use bson::{Bson, Document};
use serde::de::DeserializeOwned;

use crate::errors::Error;
use crate::handle::StoreCursor;

/// Lazy, single-pass sequence of decoded records backed by one open
/// server-side cursor. Each advance may perform a network fetch; restarting
/// requires re-materializing the query.
pub struct Cursor<M> {
    inner: Box<dyn StoreCursor>,
    position: u64,
    _record: PhantomData<fn() -> M>,
}

impl<M: DeserializeOwned> Cursor<M> {
    pub(crate) fn new(inner: Box<dyn StoreCursor>) -> Self {
        Self { inner, position: 0, _record: PhantomData }
    }

    /// Advance and return the next record together with its iteration key:
    /// the record's `_id` when present, the position otherwise.
    pub fn next_entry(&mut self) -> Option<Result<(String, M), Error>> {
        let record = self.inner.advance()?;
        let key = record_key(&record, self.position);
        self.position += 1;
        Some(bson::deserialize_from_document(record).map(|m| (key, m)).map_err(Error::from))
    }
}

impl<M: DeserializeOwned> Iterator for Cursor<M> {
    type Item = Result<M, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().map(|entry| entry.map(|(_, record)| record))
    }
}

fn record_key(record: &Document, position: u64) -> String {
    match record.get("_id") {
        Some(Bson::ObjectId(id)) => id.to_hex(),
        Some(Bson::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => position.to_string(),
    }
}
