// In-process store backend: the bundled implementation of the
// collection-handle capability, used by the integration tests and by
// embeddings that need no external server. No persistence, no indexes.

mod collection;
mod cursor;
mod eval;
mod update;

pub use collection::MemCollection;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::client::Connector;
use crate::errors::Error;
use crate::handle::CollectionHandle;

/// Hands out in-memory collection handles keyed by database and collection
/// name, pooled for the store's lifetime.
#[derive(Default)]
pub struct MemStore {
    collections: RwLock<HashMap<(String, String), Arc<MemCollection>>>,
}

impl MemStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_collection(&self, database: &str, name: &str) -> Arc<MemCollection> {
        let key = (database.to_string(), name.to_string());
        if let Some(collection) = self.collections.read().get(&key) {
            return collection.clone();
        }
        let collection = Arc::new(MemCollection::new(name));
        self.collections.write().insert(key, collection.clone());
        collection
    }
}

impl Connector for MemStore {
    fn collection(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<Arc<dyn CollectionHandle>, Error> {
        Ok(self.get_collection(database, collection))
    }
}
