use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::client::Connector;
use crate::collection::Collection;
use crate::errors::Error;

/// A named database: a lazily filled pool of collection facades, each built
/// through the owning client's connector.
pub struct Database {
    name: String,
    connector: Arc<dyn Connector>,
    collections: RwLock<HashMap<String, Collection>>,
}

impl Database {
    pub(crate) fn new(connector: Arc<dyn Connector>, name: impl Into<String>) -> Self {
        Self { name: name.into(), connector, collections: RwLock::new(HashMap::new()) }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The collection facade for `name`, pooled per database.
    ///
    /// # Errors
    /// `Configuration` when the connector cannot resolve the collection.
    pub fn collection(&self, name: &str) -> Result<Collection, Error> {
        if let Some(collection) = self.collections.read().get(name) {
            return Ok(collection.clone());
        }
        let handle = self.connector.collection(&self.name, name)?;
        let collection = Collection::new(handle);
        self.collections.write().insert(name.to_string(), collection.clone());
        Ok(collection)
    }
}
