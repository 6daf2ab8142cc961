use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::collection::Collection;
use crate::database::Database;
use crate::errors::Error;
use crate::handle::CollectionHandle;

/// Produces collection handles for a (database, collection) pair: the seam
/// between this layer and a concrete store driver, bound at compile time.
pub trait Connector: Send + Sync {
    /// # Errors
    /// `Configuration` when the pair cannot be resolved.
    fn collection(&self, database: &str, collection: &str)
    -> Result<Arc<dyn CollectionHandle>, Error>;
}

/// Entry point owning the connector and a database pool. One `Client` is
/// constructed by the process and passed by reference wherever handles are
/// needed; there is no process-wide connection cache.
#[derive(Default)]
pub struct Client {
    connector: Option<Arc<dyn Connector>>,
    databases: RwLock<HashMap<String, Arc<Database>>>,
    current_database: RwLock<Option<String>>,
}

impl Client {
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector: Some(connector),
            databases: RwLock::new(HashMap::new()),
            current_database: RwLock::new(None),
        }
    }

    /// An unconfigured client; a connector must be supplied before any
    /// database can be reached.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self::default()
    }

    pub fn set_connector(&mut self, connector: Arc<dyn Connector>) {
        self.connector = Some(connector);
    }

    fn connector(&self) -> Result<&Arc<dyn Connector>, Error> {
        self.connector
            .as_ref()
            .ok_or_else(|| Error::Configuration("connector not configured".into()))
    }

    /// The database named `name`, pooled per client.
    ///
    /// # Errors
    /// `Configuration` when no connector is configured.
    pub fn database(&self, name: &str) -> Result<Arc<Database>, Error> {
        if let Some(database) = self.databases.read().get(name) {
            return Ok(database.clone());
        }
        let database = Arc::new(Database::new(self.connector()?.clone(), name));
        self.databases.write().insert(name.to_string(), database.clone());
        Ok(database)
    }

    /// Select the database later lookups default to.
    pub fn use_database(&self, name: &str) {
        *self.current_database.write() = Some(name.to_string());
    }

    /// The currently selected database.
    ///
    /// # Errors
    /// `Configuration` when no database has been selected.
    pub fn current_database(&self) -> Result<Arc<Database>, Error> {
        let name = self
            .current_database
            .read()
            .clone()
            .ok_or_else(|| Error::Configuration("database not selected".into()))?;
        self.database(&name)
    }

    /// A collection from the currently selected database.
    ///
    /// # Errors
    /// `Configuration` when no database has been selected or the collection
    /// cannot be resolved.
    pub fn collection(&self, name: &str) -> Result<Collection, Error> {
        self.current_database()?.collection(name)
    }
}
