//! Connection registry and the operation surface the ORM calls.
//!
//! The registry is only written while connections are registered or torn
//! down; steady-state operations look collections up and run against the
//! shared session of their connection.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;

use cassorm_core::{ModelDef, SchemaDescriptor, TableDescription};
use cassorm_proto::{RawQuery, Record};

use crate::collection::{Collection, RecordStream};
use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::session::{Connector, Session};

/// A registered connection: its session and the collections bound to it.
pub struct Connection {
    config: ConnectionConfig,
    session: Arc<dyn Session>,
    collections: HashMap<String, Arc<Collection>>,
}

impl Connection {
    /// Configuration the connection was registered with.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Identities of the registered collections.
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }
}

/// Adapter between the ORM runtime and the store.
pub struct Adapter {
    connector: Arc<dyn Connector>,
    connections: DashMap<String, Arc<Connection>>,
}

impl Adapter {
    /// Create an adapter that opens sessions through `connector`.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            connections: DashMap::new(),
        }
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Compile the models, connect and synchronise schemas.
    ///
    /// Models are compiled before connecting, so a bad model or a model
    /// given twice never opens a session.
    pub async fn register_connection(
        &self,
        config: ConnectionConfig,
        models: &[ModelDef],
    ) -> Result<()> {
        let identity = config.validate()?.to_string();
        if self.connections.contains_key(&identity) {
            return Err(Error::IdentityDuplicate(identity));
        }

        let schemas = models
            .iter()
            .map(SchemaDescriptor::compile)
            .collect::<cassorm_core::Result<Vec<_>>>()?;
        let mut identities = HashSet::with_capacity(schemas.len());
        for schema in &schemas {
            if !identities.insert(schema.identity()) {
                return Err(cassorm_core::Error::Schema(format!(
                    "model '{}' is given twice for connection '{}'",
                    schema.identity(),
                    identity
                ))
                .into());
            }
        }

        let session = self.connector.connect(&config).await?;

        let mut collections = HashMap::with_capacity(schemas.len());
        for schema in schemas {
            let collection = Collection::from_schema(schema, session.clone());
            if let Err(e) = collection.migrate(config.migrate).await {
                shutdown_quietly(&identity, session.as_ref()).await;
                return Err(e);
            }
            collections.insert(collection.schema().identity().to_string(), Arc::new(collection));
        }

        let connection = Arc::new(Connection {
            config,
            session: session.clone(),
            collections,
        });

        // Another registration may have won the race while we connected.
        let inserted = match self.connections.entry(identity.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(connection);
                true
            }
        };
        if !inserted {
            shutdown_quietly(&identity, session.as_ref()).await;
            return Err(Error::IdentityDuplicate(identity));
        }

        tracing::info!(
            connection = %identity,
            collections = models.len(),
            "connection registered"
        );
        Ok(())
    }

    /// Shut down one connection, or every connection when `identity` is
    /// `None`. Unknown identities are ignored.
    pub async fn teardown(&self, identity: Option<&str>) -> Result<()> {
        let identities: Vec<String> = match identity {
            Some(id) => vec![id.to_string()],
            None => self.connections.iter().map(|e| e.key().clone()).collect(),
        };

        let mut first_error = None;
        for id in identities {
            let Some((_, connection)) = self.connections.remove(&id) else {
                continue;
            };
            match connection.session.shutdown().await {
                Ok(()) => tracing::info!(connection = %id, "connection closed"),
                Err(e) if e.is_absent() => {}
                Err(e) => {
                    tracing::warn!(connection = %id, error = %e, "shutdown failed");
                    first_error.get_or_insert(Error::Store(e));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Look up a registered collection.
    pub fn collection(&self, connection: &str, collection: &str) -> Result<Arc<Collection>> {
        let entry = self
            .connections
            .get(connection)
            .ok_or_else(|| Error::InvalidConnection(connection.to_string()))?;
        entry
            .collections
            .get(collection)
            .cloned()
            .ok_or_else(|| Error::CollectionNotRegistered {
                connection: connection.to_string(),
                collection: collection.to_string(),
            })
    }

    /// Describe the live table.
    pub async fn describe(&self, connection: &str, collection: &str) -> Result<Option<TableDescription>> {
        self.collection(connection, collection)?.describe().await
    }

    /// Create the table and its indexes.
    pub async fn define(&self, connection: &str, collection: &str) -> Result<()> {
        self.collection(connection, collection)?.define().await
    }

    /// Drop the table; absence is not an error.
    pub async fn drop(&self, connection: &str, collection: &str) -> Result<()> {
        self.collection(connection, collection)?.drop_table().await
    }

    /// Insert one record.
    pub async fn create(&self, connection: &str, collection: &str, record: Record) -> Result<Record> {
        self.collection(connection, collection)?.create(record).await
    }

    /// Insert several records in one batch.
    pub async fn create_each(
        &self,
        connection: &str,
        collection: &str,
        records: Vec<Record>,
    ) -> Result<Vec<Record>> {
        let collection = self.collection(connection, collection)?;
        collection.create_each(records).await
    }

    /// Find records matching ORM criteria.
    pub async fn find(&self, connection: &str, collection: &str, criteria: &Value) -> Result<Vec<Record>> {
        let collection = self.collection(connection, collection)?;
        let criteria = collection.criteria(criteria)?;
        collection.find(&criteria).await
    }

    /// Count records matching ORM criteria.
    pub async fn count(&self, connection: &str, collection: &str, criteria: &Value) -> Result<u64> {
        let collection = self.collection(connection, collection)?;
        let criteria = collection.criteria(criteria)?;
        collection.count(&criteria).await
    }

    /// Update records matching ORM criteria.
    pub async fn update(
        &self,
        connection: &str,
        collection: &str,
        criteria: &Value,
        values: &Record,
    ) -> Result<Vec<Record>> {
        let collection = self.collection(connection, collection)?;
        let criteria = collection.criteria(criteria)?;
        collection.update(&criteria, values).await
    }

    /// Delete records matching ORM criteria and return their keys.
    pub async fn destroy(&self, connection: &str, collection: &str, criteria: &Value) -> Result<Vec<Record>> {
        let collection = self.collection(connection, collection)?;
        let criteria = collection.criteria(criteria)?;
        collection.destroy(&criteria).await
    }

    /// Stream records matching ORM criteria.
    pub async fn stream(&self, connection: &str, collection: &str, criteria: &Value) -> Result<RecordStream> {
        let collection = self.collection(connection, collection)?;
        let criteria = collection.criteria(criteria)?;
        collection.stream(&criteria).await
    }

    /// Push records matching ORM criteria into a channel.
    pub async fn stream_to(
        &self,
        connection: &str,
        collection: &str,
        criteria: &Value,
        sink: mpsc::Sender<Record>,
    ) -> Result<usize> {
        let collection = self.collection(connection, collection)?;
        let criteria = collection.criteria(criteria)?;
        collection.stream_to(&criteria, sink).await
    }

    /// Run caller-supplied statements on a collection's connection.
    pub async fn query(&self, connection: &str, collection: &str, raw: RawQuery) -> Result<Vec<Record>> {
        self.collection(connection, collection)?.query(raw).await
    }
}

async fn shutdown_quietly(identity: &str, session: &dyn Session) {
    if let Err(e) = session.shutdown().await {
        tracing::warn!(connection = %identity, error = %e, "shutdown after failed registration");
    }
}
