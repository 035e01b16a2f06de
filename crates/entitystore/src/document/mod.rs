//! Document-database backend.
//!
//! [`DocumentStore`] drives a [`DocumentDriver`] through the identity
//! resolver, the entity mapper, the filter translator and the result
//! materializer. One collection per model type.

mod driver;
mod mongo;

pub use driver::{Connector, Credentials, DocumentDriver};
pub use mongo::{MongoConnector, MongoDriver};

use async_trait::async_trait;
use bson::doc;
use std::time::Instant;
use tracing::{debug, instrument};

use entitystore_common::config::StoreSettings;
use entitystore_common::metrics::{record_operation, record_rows_materialized, Outcome};
use entitystore_common::{PreconditionError, Result, StoreError};

use crate::connection::{self, ConnectionManager, ConnectionState};
use crate::core::{Capabilities, ConnectOptions, Filter, Operation, Order, Store};
use crate::entity::Entity;
use crate::identity::{self, Intent, PRIMARY_KEY};
use crate::list::EntityCollection;
use crate::mapper::{entity_to_document, populate_entity, IdentityWrite};
use crate::materializer::materialize;
use crate::translator::{translate_filter, translate_order};

const STORE_TYPE: &str = "DocumentStore";

/// Store backed by a document database.
///
/// Construction never performs I/O. When a shared connection has been
/// published by an earlier `connect` with `keep_connection`, the new store
/// adopts it and starts ready.
pub struct DocumentStore {
    settings: StoreSettings,
    name: String,
    connection: ConnectionManager,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(StoreSettings::with_store_type(STORE_TYPE))
    }

    #[must_use]
    pub fn with_settings(settings: StoreSettings) -> Self {
        let name = settings.display_name();
        Self {
            settings,
            name,
            connection: ConnectionManager::new(),
        }
    }

    /// Build from loose settings; unknown keys are rejected.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Ok(Self::with_settings(StoreSettings::from_pairs(STORE_TYPE, pairs)?))
    }

    #[must_use]
    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Withdraw the process-wide shared connection, if one is published.
    ///
    /// Returns whether there was one. Stores constructed afterwards start
    /// unconnected; stores already holding the connection keep working.
    pub async fn release_shared_connection() -> bool {
        connection::release_shared_connection().await
    }

    fn finish<T>(&self, operation: Operation, started: Instant, result: Result<T>) -> Result<T> {
        record_operation(&self.settings.store_type, operation.as_str(), Outcome::of(&result), started);
        if let Err(e) = &result {
            debug!(store = %self.name, operation = operation.as_str(), "Operation failed: {}", e);
        }
        result
    }

    async fn put(&self, entity: &mut Entity) -> Result<()> {
        entity.ensure_valid()?;
        let driver = self.connection.driver_for(Operation::PutModel)?;

        let target = match identity::resolve(entity) {
            Intent::Create => None,
            Intent::Update(id) => Some(identity::to_native(id)?),
            Intent::Malformed => return Err(identity::malformed(Operation::PutModel).into()),
        };
        let document = entity_to_document(entity)?;
        let collection = entity.model_type.clone();

        let identity_write = match target {
            None => {
                let id = driver.insert_one(&collection, document.clone()).await?;
                debug!(collection = %collection, id = %id, "Inserted document");
                IdentityWrite::Assign(id)
            }
            Some(id) => {
                let matched = driver.replace_one(&collection, id, document.clone()).await?;
                if matched == 0 {
                    return Err(StoreError::ModelNotFound.into());
                }
                debug!(collection = %collection, id = %id, "Replaced document");
                IdentityWrite::Keep
            }
        };
        populate_entity(entity, &document, identity_write)?;
        Ok(())
    }

    async fn get(&self, entity: &mut Entity) -> Result<()> {
        entity.ensure_valid()?;
        if entity.identity().is_empty() {
            return Err(PreconditionError::IdNotSet.into());
        }
        let driver = self.connection.driver_for(Operation::GetModel)?;

        let id = match identity::resolve(entity) {
            Intent::Update(id) => identity::to_native(id)?,
            _ => return Err(identity::malformed(Operation::GetModel).into()),
        };
        let collection = entity.model_type.clone();

        let document = driver
            .find_one(&collection, doc! { PRIMARY_KEY: id })
            .await?
            .ok_or(StoreError::ModelNotFound)?;
        populate_entity(entity, &document, IdentityWrite::FromDocument)?;
        Ok(())
    }

    async fn delete(&self, entity: &mut Entity) -> Result<()> {
        entity.ensure_valid()?;
        let driver = self.connection.driver_for(Operation::DeleteModel)?;

        let id = match identity::resolve(entity) {
            Intent::Update(id) => identity::to_native(id)?,
            _ => return Err(identity::malformed(Operation::DeleteModel).into()),
        };
        let collection = entity.model_type.clone();

        let deleted = driver.delete_one(&collection, doc! { PRIMARY_KEY: id }).await?;
        if deleted == 0 {
            return Err(StoreError::IdNotFound.into());
        }
        debug!(collection = %collection, id = %id, "Deleted document");
        entity.set_identity(crate::core::Value::Null);
        Ok(())
    }

    async fn list(
        &self,
        list: &mut EntityCollection,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<()> {
        list.model().ensure_valid()?;
        list.clear();
        let driver = self.connection.driver_for(Operation::GetList)?;

        let query = translate_filter(list.model(), filter)?;
        let sort = order
            .filter(|o| !o.is_empty())
            .map(|o| translate_order(list.model(), o));
        let collection = list.model().model_type.clone();

        let documents = driver.find(&collection, query, sort).await?;
        let rows = materialize(list, &documents)?;
        record_rows_materialized(&self.settings.store_type, rows);
        debug!(collection = %collection, rows, "Loaded list");
        Ok(())
    }
}

#[async_trait]
impl Store for DocumentStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn store_type(&self) -> &str {
        &self.settings.store_type
    }

    fn capabilities(&self) -> Capabilities {
        self.connection.capabilities()
    }

    #[instrument(skip(self, options), fields(store = %self.name))]
    async fn connect(&self, location: &str, options: Option<ConnectOptions>) -> Result<()> {
        self.connection.connect(location, options).await
    }

    #[instrument(skip(self, entity), fields(store = %self.name, model = %entity.model_type))]
    async fn put_model(&self, entity: &mut Entity) -> Result<()> {
        let started = Instant::now();
        let result = self.put(entity).await;
        self.finish(Operation::PutModel, started, result)
    }

    #[instrument(skip(self, entity), fields(store = %self.name, model = %entity.model_type))]
    async fn get_model(&self, entity: &mut Entity) -> Result<()> {
        let started = Instant::now();
        let result = self.get(entity).await;
        self.finish(Operation::GetModel, started, result)
    }

    #[instrument(skip(self, entity), fields(store = %self.name, model = %entity.model_type))]
    async fn delete_model(&self, entity: &mut Entity) -> Result<()> {
        let started = Instant::now();
        let result = self.delete(entity).await;
        self.finish(Operation::DeleteModel, started, result)
    }

    #[instrument(skip_all, fields(store = %self.name, model = %list.model().model_type))]
    async fn get_list(
        &self,
        list: &mut EntityCollection,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<()> {
        let started = Instant::now();
        let result = self.list(list, filter, order).await;
        self.finish(Operation::GetList, started, result)
    }
}
