//! MongoDB driver binding built on the `mongodb` crate.

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{doc, Document};
use futures::TryStreamExt;
use mongodb::options::{ClientOptions, Credential, FindOptions, ServerAddress};
use mongodb::{Client, Collection, Database};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, instrument};

use entitystore_common::{ConnectionError, Result, StoreError};

use super::driver::{Connector, Credentials, DocumentDriver};
use crate::core::ConnectOptions;

const APP_NAME: &str = "entitystore";

fn backend(e: &mongodb::error::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Default vendor: connects to MongoDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoConnector;

#[async_trait]
impl Connector for MongoConnector {
    async fn create(&self, location: &str, options: &ConnectOptions) -> Result<Arc<dyn DocumentDriver>> {
        let mut client_options =
            if location.starts_with("mongodb://") || location.starts_with("mongodb+srv://") {
                ClientOptions::parse(location)
                    .await
                    .map_err(|e| ConnectionError::ConnectionFailed(e.to_string()))?
            } else {
                let address = ServerAddress::parse(format!("{}:{}", options.host(), options.port()))
                    .map_err(|e| ConnectionError::ConnectionFailed(e.to_string()))?;
                ClientOptions::builder().hosts(vec![address]).build()
            };
        client_options.app_name = Some(APP_NAME.to_string());

        let driver = MongoDriver::new(client_options, options.database_name())?;
        Ok(Arc::new(driver))
    }

    fn vendor_name(&self) -> &'static str {
        "mongodb"
    }
}

/// One MongoDB database.
///
/// The client is swapped for an authenticated one by
/// [`DocumentDriver::authenticate`].
pub struct MongoDriver {
    options: ClientOptions,
    database_name: String,
    client: RwLock<Client>,
}

impl MongoDriver {
    /// Build the client; no connection is made until [`DocumentDriver::open`]
    pub fn new(options: ClientOptions, database_name: &str) -> Result<Self> {
        let client = Client::with_options(options.clone())
            .map_err(|e| ConnectionError::ConnectionFailed(e.to_string()))?;
        Ok(Self {
            options,
            database_name: database_name.to_string(),
            client: RwLock::new(client),
        })
    }

    fn database(&self) -> Database {
        self.client.read().database(&self.database_name)
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database().collection::<Document>(name)
    }
}

#[async_trait]
impl DocumentDriver for MongoDriver {
    #[instrument(skip(self), fields(database = %self.database_name))]
    async fn open(&self) -> Result<()> {
        self.database()
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| ConnectionError::ConnectionFailed(e.to_string()))?;
        debug!("MongoDB ping succeeded");
        Ok(())
    }

    #[instrument(skip(self, credentials), fields(user = %credentials.user_name, source = %credentials.source))]
    async fn authenticate(&self, credentials: &Credentials) -> Result<()> {
        let mut credential = Credential::default();
        credential.username = Some(credentials.user_name.clone());
        credential.password = credentials.password.clone();
        credential.source = Some(credentials.source.clone());

        let mut options = self.options.clone();
        options.credential = Some(credential);
        let client = Client::with_options(options)
            .map_err(|e| ConnectionError::AuthenticationFailed(e.to_string()))?;

        // the handshake authenticates on the first command
        client
            .database(&credentials.source)
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| ConnectionError::AuthenticationFailed(e.to_string()))?;

        *self.client.write() = client;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let client = self.client.read().clone();
        client.shutdown().await;
        Ok(())
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<ObjectId> {
        let result = self
            .collection(collection)
            .insert_one(document, None)
            .await
            .map_err(|e| backend(&e))?;
        result.inserted_id.as_object_id().ok_or_else(|| {
            StoreError::Backend(format!("unexpected inserted id: {}", result.inserted_id)).into()
        })
    }

    async fn replace_one(&self, collection: &str, id: ObjectId, document: Document) -> Result<u64> {
        let result = self
            .collection(collection)
            .replace_one(doc! { "_id": id }, document, None)
            .await
            .map_err(|e| backend(&e))?;
        Ok(result.matched_count)
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
        Ok(self
            .collection(collection)
            .find_one(filter, None)
            .await
            .map_err(|e| backend(&e))?)
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64> {
        let result = self
            .collection(collection)
            .delete_one(filter, None)
            .await
            .map_err(|e| backend(&e))?;
        Ok(result.deleted_count)
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        sort: Option<Document>,
    ) -> Result<Vec<Document>> {
        let options = FindOptions::builder().sort(sort).build();
        let cursor = self
            .collection(collection)
            .find(filter, options)
            .await
            .map_err(|e| backend(&e))?;
        let documents: Vec<Document> = cursor.try_collect().await.map_err(|e| backend(&e))?;
        Ok(documents)
    }
}
