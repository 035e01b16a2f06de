//! Driver seam of the document backend.
//!
//! The store never speaks a wire protocol itself. It talks to a
//! [`DocumentDriver`] created by a [`Connector`] (the `vendor` connect
//! option); the MongoDB binding lives in [`super::mongo`].

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::Document;
use std::fmt;
use std::sync::Arc;

use entitystore_common::Result;

use crate::core::ConnectOptions;

/// Authentication parameters for [`DocumentDriver::authenticate`].
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_name: String,
    pub password: Option<String>,
    /// Database the user is defined in
    pub source: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_name", &self.user_name)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("source", &self.source)
            .finish()
    }
}

/// An open (or openable) handle on one database.
///
/// Collections are addressed by the entity's model type. Documents carry
/// their primary key under `_id`.
#[async_trait]
pub trait DocumentDriver: Send + Sync {
    /// Establish the connection; the first call that performs network I/O.
    async fn open(&self) -> Result<()>;

    /// Authenticate after a successful open.
    async fn authenticate(&self, credentials: &Credentials) -> Result<()>;

    /// Release the connection.
    async fn close(&self) -> Result<()>;

    /// Insert a document and return its assigned primary key.
    async fn insert_one(&self, collection: &str, document: Document) -> Result<ObjectId>;

    /// Replace the document with primary key `id`; returns the matched count.
    async fn replace_one(&self, collection: &str, id: ObjectId, document: Document) -> Result<u64>;

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>>;

    /// Delete the first match; returns the deleted count.
    async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64>;

    /// All matching documents, sorted when `sort` is given.
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        sort: Option<Document>,
    ) -> Result<Vec<Document>>;
}

/// Factory for drivers.
///
/// `create` must not perform I/O beyond resolving the location; the
/// connection is established by [`DocumentDriver::open`].
#[async_trait]
pub trait Connector: Send + Sync {
    async fn create(&self, location: &str, options: &ConnectOptions) -> Result<Arc<dyn DocumentDriver>>;

    /// Label for logs
    fn vendor_name(&self) -> &'static str;
}
