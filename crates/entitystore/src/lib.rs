//! # EntityStore
//!
//! Persists generic attribute-based entities through one uniform store
//! contract, backed either by process memory or by a document database.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Store contract                           │
//! │   connect │ put_model │ get_model │ delete_model │ get_list  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Identity resolver │ Entity mapper │ Filter/order translator │
//! │                   Result materializer                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │   MemoryStore        │   DocumentStore + DocumentDriver      │
//! │                      │   (MongoDB via the `mongodb` crate)   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use entitystore::{AttributeType, DocumentStore, Entity, Store};
//!
//! let store = DocumentStore::new();
//! store.connect("mongodb://127.0.0.1:27017", None).await?;
//!
//! let mut person = Entity::new("Person")
//!     .with_attribute("name", AttributeType::String)
//!     .with_value("name", "Alice");
//! store.put_model(&mut person).await?;
//! assert!(person.identity().as_str().is_some());
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod connection;
pub mod core;
pub mod document;
pub mod entity;
pub mod identity;
pub mod list;
pub mod mapper;
pub mod materializer;
pub mod memory;
pub mod translator;

pub use crate::core::{
    Capabilities, ConnectOptions, Filter, Operation, Order, SortDirection, Store, Value,
};
pub use connection::{ConnectionManager, ConnectionState};
pub use document::{Connector, Credentials, DocumentDriver, DocumentStore, MongoConnector};
pub use entity::{Attribute, AttributeType, Entity, ID_ATTRIBUTE};
pub use list::EntityCollection;
pub use memory::MemoryStore;

pub use entitystore_common::{ConnectionError, Error, PreconditionError, Result, StoreError};
