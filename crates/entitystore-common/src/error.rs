//! Error types for EntityStore
//!
//! Two classes of failure leave a store operation:
//! - **Precondition faults** ([`PreconditionError`]) are raised before any
//!   backend I/O and indicate a broken call site.
//! - **Operational faults** ([`StoreError`], [`ConnectionError`]) come back
//!   from the backend or from the domain rules of the adapter.

use thiserror::Error;

/// Result type alias using EntityStore's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for EntityStore
#[derive(Error, Debug)]
pub enum Error {
    // Call-site faults
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    // Domain and backend faults
    #[error(transparent)]
    Store(#[from] StoreError),

    // Connection lifecycle faults
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    // Configuration Errors
    #[error("Configuration error: {0}")]
    Config(String),

    // IO Errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Internal Errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for faults raised before any backend call was attempted.
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::Precondition(_))
    }

    /// True for the domain-level "not found" faults of read and delete.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::Store(StoreError::ModelNotFound | StoreError::IdNotFound)
        )
    }
}

/// Faults detected synchronously at the call site
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("model has validation errors")]
    ValidationFailed(Vec<String>),

    #[error("ID not set")]
    IdNotSet,

    #[error("error creating Store: invalid property: {0}")]
    InvalidProperty(String),

    #[error("error creating Store: multiple errors")]
    MultipleInvalidProperties(Vec<String>),

    #[error("argument must be a location or a configured host")]
    InvalidLocation,
}

/// Operational faults reported by store operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("model not found in store")]
    ModelNotFound,

    #[error("id not found in store")]
    IdNotFound,

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("unsupported value for field {field}: {kind}")]
    UnsupportedValue { field: String, kind: String },

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Connection lifecycle faults
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("store is not ready for {0}")]
    NotReady(&'static str),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
