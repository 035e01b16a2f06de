//! Core types and the store contract.
//!
//! Every backend implements [`Store`]. Operations take the caller's entity or
//! collection by mutable reference and write results through it in place;
//! completion is the resolution of the returned future, which yields exactly
//! one `Ok` or one `Err`. Nothing runs until the future is polled, so no
//! backend ever completes before the call has returned.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use entitystore_common::config::ConnectionSettings;
use entitystore_common::{ConnectionError, Result};

use crate::document::{Connector, Credentials};
use crate::entity::Entity;
use crate::list::EntityCollection;

/// Scalar attribute value.
///
/// Identity values travel as strings; backends convert them to their native
/// reference type internally.
///
/// # Example
///
/// ```rust
/// use entitystore::Value;
///
/// let name = Value::from("Alice");
/// let age = Value::from(30);
/// assert!(Value::Null.is_empty());
/// assert!(Value::from("").is_empty());
/// assert!(!age.is_empty());
/// assert_eq!(name.as_str(), Some("Alice"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// Absent value
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Point in time
    Date(DateTime<Utc>),
}

impl Value {
    /// Check if the value is null
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null or the empty string
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Try to get as boolean
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as integer
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    /// Try to get as float
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as date
    #[must_use]
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Get the type name for error messages
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Date(_) => "date",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Date(d) => write!(f, "{}", d.to_rfc3339()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Date(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Store operations gated by capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetModel,
    PutModel,
    DeleteModel,
    GetList,
}

impl Operation {
    /// Name used in errors, logs and metric labels
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::GetModel => "getModel",
            Operation::PutModel => "putModel",
            Operation::DeleteModel => "deleteModel",
            Operation::GetList => "getList",
        }
    }
}

/// Which operations a store instance currently permits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Capabilities {
    pub is_ready: bool,
    pub can_get_model: bool,
    pub can_put_model: bool,
    pub can_delete_model: bool,
    pub can_get_list: bool,
}

impl Capabilities {
    /// Everything permitted
    #[must_use]
    pub fn ready() -> Self {
        Self {
            is_ready: true,
            can_get_model: true,
            can_put_model: true,
            can_delete_model: true,
            can_get_list: true,
        }
    }

    /// Nothing permitted
    #[must_use]
    pub fn unconnected() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn allows(&self, operation: Operation) -> bool {
        self.is_ready
            && match operation {
                Operation::GetModel => self.can_get_model,
                Operation::PutModel => self.can_put_model,
                Operation::DeleteModel => self.can_delete_model,
                Operation::GetList => self.can_get_list,
            }
    }

    /// Reject `operation` unless permitted
    pub fn require(&self, operation: Operation) -> Result<()> {
        if self.allows(operation) {
            Ok(())
        } else {
            Err(ConnectionError::NotReady(operation.as_str()).into())
        }
    }
}

/// Attribute name to match value.
///
/// For `Date` attributes the value selects a whole local calendar day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    entries: BTreeMap<String, Value>,
}

impl Filter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(name.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Filter {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut filter = Filter::new();
        for (k, v) in iter {
            filter.insert(k, v);
        }
        filter
    }
}

/// Sort direction of an order key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// Backend-native direction (`1` / `-1`)
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }

    /// Negative numbers sort descending, everything else ascending
    #[must_use]
    pub fn from_i32(direction: i32) -> Self {
        if direction < 0 {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        }
    }
}

/// Ordered sort keys; earlier keys take precedence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Order {
    keys: Vec<(String, SortDirection)>,
}

impl Order {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ascending(self, name: impl Into<String>) -> Self {
        self.by(name, SortDirection::Ascending)
    }

    #[must_use]
    pub fn descending(self, name: impl Into<String>) -> Self {
        self.by(name, SortDirection::Descending)
    }

    #[must_use]
    pub fn by(mut self, name: impl Into<String>, direction: SortDirection) -> Self {
        self.keys.push((name.into(), direction));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SortDirection)> {
        self.keys.iter().map(|(k, d)| (k.as_str(), *d))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Options recognised by [`Store::connect`].
///
/// Unset fields fall back to the defaults of
/// [`ConnectionSettings`]. `vendor` selects the driver implementation; when
/// absent the shared connection's vendor (if any) or the MongoDB driver is
/// used.
#[derive(Clone, Default)]
pub struct ConnectOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database_name: Option<String>,
    pub user_name: Option<String>,
    pub password: Option<String>,
    pub authdb: Option<String>,
    pub keep_connection: bool,
    pub vendor: Option<Arc<dyn Connector>>,
}

impl ConnectOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_vendor(mut self, vendor: Arc<dyn Connector>) -> Self {
        self.vendor = Some(vendor);
        self
    }

    #[must_use]
    pub fn keep_connection(mut self, keep: bool) -> Self {
        self.keep_connection = keep;
        self
    }

    #[must_use]
    pub fn with_database(mut self, database_name: impl Into<String>) -> Self {
        self.database_name = Some(database_name.into());
        self
    }

    #[must_use]
    pub fn with_credentials(
        mut self,
        user_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.user_name = Some(user_name.into());
        self.password = Some(password.into());
        self
    }

    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or("127.0.0.1")
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(27017)
    }

    pub fn database_name(&self) -> &str {
        self.database_name.as_deref().unwrap_or("entitystore")
    }

    /// Credentials for the authentication step, if a user name is set
    pub fn credentials(&self) -> Option<Credentials> {
        self.user_name.as_ref().map(|user| Credentials {
            user_name: user.clone(),
            password: self.password.clone(),
            source: self
                .authdb
                .clone()
                .unwrap_or_else(|| self.database_name().to_string()),
        })
    }
}

impl From<&ConnectionSettings> for ConnectOptions {
    fn from(settings: &ConnectionSettings) -> Self {
        Self {
            host: Some(settings.host.clone()),
            port: Some(settings.port),
            database_name: Some(settings.database_name.clone()),
            user_name: settings.user_name.clone(),
            password: settings.password.clone(),
            authdb: settings.authdb.clone(),
            keep_connection: settings.keep_connection,
            vendor: None,
        }
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_name", &self.database_name)
            .field("user_name", &self.user_name)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("authdb", &self.authdb)
            .field("keep_connection", &self.keep_connection)
            .field("vendor", &self.vendor.is_some())
            .finish()
    }
}

/// The contract every storage backend implements.
///
/// # Errors
///
/// Precondition faults ([`entitystore_common::PreconditionError`]) are
/// returned before any backend I/O: failed entity self-validation, or a
/// missing identity on `get_model`. Everything else is an operational fault.
///
/// # Thread Safety
///
/// Stores are `Send + Sync`; independent entities may be read and written
/// concurrently through one ready store.
#[async_trait]
pub trait Store: Send + Sync {
    /// Display name of this instance
    fn name(&self) -> &str;

    /// Backend label, e.g. `MemoryStore`
    fn store_type(&self) -> &str;

    /// Current capability flags
    fn capabilities(&self) -> Capabilities;

    /// Open the backend at `location`.
    async fn connect(&self, location: &str, options: Option<ConnectOptions>) -> Result<()>;

    /// Create (empty identity) or update (string identity) the entity.
    ///
    /// On create the assigned identity is written into the entity.
    async fn put_model(&self, entity: &mut Entity) -> Result<()>;

    /// Load the entity identified by its identity attribute into `entity`.
    async fn get_model(&self, entity: &mut Entity) -> Result<()>;

    /// Remove the entity and clear its identity.
    async fn delete_model(&self, entity: &mut Entity) -> Result<()>;

    /// Replace the contents of `list` with the entities matching `filter`.
    async fn get_list(
        &self,
        list: &mut EntityCollection,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from_primitives() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i64), Value::Integer(42));
        assert_eq!(Value::from(3.5), Value::Float(3.5));
        assert_eq!(Value::from("hello"), Value::String("hello".to_string()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_value_emptiness() {
        assert!(Value::Null.is_empty());
        assert!(Value::String(String::new()).is_empty());
        assert!(!Value::Integer(0).is_empty());
        assert!(!Value::Bool(false).is_empty());
    }

    #[test]
    fn test_capabilities_gate() {
        let caps = Capabilities::unconnected();
        assert!(!caps.allows(Operation::GetList));
        let err = caps.require(Operation::PutModel).unwrap_err();
        assert_eq!(err.to_string(), "Connection error: store is not ready for putModel");

        let caps = Capabilities::ready();
        assert!(caps.require(Operation::DeleteModel).is_ok());

        let partial = Capabilities {
            can_delete_model: false,
            ..Capabilities::ready()
        };
        assert!(partial.allows(Operation::GetModel));
        assert!(!partial.allows(Operation::DeleteModel));
    }

    #[test]
    fn test_order_keeps_insertion_order() {
        let order = Order::new().descending("age").ascending("name");
        let keys: Vec<_> = order.iter().collect();
        assert_eq!(
            keys,
            vec![("age", SortDirection::Descending), ("name", SortDirection::Ascending)]
        );
        assert_eq!(SortDirection::from_i32(-1), SortDirection::Descending);
        assert_eq!(SortDirection::Ascending.as_i32(), 1);
    }

    #[test]
    fn test_connect_options_credentials() {
        let options = ConnectOptions::new().with_database("crm");
        assert!(options.credentials().is_none());
        assert_eq!(options.host(), "127.0.0.1");
        assert_eq!(options.port(), 27017);

        let options = options.with_credentials("admin", "secret");
        let creds = options.credentials().unwrap();
        assert_eq!(creds.user_name, "admin");
        assert_eq!(creds.source, "crm");
        assert!(!format!("{options:?}").contains("secret"));
    }
}
