//! Connection state management for the document backend.
//!
//! ```text
//! Unconnected ──connect──▶ Connecting ──ok──▶ Ready
//!                              │
//!                              └──err──▶ Failed ──connect──▶ Connecting
//! ```
//!
//! A successful connect with `keep_connection` publishes the driver as the
//! process-wide shared connection. Managers built while one is published
//! adopt it and start `Ready`. Connects are serialized process-wide, so
//! publication is a single critical section.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

use entitystore_common::{PreconditionError, Result};

use crate::core::{Capabilities, ConnectOptions, Operation};
use crate::document::{Connector, DocumentDriver, MongoConnector};

/// Lifecycle of one store's connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Connecting,
    Ready,
    Failed,
}

/// Connection published for reuse by later stores.
#[derive(Clone)]
pub struct SharedConnection {
    pub connector: Arc<dyn Connector>,
    pub driver: Arc<dyn DocumentDriver>,
}

static SHARED: Lazy<RwLock<Option<SharedConnection>>> = Lazy::new(|| RwLock::new(None));

static CONNECT_GATE: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

/// The currently published connection, if any
pub fn shared_connection() -> Option<SharedConnection> {
    SHARED.read().clone()
}

/// Withdraw the published connection.
///
/// The driver is not closed: the store that published it and every store
/// that adopted it keep using their handle, and the driver is released when
/// the last of them drops. Returns whether a connection was published.
pub async fn release_shared_connection() -> bool {
    let _gate = CONNECT_GATE.lock().await;
    let released = SHARED.write().take();
    match released {
        Some(shared) => {
            info!(vendor = shared.connector.vendor_name(), "Released shared connection");
            true
        }
        None => false,
    }
}

async fn close_quietly(driver: &dyn DocumentDriver) {
    if let Err(e) = driver.close().await {
        warn!("Ignoring error while closing connection: {}", e);
    }
}

struct Inner {
    state: ConnectionState,
    capabilities: Capabilities,
    driver: Option<Arc<dyn DocumentDriver>>,
}

/// Per-store connection state and capability flags
pub struct ConnectionManager {
    inner: RwLock<Inner>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    /// Adopt the shared connection when one is published, else start unconnected
    pub fn new() -> Self {
        match shared_connection() {
            Some(shared) => {
                debug!(vendor = shared.connector.vendor_name(), "Adopting shared connection");
                Self::with_inner(ConnectionState::Ready, Capabilities::ready(), Some(shared.driver))
            }
            None => Self::unconnected(),
        }
    }

    /// Start unconnected regardless of shared state
    pub fn unconnected() -> Self {
        Self::with_inner(ConnectionState::Unconnected, Capabilities::unconnected(), None)
    }

    fn with_inner(
        state: ConnectionState,
        capabilities: Capabilities,
        driver: Option<Arc<dyn DocumentDriver>>,
    ) -> Self {
        Self {
            inner: RwLock::new(Inner {
                state,
                capabilities,
                driver,
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.read().state
    }

    pub fn capabilities(&self) -> Capabilities {
        self.inner.read().capabilities
    }

    /// Driver for `operation`, or `NotReady` when the capability is off
    pub fn driver_for(&self, operation: Operation) -> Result<Arc<dyn DocumentDriver>> {
        let inner = self.inner.read();
        inner.capabilities.require(operation)?;
        inner
            .driver
            .clone()
            .ok_or_else(|| entitystore_common::ConnectionError::NotReady(operation.as_str()).into())
    }

    fn fail(&self) {
        let mut inner = self.inner.write();
        inner.state = ConnectionState::Failed;
        inner.capabilities = Capabilities::unconnected();
        inner.driver = None;
    }

    /// Open the backend and move to `Ready`.
    ///
    /// On failure anything partially opened is closed (errors swallowed) and
    /// the state becomes `Failed`; calling again retries.
    pub async fn connect(&self, location: &str, options: Option<ConnectOptions>) -> Result<()> {
        let options = options.unwrap_or_default();
        if location.is_empty() && options.host().is_empty() {
            return Err(PreconditionError::InvalidLocation.into());
        }

        let _gate = CONNECT_GATE.lock().await;
        // shared state is only read and published under the gate
        let shared_vendor = shared_connection().map(|s| s.connector);
        self.inner.write().state = ConnectionState::Connecting;

        let connector: Arc<dyn Connector> = options
            .vendor
            .clone()
            .or(shared_vendor)
            .unwrap_or_else(|| Arc::new(MongoConnector));

        let driver = match connector.create(location, &options).await {
            Ok(driver) => driver,
            Err(e) => {
                warn!(vendor = connector.vendor_name(), "Connect failed: {}", e);
                self.fail();
                return Err(e);
            }
        };

        if let Err(e) = Self::open(driver.as_ref(), &options).await {
            warn!(vendor = connector.vendor_name(), "Connect failed: {}", e);
            close_quietly(driver.as_ref()).await;
            self.fail();
            return Err(e);
        }

        {
            let mut inner = self.inner.write();
            inner.state = ConnectionState::Ready;
            inner.capabilities = Capabilities::ready();
            inner.driver = Some(Arc::clone(&driver));
        }

        if options.keep_connection {
            *SHARED.write() = Some(SharedConnection {
                connector: Arc::clone(&connector),
                driver,
            });
            info!(vendor = connector.vendor_name(), "Published shared connection");
        }

        info!(
            vendor = connector.vendor_name(),
            database = options.database_name(),
            "Connected"
        );
        Ok(())
    }

    async fn open(driver: &dyn DocumentDriver, options: &ConnectOptions) -> Result<()> {
        driver.open().await?;
        if let Some(credentials) = options.credentials() {
            driver.authenticate(&credentials).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bson::oid::ObjectId;
    use bson::Document;
    use entitystore_common::{ConnectionError, Error};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::document::Credentials;

    #[derive(Default)]
    struct ScriptedDriver {
        fail_open: bool,
        fail_auth: bool,
        fail_close: bool,
        closes: AtomicUsize,
        auths: AtomicUsize,
    }

    #[async_trait]
    impl DocumentDriver for ScriptedDriver {
        async fn open(&self) -> Result<()> {
            if self.fail_open {
                return Err(ConnectionError::ConnectionFailed("refused".into()).into());
            }
            Ok(())
        }
        async fn authenticate(&self, _credentials: &Credentials) -> Result<()> {
            self.auths.fetch_add(1, Ordering::SeqCst);
            if self.fail_auth {
                return Err(ConnectionError::AuthenticationFailed("bad password".into()).into());
            }
            Ok(())
        }
        async fn close(&self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                return Err(Error::Internal("close blew up".into()));
            }
            Ok(())
        }
        async fn insert_one(&self, _: &str, _: Document) -> Result<ObjectId> {
            Ok(ObjectId::new())
        }
        async fn replace_one(&self, _: &str, _: ObjectId, _: Document) -> Result<u64> {
            Ok(1)
        }
        async fn find_one(&self, _: &str, _: Document) -> Result<Option<Document>> {
            Ok(None)
        }
        async fn delete_one(&self, _: &str, _: Document) -> Result<u64> {
            Ok(1)
        }
        async fn find(&self, _: &str, _: Document, _: Option<Document>) -> Result<Vec<Document>> {
            Ok(Vec::new())
        }
    }

    struct ScriptedConnector(Arc<ScriptedDriver>);

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn create(&self, _: &str, _: &ConnectOptions) -> Result<Arc<dyn DocumentDriver>> {
            Ok(self.0.clone())
        }
        fn vendor_name(&self) -> &'static str {
            "scripted"
        }
    }

    fn options(driver: &Arc<ScriptedDriver>) -> ConnectOptions {
        ConnectOptions::new().with_vendor(Arc::new(ScriptedConnector(driver.clone())))
    }

    #[tokio::test]
    async fn test_connect_success_enables_everything() {
        let manager = ConnectionManager::unconnected();
        assert_eq!(manager.state(), ConnectionState::Unconnected);
        assert!(manager.driver_for(Operation::GetModel).is_err());

        let driver = Arc::new(ScriptedDriver::default());
        manager.connect("scripted://", Some(options(&driver))).await.unwrap();

        assert_eq!(manager.state(), ConnectionState::Ready);
        assert_eq!(manager.capabilities(), Capabilities::ready());
        assert!(manager.driver_for(Operation::GetList).is_ok());
        assert_eq!(driver.auths.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_open_failure_closes_and_fails() {
        let manager = ConnectionManager::unconnected();
        let driver = Arc::new(ScriptedDriver {
            fail_open: true,
            fail_close: true,
            ..ScriptedDriver::default()
        });
        let err = manager.connect("scripted://", Some(options(&driver))).await.unwrap_err();

        assert!(matches!(err, Error::Connection(ConnectionError::ConnectionFailed(_))));
        assert_eq!(manager.state(), ConnectionState::Failed);
        assert!(!manager.capabilities().is_ready);
        assert_eq!(driver.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_auth_failure_closes_and_fails() {
        let manager = ConnectionManager::unconnected();
        let driver = Arc::new(ScriptedDriver {
            fail_auth: true,
            ..ScriptedDriver::default()
        });
        let opts = options(&driver).with_credentials("admin", "wrong");
        let err = manager.connect("scripted://", Some(opts)).await.unwrap_err();

        assert!(matches!(err, Error::Connection(ConnectionError::AuthenticationFailed(_))));
        assert_eq!(manager.state(), ConnectionState::Failed);
        assert_eq!(driver.auths.load(Ordering::SeqCst), 1);
        assert_eq!(driver.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_after_failure() {
        let manager = ConnectionManager::unconnected();
        let broken = Arc::new(ScriptedDriver {
            fail_open: true,
            ..ScriptedDriver::default()
        });
        assert!(manager.connect("scripted://", Some(options(&broken))).await.is_err());

        let working = Arc::new(ScriptedDriver::default());
        manager.connect("scripted://", Some(options(&working))).await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Ready);
    }

    #[tokio::test]
    async fn test_empty_location_without_host_is_rejected() {
        let manager = ConnectionManager::unconnected();
        let opts = ConnectOptions {
            host: Some(String::new()),
            ..ConnectOptions::default()
        };
        let err = manager.connect("", Some(opts)).await.unwrap_err();
        assert!(err.is_precondition());
        assert_eq!(manager.state(), ConnectionState::Unconnected);
    }
}
