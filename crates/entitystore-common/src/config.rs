//! Configuration management for EntityStore

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Main configuration structure for EntityStore
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Store identity
    #[serde(default)]
    pub store: StoreSettings,

    /// Document database connection
    #[serde(default)]
    pub connection: ConnectionSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Config {
    /// Load configuration from a TOML/JSON file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;

        let config: Config = if path.as_ref().extension().map_or(false, |ext| ext == "toml") {
            toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse TOML config: {}", e)))?
        } else {
            serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse JSON config: {}", e)))?
        };

        Ok(config)
    }

    /// Apply `ENTITYSTORE_*` environment variables on top of this config
    #[must_use]
    pub fn from_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(location) = lookup("ENTITYSTORE_LOCATION") {
            self.connection.location = location;
        }
        if let Some(database) = lookup("ENTITYSTORE_DATABASE") {
            self.connection.database_name = database;
        }
        if let Some(user) = lookup("ENTITYSTORE_USER") {
            self.connection.user_name = Some(user);
        }
        if let Some(password) = lookup("ENTITYSTORE_PASSWORD") {
            self.connection.password = Some(password);
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Display name (None = "a <store_type>")
    pub name: Option<String>,
    /// Store type label
    pub store_type: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            name: None,
            store_type: "DocumentStore".to_string(),
        }
    }
}

impl StoreSettings {
    /// Settings with the given store type and no explicit name
    pub fn with_store_type(store_type: impl Into<String>) -> Self {
        Self {
            name: None,
            store_type: store_type.into(),
        }
    }

    /// Build settings from loose key/value pairs.
    ///
    /// Only `name` and `store_type` (or `storeType`) are recognised; anything
    /// else is reported as an invalid property.
    pub fn from_pairs<'a, I>(default_type: &str, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut settings = Self::with_store_type(default_type);
        let mut invalid = Vec::new();
        for (key, value) in pairs {
            match key {
                "name" => settings.name = Some(value.to_string()),
                "store_type" | "storeType" => settings.store_type = value.to_string(),
                other => invalid.push(other.to_string()),
            }
        }
        match invalid.len() {
            0 => Ok(settings),
            1 => Err(crate::PreconditionError::InvalidProperty(invalid.remove(0)).into()),
            _ => Err(crate::PreconditionError::MultipleInvalidProperties(invalid).into()),
        }
    }

    /// Resolved display name
    #[must_use]
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("a {}", self.store_type))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Connection string; empty means build from host and port
    pub location: String,
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database holding the model collections
    pub database_name: String,
    /// User to authenticate as (None = no authentication step)
    pub user_name: Option<String>,
    /// Password for `user_name`
    pub password: Option<String>,
    /// Authentication database (None = `database_name`)
    pub authdb: Option<String>,
    /// Publish the connection for stores created later in this process
    pub keep_connection: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            location: String::new(),
            host: "127.0.0.1".to_string(),
            port: 27017,
            database_name: "entitystore".to_string(),
            user_name: None,
            password: None,
            authdb: None,
            keep_connection: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
