//! Database connection management.

use sim_core::StoreError;
use surrealdb::Surreal;
use surrealdb::engine::any::{Any, connect as connect_any};
use surrealdb::opt::auth::Root;
use thiserror::Error;

/// Database connection wrapper.
pub type Database = Surreal<Any>;

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Connection mode: "mem://" or "rocksdb://path"
    pub endpoint: String,
    /// Namespace to use
    pub namespace: String,
    /// Database name to use
    pub database: String,
    /// Optional root credentials for authentication
    pub credentials: Option<(String, String)>,
}

/// Endpoint used when `SIM_DB_ENDPOINT` is unset.
#[cfg(feature = "rocksdb")]
pub const DEFAULT_ENDPOINT: &str = "rocksdb://alpha_store";
/// Endpoint used when `SIM_DB_ENDPOINT` is unset. This build has no durable engine.
#[cfg(not(feature = "rocksdb"))]
pub const DEFAULT_ENDPOINT: &str = "mem://";

const DEFAULT_NAMESPACE: &str = "brain_simulation";
const DEFAULT_DATABASE: &str = "main";

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            credentials: None,
        }
    }
}

impl DbConfig {
    /// Create a config for in-memory testing.
    pub fn memory() -> Self {
        Self {
            endpoint: "mem://".to_string(),
            ..Default::default()
        }
    }

    /// Create a config for RocksDB persistence (requires rocksdb feature).
    pub fn rocksdb(path: impl Into<String>) -> Self {
        Self {
            endpoint: format!("rocksdb://{}", path.into()),
            ..Default::default()
        }
    }

    /// Build a config from environment variables.
    ///
    /// - `SIM_DB_ENDPOINT` (default: [`DEFAULT_ENDPOINT`]; `mem://` opts out of persistence)
    /// - `SIM_DB_NAMESPACE` (default: `brain_simulation`)
    /// - `SIM_DB_DATABASE` (default: `main`)
    /// - `SIM_DB_USER` / `SIM_DB_PASSWORD` (optional, both or neither)
    pub fn from_env() -> Result<Self, DbError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_vars<F>(lookup: F) -> Result<Self, DbError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let credentials = match (value("SIM_DB_USER"), value("SIM_DB_PASSWORD")) {
            (Some(user), Some(password)) => Some((user, password)),
            (None, None) => None,
            _ => {
                return Err(DbError::Config(
                    "SIM_DB_USER and SIM_DB_PASSWORD must be set together".into(),
                ));
            }
        };

        Ok(Self {
            endpoint: value("SIM_DB_ENDPOINT").unwrap_or(defaults.endpoint),
            namespace: value("SIM_DB_NAMESPACE").unwrap_or(defaults.namespace),
            database: value("SIM_DB_DATABASE").unwrap_or(defaults.database),
            credentials,
        })
    }

    /// Whether records vanish when the process exits.
    pub fn is_ephemeral(&self) -> bool {
        self.endpoint.starts_with("mem:")
    }
}

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Invalid database config: {0}")]
    Config(String),
    #[error("Database error: {0}")]
    Surreal(#[from] surrealdb::Error),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(fingerprint) => StoreError::NotFound(fingerprint),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Open a database connection.
pub async fn connect(config: &DbConfig) -> Result<Database, DbError> {
    tracing::info!("Connecting to database: {}", config.endpoint);

    let db = connect_any(config.endpoint.as_str()).await?;

    // Authenticate if credentials provided
    if let Some((username, password)) = &config.credentials {
        db.signin(Root {
            username,
            password,
        })
        .await?;
    }

    // Select namespace and database
    db.use_ns(&config.namespace).use_db(&config.database).await?;

    tracing::info!(
        "Connected to database: {}/{}",
        config.namespace,
        config.database
    );

    Ok(db)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn unset_endpoint_uses_the_build_default() -> Result<(), DbError> {
        let config = DbConfig::from_vars(vars(&[]))?;

        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.namespace, "brain_simulation");
        assert_eq!(config.credentials, None);
        assert_eq!(config.is_ephemeral(), cfg!(not(feature = "rocksdb")));
        Ok(())
    }

    #[cfg(feature = "rocksdb")]
    #[test]
    fn durable_builds_default_to_rocksdb() -> Result<(), DbError> {
        let config = DbConfig::from_vars(vars(&[]))?;

        assert!(config.endpoint.starts_with("rocksdb://"));
        assert!(!config.is_ephemeral());
        Ok(())
    }

    #[test]
    fn memory_is_an_explicit_opt_in() -> Result<(), DbError> {
        let config = DbConfig::from_vars(vars(&[("SIM_DB_ENDPOINT", " mem:// ")]))?;

        assert_eq!(config.endpoint, "mem://");
        assert!(config.is_ephemeral());
        assert!(DbConfig::memory().is_ephemeral());
        Ok(())
    }

    #[test]
    fn credentials_come_in_pairs() {
        let result = DbConfig::from_vars(vars(&[("SIM_DB_USER", "root")]));

        assert!(matches!(result, Err(DbError::Config(_))));
    }
}
