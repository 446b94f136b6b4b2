//! Configuration for the SQL session store

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sessionkeep_core::{DbType, Dialect, Error, Result};

/// Called with every error raised by a background sweep
pub type CleanupErrorHook = Arc<dyn Fn(&Error) + Send + Sync>;

/// Default hook: log and carry on
pub fn log_cleanup_error() -> CleanupErrorHook {
    Arc::new(|err: &Error| {
        tracing::error!("Session cleanup failed: {}", err);
    })
}

/// Configuration for [`SqlSessionStore`](crate::SqlSessionStore)
///
/// Keys are snake_case; the camelCase names used by express-style session
/// stores are accepted as aliases.
///
/// # Example
/// ```
/// use sessionkeep_sql::StoreConfig;
/// use sessionkeep_core::DbType;
///
/// let config = StoreConfig::default()
///     .with_db_type(DbType::Postgresql)
///     .with_cleanup_interval_ms(0);
/// assert!(!config.cleanup_enabled());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Delay between sweeps of expired sessions in milliseconds (0 disables)
    #[serde(default = "default_cleanup_interval_ms", alias = "cleanupInterval")]
    pub cleanup_interval_ms: u64,

    /// Database engine behind the pool
    #[serde(default, alias = "dbType")]
    pub db_type: DbType,

    /// Session table name
    #[serde(default = "default_table_name", alias = "tableName")]
    pub table_name: String,

    /// Name of the session id column
    #[serde(default = "default_sid_field_name", alias = "sidFieldName")]
    pub sid_field_name: String,

    /// Use the engine's single-statement upsert when it has one
    ///
    /// When disabled every write goes through a row-locking transaction.
    #[serde(default = "default_true", alias = "fastUpsert")]
    pub fast_upsert: bool,
}

fn default_cleanup_interval_ms() -> u64 {
    60_000
}

fn default_table_name() -> String {
    "sessions".to_string()
}

fn default_sid_field_name() -> String {
    "sid".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_ms: default_cleanup_interval_ms(),
            db_type: DbType::default(),
            table_name: default_table_name(),
            sid_field_name: default_sid_field_name(),
            fast_upsert: true,
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a YAML or TOML file (chosen by extension, YAML by default)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))?
        } else {
            serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("Invalid YAML in {}: {}", path.display(), e)))?
        };

        config.validate()?;
        Ok(config)
    }

    pub fn with_cleanup_interval_ms(mut self, interval_ms: u64) -> Self {
        self.cleanup_interval_ms = interval_ms;
        self
    }

    pub fn with_db_type(mut self, db_type: DbType) -> Self {
        self.db_type = db_type;
        self
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn with_sid_field_name(mut self, sid_field_name: impl Into<String>) -> Self {
        self.sid_field_name = sid_field_name.into();
        self
    }

    pub fn with_fast_upsert(mut self, fast_upsert: bool) -> Self {
        self.fast_upsert = fast_upsert;
        self
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }

    /// SQL dialect for the configured engine, table and id column
    pub fn dialect(&self) -> Dialect {
        Dialect::new(self.db_type, &self.table_name, &self.sid_field_name)
    }

    pub fn cleanup_enabled(&self) -> bool {
        self.cleanup_interval_ms > 0
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(Error::Config("table_name must not be empty".to_string()));
        }
        if self.sid_field_name.trim().is_empty() {
            return Err(Error::Config("sid_field_name must not be empty".to_string()));
        }
        Ok(())
    }
}
