//! Settings structures and their compiled defaults.

use std::fmt;
use std::str::FromStr;

use keeper_core::TestUserCreationConfig;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Relational backend the engine talks to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// SQLite; the default.
    #[default]
    Sqlite,
    /// PostgreSQL.
    Postgres,
    /// MariaDB / MySQL.
    MariaDb,
}

impl Provider {
    /// Canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::MariaDb => "mariadb",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mariadb" | "mysql" => Ok(Self::MariaDb),
            other => Err(SettingsError::InvalidValue(format!("unknown database provider {other:?}"))),
        }
    }
}

/// Database connection and engine tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// Backend.
    pub provider: Provider,
    /// File path (SQLite, `:memory:` allowed) or connection URL.
    pub connection_details: String,
    /// Log every querier call at debug level.
    pub debug: bool,
    /// Run migrations during startup.
    pub run_migrations: bool,
    /// Readiness probe attempts before giving up.
    pub max_ping_attempts: u32,
    /// Pool size.
    pub pool_size: u32,
    /// SQLite busy timeout.
    pub busy_timeout_ms: u64,
    /// Rows per streamed batch.
    pub stream_batch_size: u64,
    /// Streamed windows fetched at once.
    pub stream_concurrency: usize,
    /// User to create after migrating, for local development.
    pub create_test_user: Option<TestUserCreationConfig>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            provider: Provider::Sqlite,
            connection_details: "keeper.db".into(),
            debug: false,
            run_migrations: true,
            max_ping_attempts: 50,
            pool_size: 16,
            busy_timeout_ms: 30_000,
            stream_batch_size: 1000,
            stream_concurrency: 8,
            create_test_user: None,
        }
    }
}

impl DatabaseSettings {
    /// In-memory SQLite, for tests and scratch use.
    pub fn in_memory() -> Self {
        Self {
            connection_details: ":memory:".into(),
            ..Self::default()
        }
    }

    /// Whether the connection targets an in-memory SQLite database.
    pub fn is_in_memory(&self) -> bool {
        self.provider == Provider::Sqlite && self.connection_details == ":memory:"
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.connection_details.trim().is_empty() {
            return Err(SettingsError::InvalidValue("connectionDetails must not be empty".into()));
        }
        if self.pool_size == 0 {
            return Err(SettingsError::InvalidValue("poolSize must be at least 1".into()));
        }
        if self.stream_batch_size == 0 {
            return Err(SettingsError::InvalidValue("streamBatchSize must be at least 1".into()));
        }
        if self.stream_concurrency == 0 {
            return Err(SettingsError::InvalidValue("streamConcurrency must be at least 1".into()));
        }
        if self.max_ping_attempts == 0 {
            return Err(SettingsError::InvalidValue("maxPingAttempts must be at least 1".into()));
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: keeper_core::logging::DEFAULT_LEVEL.into(),
        }
    }
}

/// Root settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeeperSettings {
    /// Database section.
    pub database: DatabaseSettings,
    /// Logging section.
    pub logging: LoggingSettings,
}

impl KeeperSettings {
    /// Level to hand to `init_subscriber`.
    pub fn log_level(&self) -> &str {
        keeper_core::logging::effective_level(&self.logging.level, self.database.debug)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn defaults_validate() {
        DatabaseSettings::default().validate().unwrap();
        DatabaseSettings::in_memory().validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_pool() {
        let settings = DatabaseSettings {
            pool_size: 0,
            ..DatabaseSettings::default()
        };
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(msg)) if msg.contains("poolSize"));
    }

    #[test]
    fn validate_rejects_blank_connection() {
        let settings = DatabaseSettings {
            connection_details: "  ".into(),
            ..DatabaseSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_batch_and_attempts() {
        let batch = DatabaseSettings {
            stream_batch_size: 0,
            ..DatabaseSettings::default()
        };
        let attempts = DatabaseSettings {
            max_ping_attempts: 0,
            ..DatabaseSettings::default()
        };
        assert!(batch.validate().is_err());
        assert!(attempts.validate().is_err());
    }

    #[test]
    fn provider_parses_aliases() {
        assert_eq!("PostgreSQL".parse::<Provider>().unwrap(), Provider::Postgres);
        assert_eq!("mysql".parse::<Provider>().unwrap(), Provider::MariaDb);
        assert_eq!("sqlite".parse::<Provider>().unwrap(), Provider::Sqlite);
        assert!("oracle".parse::<Provider>().is_err());
    }

    #[test]
    fn provider_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Provider::MariaDb).unwrap(), "\"mariadb\"");
    }

    #[test]
    fn debug_raises_log_level() {
        let mut settings = KeeperSettings::default();
        assert_eq!(settings.log_level(), "info");
        settings.database.debug = true;
        assert_eq!(settings.log_level(), "debug");
    }

    #[test]
    fn in_memory_detection() {
        assert!(DatabaseSettings::in_memory().is_in_memory());
        assert!(!DatabaseSettings::default().is_in_memory());
    }
}
