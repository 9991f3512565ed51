//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MigrateError;

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    #[default]
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
    #[serde(alias = "mariadb")]
    Mysql,
    #[serde(alias = "sqlite3")]
    Sqlite,
}

impl Driver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Postgres => "postgres",
            Driver::Mysql => "mysql",
            Driver::Sqlite => "sqlite",
        }
    }

    /// Standard server port; SQLite has none.
    pub fn default_port(&self) -> u16 {
        match self {
            Driver::Postgres => 5432,
            Driver::Mysql => 3306,
            Driver::Sqlite => 0,
        }
    }

    pub fn is_file_backed(&self) -> bool {
        matches!(self, Driver::Sqlite)
    }
}

impl FromStr for Driver {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Driver::Postgres),
            "mysql" | "mariadb" => Ok(Driver::Mysql),
            "sqlite" | "sqlite3" => Ok(Driver::Sqlite),
            other => Err(MigrateError::Config(format!(
                "Unknown database driver: '{}'. Supported drivers: postgres, mysql, sqlite",
                other
            ))),
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database managed by schema operations, and the copy source.
    pub source: DatabaseConfig,

    /// Copy target; only needed for data migration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<DatabaseConfig>,

    #[serde(default)]
    pub migration: MigrationOptions,
}

/// Connection settings for one database.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub driver: Driver,

    #[serde(default = "default_host")]
    pub host: String,

    /// Server port; the driver's standard port when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default, skip_serializing)]
    pub password: String,

    /// Database name for server engines.
    #[serde(default = "default_database")]
    pub database: String,

    /// Database file for SQLite.
    #[serde(default = "default_sqlite_path")]
    pub path: PathBuf,

    /// PostgreSQL-style sslmode (disable, prefer, require, verify-ca, verify-full).
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
}

impl DatabaseConfig {
    /// Defaults for `driver` with nothing else set.
    pub fn new(driver: Driver) -> Self {
        Self {
            driver,
            host: default_host(),
            port: None,
            user: default_user(),
            password: String::new(),
            database: default_database(),
            path: default_sqlite_path(),
            ssl_mode: default_ssl_mode(),
        }
    }

    /// SQLite configuration for the given file.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::new(Driver::Sqlite)
        }
    }

    /// Effective port.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.driver.default_port())
    }

    /// Human-readable location for logs (no credentials).
    pub fn describe(&self) -> String {
        match self.driver {
            Driver::Sqlite => format!("sqlite:{}", self.path.display()),
            driver => format!("{}://{}:{}/{}", driver, self.host, self.port(), self.database),
        }
    }

    /// True when both configs address the same physical database.
    pub fn same_database(&self, other: &DatabaseConfig) -> bool {
        if self.driver != other.driver {
            return false;
        }
        match self.driver {
            Driver::Sqlite => self.path == other.path,
            _ => {
                self.host.eq_ignore_ascii_case(&other.host)
                    && self.port() == other.port()
                    && self.database == other.database
            }
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("database", &self.database)
            .field("path", &self.path)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Data migration behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationOptions {
    /// Rows fetched per page (default: 1000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Tables never copied.
    #[serde(default)]
    pub skip_tables: Vec<String>,

    /// Copy only board tables.
    #[serde(default)]
    pub dynamic_only: bool,

    /// Copy only fixed tables.
    #[serde(default)]
    pub basic_only: bool,

    /// Copy tables of inactive boards too (default: true).
    #[serde(default = "default_true")]
    pub include_inactive: bool,

    /// Skip schema synchronization.
    #[serde(default)]
    pub data_only: bool,

    /// Stop after schema synchronization.
    #[serde(default)]
    pub schema_only: bool,

    /// Wrap small tables in a transaction (default: true).
    #[serde(default = "default_true")]
    pub use_transactions: bool,

    /// Abort once more errors than this accumulate (default: 10).
    #[serde(default = "default_max_errors")]
    pub max_errors: usize,

    /// Tables with more rows than this copy without a transaction (default: 10000).
    #[serde(default = "default_transaction_row_threshold")]
    pub transaction_row_threshold: i64,

    /// Decode base64-looking strings before writing them (default: false).
    #[serde(default)]
    pub decode_base64: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            skip_tables: Vec::new(),
            dynamic_only: false,
            basic_only: false,
            include_inactive: true,
            data_only: false,
            schema_only: false,
            use_transactions: true,
            max_errors: default_max_errors(),
            transaction_row_threshold: default_transaction_row_threshold(),
            decode_base64: false,
        }
    }
}

impl MigrationOptions {
    /// Case-insensitive skip list lookup.
    pub fn is_skipped(&self, table: &str) -> bool {
        self.skip_tables
            .iter()
            .any(|t| t.trim().eq_ignore_ascii_case(table))
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_database() -> String {
    "board".to_string()
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./data/board.db")
}

fn default_ssl_mode() -> String {
    "disable".to_string()
}

fn default_batch_size() -> usize {
    1000
}

fn default_max_errors() -> usize {
    10
}

fn default_transaction_row_threshold() -> i64 {
    10_000
}

fn default_true() -> bool {
    true
}
