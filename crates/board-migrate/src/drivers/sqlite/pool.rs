//! SQLite connection pools (SQLx).

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::drivers::common::{
    CONNECTION_MAX_LIFETIME, CONNECT_TIMEOUT, MAX_OPEN_CONNECTIONS, MIN_IDLE_CONNECTIONS,
};
use crate::error::{MigrateError, Result};

/// Open a pool on the configured file.
///
/// With `create_if_missing = false` (copy sources) a missing file is an error
/// instead of silently producing an empty database.
pub async fn connect(config: &DatabaseConfig, create_if_missing: bool) -> Result<SqlitePool> {
    if !create_if_missing && !config.path.exists() {
        return Err(MigrateError::pool(
            "database file does not exist",
            config.describe(),
        ));
    }

    let options = SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(create_if_missing)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(CONNECT_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_OPEN_CONNECTIONS)
        .min_connections(MIN_IDLE_CONNECTIONS)
        .max_lifetime(CONNECTION_MAX_LIFETIME)
        .acquire_timeout(CONNECT_TIMEOUT)
        .connect_with(options)
        .await
        .map_err(|e| MigrateError::pool(e, format!("opening {}", config.describe())))?;

    tokio::time::timeout(CONNECT_TIMEOUT, sqlx::query("SELECT 1").execute(&pool))
        .await
        .map_err(|_| MigrateError::pool("ping timed out", config.describe()))?
        .map_err(|e| MigrateError::pool(e, format!("pinging {}", config.describe())))?;

    info!("Opened SQLite database: {}", config.path.display());
    Ok(pool)
}

/// Create the directory that will hold the database file.
pub async fn ensure_database(config: &DatabaseConfig) -> Result<()> {
    if let Some(parent) = config.path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            tokio::fs::create_dir_all(parent).await?;
            debug!("Created directory {}", parent.display());
        }
    }
    Ok(())
}
