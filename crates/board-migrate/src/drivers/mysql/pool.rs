//! MySQL/MariaDB connection pools (SQLx).

use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlPool, MySqlPoolOptions};
use sqlx::Connection;
use tracing::{debug, info};

use super::dialect::MysqlDialect;
use crate::config::DatabaseConfig;
use crate::core::traits::Dialect;
use crate::drivers::common::{
    SslMode, CONNECTION_MAX_LIFETIME, CONNECT_TIMEOUT, MAX_OPEN_CONNECTIONS, MIN_IDLE_CONNECTIONS,
};
use crate::error::{MigrateError, Result};

fn server_options(config: &DatabaseConfig) -> Result<MySqlConnectOptions> {
    let ssl_mode = SslMode::parse(&config.ssl_mode)?;
    Ok(MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port())
        .username(&config.user)
        .password(&config.password)
        .charset("utf8mb4")
        .ssl_mode(ssl_mode.mysql_mode()))
}

/// Open a pool on the configured database and verify it answers.
pub async fn connect(config: &DatabaseConfig) -> Result<MySqlPool> {
    let options = server_options(config)?.database(&config.database);

    let pool = MySqlPoolOptions::new()
        .max_connections(MAX_OPEN_CONNECTIONS)
        .min_connections(MIN_IDLE_CONNECTIONS)
        .max_lifetime(CONNECTION_MAX_LIFETIME)
        .acquire_timeout(CONNECT_TIMEOUT)
        .connect_with(options)
        .await
        .map_err(|e| MigrateError::pool(e, format!("connecting to {}", config.describe())))?;

    tokio::time::timeout(CONNECT_TIMEOUT, sqlx::query("SELECT 1").execute(&pool))
        .await
        .map_err(|_| MigrateError::pool("ping timed out", format!("connecting to {}", config.describe())))?
        .map_err(|e| MigrateError::pool(e, format!("pinging {}", config.describe())))?;

    info!("Connected to MySQL: {}", config.describe());
    Ok(pool)
}

/// Create the configured database, connecting without one selected, when it
/// does not exist yet.
pub async fn ensure_database(config: &DatabaseConfig) -> Result<()> {
    let dialect = MysqlDialect::new();
    let options = server_options(config)?;
    let mut conn = MySqlConnection::connect_with(&options)
        .await
        .map_err(|e| MigrateError::pool(e, "connecting to MySQL server"))?;

    let exists_sql = dialect
        .database_exists_query(&config.database)
        .unwrap_or_default();
    let count: i64 = sqlx::query_scalar(&exists_sql).fetch_one(&mut conn).await?;

    if count == 0 {
        let create = dialect
            .create_database_statement(&config.database)
            .unwrap_or_default();
        sqlx::raw_sql(&create).execute(&mut conn).await?;
        info!("Created MySQL database '{}'", config.database);
    } else {
        debug!("MySQL database '{}' already exists", config.database);
    }

    conn.close().await?;
    Ok(())
}
