//! PostgreSQL connection pools (deadpool-postgres).

use deadpool_postgres::{
    Hook, HookError, Manager, ManagerConfig, Pool, RecyclingMethod, Runtime,
};
use tokio_postgres::{Config as PgConfig, NoTls};
use tracing::{debug, info};

use super::dialect::PostgresDialect;
use crate::config::DatabaseConfig;
use crate::core::traits::Dialect;
use crate::drivers::common::{
    SslMode, TlsBuilder, CONNECTION_MAX_LIFETIME, CONNECT_TIMEOUT, MAX_OPEN_CONNECTIONS,
};
use crate::error::{MigrateError, Result};

/// Maintenance database used to create the application database.
const ADMIN_DATABASE: &str = "postgres";

fn build_pool(config: &DatabaseConfig, dbname: &str, max_size: usize) -> Result<Pool> {
    let ssl_mode = SslMode::parse(&config.ssl_mode)?;

    let mut pg_config = PgConfig::new();
    pg_config
        .host(&config.host)
        .port(config.port())
        .dbname(dbname)
        .user(&config.user)
        .password(&config.password)
        .ssl_mode(ssl_mode.postgres_mode())
        .connect_timeout(CONNECT_TIMEOUT);

    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };

    let mgr = match TlsBuilder::new(ssl_mode).build()? {
        Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
        None => {
            debug!("PostgreSQL TLS disabled for {}:{}", config.host, config.port());
            Manager::from_config(pg_config, NoTls, mgr_config)
        }
    };

    Pool::builder(mgr)
        .max_size(max_size)
        .runtime(Runtime::Tokio1)
        .wait_timeout(Some(CONNECT_TIMEOUT))
        .create_timeout(Some(CONNECT_TIMEOUT))
        .pre_recycle(Hook::sync_fn(|_client, metrics| {
            if metrics.age() > CONNECTION_MAX_LIFETIME {
                Err(HookError::Message("connection exceeded max lifetime".into()))
            } else {
                Ok(())
            }
        }))
        .build()
        .map_err(|e| MigrateError::pool(e, "creating PostgreSQL pool"))
}

/// Open a pool on the configured database and verify it answers.
pub async fn connect(config: &DatabaseConfig) -> Result<Pool> {
    let pool = build_pool(config, &config.database, MAX_OPEN_CONNECTIONS as usize)?;

    let ping = async {
        let client = pool.get().await?;
        client.simple_query("SELECT 1").await?;
        Ok::<_, MigrateError>(())
    };
    tokio::time::timeout(CONNECT_TIMEOUT, ping)
        .await
        .map_err(|_| MigrateError::pool("ping timed out", format!("connecting to {}", config.describe())))?
        .map_err(|e| MigrateError::pool(e, format!("connecting to {}", config.describe())))?;

    info!("Connected to PostgreSQL: {}", config.describe());
    Ok(pool)
}

/// Create the configured database through the `postgres` maintenance database
/// when it does not exist yet.
pub async fn ensure_database(config: &DatabaseConfig) -> Result<()> {
    let dialect = PostgresDialect::new();
    let pool = build_pool(config, ADMIN_DATABASE, 1)?;
    let client = pool
        .get()
        .await
        .map_err(|e| MigrateError::pool(e, "connecting to PostgreSQL maintenance database"))?;

    let exists_sql = dialect
        .database_exists_query(&config.database)
        .unwrap_or_default();
    let row = client.query_one(exists_sql.as_str(), &[]).await?;
    let count: i64 = row.try_get(0)?;

    if count == 0 {
        let create = dialect
            .create_database_statement(&config.database)
            .unwrap_or_default();
        client.batch_execute(&create).await?;
        info!("Created PostgreSQL database '{}'", config.database);
    } else {
        debug!("PostgreSQL database '{}' already exists", config.database);
    }

    drop(client);
    pool.close();
    Ok(())
}
