//! Pool wrapper enum for the supported engines.
//!
//! Static dispatch over the three pool types; every operation that needs a
//! database hands out a [`Session`] on one dedicated connection.

use deadpool_postgres::Pool as PgPool;
use sqlx::mysql::MySqlPool;
use sqlx::sqlite::SqlitePool;
use tracing::{debug, info};

use crate::config::{DatabaseConfig, Driver};
use crate::core::traits::Session;
use crate::drivers::{mysql, postgres, sqlite};
use crate::error::Result;

/// Enum wrapper for pool implementations.
pub enum PoolImpl {
    Postgres(PgPool),
    Mysql(MySqlPool),
    Sqlite(SqlitePool),
}

impl PoolImpl {
    /// Open a pool for `config`.
    ///
    /// `create_if_missing` only matters for SQLite: sources must already
    /// exist, targets are created on demand.
    pub async fn connect(config: &DatabaseConfig, create_if_missing: bool) -> Result<Self> {
        debug!("Connecting to {}", config.describe());
        Ok(match config.driver {
            Driver::Postgres => Self::Postgres(postgres::connect(config).await?),
            Driver::Mysql => Self::Mysql(mysql::connect(config).await?),
            Driver::Sqlite => Self::Sqlite(sqlite::connect(config, create_if_missing).await?),
        })
    }

    pub fn driver(&self) -> Driver {
        match self {
            Self::Postgres(_) => Driver::Postgres,
            Self::Mysql(_) => Driver::Mysql,
            Self::Sqlite(_) => Driver::Sqlite,
        }
    }

    /// A session on one pooled connection, held until the session is dropped.
    pub async fn session(&self) -> Result<Box<dyn Session>> {
        Ok(match self {
            Self::Postgres(p) => Box::new(postgres::PostgresSession::acquire(p).await?),
            Self::Mysql(p) => Box::new(mysql::MysqlSession::acquire(p).await?),
            Self::Sqlite(p) => Box::new(sqlite::SqliteSession::acquire(p).await?),
        })
    }

    /// Close the pool and its connections.
    pub async fn close(&self) {
        match self {
            Self::Postgres(p) => p.close(),
            Self::Mysql(p) => p.close().await,
            Self::Sqlite(p) => p.close().await,
        }
    }
}

/// Create the configured database (server engines) or its parent directory
/// (SQLite) when missing.
pub async fn ensure_database_exists(config: &DatabaseConfig) -> Result<()> {
    match config.driver {
        Driver::Postgres => postgres::ensure_database(config).await,
        Driver::Mysql => mysql::ensure_database(config).await,
        Driver::Sqlite => sqlite::ensure_database(config).await,
    }
}

/// Source and target pools of a data migration run.
pub struct ConnectionPair {
    pub source: PoolImpl,
    pub target: PoolImpl,
}

impl ConnectionPair {
    /// Open both pools, creating the target database if needed. The source
    /// pool is closed again when the target cannot be opened.
    pub async fn open(source: &DatabaseConfig, target: &DatabaseConfig) -> Result<Self> {
        let source_pool = PoolImpl::connect(source, false).await?;

        let target_pool = match ensure_database_exists(target).await {
            Ok(()) => PoolImpl::connect(target, true).await,
            Err(e) => Err(e),
        };
        let target_pool = match target_pool {
            Ok(pool) => pool,
            Err(e) => {
                source_pool.close().await;
                return Err(e);
            }
        };

        info!(
            "Connected: {} -> {}",
            source.describe(),
            target.describe()
        );
        Ok(Self {
            source: source_pool,
            target: target_pool,
        })
    }

    pub async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
    }
}
