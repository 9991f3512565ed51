//! Common utilities shared across database drivers.
//!
//! - [`tls`]: sslmode parsing and the PostgreSQL rustls connector
//! - pool sizing constants used by every engine
//! - [`is_connection_error`]: separates dropped connections from rejected statements

use std::time::Duration;

pub mod tls;

pub use tls::{SslMode, TlsBuilder};

/// Upper bound on open connections per pool.
pub const MAX_OPEN_CONNECTIONS: u32 = 25;

/// Connections kept warm per pool (sqlx pools only).
pub const MIN_IDLE_CONNECTIONS: u32 = 5;

/// Connections older than this are recycled.
pub const CONNECTION_MAX_LIFETIME: Duration = Duration::from_secs(5 * 60);

/// Bound on establishing a connection and on the post-connect ping.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// First line of a statement, shortened for logs and error context.
pub fn sql_preview(sql: &str) -> String {
    const MAX: usize = 120;
    let flat = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= MAX {
        flat
    } else {
        let cut: String = flat.chars().take(MAX).collect();
        format!("{}...", cut)
    }
}

/// True when a sqlx error means the connection itself is gone, not that the
/// statement was rejected.
pub fn is_connection_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::WorkerCrashed
    )
}
