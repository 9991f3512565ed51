//! PostgreSQL driver.
//!
//! - [`PostgresDialect`]: SQL syntax strategy for PostgreSQL
//! - [`PostgresSession`]: raw SQL over one pooled deadpool-postgres client
//! - [`connect`] / [`ensure_database`]: pool setup and database creation

mod dialect;
mod pool;
mod session;

pub use dialect::PostgresDialect;
pub use pool::{connect, ensure_database};
pub use session::PostgresSession;
