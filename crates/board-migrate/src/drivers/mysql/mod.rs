//! MySQL/MariaDB database driver.
//!
//! - [`MysqlDialect`]: SQL syntax strategy
//! - [`MysqlSession`]: raw SQL over one pooled SQLx connection
//! - [`connect`] / [`ensure_database`]: pool setup and database creation
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+
//!
//! MySQL commits implicitly after every DDL statement, so multi-statement
//! schema changes are not atomic on this engine.

mod dialect;
mod pool;
mod session;

pub use dialect::MysqlDialect;
pub use pool::{connect, ensure_database};
pub use session::MysqlSession;
