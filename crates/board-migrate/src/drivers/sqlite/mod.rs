//! SQLite database driver.
//!
//! - [`SqliteDialect`]: SQL syntax strategy
//! - [`SqliteSession`]: raw SQL over one pooled SQLx connection
//! - [`connect`] / [`ensure_database`]: pool setup (WAL, synchronous NORMAL,
//!   5 s busy timeout) and parent directory creation

mod dialect;
mod pool;
mod session;

pub use dialect::SqliteDialect;
pub use pool::{connect, ensure_database};
pub use session::SqliteSession;
