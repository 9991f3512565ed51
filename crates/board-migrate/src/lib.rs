//! # board-migrate
//!
//! Schema engine and data migration library for the board application.
//!
//! This library provides:
//!
//! - **Board tables**: create, alter, drop and introspect the per-board
//!   dynamic tables on PostgreSQL, MySQL/MariaDB and SQLite
//! - **Versioned migrations** for the fixed tables, embedded per engine
//! - **Data migration** between any two supported engines, with column
//!   reconciliation, value re-encoding and a bounded error ledger
//!
//! ## Example
//!
//! ```rust,no_run
//! use board_migrate::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> board_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let report = Orchestrator::from_config(&config)?.run().await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod dialect;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod schema;
pub mod transfer;

// Re-exports for convenient access
pub use config::{Config, DatabaseConfig, Driver, MigrationOptions};
pub use core::{Board, BoardField, BoardType, ColumnInfo, FieldType, Row, Session, SqlValue};
pub use drivers::DialectImpl;
pub use error::{MigrateError, Result};
pub use orchestrator::{
    ConnectionPair, ErrorLedger, MigrationReport, Orchestrator, PoolImpl, RunStatus,
};
pub use schema::{BoardSchema, MigrationStatus, Migrator};
pub use transfer::BatchCopier;
