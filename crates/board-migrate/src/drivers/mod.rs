//! Database driver implementations.
//!
//! - [`postgres`]: PostgreSQL via tokio-postgres + deadpool-postgres
//! - [`mysql`]: MySQL/MariaDB via SQLx
//! - [`sqlite`]: SQLite via SQLx
//! - [`common`]: TLS and pool sizing shared by the drivers
//!
//! # Architecture
//!
//! Each driver module provides:
//! - a `Dialect` implementation (pure SQL text building)
//! - a `Session` implementation over one pooled connection
//! - `connect` / `ensure_database` for pool setup
//!
//! # Adding New Databases
//!
//! 1. Create a new module under `drivers/`
//! 2. Implement `Dialect` and `Session`
//! 3. Add variants to `DialectImpl` and `PoolImpl`
//! 4. Add the driver name to `config::Driver`

pub mod common;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use common::{SslMode, TlsBuilder};
pub use mysql::MysqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use crate::config::Driver;
use crate::core::schema::{BoardField, ColumnInfo, FieldType};
use crate::core::traits::{Dialect, Row, SequenceStrategy};
use crate::error::Result;

/// Enum-based static dispatch for dialects.
///
/// The compiler generates a match instead of a vtable call.
#[derive(Debug, Clone)]
pub enum DialectImpl {
    Postgres(PostgresDialect),
    Mysql(MysqlDialect),
    Sqlite(SqliteDialect),
}

impl DialectImpl {
    pub fn from_driver(driver: Driver) -> Self {
        match driver {
            Driver::Postgres => DialectImpl::Postgres(PostgresDialect::new()),
            Driver::Mysql => DialectImpl::Mysql(MysqlDialect::new()),
            Driver::Sqlite => DialectImpl::Sqlite(SqliteDialect::new()),
        }
    }

    /// Create a dialect from a driver name (`postgres|postgresql|pg`,
    /// `mysql|mariadb`, `sqlite|sqlite3`).
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not recognized.
    pub fn from_db_type(db_type: &str) -> Result<Self> {
        Ok(Self::from_driver(db_type.parse()?))
    }

    pub fn driver(&self) -> Driver {
        match self {
            DialectImpl::Postgres(_) => Driver::Postgres,
            DialectImpl::Mysql(_) => Driver::Mysql,
            DialectImpl::Sqlite(_) => Driver::Sqlite,
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $d:ident => $body:expr) => {
        match $self {
            DialectImpl::Postgres($d) => $body,
            DialectImpl::Mysql($d) => $body,
            DialectImpl::Sqlite($d) => $body,
        }
    };
}

impl Dialect for DialectImpl {
    fn name(&self) -> &str {
        dispatch!(self, d => d.name())
    }

    fn quote_ident(&self, name: &str) -> String {
        dispatch!(self, d => d.quote_ident(name))
    }

    fn column_type(&self, field_type: FieldType) -> String {
        dispatch!(self, d => d.column_type(field_type))
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        dispatch!(self, d => d.boolean_literal(value))
    }

    fn string_literal(&self, value: &str) -> String {
        dispatch!(self, d => d.string_literal(value))
    }

    fn boolean_default(&self) -> &'static str {
        dispatch!(self, d => d.boolean_default())
    }

    fn auto_increment_clause(&self) -> &'static str {
        dispatch!(self, d => d.auto_increment_clause())
    }

    fn long_text_type(&self) -> &'static str {
        dispatch!(self, d => d.long_text_type())
    }

    fn table_exists_query(&self, table: &str) -> String {
        dispatch!(self, d => d.table_exists_query(table))
    }

    fn toggle_foreign_keys(&self, enable: bool) -> String {
        dispatch!(self, d => d.toggle_foreign_keys(enable))
    }

    fn list_columns_query(&self, table: &str) -> String {
        dispatch!(self, d => d.list_columns_query(table))
    }

    fn column_from_row(&self, row: &Row) -> Result<ColumnInfo> {
        dispatch!(self, d => d.column_from_row(row))
    }

    fn list_tables_query(&self) -> String {
        dispatch!(self, d => d.list_tables_query())
    }

    fn modify_column_statements(&self, table: &str, field: &BoardField) -> Option<Vec<String>> {
        dispatch!(self, d => d.modify_column_statements(table, field))
    }

    fn drop_table_statement(&self, table: &str, cascade: bool) -> String {
        dispatch!(self, d => d.drop_table_statement(table, cascade))
    }

    fn sequence_strategy(&self) -> SequenceStrategy {
        dispatch!(self, d => d.sequence_strategy())
    }

    fn sequence_check_query(&self, table: &str) -> Option<String> {
        dispatch!(self, d => d.sequence_check_query(table))
    }

    fn sequence_reset_statement(&self, table: &str, max_id: i64) -> Option<String> {
        dispatch!(self, d => d.sequence_reset_statement(table, max_id))
    }

    fn next_id_expression(&self, table: &str) -> Option<String> {
        dispatch!(self, d => d.next_id_expression(table))
    }

    fn database_exists_query(&self, name: &str) -> Option<String> {
        dispatch!(self, d => d.database_exists_query(name))
    }

    fn create_database_statement(&self, name: &str) -> Option<String> {
        dispatch!(self, d => d.create_database_statement(name))
    }

    fn begin_statement(&self) -> &'static str {
        dispatch!(self, d => d.begin_statement())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_impl_from_db_type() {
        assert_eq!(DialectImpl::from_db_type("postgres").unwrap().name(), "postgres");
        assert_eq!(DialectImpl::from_db_type("mariadb").unwrap().name(), "mysql");
        assert_eq!(DialectImpl::from_db_type("sqlite3").unwrap().name(), "sqlite");

        assert!(DialectImpl::from_db_type("postgresql").is_ok());
        assert!(DialectImpl::from_db_type("pg").is_ok());
        assert!(DialectImpl::from_db_type("mssql").is_err());
    }

    #[test]
    fn test_dialect_impl_dispatch() {
        let pg = DialectImpl::from_driver(Driver::Postgres);
        let my = DialectImpl::from_driver(Driver::Mysql);
        let lite = DialectImpl::from_driver(Driver::Sqlite);

        assert_eq!(pg.quote_ident("t"), "\"t\"");
        assert_eq!(my.quote_ident("t"), "`t`");
        assert_eq!(lite.quote_ident("t"), "\"t\"");

        assert_eq!(pg.auto_increment_clause(), "SERIAL PRIMARY KEY");
        assert_eq!(my.auto_increment_clause(), "INT AUTO_INCREMENT PRIMARY KEY");
        assert_eq!(lite.auto_increment_clause(), "INTEGER PRIMARY KEY AUTOINCREMENT");

        assert_eq!(pg.long_text_type(), "TEXT");
        assert_eq!(my.long_text_type(), "MEDIUMTEXT");
        assert_eq!(my.begin_statement(), "START TRANSACTION");
        assert_eq!(lite.begin_statement(), "BEGIN");
    }

    #[test]
    fn test_driver_round_trip() {
        for driver in [Driver::Postgres, Driver::Mysql, Driver::Sqlite] {
            assert_eq!(DialectImpl::from_driver(driver).driver(), driver);
        }
    }
}
