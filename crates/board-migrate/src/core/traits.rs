//! Core traits for database abstraction.
//!
//! - [`Dialect`]: SQL syntax strategy for one engine (quoting, literals, catalogs)
//! - [`Session`]: a single dedicated connection that executes raw SQL text
//!
//! Consumers (schema engine, copier, maintenance) only talk to these two traits,
//! so adding an engine means adding one dialect and one session implementation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::schema::{BoardField, ColumnInfo, FieldType};
use crate::core::value::SqlValue;
use crate::drivers::DialectImpl;
use crate::error::Result;

/// How an engine tracks the next identity value after bulk inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStrategy {
    /// Named sequence adjusted with `setval` (PostgreSQL `SERIAL`).
    Setval,
    /// Table option adjusted with `ALTER TABLE … AUTO_INCREMENT` (MySQL).
    AutoIncrement,
    /// Engine derives the next id from the table itself (SQLite).
    Implicit,
}

/// SQL dialect strategy.
///
/// Every method is pure string building; identifiers passed in must already be
/// validated by [`crate::core::identifier`].
pub trait Dialect: Send + Sync {
    /// Short engine name: "postgres", "mysql" or "sqlite".
    fn name(&self) -> &str;

    /// Quote an identifier.
    fn quote_ident(&self, name: &str) -> String;

    /// Native column type for an abstract field type, without constraints.
    fn column_type(&self, field_type: FieldType) -> String;

    /// Literal for a boolean value (`TRUE`/`FALSE` or `1`/`0`).
    fn boolean_literal(&self, value: bool) -> &'static str;

    /// Single-quoted string literal with the engine's escaping rules.
    fn string_literal(&self, value: &str) -> String {
        crate::core::identifier::quote_literal(value)
    }

    /// Default clause value for a new boolean column.
    fn boolean_default(&self) -> &'static str {
        "FALSE"
    }

    /// Full definition of the `id` column: type, auto-increment and primary key.
    fn auto_increment_clause(&self) -> &'static str;

    /// Type of the post body column.
    fn long_text_type(&self) -> &'static str {
        "TEXT"
    }

    /// Query returning a single count that is non-zero when `table` exists.
    fn table_exists_query(&self, table: &str) -> String;

    /// Statement that suspends (`enable = false`) or restores foreign key checks
    /// for the current session.
    fn toggle_foreign_keys(&self, enable: bool) -> String;

    /// Query listing the columns of `table` in ordinal order.
    fn list_columns_query(&self, table: &str) -> String;

    /// Decode one row of [`Dialect::list_columns_query`].
    fn column_from_row(&self, row: &Row) -> Result<ColumnInfo>;

    /// Query returning one table name per row for every user table.
    fn list_tables_query(&self) -> String;

    /// Statements changing a column's type and nullability in place, or `None`
    /// when the engine cannot alter a column without rebuilding the table.
    fn modify_column_statements(&self, table: &str, field: &BoardField) -> Option<Vec<String>>;

    /// `DROP TABLE IF EXISTS`, cascading where the engine supports it.
    fn drop_table_statement(&self, table: &str, cascade: bool) -> String {
        let _ = cascade;
        format!("DROP TABLE IF EXISTS {}", self.quote_ident(table))
    }

    /// How identity values are resynchronized after migration.
    fn sequence_strategy(&self) -> SequenceStrategy;

    /// Count query that is non-zero when `table` has an identity to reset.
    fn sequence_check_query(&self, table: &str) -> Option<String> {
        let _ = table;
        None
    }

    /// Statement moving the identity of `table` past `max_id`.
    fn sequence_reset_statement(&self, table: &str, max_id: i64) -> Option<String> {
        let _ = (table, max_id);
        None
    }

    /// Expression that draws a fresh id for `table` instead of copying one.
    fn next_id_expression(&self, table: &str) -> Option<String> {
        let _ = table;
        None
    }

    /// Count query against the server catalog, non-zero when database `name`
    /// exists. `None` for file-backed engines.
    fn database_exists_query(&self, name: &str) -> Option<String> {
        let _ = name;
        None
    }

    fn create_database_statement(&self, name: &str) -> Option<String> {
        let _ = name;
        None
    }

    /// Statement opening a transaction on the session.
    fn begin_statement(&self) -> &'static str {
        "BEGIN"
    }
}

/// One result row with shared column names.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&SqlValue> {
        self.values.get(idx)
    }

    /// Look up a value by column name, ignoring ASCII case.
    pub fn get_named(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(|idx| self.values.get(idx))
    }

    /// Text of a named column; `None` for NULL or a missing column.
    pub fn text(&self, name: &str) -> Option<String> {
        self.get_named(name).and_then(SqlValue::to_text)
    }

    /// Integer of a named column.
    pub fn int(&self, name: &str) -> Option<i64> {
        self.get_named(name).and_then(SqlValue::as_i64)
    }
}

/// A dedicated database connection executing raw SQL.
///
/// Foreign key toggles and transactions are connection-scoped, so a caller that
/// needs them keeps one session for the whole unit of work.
#[async_trait]
pub trait Session: Send {
    /// Dialect of the connected engine.
    fn dialect(&self) -> &DialectImpl;

    /// Execute a statement, returning the affected row count where reported.
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Run a query and decode all rows.
    async fn query(&mut self, sql: &str) -> Result<Vec<Row>>;

    /// First column of the first row as an integer.
    async fn query_i64(&mut self, sql: &str) -> Result<Option<i64>> {
        let rows = self.query(sql).await?;
        Ok(rows.first().and_then(|r| r.get(0)).and_then(SqlValue::as_i64))
    }

    async fn begin(&mut self) -> Result<()> {
        let stmt = self.dialect().begin_statement();
        self.execute(stmt).await.map(|_| ())
    }

    async fn commit(&mut self) -> Result<()> {
        self.execute("COMMIT").await.map(|_| ())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.execute("ROLLBACK").await.map(|_| ())
    }
}
