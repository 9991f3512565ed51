//! SQLite SQL dialect (Strategy pattern).
//!
//! SQLite stores booleans as integers, has no in-place `ALTER COLUMN`, and
//! derives the next `AUTOINCREMENT` id from `sqlite_sequence` on its own.

use crate::core::identifier::{quote_double, quote_literal};
use crate::core::schema::{BoardField, ColumnInfo, FieldType};
use crate::core::traits::{Dialect, Row, SequenceStrategy};
use crate::dialect::typemap;
use crate::error::{MigrateError, Result};

/// SQLite dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Create a new SQLite dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn quote_ident(&self, name: &str) -> String {
        quote_double(name)
    }

    fn column_type(&self, field_type: FieldType) -> String {
        typemap::standard_column_type(field_type).to_string()
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn boolean_default(&self) -> &'static str {
        "0"
    }

    fn auto_increment_clause(&self) -> &'static str {
        "INTEGER PRIMARY KEY AUTOINCREMENT"
    }

    fn table_exists_query(&self, table: &str) -> String {
        format!(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = {}",
            quote_literal(table)
        )
    }

    fn toggle_foreign_keys(&self, enable: bool) -> String {
        format!("PRAGMA foreign_keys = {}", if enable { "ON" } else { "OFF" })
    }

    fn list_columns_query(&self, table: &str) -> String {
        format!("PRAGMA table_info({})", self.quote_ident(table))
    }

    fn column_from_row(&self, row: &Row) -> Result<ColumnInfo> {
        // PRAGMA table_info: cid, name, type, notnull, dflt_value, pk
        let name = row
            .text("name")
            .ok_or_else(|| MigrateError::query("reading SQLite columns", "missing name"))?;
        let primary_key = row.int("pk").unwrap_or(0) > 0;

        Ok(ColumnInfo {
            name,
            data_type: row.text("type").unwrap_or_default(),
            // INTEGER PRIMARY KEY is a rowid alias and never NULL
            nullable: row.int("notnull").unwrap_or(0) == 0 && !primary_key,
            default: row.text("dflt_value"),
            primary_key,
        })
    }

    fn list_tables_query(&self) -> String {
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
            .to_string()
    }

    fn modify_column_statements(&self, _table: &str, _field: &BoardField) -> Option<Vec<String>> {
        None
    }

    fn sequence_strategy(&self) -> SequenceStrategy {
        SequenceStrategy::Implicit
    }
}
