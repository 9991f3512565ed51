//! MySQL/MariaDB SQL dialect (Strategy pattern).
//!
//! Provides MySQL-specific SQL syntax:
//! - Backtick identifier quoting
//! - `1`/`0` boolean literals (`BOOLEAN` is `TINYINT(1)`)
//! - `MEDIUMTEXT` post bodies, since `TEXT` caps at 64 KiB
//! - `MODIFY COLUMN` for in-place column changes

use crate::core::identifier::{quote_backtick, quote_literal};
use crate::core::schema::{BoardField, ColumnInfo, FieldType};
use crate::core::traits::{Dialect, Row, SequenceStrategy};
use crate::dialect::typemap;
use crate::error::{MigrateError, Result};

/// MySQL/MariaDB dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// Create a new MySQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for MysqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn quote_ident(&self, name: &str) -> String {
        quote_backtick(name)
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

    fn string_literal(&self, value: &str) -> String {
        // backslash is an escape character in MySQL's default sql_mode
        quote_literal(&value.replace('\\', "\\\\"))
    }

    fn auto_increment_clause(&self) -> &'static str {
        "INT AUTO_INCREMENT PRIMARY KEY"
    }

    fn long_text_type(&self) -> &'static str {
        "MEDIUMTEXT"
    }

    fn table_exists_query(&self, table: &str) -> String {
        format!(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_name = {}",
            quote_literal(table)
        )
    }

    fn toggle_foreign_keys(&self, enable: bool) -> String {
        format!("SET FOREIGN_KEY_CHECKS = {}", if enable { 1 } else { 0 })
    }

    fn list_columns_query(&self, table: &str) -> String {
        format!("SHOW COLUMNS FROM {}", self.quote_ident(table))
    }

    fn column_from_row(&self, row: &Row) -> Result<ColumnInfo> {
        // SHOW COLUMNS: Field, Type, Null, Key, Default, Extra
        let name = row
            .text("Field")
            .ok_or_else(|| MigrateError::query("reading MySQL columns", "missing Field"))?;

        Ok(ColumnInfo {
            name,
            data_type: row.text("Type").unwrap_or_default(),
            nullable: row
                .text("Null")
                .map(|v| v.eq_ignore_ascii_case("YES"))
                .unwrap_or(true),
            default: row.text("Default"),
            primary_key: row
                .text("Key")
                .map(|k| k.eq_ignore_ascii_case("PRI"))
                .unwrap_or(false),
        })
    }

    fn list_tables_query(&self) -> String {
        "SELECT table_name AS table_name FROM information_schema.tables \
         WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' ORDER BY table_name"
            .to_string()
    }

    fn modify_column_statements(&self, table: &str, field: &BoardField) -> Option<Vec<String>> {
        Some(vec![format!(
            "ALTER TABLE {} MODIFY COLUMN {}",
            self.quote_ident(table),
            typemap::column_definition(self, field)
        )])
    }

    fn sequence_strategy(&self) -> SequenceStrategy {
        SequenceStrategy::AutoIncrement
    }

    fn sequence_check_query(&self, table: &str) -> Option<String> {
        Some(format!(
            "SELECT COUNT(*) FROM information_schema.columns \
             WHERE table_schema = DATABASE() AND table_name = {} \
             AND column_name = 'id' AND extra LIKE '%auto_increment%'",
            quote_literal(table)
        ))
    }

    fn sequence_reset_statement(&self, table: &str, max_id: i64) -> Option<String> {
        Some(format!(
            "ALTER TABLE {} AUTO_INCREMENT = {}",
            self.quote_ident(table),
            max_id + 1
        ))
    }

    fn database_exists_query(&self, name: &str) -> Option<String> {
        Some(format!(
            "SELECT COUNT(*) FROM information_schema.schemata WHERE schema_name = {}",
            quote_literal(name)
        ))
    }

    fn create_database_statement(&self, name: &str) -> Option<String> {
        Some(format!(
            "CREATE DATABASE {} CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci",
            self.quote_ident(name)
        ))
    }

    fn begin_statement(&self) -> &'static str {
        "START TRANSACTION"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::value::SqlValue;

    #[test]
    fn test_quote_ident() {
        let dialect = MysqlDialect::new();
        assert_eq!(dialect.quote_ident("users"), "`users`");
        assert_eq!(dialect.quote_ident("tab`le"), "`tab``le`");
    }

    #[test]
    fn test_boolean_literals() {
        let dialect = MysqlDialect::new();
        assert_eq!(dialect.boolean_literal(true), "1");
        assert_eq!(dialect.boolean_literal(false), "0");
    }

    #[test]
    fn test_string_literal_escapes_backslash() {
        let dialect = MysqlDialect::new();
        assert_eq!(dialect.string_literal("it's"), "'it''s'");
        assert_eq!(dialect.string_literal("C:\\tmp\\"), "'C:\\\\tmp\\\\'");
    }

    #[test]
    fn test_modify_column_uses_full_definition() {
        let dialect = MysqlDialect::new();
        let field = BoardField::new("summary", FieldType::Textarea).required(true);
        let stmts = dialect.modify_column_statements("board_free", &field).unwrap();
        assert_eq!(
            stmts,
            vec!["ALTER TABLE `board_free` MODIFY COLUMN `summary` TEXT NOT NULL".to_string()]
        );
    }

    #[test]
    fn test_auto_increment_reset() {
        let dialect = MysqlDialect::new();
        assert_eq!(dialect.sequence_strategy(), SequenceStrategy::AutoIncrement);
        assert_eq!(
            dialect.sequence_reset_statement("comments", 41).unwrap(),
            "ALTER TABLE `comments` AUTO_INCREMENT = 42"
        );
        assert_eq!(dialect.next_id_expression("referrer_stats"), None);
    }

    #[test]
    fn test_create_database_uses_utf8mb4() {
        let dialect = MysqlDialect::new();
        assert_eq!(
            dialect.create_database_statement("board").unwrap(),
            "CREATE DATABASE `board` CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci"
        );
    }

    #[test]
    fn test_column_from_show_columns_row() {
        let dialect = MysqlDialect::new();
        let columns: Arc<[String]> = ["Field", "Type", "Null", "Key", "Default", "Extra"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let row = Row::new(
            columns,
            vec![
                SqlValue::from("id"),
                SqlValue::Bytes(b"int".to_vec()),
                SqlValue::from("NO"),
                SqlValue::from("PRI"),
                SqlValue::Null,
                SqlValue::from("auto_increment"),
            ],
        );
        let col = dialect.column_from_row(&row).unwrap();
        assert_eq!(col.name, "id");
        assert_eq!(col.data_type, "int");
        assert!(!col.nullable);
        assert!(col.primary_key);
        assert_eq!(col.default, None);
    }
}
