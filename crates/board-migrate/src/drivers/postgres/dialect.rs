//! PostgreSQL SQL dialect (Strategy pattern).
//!
//! Double-quoted identifiers, native `BOOLEAN`, `SERIAL` identities backed by
//! `<table>_id_seq` sequences, and catalog queries against the `public` schema.

use crate::core::identifier::{quote_double, quote_literal};
use crate::core::schema::{BoardField, ColumnInfo, FieldType};
use crate::core::traits::{Dialect, Row, SequenceStrategy};
use crate::dialect::typemap;
use crate::error::{MigrateError, Result};

/// PostgreSQL dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Create a new PostgreSQL dialect instance.
    pub fn new() -> Self {
        Self
    }

    fn sequence_name(table: &str) -> String {
        format!("{}_id_seq", table)
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn quote_ident(&self, name: &str) -> String {
        quote_double(name)
    }

    fn column_type(&self, field_type: FieldType) -> String {
        typemap::standard_column_type(field_type).to_string()
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    fn auto_increment_clause(&self) -> &'static str {
        "SERIAL PRIMARY KEY"
    }

    fn table_exists_query(&self, table: &str) -> String {
        format!(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = 'public' AND table_name = {}",
            quote_literal(table)
        )
    }

    fn toggle_foreign_keys(&self, enable: bool) -> String {
        // Replica mode skips FK triggers for the session only
        let role = if enable { "origin" } else { "replica" };
        format!("SET session_replication_role = '{}'", role)
    }

    fn list_columns_query(&self, table: &str) -> String {
        format!(
            "SELECT column_name::text AS column_name, data_type::text AS data_type, \
             is_nullable::text AS is_nullable, column_default::text AS column_default \
             FROM information_schema.columns \
             WHERE table_schema = 'public' AND table_name = {} \
             ORDER BY ordinal_position",
            quote_literal(table)
        )
    }

    fn column_from_row(&self, row: &Row) -> Result<ColumnInfo> {
        let name = row
            .text("column_name")
            .ok_or_else(|| MigrateError::query("reading PostgreSQL columns", "missing column_name"))?;
        let data_type = row.text("data_type").unwrap_or_default();
        let nullable = row
            .text("is_nullable")
            .map(|v| v.eq_ignore_ascii_case("YES"))
            .unwrap_or(true);
        let default = row.text("column_default");
        let primary_key = default
            .as_deref()
            .map(|d| d.starts_with("nextval("))
            .unwrap_or(false);

        Ok(ColumnInfo {
            name,
            data_type,
            nullable,
            default,
            primary_key,
        })
    }

    fn list_tables_query(&self) -> String {
        "SELECT tablename::text AS table_name FROM pg_tables WHERE schemaname = 'public' ORDER BY tablename"
            .to_string()
    }

    fn modify_column_statements(&self, table: &str, field: &BoardField) -> Option<Vec<String>> {
        let table = self.quote_ident(table);
        let column = self.quote_ident(&field.column_name);
        let native = self.column_type(field.field_type);
        let nullability = if field.required { "SET" } else { "DROP" };

        Some(vec![
            format!(
                "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{}",
                table, column, native, column, native
            ),
            format!(
                "ALTER TABLE {} ALTER COLUMN {} {} NOT NULL",
                table, column, nullability
            ),
        ])
    }

    fn drop_table_statement(&self, table: &str, cascade: bool) -> String {
        let mut sql = format!("DROP TABLE IF EXISTS {}", self.quote_ident(table));
        if cascade {
            sql.push_str(" CASCADE");
        }
        sql
    }

    fn sequence_strategy(&self) -> SequenceStrategy {
        SequenceStrategy::Setval
    }

    fn sequence_check_query(&self, table: &str) -> Option<String> {
        Some(format!(
            "SELECT COUNT(*) FROM pg_class WHERE relkind = 'S' AND relname = {}",
            quote_literal(&Self::sequence_name(table))
        ))
    }

    fn sequence_reset_statement(&self, table: &str, _max_id: i64) -> Option<String> {
        let sequence = quote_literal(&quote_double(&Self::sequence_name(table)));
        Some(format!(
            "SELECT setval({}, COALESCE((SELECT MAX(id) FROM {}), 1))",
            sequence,
            self.quote_ident(table)
        ))
    }

    fn next_id_expression(&self, table: &str) -> Option<String> {
        Some(format!(
            "nextval({})",
            quote_literal(&quote_double(&Self::sequence_name(table)))
        ))
    }

    fn database_exists_query(&self, name: &str) -> Option<String> {
        Some(format!(
            "SELECT COUNT(*) FROM pg_database WHERE datname = {}",
            quote_literal(name)
        ))
    }

    fn create_database_statement(&self, name: &str) -> Option<String> {
        Some(format!("CREATE DATABASE {}", self.quote_ident(name)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::value::SqlValue;

    #[test]
    fn test_quote_ident() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.quote_ident("board_free"), "\"board_free\"");
        assert_eq!(dialect.quote_ident("bo\"ard"), "\"bo\"\"ard\"");
    }

    #[test]
    fn test_toggle_foreign_keys_uses_replication_role() {
        let dialect = PostgresDialect::new();
        assert_eq!(
            dialect.toggle_foreign_keys(false),
            "SET session_replication_role = 'replica'"
        );
        assert_eq!(
            dialect.toggle_foreign_keys(true),
            "SET session_replication_role = 'origin'"
        );
    }

    #[test]
    fn test_modify_column_sets_type_then_nullability() {
        let dialect = PostgresDialect::new();
        let field = BoardField::new("price", FieldType::Number).required(true);
        let stmts = dialect.modify_column_statements("board_market", &field).unwrap();
        assert_eq!(
            stmts[0],
            "ALTER TABLE \"board_market\" ALTER COLUMN \"price\" TYPE INTEGER USING \"price\"::INTEGER"
        );
        assert_eq!(
            stmts[1],
            "ALTER TABLE \"board_market\" ALTER COLUMN \"price\" SET NOT NULL"
        );
    }

    #[test]
    fn test_sequence_statements() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.sequence_strategy(), SequenceStrategy::Setval);
        assert!(dialect
            .sequence_check_query("users")
            .unwrap()
            .ends_with("relname = 'users_id_seq'"));
        assert_eq!(
            dialect.sequence_reset_statement("users", 0).unwrap(),
            "SELECT setval('\"users_id_seq\"', COALESCE((SELECT MAX(id) FROM \"users\"), 1))"
        );
        assert_eq!(
            dialect.next_id_expression("referrer_stats").unwrap(),
            "nextval('\"referrer_stats_id_seq\"')"
        );
    }

    #[test]
    fn test_drop_table_cascade() {
        let dialect = PostgresDialect::new();
        assert_eq!(
            dialect.drop_table_statement("users", true),
            "DROP TABLE IF EXISTS \"users\" CASCADE"
        );
        assert_eq!(
            dialect.drop_table_statement("users", false),
            "DROP TABLE IF EXISTS \"users\""
        );
    }

    #[test]
    fn test_column_from_row() {
        let dialect = PostgresDialect::new();
        let columns: Arc<[String]> = ["column_name", "data_type", "is_nullable", "column_default"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let row = Row::new(
            columns,
            vec![
                SqlValue::from("due_date"),
                SqlValue::from("date"),
                SqlValue::from("NO"),
                SqlValue::Null,
            ],
        );
        let col = dialect.column_from_row(&row).unwrap();
        assert_eq!(col.name, "due_date");
        assert_eq!(col.data_type, "date");
        assert!(!col.nullable);
        assert!(!col.primary_key);
    }
}
