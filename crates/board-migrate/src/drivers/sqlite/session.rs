//! SQLite session over one pooled SQLx connection.
//!
//! SQLite is dynamically typed, so each value is decoded by its runtime
//! storage class rather than the declared column type.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{Sqlite, SqlitePool, SqliteRow};
use sqlx::{Column, Executor as _, Row as _, TypeInfo, ValueRef};
use tracing::trace;

use super::dialect::SqliteDialect;
use crate::core::traits::{Row, Session};
use crate::core::value::SqlValue;
use crate::drivers::common::{is_connection_error, sql_preview};
use crate::drivers::DialectImpl;
use crate::error::{MigrateError, Result};

/// A dedicated SQLite connection.
pub struct SqliteSession {
    conn: PoolConnection<Sqlite>,
    dialect: DialectImpl,
}

impl SqliteSession {
    pub async fn acquire(pool: &SqlitePool) -> Result<Self> {
        let conn = pool
            .acquire()
            .await
            .map_err(|e| MigrateError::pool(e, "acquiring SQLite connection"))?;
        Ok(Self {
            conn,
            dialect: DialectImpl::Sqlite(SqliteDialect::new()),
        })
    }
}

#[async_trait]
impl Session for SqliteSession {
    fn dialect(&self) -> &DialectImpl {
        &self.dialect
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        trace!(sql = %sql_preview(sql), "execute");
        let result = (&mut *self.conn)
            .execute(sqlx::raw_sql(sql))
            .await
            .map_err(|e| statement_error(sql, &e))?;
        Ok(result.rows_affected())
    }

    async fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        trace!(sql = %sql_preview(sql), "query");
        let rows = (&mut *self.conn)
            .fetch_all(sqlx::raw_sql(sql))
            .await
            .map_err(|e| statement_error(sql, &e))?;

        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let columns: Arc<[String]> = first
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        Ok(rows
            .iter()
            .map(|row| {
                let values = (0..row.len()).map(|idx| decode_value(row, idx)).collect();
                Row::new(Arc::clone(&columns), values)
            })
            .collect())
    }
}

fn statement_error(sql: &str, e: &sqlx::Error) -> MigrateError {
    if is_connection_error(e) {
        MigrateError::connection_lost(sql_preview(sql), e)
    } else {
        MigrateError::query(sql_preview(sql), describe(e))
    }
}

fn describe(e: &sqlx::Error) -> String {
    match e.as_database_error() {
        Some(db) => db.message().to_string(),
        None => e.to_string(),
    }
}

/// Convert one column of a SQLite row to a [`SqlValue`].
fn decode_value(row: &SqliteRow, idx: usize) -> SqlValue {
    let storage = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return SqlValue::Null,
        Ok(raw) => raw.type_info().name().to_ascii_uppercase(),
        Err(_) => return SqlValue::Null,
    };

    let value = match storage.as_str() {
        "INTEGER" | "INT8" | "BOOLEAN" => row.try_get_unchecked::<i64, _>(idx).ok().map(SqlValue::Int),
        "REAL" => row.try_get_unchecked::<f64, _>(idx).ok().map(SqlValue::Float),
        "BLOB" => row.try_get_unchecked::<Vec<u8>, _>(idx).ok().map(SqlValue::Bytes),
        _ => row.try_get_unchecked::<String, _>(idx).ok().map(SqlValue::Text),
    };

    value.unwrap_or(SqlValue::Null)
}
