//! MySQL session over one pooled SQLx connection.
//!
//! Statements go through `sqlx::raw_sql`, i.e. the text protocol, so values
//! are decoded by the column type the server reports for each result set.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::mysql::{MySql, MySqlPool, MySqlRow};
use sqlx::pool::PoolConnection;
use sqlx::{Column, Executor as _, Row as _, TypeInfo, ValueRef};
use tracing::trace;

use super::dialect::MysqlDialect;
use crate::core::traits::{Row, Session};
use crate::core::value::SqlValue;
use crate::drivers::common::{is_connection_error, sql_preview};
use crate::drivers::DialectImpl;
use crate::error::{MigrateError, Result};

/// A dedicated MySQL connection.
pub struct MysqlSession {
    conn: PoolConnection<MySql>,
    dialect: DialectImpl,
}

impl MysqlSession {
    pub async fn acquire(pool: &MySqlPool) -> Result<Self> {
        let conn = pool
            .acquire()
            .await
            .map_err(|e| MigrateError::pool(e, "acquiring MySQL connection"))?;
        Ok(Self {
            conn,
            dialect: DialectImpl::Mysql(MysqlDialect::new()),
        })
    }
}

#[async_trait]
impl Session for MysqlSession {
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
        Some(db) => match db.code() {
            Some(code) => format!("{} ({})", db.message(), code),
            None => db.message().to_string(),
        },
        None => e.to_string(),
    }
}

fn get<'r, T>(row: &'r MySqlRow, idx: usize) -> Option<T>
where
    T: sqlx::Decode<'r, MySql> + sqlx::Type<MySql>,
{
    row.try_get::<Option<T>, _>(idx).ok().flatten()
}

/// Convert one column of a MySQL row to a [`SqlValue`].
fn decode_value(row: &MySqlRow, idx: usize) -> SqlValue {
    let type_name = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return SqlValue::Null,
        Ok(raw) => raw.type_info().name().to_ascii_uppercase(),
        Err(_) => return SqlValue::Null,
    };

    let typed = match type_name.as_str() {
        "BOOLEAN" => get::<bool>(row, idx).map(SqlValue::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            get::<i64>(row, idx).map(SqlValue::Int)
        }
        name if name.ends_with("UNSIGNED") => get::<u64>(row, idx).map(|v| match i64::try_from(v) {
            Ok(i) => SqlValue::Int(i),
            Err(_) => SqlValue::Decimal(v.into()),
        }),
        "FLOAT" | "DOUBLE" => get::<f64>(row, idx).map(SqlValue::Float),
        "DECIMAL" => get::<rust_decimal::Decimal>(row, idx).map(SqlValue::Decimal),
        "DATETIME" | "TIMESTAMP" => get::<NaiveDateTime>(row, idx).map(SqlValue::DateTime),
        "DATE" => get::<NaiveDate>(row, idx).map(SqlValue::Date),
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
            get::<Vec<u8>>(row, idx).map(SqlValue::Bytes)
        }
        _ => get::<String>(row, idx).map(SqlValue::Text),
    };

    typed
        .or_else(|| get::<String>(row, idx).map(SqlValue::Text))
        .or_else(|| get::<Vec<u8>>(row, idx).map(SqlValue::Bytes))
        .unwrap_or(SqlValue::Null)
}
