//! PostgreSQL session over one pooled client.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use deadpool_postgres::{Object, Pool};
use tokio_postgres::types::{FromSql, Type};
use tokio_postgres::SimpleQueryMessage;
use tracing::trace;

use super::dialect::PostgresDialect;
use crate::core::traits::{Row, Session};
use crate::core::value::SqlValue;
use crate::drivers::common::sql_preview;
use crate::drivers::DialectImpl;
use crate::error::{MigrateError, Result};

/// A dedicated PostgreSQL connection.
pub struct PostgresSession {
    client: Object,
    dialect: DialectImpl,
}

impl PostgresSession {
    /// Check a client out of the pool for the lifetime of the session.
    pub async fn acquire(pool: &Pool) -> Result<Self> {
        let client = pool.get().await?;
        Ok(Self {
            client,
            dialect: DialectImpl::Postgres(PostgresDialect::new()),
        })
    }
}

#[async_trait]
impl Session for PostgresSession {
    fn dialect(&self) -> &DialectImpl {
        &self.dialect
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        trace!(sql = %sql_preview(sql), "execute");
        let messages = self
            .client
            .simple_query(sql)
            .await
            .map_err(|e| statement_error(sql, &e))?;

        Ok(messages
            .iter()
            .map(|m| match m {
                SimpleQueryMessage::CommandComplete(n) => *n,
                _ => 0,
            })
            .sum())
    }

    async fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        trace!(sql = %sql_preview(sql), "query");
        let rows = self
            .client
            .query(sql, &[])
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

/// Server message with its SQLSTATE, or the client-side error text.
fn statement_error(sql: &str, e: &tokio_postgres::Error) -> MigrateError {
    if e.is_closed() {
        MigrateError::connection_lost(sql_preview(sql), e)
    } else {
        MigrateError::query(sql_preview(sql), describe(e))
    }
}

fn describe(e: &tokio_postgres::Error) -> String {
    match e.as_db_error() {
        Some(db) => format!("{} ({})", db.message(), db.code().code()),
        None => e.to_string(),
    }
}

/// Bytes of any column type, used when no typed decoder applies.
struct RawValue(Vec<u8>);

impl<'a> FromSql<'a> for RawValue {
    fn from_sql(
        _ty: &Type,
        raw: &'a [u8],
    ) -> std::result::Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(RawValue(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a tokio_postgres::Row, idx: usize) -> Option<T> {
    row.try_get::<_, Option<T>>(idx).ok().flatten()
}

/// Convert one column of a PostgreSQL row to a [`SqlValue`].
fn decode_value(row: &tokio_postgres::Row, idx: usize) -> SqlValue {
    let ty = row.columns()[idx].type_();

    let typed = match *ty {
        Type::BOOL => get::<bool>(row, idx).map(SqlValue::Bool),
        Type::INT2 => get::<i16>(row, idx).map(|v| SqlValue::Int(v.into())),
        Type::INT4 => get::<i32>(row, idx).map(|v| SqlValue::Int(v.into())),
        Type::INT8 => get::<i64>(row, idx).map(SqlValue::Int),
        Type::OID => get::<u32>(row, idx).map(|v| SqlValue::Int(v.into())),
        Type::FLOAT4 => get::<f32>(row, idx).map(|v| SqlValue::Float(v.into())),
        Type::FLOAT8 => get::<f64>(row, idx).map(SqlValue::Float),
        Type::NUMERIC => get::<rust_decimal::Decimal>(row, idx).map(SqlValue::Decimal),
        Type::BYTEA => get::<Vec<u8>>(row, idx).map(SqlValue::Bytes),
        Type::UUID => get::<uuid::Uuid>(row, idx).map(SqlValue::Uuid),
        Type::DATE => get::<NaiveDate>(row, idx).map(SqlValue::Date),
        Type::TIME => get::<NaiveTime>(row, idx).map(SqlValue::Time),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx).map(SqlValue::DateTime),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx).map(SqlValue::DateTimeTz),
        Type::JSON | Type::JSONB => {
            get::<serde_json::Value>(row, idx).map(|v| SqlValue::Text(v.to_string()))
        }
        _ => get::<String>(row, idx).map(SqlValue::Text),
    };

    typed
        .or_else(|| {
            get::<RawValue>(row, idx)
                .map(|raw| SqlValue::Text(String::from_utf8_lossy(&raw.0).into_owned()))
        })
        .unwrap_or(SqlValue::Null)
}
