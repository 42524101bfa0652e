//! PostgreSQL access
//!
//! [`Database`] is the seam between the tool handlers and the driver. The
//! production [`PgDatabase`] opens one connection per call; tests swap in an
//! in-memory implementation.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, TryStreamExt};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column, Connection, Row as _, TypeInfo, ValueRef};

use crate::config::DatabaseConfig;
use crate::error::{QueryError, QueryResult};
use crate::schema::ColumnRecord;
use crate::types::{Row, Value};

const COLUMNS_QUERY: &str = "\
    SELECT table_name::text, column_name::text, data_type::text, is_nullable::text \
    FROM information_schema.columns \
    WHERE table_schema = $1 \
    ORDER BY table_name, ordinal_position";

/// Database operations needed by the tools
#[async_trait]
pub trait Database: Send + Sync {
    /// Run a query the gate has already accepted and return at most `limit`
    /// of its rows; the rest are never read
    async fn fetch_rows(&self, sql: &str, limit: usize) -> QueryResult<Vec<Row>>;

    /// Column catalogue of `schema`, ordered by table and ordinal position
    async fn fetch_columns(&self, schema: &str) -> QueryResult<Vec<ColumnRecord>>;
}

/// [`Database`] backed by a fresh PostgreSQL connection per call
#[derive(Debug, Clone)]
pub struct PgDatabase {
    options: PgConnectOptions,
    timeout: Duration,
    read_only_transaction: bool,
}

impl PgDatabase {
    /// Validates the connection string without connecting
    pub fn new(url: &str, config: &DatabaseConfig) -> QueryResult<Self> {
        let options = PgConnectOptions::from_str(url)
            .map_err(|e| QueryError::Config(format!("Invalid connection string: {}", e)))?;

        Ok(Self {
            options,
            timeout: Duration::from_secs(config.timeout_secs),
            read_only_transaction: config.read_only_transaction,
        })
    }

    async fn connect(&self) -> QueryResult<PgConnection> {
        PgConnection::connect_with(&self.options)
            .await
            .map_err(QueryError::Connection)
    }

    async fn run_rows(&self, sql: &str, limit: usize) -> QueryResult<Vec<Row>> {
        let mut conn = self.connect().await?;

        let rows = if self.read_only_transaction {
            let mut tx = conn.begin().await.map_err(QueryError::Execution)?;
            sqlx::query("SET TRANSACTION READ ONLY")
                .execute(&mut *tx)
                .await
                .map_err(QueryError::Execution)?;
            let rows = collect_rows(sqlx::query(sql).fetch(&mut *tx), limit).await?;
            tx.rollback().await.map_err(QueryError::Execution)?;
            rows
        } else {
            collect_rows(sqlx::query(sql).fetch(&mut conn), limit).await?
        };

        if let Err(e) = conn.close().await {
            tracing::debug!("Error closing connection: {}", e);
        }

        Ok(rows)
    }

    async fn run_columns(&self, schema: &str) -> QueryResult<Vec<ColumnRecord>> {
        let mut conn = self.connect().await?;

        let records = sqlx::query_as::<_, (String, String, String, String)>(COLUMNS_QUERY)
            .bind(schema)
            .fetch_all(&mut conn)
            .await
            .map_err(QueryError::Execution)?;

        if let Err(e) = conn.close().await {
            tracing::debug!("Error closing connection: {}", e);
        }

        Ok(records
            .into_iter()
            .map(|(table_name, column_name, data_type, is_nullable)| ColumnRecord {
                table_name,
                column_name,
                data_type,
                is_nullable,
            })
            .collect())
    }

    async fn with_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = QueryResult<T>>,
    ) -> QueryResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            // Dropping the future drops the connection
            Err(_elapsed) => Err(QueryError::Timeout(self.timeout.as_secs())),
        }
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn fetch_rows(&self, sql: &str, limit: usize) -> QueryResult<Vec<Row>> {
        self.with_timeout(self.run_rows(sql, limit)).await
    }

    async fn fetch_columns(&self, schema: &str) -> QueryResult<Vec<ColumnRecord>> {
        self.with_timeout(self.run_columns(schema)).await
    }
}

// ============================================================================
// Row Conversion
// ============================================================================

/// Decode rows off `stream` until it ends or `limit` rows are collected
async fn collect_rows<S>(mut stream: S, limit: usize) -> QueryResult<Vec<Row>>
where
    S: Stream<Item = Result<PgRow, sqlx::Error>> + Unpin,
{
    let mut rows = Vec::new();
    while rows.len() < limit {
        match stream.try_next().await.map_err(QueryError::Execution)? {
            Some(row) => rows.push(convert_row(&row)?),
            None => break,
        }
    }
    Ok(rows)
}

fn convert_row(row: &PgRow) -> QueryResult<Row> {
    let mut converted = Row::with_capacity(row.len());

    for (idx, column) in row.columns().iter().enumerate() {
        let decode_err = |source| QueryError::Decode {
            column: column.name().to_string(),
            source,
        };

        let raw = row.try_get_raw(idx).map_err(decode_err)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_string();
            decode_value(row, idx, &type_name).map_err(decode_err)?
        };

        converted.push(column.name(), value);
    }

    Ok(converted)
}

/// Decode one non-null value into the tagged [`Value`] set
///
/// Types outside text/number/bool become a placeholder; callers are told to
/// cast such columns to TEXT.
fn decode_value(row: &PgRow, idx: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    let value = match type_name {
        "BOOL" => Value::Bool(row.try_get::<bool, _>(idx)?),
        "INT2" => Value::from(i64::from(row.try_get::<i16, _>(idx)?)),
        "INT4" => Value::from(i64::from(row.try_get::<i32, _>(idx)?)),
        "INT8" => Value::from(row.try_get::<i64, _>(idx)?),
        "FLOAT4" => Value::from_f64(f64::from(row.try_get::<f32, _>(idx)?)),
        "FLOAT8" => Value::from_f64(row.try_get::<f64, _>(idx)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "UNKNOWN" => {
            Value::Text(row.try_get::<String, _>(idx)?)
        }
        "JSON" | "JSONB" => Value::Text(row.try_get::<serde_json::Value, _>(idx)?.to_string()),
        other => Value::Text(placeholder(other)),
    };
    Ok(value)
}

fn placeholder(type_name: &str) -> String {
    format!("<{} value>", type_name.to_lowercase())
}
