//! SQLite executor on a `sqlx` pool

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

use crate::backends::core::{compile_named, ExecuteResult, QueryExecutor, Row, SqlDialect};
use crate::config::{DatabaseConfig, PoolConfig};
use crate::constraint::Parameters;
use crate::error::{ModelError, OrmResult};
use crate::model::{descriptor_of, Constrainable};
use crate::value::{Value, DATETIME_FORMAT, DATE_FORMAT};

/// SQLite connection pool implementation
#[derive(Debug, Clone)]
pub struct SqliteExecutor {
    pool: SqlitePool,
}

impl SqliteExecutor {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool for `url`.
    ///
    /// In-memory databases live only as long as their connection, so they get
    /// a single connection that is never recycled.
    pub async fn connect(url: &str, config: &PoolConfig) -> OrmResult<Self> {
        let mut options = SqlitePoolOptions::new()
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout());

        options = if is_memory_url(url) {
            options.max_connections(1).idle_timeout(None).max_lifetime(None)
        } else {
            options
                .max_connections(config.max_connections)
                .idle_timeout(config.idle_timeout())
                .max_lifetime(config.max_lifetime())
        };

        let pool = options
            .connect(url)
            .await
            .map_err(|e| ModelError::Connection(format!("Failed to open SQLite pool: {}", e)))?;

        tracing::info!("SQLite pool ready for {}", url);
        Ok(Self { pool })
    }

    /// Open the named connection from `config`
    pub async fn from_config(config: &DatabaseConfig, connection_name: &str) -> OrmResult<Self> {
        config.validate()?;
        let url = config.connection_string(connection_name)?;
        Self::connect(url, &config.pool).await
    }

    /// Open the connection named by the descriptor of `C`
    pub async fn for_model<C: Constrainable>(config: &DatabaseConfig) -> OrmResult<Self> {
        let descriptor = descriptor_of::<C>()?;
        Self::from_config(config, descriptor.connection_name()).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl QueryExecutor for SqliteExecutor {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::SQLite
    }

    async fn fetch_all(&self, sql: &str, parameters: &Parameters) -> OrmResult<Vec<Row>> {
        let compiled = compile_named(sql, parameters, self.dialect())?;

        let mut query = sqlx::query(&compiled.sql);
        for value in &compiled.values {
            query = bind_value(query, value);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute(&self, sql: &str, parameters: &Parameters) -> OrmResult<ExecuteResult> {
        let compiled = compile_named(sql, parameters, self.dialect())?;

        let mut query = sqlx::query(&compiled.sql);
        for value in &compiled.values {
            query = bind_value(query, value);
        }

        let result = query.execute(&self.pool).await?;
        Ok(ExecuteResult {
            rows_affected: result.rows_affected(),
            last_insert_id: Some(result.last_insert_rowid()),
        })
    }
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Bind a Value to a sqlx query; temporal values and UUIDs are stored as text
fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Int16(i) => query.bind(*i),
        Value::Int32(i) => query.bind(*i),
        Value::Int64(i) => query.bind(*i),
        Value::Float32(f) => query.bind(*f),
        Value::Float64(f) => query.bind(*f),
        Value::String(s) => query.bind(s.clone()),
        Value::DateTime(dt) => query.bind(dt.format(DATETIME_FORMAT).to_string()),
        Value::Date(d) => query.bind(d.format(DATE_FORMAT).to_string()),
        Value::Uuid(u) => query.bind(u.to_string()),
    }
}

/// Convert a SQLite row using each value's storage class
fn decode_row(row: &SqliteRow) -> OrmResult<Row> {
    let mut columns = Vec::with_capacity(row.len());

    for (index, column) in row.columns().iter().enumerate() {
        let storage = {
            let raw = row.try_get_raw(index)?;
            if raw.is_null() {
                None
            } else {
                Some(raw.type_info().name().to_string())
            }
        };

        let value = match storage.as_deref() {
            None => Value::Null,
            Some("INTEGER") | Some("BOOLEAN") => Value::Int64(row.try_get_unchecked::<i64, _>(index)?),
            Some("REAL") => Value::Float64(row.try_get_unchecked::<f64, _>(index)?),
            Some("BLOB") => {
                let bytes = row.try_get_unchecked::<Vec<u8>, _>(index)?;
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            }
            Some(_) => Value::String(row.try_get_unchecked::<String, _>(index)?),
        };

        columns.push((column.name().to_string(), value));
    }

    Ok(Row::new(columns))
}
