//! The columnar warehouse sink. Deliberately opaque: this collector's job is
//! to validate and flatten, not to own a warehouse schema, so the sink is
//! just an `insert(rows)` boundary.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sqlx::postgres::PgPool;

#[derive(Debug, Clone, thiserror::Error)]
#[error("sink error: {0}")]
pub struct SinkError(pub String);

fn map_sqlx_err(err: sqlx::Error) -> SinkError {
    SinkError(err.to_string())
}

/// One flattened row per `(connection report, user report)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionRow {
    pub server_id: String,
    pub start_timestamp: String,
    pub end_timestamp: String,
    pub user_id: Option<String>,
    pub countries: Vec<String>,
    pub bytes_transferred: u64,
    pub tunnel_time_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub server_id: String,
    pub server_version: String,
    pub timestamp: String,
    pub data_limit_enabled: bool,
    pub per_key_limit_count: Option<u64>,
}

pub fn iso8601_millis(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms).single().map(|dt| dt.to_rfc3339()).unwrap_or_else(|| ms.to_string())
}

#[async_trait]
pub trait ColumnarSink: Send + Sync {
    async fn insert_connections(&self, rows: Vec<ConnectionRow>) -> Result<(), SinkError>;
    async fn insert_feature(&self, row: FeatureRow) -> Result<(), SinkError>;
}

pub struct PostgresSink {
    pool: PgPool,
}

impl PostgresSink {
    pub async fn connect(database_url: &str) -> Result<Self, SinkError> {
        let pool = PgPool::connect(database_url).await.map_err(map_sqlx_err)?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl ColumnarSink for PostgresSink {
    async fn insert_connections(&self, rows: Vec<ConnectionRow>) -> Result<(), SinkError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;
        for row in &rows {
            let countries = serde_json::to_value(&row.countries).map_err(|e| SinkError(e.to_string()))?;
            sqlx::query(
                r#"INSERT INTO connection_reports
                   (server_id, start_timestamp, end_timestamp, user_id, countries, bytes_transferred, tunnel_time_ms)
                   VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
            )
            .bind(&row.server_id)
            .bind(&row.start_timestamp)
            .bind(&row.end_timestamp)
            .bind(&row.user_id)
            .bind(countries)
            .bind(row.bytes_transferred as i64)
            .bind(row.tunnel_time_ms.map(|v| v as i64))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
        }
        tx.commit().await.map_err(map_sqlx_err)
    }

    async fn insert_feature(&self, row: FeatureRow) -> Result<(), SinkError> {
        sqlx::query(
            r#"INSERT INTO feature_reports
               (server_id, server_version, timestamp, data_limit_enabled, per_key_limit_count)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(&row.server_id)
        .bind(&row.server_version)
        .bind(&row.timestamp)
        .bind(row.data_limit_enabled)
        .bind(row.per_key_limit_count.map(|v| v as i64))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }
}

/// An in-memory `ColumnarSink` double used by handler tests and the
/// crate's `tests/` integration suite — no live database required.
pub mod test_support {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub struct InMemorySink {
        pub connections: Mutex<Vec<ConnectionRow>>,
        pub features: Mutex<Vec<FeatureRow>>,
    }

    #[async_trait]
    impl ColumnarSink for InMemorySink {
        async fn insert_connections(&self, rows: Vec<ConnectionRow>) -> Result<(), SinkError> {
            self.connections.lock().await.extend(rows);
            Ok(())
        }

        async fn insert_feature(&self, row: FeatureRow) -> Result<(), SinkError> {
            self.features.lock().await.push(row);
            Ok(())
        }
    }
}
