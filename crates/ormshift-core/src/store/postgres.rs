//! PostgreSQL store.
//!
//! Rows travel as JSON: reads use `row_to_json`, writes go through
//! `jsonb_populate_recordset` so one statement inserts a whole batch.

use super::row::Row;
use super::{quote_ident, redact, DestinationStore, SourceStore, StoreHandle};
use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row as _};
use std::collections::BTreeSet;

/// Maximum pooled connections per store.
pub const PG_MAX_CONNECTIONS: u32 = 5;

/// Table lookup in the connection's current schema.
const HAS_TABLE_SQL: &str = "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
     WHERE table_schema = current_schema() AND table_name = $1)";

/// A store backed by a PostgreSQL connection pool.
pub struct PostgresStore {
    name: String,
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to the database at `url`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(PG_MAX_CONNECTIONS)
            .connect(url)
            .await?;
        Ok(Self::from_pool(redact(url), pool))
    }

    /// Wrap an existing pool.
    pub fn from_pool(name: impl Into<String>, pool: PgPool) -> Self {
        Self {
            name: name.into(),
            pool,
        }
    }
}

#[async_trait]
impl StoreHandle for PostgresStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn has_table(&self, table: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(HAS_TABLE_SQL)
            .bind(table)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn count_rows(&self, table: &str) -> Result<u64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count as u64)
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.pool.close().await;
        Ok(())
    }
}

#[async_trait]
impl SourceStore for PostgresStore {
    async fn fetch_rows(&self, table: &str, order_by: &str) -> Result<Vec<Row>, StoreError> {
        let sql = format!(
            "SELECT row_to_json(t) AS row FROM {} t ORDER BY t.{}",
            quote_ident(table),
            quote_ident(order_by)
        );
        let records = sqlx::query(&sql).fetch_all(&self.pool).await?;

        records
            .iter()
            .map(|record| match record.try_get::<Value, _>("row")? {
                Value::Object(object) => Ok(Row::from_object(object)),
                other => Err(StoreError::InvalidRow {
                    table: table.to_string(),
                    reason: format!("expected a JSON object, got {other}"),
                }),
            })
            .collect()
    }
}

#[async_trait]
impl DestinationStore for PostgresStore {
    async fn insert_or_skip(
        &self,
        table: &str,
        key_column: &str,
        rows: &[Row],
    ) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        if rows.iter().any(|row| row.key(key_column).is_none()) {
            return Err(StoreError::InvalidRow {
                table: table.to_string(),
                reason: format!("missing key column '{key_column}'"),
            });
        }

        // Only columns present in the batch are listed so destination
        // defaults still apply to the others.
        let columns: BTreeSet<&str> = rows
            .iter()
            .flat_map(|row| row.values.keys().map(String::as_str))
            .collect();
        let column_list = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let quoted_table = quote_ident(table);
        let sql = format!(
            "INSERT INTO {quoted_table} ({column_list}) \
             SELECT {column_list} FROM jsonb_populate_recordset(NULL::{quoted_table}, $1) \
             ON CONFLICT DO NOTHING"
        );

        let payload = Value::Array(rows.iter().map(|r| Value::Object(r.to_object())).collect());
        let result = sqlx::query(&sql)
            .bind(sqlx::types::Json(payload))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_table_uses_catalog_views() {
        assert!(HAS_TABLE_SQL.contains("information_schema.tables"));
        assert!(HAS_TABLE_SQL.contains("table_name = $1"));
        assert!(!HAS_TABLE_SQL.contains("regclass"));
    }
}
