//! SQLite store.

use super::row::Row;
use super::{quote_ident, DestinationStore, SourceStore, StoreHandle};
use crate::error::StoreError;
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection};
use serde_json::{Number, Value};
use std::path::Path;

/// A store backed by a SQLite database file (or an in-memory database).
///
/// Inserts use `INSERT OR IGNORE`, so any uniqueness constraint declared on
/// the destination table turns a conflicting row into a no-op. Each batch runs
/// in one transaction: a row failing for another reason fails the batch.
pub struct SqliteStore {
    name: String,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        Ok(Self {
            name: format!("sqlite:{}", path.display()),
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            name: "sqlite::memory:".to_string(),
            conn: Mutex::new(Connection::open_in_memory()?),
        })
    }

    /// Run a batch of SQL statements (schema setup, seeding).
    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

#[async_trait]
impl StoreHandle for SqliteStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.conn
            .lock()
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    async fn has_table(&self, table: &str) -> Result<bool, StoreError> {
        let count: i64 = self.conn.lock().query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn count_rows(&self, table: &str) -> Result<u64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let count: i64 = self.conn.lock().query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[async_trait]
impl SourceStore for SqliteStore {
    async fn fetch_rows(&self, table: &str, order_by: &str) -> Result<Vec<Row>, StoreError> {
        let sql = format!(
            "SELECT * FROM {} ORDER BY {}",
            quote_ident(table),
            quote_ident(order_by)
        );
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([])?;
        while let Some(sql_row) = cursor.next()? {
            let mut row = Row::new();
            for (idx, column) in columns.iter().enumerate() {
                row.values.insert(column.clone(), to_json(sql_row.get_ref(idx)?));
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

#[async_trait]
impl DestinationStore for SqliteStore {
    async fn insert_or_skip(
        &self,
        table: &str,
        key_column: &str,
        rows: &[Row],
    ) -> Result<u64, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut inserted = 0u64;

        for row in rows {
            if row.key(key_column).is_none() {
                return Err(StoreError::InvalidRow {
                    table: table.to_string(),
                    reason: format!("missing key column '{key_column}'"),
                });
            }

            let columns: Vec<String> = row.values.keys().map(|c| quote_ident(c)).collect();
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "INSERT OR IGNORE INTO {} ({}) VALUES ({})",
                quote_ident(table),
                columns.join(", "),
                placeholders.join(", ")
            );
            let changed = tx.execute(&sql, params_from_iter(row.values.values().map(to_sql)))?;
            inserted += changed as u64;
        }

        tx.commit()?;
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with_users() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .execute_batch(
                r#"
                CREATE TABLE users (
                    id TEXT PRIMARY KEY,
                    full_name TEXT NOT NULL,
                    age INTEGER,
                    verified INTEGER
                );
                "#,
            )
            .unwrap();
        store
    }

    fn user(id: &str, age: i64) -> Row {
        Row::new()
            .with("id", json!(id))
            .with("full_name", json!(format!("User {id}")))
            .with("age", json!(age))
            .with("verified", json!(true))
    }

    #[tokio::test]
    async fn test_insert_or_ignore() {
        let store = store_with_users();

        let first = store
            .insert_or_skip("users", "id", &[user("a", 20), user("b", 30)])
            .await
            .unwrap();
        let second = store
            .insert_or_skip("users", "id", &[user("a", 99), user("c", 40)])
            .await
            .unwrap();

        assert_eq!(first, 2);
        assert_eq!(second, 1);
        assert_eq!(store.count_rows("users").await.unwrap(), 3);

        let rows = store.fetch_rows("users", "id").await.unwrap();
        assert_eq!(rows[0].get("age"), Some(&json!(20)));
        assert_eq!(rows[0].get("verified"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_failed_row_rolls_back_batch() {
        let store = store_with_users();
        // OR IGNORE does not cover unknown columns.
        let bad = user("x", 5).with("nickname", json!("xx"));

        let result = store.insert_or_skip("users", "id", &[user("a", 1), bad]).await;

        assert!(result.is_err());
        assert_eq!(store.count_rows("users").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_has_table_and_ping() {
        let store = store_with_users();
        store.ping().await.unwrap();
        assert!(store.has_table("users").await.unwrap());
        assert!(!store.has_table("posts").await.unwrap());
    }
}
