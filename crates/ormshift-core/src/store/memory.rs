//! In-process store.

use super::row::{compare_values, Row};
use super::{DestinationStore, SourceStore, StoreHandle};
use crate::error::StoreError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Default)]
struct MemoryTable {
    rows: Vec<Row>,
    keys: HashSet<String>,
}

/// A store kept entirely in memory.
///
/// Tables must be created before use. Insert-or-skip uniqueness is enforced
/// on the key column passed to each insert; a batch containing a row without
/// a key is rejected as a whole.
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    tables: Mutex<BTreeMap<String, MemoryTable>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Mutex::new(BTreeMap::new()),
        }
    }

    /// Create a table if it does not exist.
    pub fn create_table(&self, table: &str) {
        self.tables.lock().entry(table.to_string()).or_default();
    }

    /// Builder-style table creation.
    pub fn with_table(self, table: &str) -> Self {
        self.create_table(table);
        self
    }

    /// Append rows to a table without any uniqueness check, creating it if needed.
    ///
    /// Used to seed a source store.
    pub fn seed(&self, table: &str, key_column: &str, rows: impl IntoIterator<Item = Row>) {
        let mut tables = self.tables.lock();
        let entry = tables.entry(table.to_string()).or_default();
        for row in rows {
            if let Some(key) = row.key(key_column) {
                entry.keys.insert(key);
            }
            entry.rows.push(row);
        }
    }

    /// Snapshot of a table's rows in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StoreHandle for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn has_table(&self, table: &str) -> Result<bool, StoreError> {
        Ok(self.tables.lock().contains_key(table))
    }

    async fn count_rows(&self, table: &str) -> Result<u64, StoreError> {
        self.tables
            .lock()
            .get(table)
            .map(|t| t.rows.len() as u64)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }
}

#[async_trait]
impl SourceStore for MemoryStore {
    async fn fetch_rows(&self, table: &str, order_by: &str) -> Result<Vec<Row>, StoreError> {
        let mut rows = self
            .tables
            .lock()
            .get(table)
            .map(|t| t.rows.clone())
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        rows.sort_by(|a, b| compare_values(a.get(order_by), b.get(order_by)));
        Ok(rows)
    }
}

#[async_trait]
impl DestinationStore for MemoryStore {
    async fn insert_or_skip(
        &self,
        table: &str,
        key_column: &str,
        rows: &[Row],
    ) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock();
        let entry = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;

        let keys = rows
            .iter()
            .map(|row| {
                row.key(key_column).ok_or_else(|| StoreError::InvalidRow {
                    table: table.to_string(),
                    reason: format!("missing key column '{key_column}'"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut inserted = 0;
        for (key, row) in keys.into_iter().zip(rows) {
            if entry.keys.insert(key) {
                entry.rows.push(row.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}
