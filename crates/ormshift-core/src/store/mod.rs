//! Source and destination store capabilities.
//!
//! The migration engine never talks to a database directly. It receives
//! store handles implementing these traits and calls them one at a time:
//!
//! - [`SourceStore`] is read-only: full row sets and counts.
//! - [`DestinationStore`] accepts batches with insert-or-skip semantics:
//!   rows that collide with an existing identity are dropped, never
//!   overwritten.
//!
//! Implementations: [`MemoryStore`] (in process), [`SqliteStore`] and, with
//! the `postgres` feature, [`PostgresStore`]. [`open_source`] and
//! [`open_destination`] pick one from a connection URL.

mod memory;
#[cfg(feature = "postgres")]
mod postgres;
mod row;
mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
pub use row::{compare_values, Row};
pub use sqlite::SqliteStore;

use crate::catalog::{EntityDef, SchemaBundle};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Capabilities shared by both sides of a migration.
#[async_trait]
pub trait StoreHandle: Send + Sync {
    /// Human-readable store name for logs.
    fn name(&self) -> &str;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Check whether a table exists.
    async fn has_table(&self, table: &str) -> Result<bool, StoreError>;

    /// Count the rows of a table.
    async fn count_rows(&self, table: &str) -> Result<u64, StoreError>;

    /// Release connections. Called once from the cleanup phase.
    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Read capability of the migration source.
#[async_trait]
pub trait SourceStore: StoreHandle {
    /// Fetch every row of a table ordered by `order_by`.
    async fn fetch_rows(&self, table: &str, order_by: &str) -> Result<Vec<Row>, StoreError>;

    /// Fetch every row of an entity with its child rows nested under `related`.
    async fn fetch_entity(
        &self,
        entity: &EntityDef,
        schema: &SchemaBundle,
    ) -> Result<Vec<Row>, StoreError> {
        let mut rows = self
            .fetch_rows(&entity.source_table, &entity.identity_field)
            .await?;

        for child in &entity.children {
            let child_def = schema
                .get_entity(&child.entity)
                .ok_or_else(|| StoreError::UnknownTable(child.entity.clone()))?;
            let child_rows = self
                .fetch_rows(&child_def.source_table, &child_def.identity_field)
                .await?;
            let orphans = attach_children(
                &mut rows,
                &entity.identity_field,
                &child.entity,
                &child.foreign_key,
                child_rows,
            );
            if orphans > 0 {
                tracing::warn!(
                    entity = %entity.name,
                    child = %child.entity,
                    orphans,
                    "child rows without a parent were not attached"
                );
            }
        }

        Ok(rows)
    }
}

/// Write capability of the migration destination.
#[async_trait]
pub trait DestinationStore: StoreHandle {
    /// Insert rows, silently skipping any whose identity already exists.
    ///
    /// Returns the number of rows actually inserted. `key_column` names the
    /// identity column every row must carry.
    async fn insert_or_skip(
        &self,
        table: &str,
        key_column: &str,
        rows: &[Row],
    ) -> Result<u64, StoreError>;
}

/// Group child rows under their parents. Returns the number of orphans.
pub fn attach_children(
    parents: &mut [Row],
    parent_key: &str,
    child_name: &str,
    foreign_key: &str,
    children: Vec<Row>,
) -> usize {
    let index: HashMap<String, usize> = parents
        .iter()
        .enumerate()
        .filter_map(|(idx, row)| row.key(parent_key).map(|k| (k, idx)))
        .collect();

    let mut orphans = 0;
    for child in children {
        match child.key(foreign_key).and_then(|k| index.get(&k)) {
            Some(&idx) => parents[idx]
                .related
                .entry(child_name.to_string())
                .or_default()
                .push(child),
            None => orphans += 1,
        }
    }
    orphans
}

/// Quote an SQL identifier.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

enum OpenedStore {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
    #[cfg(feature = "postgres")]
    Postgres(PostgresStore),
}

async fn open(url: &str) -> Result<OpenedStore, StoreError> {
    if let Some(name) = url.strip_prefix("memory:") {
        let name = name.trim_start_matches('/');
        let name = if name.is_empty() { "memory" } else { name };
        return Ok(OpenedStore::Memory(MemoryStore::new(name)));
    }

    if url == "sqlite::memory:" {
        return Ok(OpenedStore::Sqlite(SqliteStore::open_in_memory()?));
    }
    if let Some(path) = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
    {
        return Ok(OpenedStore::Sqlite(SqliteStore::open(path)?));
    }

    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        #[cfg(feature = "postgres")]
        {
            return Ok(OpenedStore::Postgres(PostgresStore::connect(url).await?));
        }
        #[cfg(not(feature = "postgres"))]
        {
            return Err(StoreError::UnsupportedUrl(format!(
                "{} (built without the postgres feature)",
                redact(url)
            )));
        }
    }

    Err(StoreError::UnsupportedUrl(redact(url)))
}

/// Open a source store from a connection URL.
pub async fn open_source(url: &str) -> Result<Arc<dyn SourceStore>, StoreError> {
    Ok(match open(url).await? {
        OpenedStore::Memory(store) => Arc::new(store),
        OpenedStore::Sqlite(store) => Arc::new(store),
        #[cfg(feature = "postgres")]
        OpenedStore::Postgres(store) => Arc::new(store),
    })
}

/// Open a destination store from a connection URL.
pub async fn open_destination(url: &str) -> Result<Arc<dyn DestinationStore>, StoreError> {
    Ok(match open(url).await? {
        OpenedStore::Memory(store) => Arc::new(store),
        OpenedStore::Sqlite(store) => Arc::new(store),
        #[cfg(feature = "postgres")]
        OpenedStore::Postgres(store) => Arc::new(store),
    })
}

/// Strip credentials from a URL before it reaches a log or error.
pub fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
