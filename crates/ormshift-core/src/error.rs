//! Core error types.

use thiserror::Error;

/// Errors raised by source and destination stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite backend error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// PostgreSQL backend error.
    #[cfg(feature = "postgres")]
    #[error("postgres error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Row (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The table does not exist in the store.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// A row could not be written or read in the expected shape.
    #[error("invalid row in {table}: {reason}")]
    InvalidRow {
        /// Table the row belongs to.
        table: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The connection string names a backend this build does not support.
    #[error("unsupported store url: {0}")]
    UnsupportedUrl(String),

    /// Any other backend failure.
    #[error("store failure: {0}")]
    Backend(String),
}

/// Errors raised by the migration engine.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Reading an entity from the source failed.
    #[error("failed to read {entity} from source: {source}")]
    SourceRead {
        /// Entity being read.
        entity: String,
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },

    /// Store error outside of the source-read path.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The schema bundle is inconsistent.
    #[error("invalid schema: {message}")]
    InvalidSchema {
        /// Description of the inconsistency.
        message: String,
    },

    /// A table declared in the schema is missing from a store.
    #[error("table {table} for {entity} is missing in the {side} store")]
    MissingTable {
        /// Entity the table belongs to.
        entity: String,
        /// The missing table.
        table: String,
        /// "source" or "destination".
        side: &'static str,
    },

    /// Row counts differ after migration.
    #[error("validation failed for {} entities: {}", entities.len(), entities.join(", "))]
    ValidationFailed {
        /// Entities whose counts did not match.
        entities: Vec<String>,
    },

    /// A phase failed and the run was aborted.
    #[error("phase {phase} failed: {message}")]
    PhaseFailed {
        /// Name of the failed phase.
        phase: String,
        /// Error message recorded on the phase.
        message: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error (log, report or source scan).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias for the migration engine.
pub type Result<T, E = MigrationError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_read_display() {
        let err = MigrationError::SourceRead {
            entity: "profiles".to_string(),
            source: StoreError::UnknownTable("Profile".to_string()),
        };
        let text = err.to_string();
        assert!(text.contains("profiles"));
        assert!(text.contains("unknown table: Profile"));
    }

    #[test]
    fn test_validation_failed_display() {
        let err = MigrationError::ValidationFailed {
            entities: vec!["posts".to_string(), "circles".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "validation failed for 2 entities: posts, circles"
        );
    }
}
