//! ormshift core - staged data migration with validation.
//!
//! Copies the rows of a relational data model from a source store to a
//! destination store in fixed-size batches, checks row-count parity and
//! records every step in a run log and a JSON report.

pub mod catalog;
pub mod config;
pub mod error;
pub mod migration;
pub mod report;
pub mod store;

pub use catalog::{platform_schema, ChildRelation, ColumnCase, EntityDef, SchemaBundle};
pub use config::{CleanupPolicy, MigrationConfig, StoreUrls};
pub use error::{MigrationError, StoreError};
pub use migration::{
    BatchCopier, EntityMigrationRecord, EntityValidation, MigrationOrchestrator, MigrationPhase,
    MigrationRunStats, PhaseName, PhaseStatus, Validator,
};
pub use report::{write_report, MigrationReport, OverallStatus, RunLog};
pub use store::{open_destination, open_source, DestinationStore, MemoryStore, Row, SourceStore, SqliteStore, StoreHandle};

#[cfg(feature = "postgres")]
pub use store::PostgresStore;
