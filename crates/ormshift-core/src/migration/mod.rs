//! Migration engine.
//!
//! A run moves every entity of a [`SchemaBundle`](crate::catalog::SchemaBundle)
//! through six phases:
//!
//! | Phase | Work |
//! |-------|------|
//! | `preparation` | Output directories, store ping, destination counts before the copy |
//! | `schema_validation` | Bundle consistency, tables present on both sides |
//! | `database_migration` | Batch copy of each top-level entity and its nested children |
//! | `api_analysis` | Route handler inventory and query translation |
//! | `validation` | Row-count parity per entity |
//! | `cleanup` | Close store connections |
//!
//! # Example
//!
//! ```ignore
//! use ormshift_core::migration::MigrationOrchestrator;
//!
//! let mut orchestrator = MigrationOrchestrator::new(source, destination, schema, config);
//! let report = orchestrator.run().await?;
//! println!("{}", report.summary(orchestrator.report_path()));
//! report.ensure_success()?;
//! ```

pub mod api_analysis;
pub mod copier;
pub mod orchestrator;
pub mod phase;
pub mod record;
pub mod validator;

pub use api_analysis::{
    translate_expression, ApiAnalyzer, ApiEndpointRecord, EndpointStatus, HttpMethod,
};
pub use copier::{batch_count, partition_into_batches, BatchCopier};
pub use orchestrator::MigrationOrchestrator;
pub use phase::{MigrationPhase, PhaseName, PhaseStatus};
pub use record::{EntityMigrationRecord, MigrationRunStats};
pub use validator::{EntityValidation, ValidationOutcome, Validator};
