//! Schema definition layer.
//!
//! Describes the entities a migration moves: where each one lives in the
//! source and destination representations, how columns are renamed between
//! them and which child entities travel nested under a parent.

mod entity;
mod platform;
mod relation;
mod schema;

pub use entity::{ColumnCase, ColumnMapping, EntityDef};
pub use platform::platform_schema;
pub use relation::ChildRelation;
pub use schema::SchemaBundle;
