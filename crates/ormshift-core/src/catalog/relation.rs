//! Parent/child relations between migrated entities.

use serde::{Deserialize, Serialize};

/// A one-to-many relation whose child rows are migrated nested under the parent.
///
/// The child entity is declared in the same [`SchemaBundle`](super::SchemaBundle);
/// `foreign_key` is the child's source column that references the parent's
/// identity column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRelation {
    /// Name of the child entity.
    pub entity: String,
    /// Source column on the child pointing at the parent identity.
    pub foreign_key: String,
}

impl ChildRelation {
    /// Create a child relation.
    pub fn new(entity: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            foreign_key: foreign_key.into(),
        }
    }
}
