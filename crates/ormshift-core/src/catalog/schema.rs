//! Schema bundle - the ordered set of entities a migration moves.

use super::EntityDef;
use crate::error::MigrationError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// A versioned, ordered description of every migrated entity.
///
/// Entity order is migration order: parents must be listed before entities
/// holding foreign keys to them. Entities named as a child of another entity
/// are not migrated at top level; they travel with their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaBundle {
    /// Schema version.
    pub version: u64,
    /// Entity definitions in migration order.
    pub entities: Vec<EntityDef>,
}

impl SchemaBundle {
    /// Create an empty schema bundle.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            entities: Vec::new(),
        }
    }

    /// Add an entity to the schema.
    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.entities.push(entity);
        self
    }

    /// Get an entity by name.
    pub fn get_entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Find the entity whose source table matches a model name (case-insensitive).
    pub fn entity_for_model(&self, model: &str) -> Option<&EntityDef> {
        self.entities
            .iter()
            .find(|e| e.source_table.eq_ignore_ascii_case(model))
    }

    /// Names of all entities migrated nested under a parent.
    pub fn child_entities(&self) -> HashSet<&str> {
        self.entities
            .iter()
            .flat_map(|e| e.children.iter().map(|c| c.entity.as_str()))
            .collect()
    }

    /// Entities migrated at top level, in declared order.
    pub fn migration_order(&self) -> Vec<&EntityDef> {
        let children = self.child_entities();
        self.entities
            .iter()
            .filter(|e| !children.contains(e.name.as_str()))
            .collect()
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), MigrationError> {
        if self.entities.is_empty() {
            return Err(invalid("schema declares no entities"));
        }

        let mut positions: HashMap<&str, usize> = HashMap::new();
        for (idx, entity) in self.entities.iter().enumerate() {
            if entity.name.is_empty() {
                return Err(invalid(format!("entity at position {idx} has no name")));
            }
            if positions.insert(entity.name.as_str(), idx).is_some() {
                return Err(invalid(format!("duplicate entity '{}'", entity.name)));
            }
            if entity.identity_field.is_empty() {
                return Err(invalid(format!("entity '{}' has no identity field", entity.name)));
            }
            if entity.source_table.is_empty() || entity.destination_table.is_empty() {
                return Err(invalid(format!("entity '{}' is missing a table name", entity.name)));
            }
        }

        let mut parent_of: HashMap<&str, &str> = HashMap::new();
        for entity in &self.entities {
            for child in &entity.children {
                if child.foreign_key.is_empty() {
                    return Err(invalid(format!(
                        "child '{}' of '{}' has no foreign key",
                        child.entity, entity.name
                    )));
                }
                if child.entity == entity.name {
                    return Err(invalid(format!("entity '{}' lists itself as a child", entity.name)));
                }
                if !positions.contains_key(child.entity.as_str()) {
                    return Err(invalid(format!(
                        "entity '{}' references unknown child '{}'",
                        entity.name, child.entity
                    )));
                }
                if let Some(previous) = parent_of.insert(child.entity.as_str(), entity.name.as_str()) {
                    return Err(invalid(format!(
                        "child '{}' is claimed by both '{}' and '{}'",
                        child.entity, previous, entity.name
                    )));
                }
            }
        }

        // Nesting is one level deep.
        for (child, parent) in &parent_of {
            if parent_of.contains_key(parent) {
                return Err(invalid(format!(
                    "child '{}' has parent '{}' which is itself nested",
                    child, parent
                )));
            }
        }

        Ok(())
    }

    /// Load a schema bundle from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, MigrationError> {
        let content = std::fs::read_to_string(path)?;
        let bundle: Self = serde_json::from_str(&content)?;
        Ok(bundle)
    }
}

fn invalid(message: impl Into<String>) -> MigrationError {
    MigrationError::InvalidSchema {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blog_schema() -> SchemaBundle {
        SchemaBundle::new(1)
            .with_entity(EntityDef::new("users", "User", "users", "id"))
            .with_entity(
                EntityDef::new("posts", "Post", "posts", "id").with_child("comments", "postId"),
            )
            .with_entity(EntityDef::new("comments", "Comment", "comments", "id"))
    }

    #[test]
    fn test_valid_schema() {
        assert!(blog_schema().validate().is_ok());
    }

    #[test]
    fn test_migration_order_skips_children() {
        let schema = blog_schema();
        let order: Vec<_> = schema.migration_order().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(order, vec!["users", "posts"]);
        assert!(schema.child_entities().contains("comments"));
    }

    #[test]
    fn test_empty_schema_rejected() {
        let result = SchemaBundle::new(1).validate();
        assert!(matches!(result, Err(MigrationError::InvalidSchema { .. })));
    }

    #[test]
    fn test_duplicate_entity_rejected() {
        let schema = SchemaBundle::new(1)
            .with_entity(EntityDef::new("users", "User", "users", "id"))
            .with_entity(EntityDef::new("users", "Account", "accounts", "id"));
        let err = schema.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate entity 'users'"));
    }

    #[test]
    fn test_unknown_child_rejected() {
        let schema = SchemaBundle::new(1)
            .with_entity(EntityDef::new("posts", "Post", "posts", "id").with_child("likes", "postId"));
        let err = schema.validate().unwrap_err();
        assert!(err.to_string().contains("unknown child 'likes'"));
    }

    #[test]
    fn test_child_claimed_twice_rejected() {
        let schema = SchemaBundle::new(1)
            .with_entity(EntityDef::new("posts", "Post", "posts", "id").with_child("likes", "postId"))
            .with_entity(
                EntityDef::new("circles", "Circle", "circles", "id").with_child("likes", "circleId"),
            )
            .with_entity(EntityDef::new("likes", "Like", "likes", "id"));
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_deep_nesting_rejected() {
        let schema = SchemaBundle::new(1)
            .with_entity(EntityDef::new("a", "A", "a", "id").with_child("b", "aId"))
            .with_entity(EntityDef::new("b", "B", "b", "id").with_child("c", "bId"))
            .with_entity(EntityDef::new("c", "C", "c", "id"));
        let err = schema.validate().unwrap_err();
        assert!(err.to_string().contains("itself nested"));
    }

    #[test]
    fn test_entity_for_model() {
        let schema = blog_schema();
        assert_eq!(schema.entity_for_model("post").map(|e| e.name.as_str()), Some("posts"));
        assert!(schema.entity_for_model("tag").is_none());
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        let schema = blog_schema();
        std::fs::write(&path, serde_json::to_string_pretty(&schema).unwrap()).unwrap();

        let loaded = SchemaBundle::from_json_file(&path).unwrap();
        assert_eq!(loaded, schema);
    }
}
