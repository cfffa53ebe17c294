//! Entity definitions.

use super::relation::ChildRelation;
use crate::store::Row;
use serde::{Deserialize, Serialize};

/// How column names are carried from the source to the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnCase {
    /// Keep the source column name.
    Preserve,
    /// Convert `camelCase` source names to `snake_case`.
    #[default]
    SnakeCase,
}

impl ColumnCase {
    /// Apply the convention to a source column name.
    pub fn apply(self, column: &str) -> String {
        match self {
            ColumnCase::Preserve => column.to_string(),
            ColumnCase::SnakeCase => to_snake_case(column),
        }
    }
}

/// An explicit source -> destination column rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Column name in the source table.
    pub source: String,
    /// Column name in the destination table.
    pub destination: String,
}

/// An entity definition: one logical table present in both representations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    /// Entity name (unique within a schema).
    pub name: String,
    /// Table name in the source store.
    pub source_table: String,
    /// Table name in the destination store.
    pub destination_table: String,
    /// Source column holding the unique identity.
    pub identity_field: String,
    /// Naming convention for columns without an explicit mapping.
    #[serde(default)]
    pub column_case: ColumnCase,
    /// Explicit column renames, applied before `column_case`.
    #[serde(default)]
    pub columns: Vec<ColumnMapping>,
    /// Child entities migrated nested under this one.
    #[serde(default)]
    pub children: Vec<ChildRelation>,
}

impl EntityDef {
    /// Create a new entity definition with snake_case column conversion.
    pub fn new(
        name: impl Into<String>,
        source_table: impl Into<String>,
        destination_table: impl Into<String>,
        identity_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source_table: source_table.into(),
            destination_table: destination_table.into(),
            identity_field: identity_field.into(),
            column_case: ColumnCase::default(),
            columns: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Set the column naming convention.
    pub fn with_column_case(mut self, case: ColumnCase) -> Self {
        self.column_case = case;
        self
    }

    /// Add an explicit column rename.
    pub fn with_column(mut self, source: impl Into<String>, destination: impl Into<String>) -> Self {
        self.columns.push(ColumnMapping {
            source: source.into(),
            destination: destination.into(),
        });
        self
    }

    /// Add a child relation.
    pub fn with_child(mut self, entity: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        self.children.push(ChildRelation::new(entity, foreign_key));
        self
    }

    /// Destination name for a source column.
    pub fn destination_column(&self, source: &str) -> String {
        self.columns
            .iter()
            .find(|m| m.source == source)
            .map(|m| m.destination.clone())
            .unwrap_or_else(|| self.column_case.apply(source))
    }

    /// Destination name of the identity column.
    pub fn destination_identity(&self) -> String {
        self.destination_column(&self.identity_field)
    }

    /// Map a source row to its destination shape.
    ///
    /// Columns are renamed; nested related rows are dropped since they are
    /// written separately.
    pub fn to_destination_row(&self, row: &Row) -> Row {
        let mut out = Row::new();
        for (column, value) in &row.values {
            out.values
                .insert(self.destination_column(column), value.clone());
        }
        out
    }

    /// Check whether this entity has nested children.
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower = false;
        } else {
            prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snake_case_conversion() {
        assert_eq!(to_snake_case("createdAt"), "created_at");
        assert_eq!(to_snake_case("userId"), "user_id");
        assert_eq!(to_snake_case("id"), "id");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case("profileURL"), "profile_url");
        assert_eq!(to_snake_case("line2Address"), "line2_address");
    }

    #[test]
    fn test_entity_builder() {
        let entity = EntityDef::new("posts", "Post", "posts", "id")
            .with_column("authorId", "author_profile_id")
            .with_child("post_comments", "postId");

        assert_eq!(entity.name, "posts");
        assert_eq!(entity.column_case, ColumnCase::SnakeCase);
        assert_eq!(entity.columns.len(), 1);
        assert!(entity.has_children());
    }

    #[test]
    fn test_destination_row_mapping() {
        let entity = EntityDef::new("posts", "Post", "posts", "id")
            .with_column("authorId", "author_profile_id");

        let mut row = Row::new()
            .with("id", json!("p1"))
            .with("authorId", json!("u1"))
            .with("createdAt", json!("2024-01-01"));
        row.related
            .insert("post_comments".to_string(), vec![Row::new().with("id", json!("c1"))]);

        let mapped = entity.to_destination_row(&row);
        assert_eq!(mapped.get("id"), Some(&json!("p1")));
        assert_eq!(mapped.get("author_profile_id"), Some(&json!("u1")));
        assert_eq!(mapped.get("created_at"), Some(&json!("2024-01-01")));
        assert!(mapped.related.is_empty());
    }

    #[test]
    fn test_preserve_case() {
        let entity =
            EntityDef::new("tags", "tags", "tags", "id").with_column_case(ColumnCase::Preserve);
        assert_eq!(entity.destination_column("displayName"), "displayName");
        assert_eq!(entity.destination_identity(), "id");
    }
}
