//! Row-count parity between source and destination.
//!
//! Each entity is counted twice, once per store, with two independent
//! queries. An entity passes iff the counts are equal.
//!
//! Count parity does not detect content mismatches: two tables with the same
//! number of rows but different field values, or with duplicates on one side
//! masked by missing rows, both pass.

use crate::catalog::EntityDef;
use crate::report::RunLog;
use crate::store::{DestinationStore, SourceStore};
use serde::{Deserialize, Serialize};

const PHASE: Option<&str> = Some("validation");

/// Parity result for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityValidation {
    /// Entity name.
    pub entity_name: String,
    /// Source row count, if it could be read.
    pub source_count: Option<u64>,
    /// Destination row count, if it could be read.
    pub destination_count: Option<u64>,
    /// Whether both counts were read and are equal.
    pub passed: bool,
    /// Count query failure, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EntityValidation {
    /// Compare two counts.
    pub fn compare(entity_name: impl Into<String>, source_count: u64, destination_count: u64) -> Self {
        Self {
            entity_name: entity_name.into(),
            source_count: Some(source_count),
            destination_count: Some(destination_count),
            passed: source_count == destination_count,
            error: None,
        }
    }
}

/// Result of validating a set of entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// Per-entity detail in the order checked.
    pub entities: Vec<EntityValidation>,
}

impl ValidationOutcome {
    /// True if every entity passed.
    pub fn all_passed(&self) -> bool {
        self.entities.iter().all(|e| e.passed)
    }

    /// Names of entities that failed.
    pub fn failed_entities(&self) -> Vec<String> {
        self.entities
            .iter()
            .filter(|e| !e.passed)
            .map(|e| e.entity_name.clone())
            .collect()
    }
}

/// Compares row counts.
#[derive(Debug, Default, Clone, Copy)]
pub struct Validator;

impl Validator {
    /// Check every entity in order. Never returns early: a count that cannot
    /// be read fails that entity and the check moves on.
    pub async fn validate(
        &self,
        entities: &[&EntityDef],
        source: &dyn SourceStore,
        destination: &dyn DestinationStore,
        log: &RunLog,
    ) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();

        for entity in entities {
            let source_count = source.count_rows(&entity.source_table).await;
            let destination_count = destination.count_rows(&entity.destination_table).await;

            let result = match (source_count, destination_count) {
                (Ok(s), Ok(d)) => {
                    let result = EntityValidation::compare(&entity.name, s, d);
                    if result.passed {
                        log.info(PHASE, format!("{}: {} rows on both sides", entity.name, s))
                            .await;
                    } else {
                        log.error(
                            PHASE,
                            format!("{}: count mismatch, source {} destination {}", entity.name, s, d),
                        )
                        .await;
                    }
                    result
                }
                (s, d) => {
                    let source_count = s.as_ref().ok().copied();
                    let destination_count = d.as_ref().ok().copied();
                    let error = [s.err(), d.err()]
                        .into_iter()
                        .flatten()
                        .map(|e| e.to_string())
                        .collect::<Vec<_>>()
                        .join("; ");
                    log.error(PHASE, format!("{}: count failed: {error}", entity.name))
                        .await;
                    EntityValidation {
                        entity_name: entity.name.clone(),
                        source_count,
                        destination_count,
                        passed: false,
                        error: Some(error),
                    }
                }
            };
            outcome.entities.push(result);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Row};
    use serde_json::json;

    fn rows(n: usize) -> Vec<Row> {
        (0..n).map(|i| Row::new().with("id", json!(i))).collect()
    }

    #[test]
    fn test_pass_iff_equal() {
        for s in 0..4u64 {
            for d in 0..4u64 {
                assert_eq!(EntityValidation::compare("e", s, d).passed, s == d);
            }
        }
    }

    #[tokio::test]
    async fn test_empty_tables_pass() {
        let entity = EntityDef::new("users", "User", "users", "id");
        let source = MemoryStore::new("source").with_table("User");
        let destination = MemoryStore::new("dest").with_table("users");

        let outcome = Validator
            .validate(&[&entity], &source, &destination, &RunLog::disabled())
            .await;

        assert!(outcome.all_passed());
        assert_eq!(outcome.entities[0].source_count, Some(0));
        assert_eq!(outcome.entities[0].destination_count, Some(0));
    }

    #[tokio::test]
    async fn test_checks_every_entity_after_a_mismatch() {
        let users = EntityDef::new("users", "User", "users", "id");
        let posts = EntityDef::new("posts", "Post", "posts", "id");
        let missing = EntityDef::new("tags", "Tag", "tags", "id");

        let source = MemoryStore::new("source");
        source.seed("User", "id", rows(3));
        source.seed("Post", "id", rows(2));
        let destination = MemoryStore::new("dest");
        destination.seed("users", "id", rows(2));
        destination.seed("posts", "id", rows(2));

        let outcome = Validator
            .validate(&[&users, &missing, &posts], &source, &destination, &RunLog::disabled())
            .await;

        assert_eq!(outcome.entities.len(), 3);
        assert!(!outcome.entities[0].passed);
        assert!(outcome.entities[1].error.is_some());
        assert_eq!(outcome.entities[1].source_count, None);
        assert_eq!(outcome.entities[1].destination_count, None);
        assert!(outcome.entities[2].passed);
        assert_eq!(outcome.failed_entities(), vec!["users", "tags"]);
        assert!(!outcome.all_passed());
    }

    #[tokio::test]
    async fn test_keeps_the_count_that_was_read() {
        let comments = EntityDef::new("comments", "Comment", "comments", "id");
        let source = MemoryStore::new("source");
        source.seed("Comment", "id", rows(4));
        let destination = MemoryStore::new("dest");

        let outcome = Validator
            .validate(&[&comments], &source, &destination, &RunLog::disabled())
            .await;

        let result = &outcome.entities[0];
        assert!(!result.passed);
        assert_eq!(result.source_count, Some(4));
        assert_eq!(result.destination_count, None);
        assert!(result.error.is_some());
    }
}
