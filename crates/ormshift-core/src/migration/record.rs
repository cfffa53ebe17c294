//! Per-entity and per-run counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the batch copier did for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMigrationRecord {
    /// Entity name.
    pub entity_name: String,
    /// Rows read from the source.
    pub source_row_count: u64,
    /// Destination row count queried after the copy.
    pub destination_row_count_after_copy: u64,
    /// Batches issued (planned batches in dry-run mode).
    pub batches_processed: u64,
    /// Batches whose write failed.
    pub errors_encountered: u64,
    /// Rows handed to successful write calls.
    pub rows_submitted: u64,
    /// Rows the destination reported as newly inserted.
    pub rows_inserted: u64,
}

impl EntityMigrationRecord {
    /// Create an empty record.
    pub fn new(entity_name: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
            source_row_count: 0,
            destination_row_count_after_copy: 0,
            batches_processed: 0,
            errors_encountered: 0,
            rows_submitted: 0,
            rows_inserted: 0,
        }
    }

    /// Rows skipped by the destination as already present.
    pub fn rows_skipped(&self) -> u64 {
        self.rows_submitted.saturating_sub(self.rows_inserted)
    }
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRunStats {
    /// Entities processed.
    pub tables_processed: u64,
    /// Rows submitted across all entities.
    pub records_migrated: u64,
    /// Batch errors across all entities.
    pub errors_encountered: u64,
    /// Run start.
    pub start_time: DateTime<Utc>,
    /// Run end, set when the run finishes.
    pub end_time: Option<DateTime<Utc>>,
    /// Elapsed milliseconds, set when the run finishes.
    pub duration_ms: Option<i64>,
}

impl MigrationRunStats {
    /// Start a new run.
    pub fn start(start_time: DateTime<Utc>) -> Self {
        Self {
            tables_processed: 0,
            records_migrated: 0,
            errors_encountered: 0,
            start_time,
            end_time: None,
            duration_ms: None,
        }
    }

    /// Recompute the totals from the entity records.
    pub fn accumulate(&mut self, records: &[EntityMigrationRecord]) {
        self.tables_processed = records.len() as u64;
        self.records_migrated = records.iter().map(|r| r.rows_submitted).sum();
        self.errors_encountered = records.iter().map(|r| r.errors_encountered).sum();
    }

    /// Stamp the end of the run.
    pub fn finish(&mut self, end_time: DateTime<Utc>) {
        self.end_time = Some(end_time);
        self.duration_ms = Some((end_time - self.start_time).num_milliseconds());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_are_sum_of_records() {
        let mut profiles = EntityMigrationRecord::new("profiles");
        profiles.rows_submitted = 2500;
        profiles.errors_encountered = 1;
        let mut posts = EntityMigrationRecord::new("posts");
        posts.rows_submitted = 40;

        let mut stats = MigrationRunStats::start(Utc::now());
        stats.accumulate(&[profiles, posts]);

        assert_eq!(stats.tables_processed, 2);
        assert_eq!(stats.records_migrated, 2540);
        assert_eq!(stats.errors_encountered, 1);
    }

    #[test]
    fn test_finish_sets_duration() {
        let start = Utc::now();
        let mut stats = MigrationRunStats::start(start);
        stats.finish(start + chrono::Duration::milliseconds(1500));
        assert_eq!(stats.duration_ms, Some(1500));
    }

    #[test]
    fn test_rows_skipped() {
        let mut record = EntityMigrationRecord::new("users");
        record.rows_submitted = 10;
        record.rows_inserted = 7;
        assert_eq!(record.rows_skipped(), 3);
    }
}
