//! Batch copier - moves one entity from source to destination.
//!
//! The source row set is fetched once, partitioned into fixed-size batches and
//! written one batch at a time. A failed batch is logged and counted and the
//! copier moves on; a failed source read aborts the entity.

use super::record::EntityMigrationRecord;
use crate::catalog::{EntityDef, SchemaBundle};
use crate::error::MigrationError;
use crate::report::RunLog;
use crate::store::{DestinationStore, Row, SourceStore};

const PHASE: Option<&str> = Some("database_migration");

/// Split rows into consecutive batches of `batch_size` (at least 1).
///
/// For `n` rows this yields `ceil(n / batch_size)` batches; all but the last
/// are full.
pub fn partition_into_batches<T>(rows: &[T], batch_size: usize) -> std::slice::Chunks<'_, T> {
    rows.chunks(batch_size.max(1))
}

/// Number of batches `partition_into_batches` yields.
pub fn batch_count(rows: usize, batch_size: usize) -> usize {
    rows.div_ceil(batch_size.max(1))
}

/// Copies entities batch by batch.
#[derive(Debug, Clone)]
pub struct BatchCopier {
    batch_size: usize,
    dry_run: bool,
}

/// Outcome of writing one batch.
enum BatchOutcome {
    Written,
    Failed,
    Planned,
}

impl BatchCopier {
    /// Create a copier.
    pub fn new(batch_size: usize, dry_run: bool) -> Self {
        Self {
            batch_size: batch_size.max(1),
            dry_run,
        }
    }

    /// Rows per batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Copy one entity and its nested children.
    ///
    /// Returns the parent's record followed by one record per child relation.
    pub async fn copy_entity(
        &self,
        entity: &EntityDef,
        schema: &SchemaBundle,
        source: &dyn SourceStore,
        destination: &dyn DestinationStore,
        log: &RunLog,
    ) -> Result<Vec<EntityMigrationRecord>, MigrationError> {
        let rows = source
            .fetch_entity(entity, schema)
            .await
            .map_err(|source| MigrationError::SourceRead {
                entity: entity.name.clone(),
                source,
            })?;

        let mut record = EntityMigrationRecord::new(&entity.name);
        record.source_row_count = rows.len() as u64;

        let mut children = Vec::with_capacity(entity.children.len());
        for relation in &entity.children {
            let child_def =
                schema
                    .get_entity(&relation.entity)
                    .ok_or_else(|| MigrationError::InvalidSchema {
                        message: format!(
                            "entity '{}' references unknown child '{}'",
                            entity.name, relation.entity
                        ),
                    })?;
            let mut child_record = EntityMigrationRecord::new(&child_def.name);
            child_record.source_row_count = rows
                .iter()
                .map(|r| r.related.get(&child_def.name).map_or(0, Vec::len) as u64)
                .sum();
            children.push((child_def, child_record));
        }

        let total = batch_count(rows.len(), self.batch_size);
        log.info(
            PHASE,
            format!(
                "{}: {} rows from {} in {} batches of {}{}",
                entity.name,
                rows.len(),
                entity.source_table,
                total,
                self.batch_size,
                if self.dry_run { " (dry run)" } else { "" }
            ),
        )
        .await;

        for (idx, batch) in partition_into_batches(&rows, self.batch_size).enumerate() {
            let label = format!("{} batch {}/{}", entity.name, idx + 1, total);
            let outcome = self
                .write_batch(entity, batch, &label, &mut record, destination, log)
                .await;

            if matches!(outcome, BatchOutcome::Failed) {
                if entity.has_children() {
                    log.warn(PHASE, format!("{label}: nested rows skipped after parent failure"))
                        .await;
                }
                continue;
            }

            // Second pass: children of this parent batch, once the parents exist.
            for (child_def, child_record) in children.iter_mut() {
                let nested: Vec<Row> = batch
                    .iter()
                    .filter_map(|parent| parent.related.get(&child_def.name))
                    .flatten()
                    .cloned()
                    .collect();
                let nested_total = batch_count(nested.len(), self.batch_size);
                for (child_idx, child_batch) in
                    partition_into_batches(&nested, self.batch_size).enumerate()
                {
                    let child_label = format!(
                        "{label} -> {} {}/{}",
                        child_def.name,
                        child_idx + 1,
                        nested_total
                    );
                    self.write_batch(child_def, child_batch, &child_label, child_record, destination, log)
                        .await;
                }
            }
        }

        record.destination_row_count_after_copy =
            destination.count_rows(&entity.destination_table).await?;
        let mut records = vec![record];
        for (child_def, mut child_record) in children {
            child_record.destination_row_count_after_copy =
                destination.count_rows(&child_def.destination_table).await?;
            records.push(child_record);
        }

        for record in &records {
            let message = format!(
                "{}: {} source rows, {} submitted, {} inserted, {} batch errors, destination now {}",
                record.entity_name,
                record.source_row_count,
                record.rows_submitted,
                record.rows_inserted,
                record.errors_encountered,
                record.destination_row_count_after_copy
            );
            if record.errors_encountered > 0 {
                log.warn(PHASE, message).await;
            } else {
                log.info(PHASE, message).await;
            }
        }

        Ok(records)
    }

    async fn write_batch(
        &self,
        entity: &EntityDef,
        batch: &[Row],
        label: &str,
        record: &mut EntityMigrationRecord,
        destination: &dyn DestinationStore,
        log: &RunLog,
    ) -> BatchOutcome {
        let mapped: Vec<Row> = batch.iter().map(|r| entity.to_destination_row(r)).collect();
        record.batches_processed += 1;

        if self.dry_run {
            log.info(
                PHASE,
                format!(
                    "{label}: would write {} rows to {}",
                    mapped.len(),
                    entity.destination_table
                ),
            )
            .await;
            return BatchOutcome::Planned;
        }

        match destination
            .insert_or_skip(&entity.destination_table, &entity.destination_identity(), &mapped)
            .await
        {
            Ok(inserted) => {
                record.rows_submitted += mapped.len() as u64;
                record.rows_inserted += inserted;
                log.info(
                    PHASE,
                    format!("{label}: submitted {}, inserted {}", mapped.len(), inserted),
                )
                .await;
                BatchOutcome::Written
            }
            Err(e) => {
                record.errors_encountered += 1;
                log.error(PHASE, format!("{label}: write failed: {e}")).await;
                BatchOutcome::Failed
            }
        }
    }
}
