//! Phase runner.
//!
//! Executes the fixed phase list in order against injected stores. The first
//! failed phase aborts every later phase; cleanup is the one exception and
//! follows the configured [`CleanupPolicy`].

use super::api_analysis::{ApiAnalyzer, ApiEndpointRecord};
use super::copier::BatchCopier;
use super::phase::{MigrationPhase, PhaseName};
use super::record::{EntityMigrationRecord, MigrationRunStats};
use super::validator::{EntityValidation, Validator};
use crate::catalog::{EntityDef, SchemaBundle};
use crate::config::{CleanupPolicy, MigrationConfig};
use crate::error::MigrationError;
use crate::report::{write_report, MigrationReport, OverallStatus, RunLog};
use crate::store::{DestinationStore, SourceStore};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Results collected while phases run.
#[derive(Default)]
struct RunState {
    entities: Vec<EntityMigrationRecord>,
    validation: Vec<EntityValidation>,
    endpoints: Vec<ApiEndpointRecord>,
    destination_counts_before: BTreeMap<String, u64>,
}

/// Runs a staged migration from one store to another.
pub struct MigrationOrchestrator {
    source: Arc<dyn SourceStore>,
    destination: Arc<dyn DestinationStore>,
    schema: SchemaBundle,
    config: MigrationConfig,
    phases: Vec<MigrationPhase>,
    log_path: Option<PathBuf>,
    report_path: Option<PathBuf>,
}

impl MigrationOrchestrator {
    /// Create an orchestrator.
    pub fn new(
        source: Arc<dyn SourceStore>,
        destination: Arc<dyn DestinationStore>,
        schema: SchemaBundle,
        config: MigrationConfig,
    ) -> Self {
        Self {
            source,
            destination,
            schema,
            config,
            phases: MigrationPhase::plan(),
            log_path: None,
            report_path: None,
        }
    }

    /// Phase states of the last run, or the pending plan before any run.
    pub fn phases(&self) -> &[MigrationPhase] {
        &self.phases
    }

    /// Run log file of the last run.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Report file of the last run.
    pub fn report_path(&self) -> Option<&Path> {
        self.report_path.as_deref()
    }

    /// The configuration in use.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Run every phase and write the report.
    ///
    /// A failed phase does not make this return `Err`: the failure is recorded
    /// in the returned report (see [`MigrationReport::ensure_success`]). `Err`
    /// means the run could not be set up or the report could not be written.
    pub async fn run(&mut self) -> Result<MigrationReport, MigrationError> {
        self.config.validate()?;

        let started = Utc::now();
        let log = if self.config.logging_enabled {
            RunLog::create(&self.config.logs_dir, &self.config.kind, started).await?
        } else {
            RunLog::disabled()
        };
        self.log_path = log.path().map(Path::to_path_buf);
        self.report_path = None;
        self.phases = MigrationPhase::plan();

        let mut stats = MigrationRunStats::start(started);
        let mut state = RunState::default();

        log.info(
            None,
            format!(
                "starting {} run: {} -> {}, batch size {}{}",
                self.config.kind,
                self.source.name(),
                self.destination.name(),
                self.config.batch_size,
                if self.config.dry_run { ", dry run" } else { "" }
            ),
        )
        .await;

        let mut aborted = false;
        for idx in 0..self.phases.len() {
            let name = self.phases[idx].name;
            if aborted
                && !(name == PhaseName::Cleanup
                    && self.config.cleanup_policy == CleanupPolicy::AlwaysRun)
            {
                log.warn(Some(name.as_str()), "skipped after earlier failure").await;
                continue;
            }

            self.phases[idx].start();
            log.info(Some(name.as_str()), name.description()).await;

            match self.execute_phase(name, &mut state, &log).await {
                Ok(()) => {
                    self.phases[idx].complete();
                    let elapsed = self.phases[idx].duration_ms().unwrap_or_default();
                    log.info(Some(name.as_str()), format!("completed in {elapsed} ms"))
                        .await;
                }
                Err(e) => {
                    self.phases[idx].fail(e.to_string());
                    log.error(Some(name.as_str()), format!("failed: {e}")).await;
                    aborted = true;
                }
            }
        }

        stats.accumulate(&state.entities);
        stats.finish(Utc::now());

        let report = MigrationReport {
            run_id: format!("{}-{}", self.config.kind, started.timestamp_millis()),
            kind: self.config.kind.clone(),
            dry_run: self.config.dry_run,
            batch_size: self.config.batch_size,
            overall_status: OverallStatus::from_phases(&self.phases),
            stats,
            phases: self.phases.clone(),
            entities: state.entities,
            validation: state.validation,
            endpoints: state.endpoints,
            destination_counts_before: state.destination_counts_before,
            log_file: self.log_path.clone(),
        };

        let path = write_report(&self.config.reports_dir, &report).await?;
        log.info(
            None,
            format!("run {}: {}, report written to {}", report.run_id, report.overall_status, path.display()),
        )
        .await;
        self.report_path = Some(path);

        Ok(report)
    }

    async fn execute_phase(
        &self,
        name: PhaseName,
        state: &mut RunState,
        log: &RunLog,
    ) -> Result<(), MigrationError> {
        match name {
            PhaseName::Preparation => self.prepare(state, log).await,
            PhaseName::SchemaValidation => self.validate_schema(log).await,
            PhaseName::DatabaseMigration => self.migrate_data(state, log).await,
            PhaseName::ApiAnalysis => self.analyze_api(state, log).await,
            PhaseName::Validation => self.validate_counts(state, log).await,
            PhaseName::Cleanup => self.cleanup(log).await,
        }
    }

    /// Output directories, connectivity, destination counts before the copy.
    async fn prepare(&self, state: &mut RunState, log: &RunLog) -> Result<(), MigrationError> {
        let phase = Some(PhaseName::Preparation.as_str());
        tokio::fs::create_dir_all(&self.config.reports_dir).await?;

        self.source.ping().await?;
        self.destination.ping().await?;
        log.info(
            phase,
            format!("stores reachable: {}, {}", self.source.name(), self.destination.name()),
        )
        .await;

        for entity in &self.schema.entities {
            let table = &entity.destination_table;
            if self.destination.has_table(table).await? {
                let count = self.destination.count_rows(table).await?;
                state.destination_counts_before.insert(entity.name.clone(), count);
            }
        }
        Ok(())
    }

    /// Schema consistency and table presence on both sides.
    async fn validate_schema(&self, log: &RunLog) -> Result<(), MigrationError> {
        self.schema.validate()?;

        for entity in &self.schema.entities {
            if !self.source.has_table(&entity.source_table).await? {
                return Err(MigrationError::MissingTable {
                    entity: entity.name.clone(),
                    table: entity.source_table.clone(),
                    side: "source",
                });
            }
            if !self.destination.has_table(&entity.destination_table).await? {
                return Err(MigrationError::MissingTable {
                    entity: entity.name.clone(),
                    table: entity.destination_table.clone(),
                    side: "destination",
                });
            }
        }

        log.info(
            Some(PhaseName::SchemaValidation.as_str()),
            format!(
                "schema v{}: {} entities, {} nested",
                self.schema.version,
                self.schema.entities.len(),
                self.schema.child_entities().len()
            ),
        )
        .await;
        Ok(())
    }

    async fn migrate_data(&self, state: &mut RunState, log: &RunLog) -> Result<(), MigrationError> {
        let copier = BatchCopier::new(self.config.batch_size, self.config.dry_run);
        for entity in self.schema.migration_order() {
            let records = copier
                .copy_entity(
                    entity,
                    &self.schema,
                    self.source.as_ref(),
                    self.destination.as_ref(),
                    log,
                )
                .await?;
            state.entities.extend(records);
        }
        Ok(())
    }

    async fn analyze_api(&self, state: &mut RunState, log: &RunLog) -> Result<(), MigrationError> {
        let analyzer = ApiAnalyzer::new(&self.config.api_dir)?;
        state.endpoints = analyzer.analyze(&self.schema, log).await?;
        Ok(())
    }

    /// Count parity for every entity, nested ones included.
    async fn validate_counts(&self, state: &mut RunState, log: &RunLog) -> Result<(), MigrationError> {
        let entities: Vec<&EntityDef> = self.schema.entities.iter().collect();
        let outcome = Validator
            .validate(&entities, self.source.as_ref(), self.destination.as_ref(), log)
            .await;
        let failed = outcome.failed_entities();
        state.validation = outcome.entities;

        if failed.is_empty() {
            return Ok(());
        }
        if self.config.dry_run {
            log.warn(
                Some(PhaseName::Validation.as_str()),
                format!("{} entities differ, expected in a dry run", failed.len()),
            )
            .await;
            return Ok(());
        }
        Err(MigrationError::ValidationFailed { entities: failed })
    }

    /// Close both stores. Both are attempted; the first error is returned.
    async fn cleanup(&self, log: &RunLog) -> Result<(), MigrationError> {
        let source = self.source.close().await;
        let destination = self.destination.close().await;
        source.and(destination)?;
        log.info(Some(PhaseName::Cleanup.as_str()), "store connections closed")
            .await;
        Ok(())
    }
}

impl MigrationReport {
    /// `Err` naming the first failed phase, if the run did not succeed.
    pub fn ensure_success(&self) -> Result<(), MigrationError> {
        match self.failed_phase() {
            None if self.is_success() => Ok(()),
            None => Err(MigrationError::PhaseFailed {
                phase: "unknown".to_string(),
                message: "run did not complete".to_string(),
            }),
            Some(phase) => Err(MigrationError::PhaseFailed {
                phase: phase.name.to_string(),
                message: phase.errors.join("; "),
            }),
        }
    }
}
