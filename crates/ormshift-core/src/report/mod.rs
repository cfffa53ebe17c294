//! Run log and final report.

mod log;
mod summary;

pub use log::{format_line, LogLevel, RunLog};

use crate::error::MigrationError;
use crate::migration::{
    ApiEndpointRecord, EntityMigrationRecord, EntityValidation, MigrationPhase, MigrationRunStats,
    PhaseStatus,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OverallStatus {
    /// Every phase completed.
    Success,
    /// At least one phase did not complete.
    Failed,
}

impl OverallStatus {
    /// `Success` only if every phase completed.
    pub fn from_phases(phases: &[MigrationPhase]) -> Self {
        if phases.iter().all(|p| p.status == PhaseStatus::Completed) {
            OverallStatus::Success
        } else {
            OverallStatus::Failed
        }
    }
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverallStatus::Success => write!(f, "SUCCESS"),
            OverallStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Everything recorded about one run, serialized as the JSON report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Run identifier, also used in file names.
    pub run_id: String,
    /// Migration kind, the prefix of the log and report files.
    pub kind: String,
    /// Whether writes were skipped.
    pub dry_run: bool,
    /// Rows per destination write.
    pub batch_size: usize,
    /// Derived from the phase statuses.
    pub overall_status: OverallStatus,
    /// Run-wide counters.
    pub stats: MigrationRunStats,
    /// All six phases in order.
    pub phases: Vec<MigrationPhase>,
    /// Copy results per entity.
    pub entities: Vec<EntityMigrationRecord>,
    /// Count parity per entity.
    pub validation: Vec<EntityValidation>,
    /// Analyzed route handlers.
    pub endpoints: Vec<ApiEndpointRecord>,
    /// Destination row counts taken during preparation.
    pub destination_counts_before: BTreeMap<String, u64>,
    /// Run log file, when one was written.
    pub log_file: Option<PathBuf>,
}

impl MigrationReport {
    /// True if the run succeeded.
    pub fn is_success(&self) -> bool {
        self.overall_status == OverallStatus::Success
    }

    /// The first failed phase, if any.
    pub fn failed_phase(&self) -> Option<&MigrationPhase> {
        self.phases.iter().find(|p| p.status == PhaseStatus::Failed)
    }
}

/// Write the report as pretty JSON to `<dir>/<kind>-report-<unix-ts>.json`.
pub async fn write_report(dir: &Path, report: &MigrationReport) -> Result<PathBuf, MigrationError> {
    let finished = report.stats.end_time.unwrap_or_else(Utc::now);
    let stem = format!("{}-report-{}", report.kind, finished.timestamp());
    let json = serde_json::to_vec_pretty(report)?;

    let (path, mut file) = create_unique(dir, &stem, "json").await?;
    file.write_all(&json).await?;
    file.flush().await?;
    Ok(path)
}

/// Create `<dir>/<stem>.<ext>`, adding `-1`, `-2`, ... if the name is taken.
pub(crate) async fn create_unique(
    dir: &Path,
    stem: &str,
    ext: &str,
) -> std::io::Result<(PathBuf, File)> {
    tokio::fs::create_dir_all(dir).await?;

    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("{stem}.{ext}")
        } else {
            format!("{stem}-{attempt}.{ext}")
        };
        let path = dir.join(name);
        match OpenOptions::new()
            .write(true)
            .append(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::PhaseName;

    pub(super) fn sample_report(dry_run: bool) -> MigrationReport {
        let mut phases = MigrationPhase::plan();
        for phase in &mut phases {
            phase.start();
            phase.complete();
        }
        let mut stats = MigrationRunStats::start(Utc::now());
        stats.finish(Utc::now());
        MigrationReport {
            run_id: "migration-1".to_string(),
            kind: "migration".to_string(),
            dry_run,
            batch_size: 1000,
            overall_status: OverallStatus::from_phases(&phases),
            stats,
            phases,
            entities: vec![EntityMigrationRecord::new("profiles")],
            validation: vec![EntityValidation::compare("profiles", 0, 0)],
            endpoints: Vec::new(),
            destination_counts_before: BTreeMap::new(),
            log_file: None,
        }
    }

    #[test]
    fn test_overall_status_needs_every_phase_completed() {
        let mut phases = MigrationPhase::plan();
        assert_eq!(OverallStatus::from_phases(&phases), OverallStatus::Failed);

        for phase in &mut phases {
            phase.start();
            phase.complete();
        }
        assert_eq!(OverallStatus::from_phases(&phases), OverallStatus::Success);

        let mut phases = MigrationPhase::plan();
        phases[0].start();
        phases[0].fail("unreachable");
        assert_eq!(OverallStatus::from_phases(&phases), OverallStatus::Failed);
    }

    #[tokio::test]
    async fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let report = sample_report(false);

        let first = write_report(dir.path(), &report).await.unwrap();
        let second = write_report(dir.path(), &report).await.unwrap();
        assert_ne!(first, second);

        let name = first.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("migration-report-"));
        assert!(name.ends_with(".json"));

        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&first).unwrap()).unwrap();
        assert_eq!(value["overall_status"], "SUCCESS");
        assert_eq!(value["phases"].as_array().unwrap().len(), PhaseName::ALL.len());
        assert_eq!(value["validation"][0]["passed"], true);
    }
}
