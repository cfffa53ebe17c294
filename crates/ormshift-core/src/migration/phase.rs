//! Migration phases and their lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The fixed phases of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseName {
    /// Output directories, store reachability, pre-run destination counts.
    Preparation,
    /// Schema bundle consistency and table presence in both stores.
    SchemaValidation,
    /// Batch copy of every entity.
    DatabaseMigration,
    /// Scan of route handlers for source query expressions.
    ApiAnalysis,
    /// Row-count parity between source and destination.
    Validation,
    /// Release store connections.
    Cleanup,
}

impl PhaseName {
    /// Every phase in declared order.
    pub const ALL: [PhaseName; 6] = [
        PhaseName::Preparation,
        PhaseName::SchemaValidation,
        PhaseName::DatabaseMigration,
        PhaseName::ApiAnalysis,
        PhaseName::Validation,
        PhaseName::Cleanup,
    ];

    /// Stable identifier used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseName::Preparation => "preparation",
            PhaseName::SchemaValidation => "schema_validation",
            PhaseName::DatabaseMigration => "database_migration",
            PhaseName::ApiAnalysis => "api_analysis",
            PhaseName::Validation => "validation",
            PhaseName::Cleanup => "cleanup",
        }
    }

    /// One-line description.
    pub fn description(&self) -> &'static str {
        match self {
            PhaseName::Preparation => "Prepare output directories and check store connectivity",
            PhaseName::SchemaValidation => "Validate the schema bundle against both stores",
            PhaseName::DatabaseMigration => "Copy every entity from source to destination in batches",
            PhaseName::ApiAnalysis => "Inventory API endpoints and translate their queries",
            PhaseName::Validation => "Compare source and destination row counts",
            PhaseName::Cleanup => "Close store connections",
        }
    }
}

impl std::fmt::Display for PhaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    /// Not entered yet.
    Pending,
    /// Currently executing.
    Running,
    /// Finished without error.
    Completed,
    /// Finished with an error.
    Failed,
}

impl std::fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseStatus::Pending => write!(f, "pending"),
            PhaseStatus::Running => write!(f, "running"),
            PhaseStatus::Completed => write!(f, "completed"),
            PhaseStatus::Failed => write!(f, "failed"),
        }
    }
}

/// State of one phase within a run.
///
/// Transitions are monotonic: `pending -> running -> completed | failed`.
/// Calls that would move backwards are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationPhase {
    /// Phase identifier.
    pub name: PhaseName,
    /// Human description.
    pub description: String,
    /// Current status.
    pub status: PhaseStatus,
    /// When the phase was entered.
    pub start_time: Option<DateTime<Utc>>,
    /// When the phase exited.
    pub end_time: Option<DateTime<Utc>>,
    /// Errors recorded while the phase ran.
    pub errors: Vec<String>,
}

impl MigrationPhase {
    /// Create a pending phase.
    pub fn new(name: PhaseName) -> Self {
        Self {
            name,
            description: name.description().to_string(),
            status: PhaseStatus::Pending,
            start_time: None,
            end_time: None,
            errors: Vec::new(),
        }
    }

    /// The full phase list for a new run, all pending.
    pub fn plan() -> Vec<Self> {
        PhaseName::ALL.iter().copied().map(Self::new).collect()
    }

    /// Mark the phase as running.
    pub fn start(&mut self) {
        if self.status == PhaseStatus::Pending {
            self.status = PhaseStatus::Running;
            self.start_time = Some(Utc::now());
        }
    }

    /// Mark the phase as completed.
    pub fn complete(&mut self) {
        if self.status == PhaseStatus::Running {
            self.status = PhaseStatus::Completed;
            self.end_time = Some(Utc::now());
        }
    }

    /// Mark the phase as failed and record the error.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.status == PhaseStatus::Running {
            self.status = PhaseStatus::Failed;
            self.end_time = Some(Utc::now());
            self.errors.push(error.into());
        }
    }

    /// Check if the phase reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, PhaseStatus::Completed | PhaseStatus::Failed)
    }

    /// Duration in milliseconds, once both timestamps are set.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        let names: Vec<_> = PhaseName::ALL.iter().map(PhaseName::as_str).collect();
        assert_eq!(
            names,
            vec![
                "preparation",
                "schema_validation",
                "database_migration",
                "api_analysis",
                "validation",
                "cleanup"
            ]
        );
    }

    #[test]
    fn test_phase_lifecycle() {
        let mut phase = MigrationPhase::new(PhaseName::Validation);
        assert_eq!(phase.status, PhaseStatus::Pending);

        phase.start();
        assert_eq!(phase.status, PhaseStatus::Running);
        assert!(phase.start_time.is_some());

        phase.complete();
        assert_eq!(phase.status, PhaseStatus::Completed);
        assert!(phase.start_time <= phase.end_time);
        assert!(phase.duration_ms().unwrap() >= 0);
    }

    #[test]
    fn test_phase_never_moves_backwards() {
        let mut phase = MigrationPhase::new(PhaseName::Preparation);
        // Cannot finish without starting.
        phase.complete();
        assert_eq!(phase.status, PhaseStatus::Pending);

        phase.start();
        phase.fail("store unreachable");
        phase.start();
        phase.complete();

        assert_eq!(phase.status, PhaseStatus::Failed);
        assert_eq!(phase.errors, vec!["store unreachable".to_string()]);
        assert!(phase.is_terminal());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&PhaseStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
        let json = serde_json::to_string(&PhaseName::SchemaValidation).unwrap();
        assert_eq!(json, "\"schema_validation\"");
    }
}
