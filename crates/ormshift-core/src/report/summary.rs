//! Human-readable end-of-run banner.

use super::MigrationReport;
use std::fmt::Write;
use std::path::Path;

const RULE: &str = "============================================================";

impl MigrationReport {
    /// Render the summary printed at the end of a run.
    pub fn summary(&self, report_path: Option<&Path>) -> String {
        let mut out = String::new();
        let title = match (self.is_success(), self.dry_run) {
            (true, true) => "DRY RUN COMPLETE: no rows were written",
            (true, false) => "MIGRATION COMPLETE",
            (false, _) => "MIGRATION FAILED",
        };
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "{title}");
        let _ = writeln!(out, "{RULE}");

        let _ = writeln!(out, "Run:              {}", self.run_id);
        let _ = writeln!(out, "Status:           {}", self.overall_status);
        if let Some(ms) = self.stats.duration_ms {
            let _ = writeln!(out, "Duration:         {:.1}s", ms as f64 / 1000.0);
        }
        let _ = writeln!(out, "Entities:         {}", self.stats.tables_processed);
        let _ = writeln!(out, "Rows migrated:    {}", self.stats.records_migrated);
        let _ = writeln!(out, "Batch errors:     {}", self.stats.errors_encountered);

        if !self.validation.is_empty() {
            let passed = self.validation.iter().filter(|v| v.passed).count();
            let _ = writeln!(out, "Validation:       {}/{} passed", passed, self.validation.len());
            for v in self.validation.iter().filter(|v| !v.passed) {
                let count = |c: Option<u64>| c.map_or_else(|| "?".to_string(), |c| c.to_string());
                let _ = writeln!(
                    out,
                    "  - {}: source {} destination {}",
                    v.entity_name,
                    count(v.source_count),
                    count(v.destination_count)
                );
            }
        }

        if !self.endpoints.is_empty() {
            let review: usize = self.endpoints.iter().map(|e| e.manual_review_count()).sum();
            let _ = writeln!(
                out,
                "API endpoints:    {} ({} expressions need manual review)",
                self.endpoints.len(),
                review
            );
        }

        if let Some(path) = report_path {
            let _ = writeln!(out, "Report:           {}", path.display());
        }
        if let Some(path) = &self.log_file {
            let _ = writeln!(out, "Log:              {}", path.display());
        }

        let _ = writeln!(out);
        if let Some(phase) = self.failed_phase() {
            let _ = writeln!(out, "Failed phase: {}", phase.name);
            for error in &phase.errors {
                let _ = writeln!(out, "  {error}");
            }
            match &self.log_file {
                Some(path) => {
                    let _ = writeln!(out, "See {} for the full log.", path.display());
                }
                None => {
                    let _ = writeln!(out, "Re-run with logging enabled for a full log.");
                }
            }
        } else if self.dry_run {
            let _ = writeln!(out, "Re-run without --dry-run to write the rows.");
        } else {
            let _ = writeln!(out, "Next steps:");
            let _ = writeln!(out, "  1. Point the application at the destination database.");
            let _ = writeln!(out, "  2. Review API endpoints flagged for manual review.");
            let _ = writeln!(out, "  3. Run the application test suite against the destination.");
            let _ = writeln!(out, "  4. Keep the source database until the cutover is confirmed.");
        }

        out
    }
}
