//! Migration run configuration.

use crate::error::MigrationError;
use std::path::PathBuf;

/// Default number of rows per write call.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default directory for run log files.
pub const DEFAULT_LOGS_DIR: &str = "logs";

/// Default directory for JSON reports.
pub const DEFAULT_REPORTS_DIR: &str = "reports";

/// Default directory scanned by the API analysis phase.
pub const DEFAULT_API_DIR: &str = "src/app/api";

/// Default run kind, used as the log and report file prefix.
pub const DEFAULT_RUN_KIND: &str = "migration";

/// Environment variable holding the source connection URL.
pub const ENV_SOURCE_URL: &str = "SOURCE_DATABASE_URL";

/// Environment variable holding the destination connection URL.
pub const ENV_DESTINATION_URL: &str = "DESTINATION_DATABASE_URL";

/// Environment variable pointing at a JSON schema bundle.
pub const ENV_SCHEMA_PATH: &str = "ORMSHIFT_SCHEMA";

/// Environment variable overriding the logs directory.
pub const ENV_LOGS_DIR: &str = "ORMSHIFT_LOGS_DIR";

/// Environment variable overriding the reports directory.
pub const ENV_REPORTS_DIR: &str = "ORMSHIFT_REPORTS_DIR";

/// Environment variable overriding the API source directory.
pub const ENV_API_DIR: &str = "ORMSHIFT_API_DIR";

/// Environment variable toggling the run log file.
pub const ENV_LOGGING: &str = "ORMSHIFT_LOGGING";

/// Whether the cleanup phase runs after an earlier phase failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanupPolicy {
    /// Cleanup is attempted even after a fail-fast abort.
    #[default]
    AlwaysRun,
    /// Cleanup is skipped with the rest of the phases on abort.
    SkipOnFailure,
}

/// Configuration for one orchestrated run.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Rows per destination write call.
    pub batch_size: usize,

    /// Compute and log every write without performing it.
    pub dry_run: bool,

    /// Write the per-run log file. Console output is always on.
    pub logging_enabled: bool,

    /// Directory for run log files.
    pub logs_dir: PathBuf,

    /// Directory for JSON reports.
    pub reports_dir: PathBuf,

    /// Directory of route handler sources scanned by API analysis.
    pub api_dir: PathBuf,

    /// Cleanup behavior after a failed phase.
    pub cleanup_policy: CleanupPolicy,

    /// Prefix for log and report file names.
    pub kind: String,
}

impl MigrationConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            dry_run: false,
            logging_enabled: true,
            logs_dir: PathBuf::from(DEFAULT_LOGS_DIR),
            reports_dir: PathBuf::from(DEFAULT_REPORTS_DIR),
            api_dir: PathBuf::from(DEFAULT_API_DIR),
            cleanup_policy: CleanupPolicy::default(),
            kind: DEFAULT_RUN_KIND.to_string(),
        }
    }

    /// Build a configuration from environment lookups, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new();
        if let Some(dir) = lookup(ENV_LOGS_DIR) {
            config.logs_dir = dir.into();
        }
        if let Some(dir) = lookup(ENV_REPORTS_DIR) {
            config.reports_dir = dir.into();
        }
        if let Some(dir) = lookup(ENV_API_DIR) {
            config.api_dir = dir.into();
        }
        if let Some(flag) = lookup(ENV_LOGGING) {
            config.logging_enabled = !matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "off" | "no"
            );
        }
        config
    }

    /// Build a configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Enable or disable dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enable or disable the run log file.
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.logging_enabled = enabled;
        self
    }

    /// Set the logs directory.
    pub fn with_logs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.logs_dir = dir.into();
        self
    }

    /// Set the reports directory.
    pub fn with_reports_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.reports_dir = dir.into();
        self
    }

    /// Set the API source directory.
    pub fn with_api_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.api_dir = dir.into();
        self
    }

    /// Set the cleanup policy.
    pub fn with_cleanup_policy(mut self, policy: CleanupPolicy) -> Self {
        self.cleanup_policy = policy;
        self
    }

    /// Set the run kind.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Check the configuration before a run.
    pub fn validate(&self) -> Result<(), MigrationError> {
        if self.batch_size == 0 {
            return Err(MigrationError::Config("batch size must be at least 1".to_string()));
        }
        if self.kind.is_empty() || self.kind.contains(['/', '\\']) {
            return Err(MigrationError::Config(format!(
                "invalid run kind '{}'",
                self.kind
            )));
        }
        Ok(())
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Source and destination connection URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreUrls {
    /// Source connection URL.
    pub source: String,
    /// Destination connection URL.
    pub destination: String,
}

impl StoreUrls {
    /// Read both URLs through `lookup`; both are required.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, MigrationError> {
        let require = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| MigrationError::Config(format!("{key} must be set")))
        };
        Ok(Self {
            source: require(ENV_SOURCE_URL)?,
            destination: require(ENV_DESTINATION_URL)?,
        })
    }

    /// Read both URLs from the process environment.
    pub fn from_env() -> Result<Self, MigrationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = MigrationConfig::default();
        assert_eq!(config.batch_size, 1000);
        assert!(!config.dry_run);
        assert!(config.logging_enabled);
        assert_eq!(config.cleanup_policy, CleanupPolicy::AlwaysRun);
        assert_eq!(config.kind, "migration");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = MigrationConfig::from_lookup(lookup_from(&[
            (ENV_LOGS_DIR, "/var/log/shift"),
            (ENV_LOGGING, "false"),
        ]));
        assert_eq!(config.logs_dir, PathBuf::from("/var/log/shift"));
        assert!(!config.logging_enabled);
        assert_eq!(config.reports_dir, PathBuf::from(DEFAULT_REPORTS_DIR));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = MigrationConfig::new().with_batch_size(0);
        assert!(matches!(config.validate(), Err(MigrationError::Config(_))));
    }

    #[test]
    fn test_store_urls_required() {
        let err = StoreUrls::from_lookup(lookup_from(&[(ENV_SOURCE_URL, "sqlite://a.db")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_DESTINATION_URL));

        let urls = StoreUrls::from_lookup(lookup_from(&[
            (ENV_SOURCE_URL, "sqlite://a.db"),
            (ENV_DESTINATION_URL, "sqlite://b.db"),
        ]))
        .unwrap();
        assert_eq!(urls.destination, "sqlite://b.db");
    }
}
