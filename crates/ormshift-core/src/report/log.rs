//! Per-run log file mirrored to the console.

use super::create_unique;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Log line severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Progress information.
    Info,
    /// Recovered problem.
    Warn,
    /// Failure.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Format one log line: `[timestamp] [LEVEL] [phase] message`.
pub fn format_line(
    timestamp: DateTime<Utc>,
    level: LogLevel,
    phase: Option<&str>,
    message: &str,
) -> String {
    let ts = timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
    match phase {
        Some(phase) => format!("[{ts}] [{level}] [{phase}] {message}"),
        None => format!("[{ts}] [{level}] {message}"),
    }
}

/// Timestamped run log.
///
/// Every line goes to `tracing` for the console and, when a file is attached,
/// is appended to `<logs-dir>/<kind>-<unix-timestamp>.log`. A failed append
/// detaches the file; logging never fails the run.
pub struct RunLog {
    path: Option<PathBuf>,
    file: Mutex<Option<File>>,
}

impl RunLog {
    /// Create a new log file for a run started at `started_at`.
    pub async fn create(
        dir: &Path,
        kind: &str,
        started_at: DateTime<Utc>,
    ) -> std::io::Result<Self> {
        let stem = format!("{}-{}", kind, started_at.timestamp());
        let (path, file) = create_unique(dir, &stem, "log").await?;
        Ok(Self {
            path: Some(path),
            file: Mutex::new(Some(file)),
        })
    }

    /// A log that only writes to the console.
    pub fn disabled() -> Self {
        Self {
            path: None,
            file: Mutex::new(None),
        }
    }

    /// Path of the log file, if one is attached.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Log an informational line.
    pub async fn info(&self, phase: Option<&str>, message: impl AsRef<str>) {
        self.write(LogLevel::Info, phase, message.as_ref()).await;
    }

    /// Log a warning.
    pub async fn warn(&self, phase: Option<&str>, message: impl AsRef<str>) {
        self.write(LogLevel::Warn, phase, message.as_ref()).await;
    }

    /// Log an error.
    pub async fn error(&self, phase: Option<&str>, message: impl AsRef<str>) {
        self.write(LogLevel::Error, phase, message.as_ref()).await;
    }

    /// Write a line at the given level.
    pub async fn write(&self, level: LogLevel, phase: Option<&str>, message: &str) {
        let phase_field = phase.unwrap_or("-");
        match level {
            LogLevel::Info => tracing::info!(phase = phase_field, "{message}"),
            LogLevel::Warn => tracing::warn!(phase = phase_field, "{message}"),
            LogLevel::Error => tracing::error!(phase = phase_field, "{message}"),
        }

        let mut guard = self.file.lock().await;
        if let Some(file) = guard.as_mut() {
            let mut line = format_line(Utc::now(), level, phase, message);
            line.push('\n');
            let written = match file.write_all(line.as_bytes()).await {
                Ok(()) => file.flush().await,
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                tracing::error!(error = %e, "run log append failed, continuing without log file");
                *guard = None;
            }
        }
    }
}
