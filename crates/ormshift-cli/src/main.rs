//! ormshift command-line orchestrator.
//!
//! Runs a staged migration from `SOURCE_DATABASE_URL` to
//! `DESTINATION_DATABASE_URL`. Nothing happens without `--force`.

use clap::Parser;
use ormshift_core::config::{DEFAULT_BATCH_SIZE, ENV_SCHEMA_PATH};
use ormshift_core::store::redact;
use ormshift_core::{
    open_destination, open_source, platform_schema, MigrationConfig, MigrationError,
    MigrationOrchestrator, SchemaBundle, StoreError, StoreUrls,
};
use std::future::Future;
use std::process::ExitCode;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Staged data migration with validation
#[derive(Parser, Debug)]
#[command(name = "ormshift")]
#[command(version, about = "Copy a relational data model between stores in validated phases")]
pub struct Args {
    /// Actually run the migration
    #[arg(long)]
    pub force: bool,

    /// Log every write without performing it
    #[arg(long)]
    pub dry_run: bool,

    /// Rows per destination write
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error("cannot open {side} store {url}: {source}")]
    Open {
        side: &'static str,
        url: String,
        #[source]
        source: StoreError,
    },
}

/// How a CLI invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// `--force` was missing; nothing was touched.
    Refused,
    /// Every phase completed.
    Succeeded,
    /// A phase failed or the run could not start.
    Failed,
}

impl Outcome {
    fn exit_code(self) -> ExitCode {
        match self {
            Outcome::Refused | Outcome::Succeeded => ExitCode::SUCCESS,
            Outcome::Failed => ExitCode::FAILURE,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ormshift=info,ormshift_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    execute(args, run).await.exit_code()
}

/// Apply the `--force` guard, then hand off to `run`.
async fn execute<F, Fut>(args: Args, run: F) -> Outcome
where
    F: FnOnce(Args) -> Fut,
    Fut: Future<Output = Result<bool, CliError>>,
{
    if !args.force {
        tracing::warn!("this copies every entity into the destination store");
        println!("Refusing to run without --force.");
        println!("Re-run with --force to migrate, or --force --dry-run to preview.");
        return Outcome::Refused;
    }

    match run(args).await {
        Ok(true) => Outcome::Succeeded,
        Ok(false) => Outcome::Failed,
        Err(e) => {
            tracing::error!(error = %e, "migration aborted");
            eprintln!("Error: {}", e);
            Outcome::Failed
        }
    }
}

/// Run the migration. `Ok(false)` means the run finished with a failed phase.
async fn run(args: Args) -> Result<bool, CliError> {
    let config = build_config(&args, |key| std::env::var(key).ok())?;
    let urls = StoreUrls::from_env()?;
    let schema = load_schema(std::env::var(ENV_SCHEMA_PATH).ok())?;

    let source = open_source(&urls.source)
        .await
        .map_err(|source| CliError::Open {
            side: "source",
            url: redact(&urls.source),
            source,
        })?;
    let destination = open_destination(&urls.destination)
        .await
        .map_err(|source| CliError::Open {
            side: "destination",
            url: redact(&urls.destination),
            source,
        })?;

    let mut orchestrator = MigrationOrchestrator::new(source, destination, schema, config);
    let report = orchestrator.run().await?;

    println!("{}", report.summary(orchestrator.report_path()));
    Ok(report.is_success())
}

fn build_config(
    args: &Args,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<MigrationConfig, MigrationError> {
    let config = MigrationConfig::from_lookup(lookup)
        .with_batch_size(args.batch_size)
        .with_dry_run(args.dry_run);
    config.validate()?;
    Ok(config)
}

fn load_schema(path: Option<String>) -> Result<SchemaBundle, MigrationError> {
    match path.filter(|p| !p.trim().is_empty()) {
        Some(path) => {
            tracing::info!(path = %path, "loading schema bundle");
            SchemaBundle::from_json_file(path)
        }
        None => Ok(platform_schema()),
    }
}
