//! Binary entry point for the credential ingestion engine.
//!
//! Loads configuration from the environment, initializes structured
//! logging, and runs the orchestrator to completion. A `ConfigError` at
//! startup is fatal and prints to stderr before the process exits non-zero;
//! every other failure is handled inside the run and reflected in the
//! summary logged at the end.

use credstrata_ingest::{run, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    init_tracing(&config.log_level);

    tracing::info!(
        input_dir = %config.input_dir.display(),
        shard_dir = %config.shard_dir.display(),
        max_streams = config.max_streams,
        batch_size = config.batch_size,
        concurrency = config.concurrency,
        emit_email = config.emit_email,
        "starting ingestion run"
    );

    let summary = run(config).await?;

    tracing::info!(
        files_processed = summary.files_processed,
        files_skipped = summary.files_skipped,
        accepted = summary.counters.accepted,
        skipped = summary.counters.total_skipped(),
        "ingestion run finished"
    );

    Ok(())
}

fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level.to_lowercase()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
