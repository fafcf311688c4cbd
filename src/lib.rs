//! Prefix-sharded streaming credential ingestion engine.
//!
//! Reads breach-dump-style text files, normalizes and keyed-hashes the email
//! half of each record, classifies the credential half by hash family, and
//! routes the result into one of up to 65,536 append-only JSONL shard files
//! selected by the first four hex characters of the email hash. A bounded
//! LRU keeps at most [`config::Config::max_streams`] shard writers open at
//! once; a durable progress store lets an interrupted run resume without
//! reprocessing files it already finished.

pub mod audit;
pub mod batch_writer;
pub mod classifier;
pub mod config;
pub mod error;
pub mod file_processor;
pub mod normalize;
pub mod orchestrator;
pub mod parser;
pub mod progress;
pub mod stream_cache;
pub mod types;

pub use crate::config::Config;
pub use crate::error::{ConfigError, IngestError};
pub use crate::orchestrator::{Orchestrator, RunSummary};

/// Commonly imported types for downstream callers and integration tests.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{ConfigError, IngestError};
    pub use crate::orchestrator::{Orchestrator, RunSummary};
    pub use crate::types::{FileCounters, HashType};
}

/// Build the full component graph from a validated [`Config`] and run the
/// ingestion to completion. This is the single call `main` makes; tests that
/// need finer control construct the components directly instead.
pub async fn run(config: Config) -> Result<RunSummary, IngestError> {
    use std::sync::Arc;

    use crate::audit::{MultiFieldLog, SkippedLog};
    use crate::progress::ProgressStore;
    use crate::stream_cache::StreamCache;

    let config = Arc::new(config);
    let cache = Arc::new(StreamCache::new(
        config.shard_dir.clone(),
        config.max_streams,
        config.batch_size,
        config.batch_interval,
    ));
    let progress = Arc::new(ProgressStore::load(config.progress_file_path()).await);
    let multi_field_log = Arc::new(MultiFieldLog::new(config.multi_field_log_path()));
    let skipped_log = Arc::new(SkippedLog::new(config.skipped_log_path()));

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&config),
        cache,
        progress,
        multi_field_log,
        skipped_log,
    ));

    install_shutdown_handler(Arc::clone(&orchestrator));

    orchestrator.run().await
}

/// Spawn a task that watches for SIGINT/SIGTERM and calls
/// [`Orchestrator::request_stop`] on either, so a worker never starts a new
/// file after the operator has asked for a graceful stop.
fn install_shutdown_handler(orchestrator: std::sync::Arc<Orchestrator>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let mut terminate = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(err) => {
                    tracing::warn!(%err, "failed to install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {},
                _ = terminate.recv() => {},
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        orchestrator.request_stop();
    });
}
