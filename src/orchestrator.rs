//! Orchestrator (spec.md §4.8): walks the input tree, fans work out across a
//! bounded pool of workers, and drives graceful shutdown.
//!
//! The run moves through three states: `Running` pulls new files onto
//! workers as fast as they free up; `Draining` stops handing out new files
//! but lets in-flight ones finish; `Closed` means every worker has returned
//! and the shard stream cache has been flushed and closed. A state never
//! moves backwards.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::audit::{MultiFieldLog, SkippedLog};
use crate::config::Config;
use crate::error::IngestError;
use crate::file_processor::process_file;
use crate::progress::ProgressStore;
use crate::stream_cache::StreamCache;
use crate::types::FileCounters;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum RunState {
    Running = 0,
    Draining = 1,
    Closed = 2,
}

impl From<u8> for RunState {
    fn from(value: u8) -> Self {
        match value {
            0 => RunState::Running,
            1 => RunState::Draining,
            _ => RunState::Closed,
        }
    }
}

/// Totals across every file the run touched.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    pub files_processed: u64,
    pub files_skipped: u64,
    pub counters: FileCounters,
}

pub struct Orchestrator {
    config: Arc<Config>,
    cache: Arc<StreamCache>,
    progress: Arc<ProgressStore>,
    multi_field_log: Arc<MultiFieldLog>,
    skipped_log: Arc<SkippedLog>,
    state: AtomicU8,
    stop_requested: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        config: Arc<Config>,
        cache: Arc<StreamCache>,
        progress: Arc<ProgressStore>,
        multi_field_log: Arc<MultiFieldLog>,
        skipped_log: Arc<SkippedLog>,
    ) -> Self {
        Self {
            config,
            cache,
            progress,
            multi_field_log,
            skipped_log,
            state: AtomicU8::new(RunState::Running as u8),
            stop_requested: AtomicBool::new(false),
        }
    }

    fn state(&self) -> RunState {
        RunState::from(self.state.load(Ordering::Acquire))
    }

    fn advance_state(&self, next: RunState) {
        self.state.store(next as u8, Ordering::Release);
    }

    /// `STOP_INGESTION` is checked in the process's current working
    /// directory, per spec.md §6 ("presence of file named `STOP_INGESTION`
    /// in the working directory") — not under `SHARD_DIR`.
    fn sentinel_path(&self) -> PathBuf {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        cwd.join(crate::config::STOP_SENTINEL_NAME)
    }

    /// Remove a leftover `STOP_INGESTION` sentinel after a clean exit
    /// (spec.md §6: "it is deleted on clean exit"). A missing sentinel is
    /// the common case and not logged as an error.
    async fn clear_sentinel(&self) {
        match tokio::fs::remove_file(self.sentinel_path()).await {
            Ok(()) => info!("removed stop sentinel after clean exit"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(%err, "failed to remove stop sentinel after clean exit"),
        }
    }

    /// Request a graceful stop: in-flight files finish, no new ones start.
    /// Called from the signal handler installed in `main`.
    pub fn request_stop(&self) {
        if !self.stop_requested.swap(true, Ordering::AcqRel) {
            info!("graceful shutdown requested");
        }
    }

    async fn should_drain(&self) -> bool {
        if self.stop_requested.load(Ordering::Acquire) {
            return true;
        }
        tokio::fs::try_exists(self.sentinel_path()).await.unwrap_or(false)
    }

    /// Walk the configured input directory, process every `.txt`/`.TXT` file
    /// not already marked done, and return aggregate counters.
    #[instrument(skip(self))]
    pub async fn run(self: Arc<Self>) -> Result<RunSummary, IngestError> {
        let discovered = walk_input_files(&self.config.input_dir).await?;
        info!(discovered = discovered.len(), "discovered input files");

        let mut queue = VecDeque::new();
        for path in discovered {
            if self.progress.is_done(&path).await {
                continue;
            }
            queue.push_back(path);
        }
        let queue = Arc::new(tokio::sync::Mutex::new(queue));

        let worker_count = self.config.concurrency.max(1);
        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let orchestrator = Arc::clone(&self);
            let queue = Arc::clone(&queue);
            handles.push(tokio::spawn(async move { orchestrator.worker_loop(worker_id, queue).await }));
        }

        let mut summary = RunSummary::default();
        for handle in handles {
            match handle.await {
                Ok(worker_summary) => {
                    summary.files_processed += worker_summary.files_processed;
                    summary.files_skipped += worker_summary.files_skipped;
                    summary.counters.merge(worker_summary.counters);
                }
                Err(join_err) => warn!(%join_err, "ingestion worker task panicked"),
            }
        }

        self.advance_state(RunState::Closed);
        self.cache.close_all().await?;
        self.clear_sentinel().await;
        info!(?summary, "ingestion run complete");
        Ok(summary)
    }

    async fn worker_loop(&self, worker_id: usize, queue: Arc<tokio::sync::Mutex<VecDeque<PathBuf>>>) -> RunSummary {
        let mut summary = RunSummary::default();
        loop {
            if self.should_drain().await {
                if self.state() == RunState::Running {
                    self.advance_state(RunState::Draining);
                    info!("entering draining state, no new files will start");
                }
                break;
            }

            let next = queue.lock().await.pop_front();
            let Some(path) = next else { break };

            if let Err(err) = self.progress.mark_in_progress(&path).await {
                warn!(worker_id, ?path, %err, "failed to record in-progress state, continuing anyway");
            }

            match process_file(&path, &self.config, &self.cache, &self.multi_field_log).await {
                Ok(counters) => {
                    summary.files_processed += 1;
                    summary.counters.merge(counters);
                    if let Err(err) = self.progress.mark_done(&path).await {
                        warn!(worker_id, ?path, %err, "failed to record done state");
                    }
                }
                Err(err) => {
                    warn!(worker_id, ?path, %err, "file could not be processed, skipping");
                    summary.files_skipped += 1;
                    if let Err(log_err) = self.skipped_log.record(&path, &err.to_string()).await {
                        warn!(worker_id, ?path, %log_err, "failed to record skipped-file log entry");
                    }
                }
            }
        }
        summary
    }
}

/// Recursively collect every `.txt`/`.TXT` file under `root`.
fn walk_input_files(root: &Path) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<PathBuf>, IngestError>> + Send + '_>> {
    Box::pin(async move {
        let mut out = Vec::new();
        let mut entries = tokio::fs::read_dir(root)
            .await
            .map_err(|source| IngestError::InputIo { path: root.to_path_buf(), source })?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| IngestError::InputIo { path: root.to_path_buf(), source })?
        {
            let path = entry.path();
            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(err) => {
                    warn!(?path, %err, "could not stat directory entry, skipping");
                    continue;
                }
            };

            if file_type.is_dir() {
                out.extend(walk_input_files(&path).await?);
            } else if file_type.is_file() && is_txt_extension(&path) {
                out.push(path);
            }
        }

        Ok(out)
    })
}

fn is_txt_extension(path: &Path) -> bool {
    matches!(path.extension().and_then(|ext| ext.to_str()), Some("txt") | Some("TXT"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config(input_dir: PathBuf, shard_dir: PathBuf) -> Config {
        Config {
            hmac_key: [3u8; 32],
            input_dir,
            shard_dir,
            max_streams: 4,
            batch_size: 5,
            batch_interval: Duration::from_secs(60),
            concurrency: 2,
            log_level: "INFO".to_string(),
            emit_email: true,
            skip_header: false,
            progress_file_name: "progress.json".to_string(),
            multi_field_log_name: "multi_field.log".to_string(),
            skipped_log_name: "skipped.log".to_string(),
        }
    }

    #[tokio::test]
    async fn discovers_and_processes_nested_txt_files_once() {
        let input_dir = tempfile::tempdir().unwrap();
        let shard_dir = tempfile::tempdir().unwrap();
        let nested = input_dir.path().join("batch1");
        tokio::fs::create_dir_all(&nested).await.unwrap();

        tokio::fs::write(input_dir.path().join("a.txt"), "alice@example.com:pw1\n").await.unwrap();
        tokio::fs::write(nested.join("b.TXT"), "bob@example.com:pw2\n").await.unwrap();
        tokio::fs::write(input_dir.path().join("ignore.csv"), "not a txt file\n").await.unwrap();

        let config = Arc::new(test_config(input_dir.path().to_path_buf(), shard_dir.path().to_path_buf()));
        let cache = Arc::new(StreamCache::new(config.shard_dir.clone(), 4, 5, Duration::from_secs(60)));
        let progress = Arc::new(ProgressStore::load(config.progress_file_path()).await);
        let multi_field_log = Arc::new(MultiFieldLog::new(config.multi_field_log_path()));
        let skipped_log = Arc::new(SkippedLog::new(config.skipped_log_path()));

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&config),
            cache,
            Arc::clone(&progress),
            multi_field_log,
            skipped_log,
        ));

        let summary = orchestrator.run().await.unwrap();
        assert_eq!(summary.files_processed, 2);
        assert_eq!(summary.counters.accepted, 2);

        assert!(progress.is_done(&input_dir.path().join("a.txt")).await);
        assert!(progress.is_done(&nested.join("b.TXT")).await);
    }

    #[tokio::test]
    async fn request_stop_halts_before_new_files_start() {
        let input_dir = tempfile::tempdir().unwrap();
        let shard_dir = tempfile::tempdir().unwrap();
        tokio::fs::write(input_dir.path().join("a.txt"), "alice@example.com:pw1\n").await.unwrap();

        let config = Arc::new(test_config(input_dir.path().to_path_buf(), shard_dir.path().to_path_buf()));
        let cache = Arc::new(StreamCache::new(config.shard_dir.clone(), 4, 5, Duration::from_secs(60)));
        let progress = Arc::new(ProgressStore::load(config.progress_file_path()).await);
        let multi_field_log = Arc::new(MultiFieldLog::new(config.multi_field_log_path()));
        let skipped_log = Arc::new(SkippedLog::new(config.skipped_log_path()));

        let orchestrator =
            Arc::new(Orchestrator::new(Arc::clone(&config), cache, progress, multi_field_log, skipped_log));
        orchestrator.request_stop();

        let summary = orchestrator.run().await.unwrap();
        assert_eq!(summary.files_processed, 0);
        assert_eq!(orchestrator.state(), RunState::Closed);
    }
}
