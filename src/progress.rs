//! Progress store (spec.md §4.7): a durable `path -> state` map that lets a
//! restarted run skip files it already finished instead of reprocessing the
//! whole input tree.
//!
//! Every mutation is followed by a full rewrite of the on-disk file via a
//! temp-file-then-rename, so a crash mid-write never leaves a torn or
//! partially-written progress file behind — the rename either lands or it
//! doesn't, and the old file is untouched either way.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::IngestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileState {
    Pending,
    InProgress,
    Done,
}

pub struct ProgressStore {
    path: PathBuf,
    inner: tokio::sync::Mutex<HashMap<String, FileState>>,
}

impl ProgressStore {
    /// Load `path` if present and well-formed. A missing file is treated as
    /// an empty store; a malformed file is logged and discarded rather than
    /// treated as fatal, since progress tracking is an optimization, not a
    /// correctness requirement (spec.md §7).
    pub async fn load(path: PathBuf) -> Self {
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<HashMap<String, FileState>>(&bytes) {
                Ok(map) => map,
                Err(err) => {
                    warn!(?path, %err, "progress file is malformed, starting with empty progress");
                    HashMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => {
                warn!(?path, %err, "could not read progress file, starting with empty progress");
                HashMap::new()
            }
        };
        Self { path, inner: tokio::sync::Mutex::new(entries) }
    }

    /// `true` if `file` is recorded as already completed.
    pub async fn is_done(&self, file: &Path) -> bool {
        matches!(self.inner.lock().await.get(&key(file)), Some(FileState::Done))
    }

    /// Record `file` as in-progress and persist immediately.
    pub async fn mark_in_progress(&self, file: &Path) -> Result<(), IngestError> {
        self.set(file, FileState::InProgress).await
    }

    /// Record `file` as done and persist immediately.
    pub async fn mark_done(&self, file: &Path) -> Result<(), IngestError> {
        self.set(file, FileState::Done).await
    }

    async fn set(&self, file: &Path, state: FileState) -> Result<(), IngestError> {
        let snapshot = {
            let mut guard = self.inner.lock().await;
            guard.insert(key(file), state);
            guard.clone()
        };
        self.persist(&snapshot).await
    }

    async fn persist(&self, snapshot: &HashMap<String, FileState>) -> Result<(), IngestError> {
        let payload = serde_json::to_vec_pretty(snapshot).expect("progress map always serializes");

        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &payload)
            .await
            .map_err(|source| IngestError::ProgressIo { source })?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|source| IngestError::ProgressIo { source })?;
        Ok(())
    }
}

fn key(file: &Path) -> String {
    file.to_string_lossy().into_owned()
}
