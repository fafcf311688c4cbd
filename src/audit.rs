//! Append-only audit logs (spec.md §6, detailed in `SPEC_FULL.md` §4.9/§4.10):
//! a multi-field-file log of bare input paths, and a skipped-files log of
//! `path - reason` entries.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::IngestError;

async fn append_line(path: &Path, line: &str) -> Result<(), IngestError> {
    let mut handle = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|source| IngestError::ProgressIo { source })?;
    handle
        .write_all(line.as_bytes())
        .await
        .map_err(|source| IngestError::ProgressIo { source })
}

/// `multi_field_files.log`: one input path per line, each file recorded at
/// most once per run (spec.md §6). Gated by an in-memory dedup set.
pub struct MultiFieldLog {
    path: PathBuf,
    seen: tokio::sync::Mutex<HashSet<PathBuf>>,
}

impl MultiFieldLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path, seen: tokio::sync::Mutex::new(HashSet::new()) }
    }

    /// Record `file` if it has not already been recorded this run. A second
    /// call for the same path is a silent no-op.
    pub async fn record_once(&self, file: &Path) -> Result<(), IngestError> {
        let mut seen = self.seen.lock().await;
        if !seen.insert(file.to_path_buf()) {
            return Ok(());
        }
        drop(seen);

        append_line(&self.path, &format!("{}\n", file.display())).await?;
        debug!(?file, "recorded multi-field source file");
        Ok(())
    }
}

/// `skipped.log`: one `"{input_path} - {reason}"` line per file-level
/// failure (spec.md §6).
pub struct SkippedLog {
    path: PathBuf,
}

impl SkippedLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub async fn record(&self, file: &Path, reason: &str) -> Result<(), IngestError> {
        append_line(&self.path, &format!("{} - {}\n", file.display(), reason)).await?;
        debug!(?file, reason, "recorded skipped file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn multi_field_log_records_each_path_once_as_a_bare_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = MultiFieldLog::new(dir.path().join("multi_field.log"));

        let file = Path::new("/data/dump.txt");
        log.record_once(file).await.unwrap();
        log.record_once(file).await.unwrap();

        let contents = tokio::fs::read_to_string(dir.path().join("multi_field.log")).await.unwrap();
        assert_eq!(contents, "/data/dump.txt\n");
    }

    #[tokio::test]
    async fn skipped_log_records_path_and_reason() {
        let dir = tempfile::tempdir().unwrap();
        let log = SkippedLog::new(dir.path().join("skipped.log"));

        log.record(Path::new("/data/a.txt"), "unreadable").await.unwrap();
        log.record(Path::new("/data/b.txt"), "permission denied").await.unwrap();

        let contents = tokio::fs::read_to_string(dir.path().join("skipped.log")).await.unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next().unwrap(), "/data/a.txt - unreadable");
        assert_eq!(lines.next().unwrap(), "/data/b.txt - permission denied");
    }
}
