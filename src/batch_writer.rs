//! Batch writer (spec.md §4.4): buffers shard-bound lines in front of a
//! single append-mode file handle, flushing on size, on a timer, or on
//! explicit request.

use std::path::PathBuf;
use std::time::Duration;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, warn};

use crate::error::IngestError;

struct Inner {
    file: Option<File>,
    buffer: Vec<String>,
    batch_size: usize,
    closed: bool,
}

/// A buffered, periodically-flushed append writer for a single shard file.
///
/// Owns a background task that ticks every `BATCH_INTERVAL_MS` and flushes
/// whatever is pending; the tick is cancelled on `close()` before the final
/// flush, so it cannot fire after the handle is gone (spec.md §9).
pub struct BatchWriter {
    inner: Mutex<Inner>,
    tick_handle: std::sync::Mutex<Option<JoinHandle<()>>>,
    prefix: String,
}

impl BatchWriter {
    /// Open `path` for append, creating it if absent, and start the
    /// background flush timer.
    pub async fn open(
        path: PathBuf,
        prefix: String,
        batch_size: usize,
        batch_interval: Duration,
    ) -> Result<std::sync::Arc<Self>, IngestError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| IngestError::ShardIo { prefix: prefix.clone(), source })?;

        let writer = std::sync::Arc::new(Self {
            inner: Mutex::new(Inner { file: Some(file), buffer: Vec::new(), batch_size, closed: false }),
            tick_handle: std::sync::Mutex::new(None),
            prefix,
        });

        let ticker_writer = std::sync::Arc::clone(&writer);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(batch_interval);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                if let Err(err) = ticker_writer.flush().await {
                    warn!(prefix = %ticker_writer.prefix, %err, "timer-driven flush failed");
                }
                if ticker_writer.inner.lock().await.closed {
                    break;
                }
            }
        });
        *writer.tick_handle.lock().expect("tick handle mutex is never poisoned") = Some(handle);

        Ok(writer)
    }

    /// Append one pre-encoded, `\n`-terminated line to the buffer, flushing
    /// immediately if the batch is now full.
    pub async fn submit(&self, line: String) -> Result<(), IngestError> {
        let mut guard = self.inner.lock().await;
        if guard.closed {
            return Err(IngestError::WriterClosed(self.prefix.clone()));
        }
        guard.buffer.push(line);
        if guard.buffer.len() >= guard.batch_size {
            self.flush_locked(&mut guard).await?;
        }
        Ok(())
    }

    /// Flush any buffered lines and best-effort fsync the file descriptor.
    /// Idempotent: a flush on an already-closed writer silently succeeds.
    pub async fn flush(&self) -> Result<(), IngestError> {
        let mut guard = self.inner.lock().await;
        if guard.closed {
            return Ok(());
        }
        self.flush_locked(&mut guard).await
    }

    async fn flush_locked(&self, guard: &mut Inner) -> Result<(), IngestError> {
        if guard.buffer.is_empty() {
            return Ok(());
        }
        let Some(file) = guard.file.as_mut() else {
            return Ok(());
        };

        let mut payload = String::new();
        for line in guard.buffer.drain(..) {
            payload.push_str(&line);
        }

        file.write_all(payload.as_bytes())
            .await
            .map_err(|source| IngestError::ShardIo { prefix: self.prefix.clone(), source })?;

        if let Err(sync_fault) = file.sync_data().await {
            warn!(prefix = %self.prefix, error = %sync_fault, "fsync failed, continuing best-effort");
        }

        debug!(prefix = %self.prefix, "flushed batch");
        Ok(())
    }

    /// Stop the background timer, flush the remaining buffer, and close the
    /// handle. Idempotent: a second `close()` is a no-op.
    pub async fn close(&self) -> Result<(), IngestError> {
        {
            let mut guard = self.inner.lock().await;
            if guard.closed {
                return Ok(());
            }
            self.flush_locked(&mut guard).await?;
            guard.file = None;
            guard.closed = true;
        }
        if let Some(handle) = self.tick_handle.lock().expect("tick handle mutex is never poisoned").take() {
            handle.abort();
        }
        debug!(prefix = %self.prefix, "writer closed");
        Ok(())
    }
}
