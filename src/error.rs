//! Error taxonomy for the ingestion engine.
//!
//! Mirrors the five classes the ingestion design separates: a fatal
//! `ConfigError` at startup, and four non-fatal classes that are logged and
//! swallowed at the appropriate layer (`InputIoError` at the file processor,
//! `ShardIoError` at the stream cache, `ProgressIoError` at the progress
//! store, and per-line rejects which never become an `Err` at all — they are
//! counted, not propagated).

use std::path::PathBuf;

use thiserror::Error;

/// Startup-only failures. Any `ConfigError` is fatal; the process exits
/// non-zero without touching the shard root.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is required but not set")]
    MissingEnv(&'static str),

    #[error("EMAIL_HASH_KEY must decode to exactly 32 bytes, got {0}")]
    InvalidHmacKeyLength(usize),

    #[error("EMAIL_HASH_KEY is not valid hex: {0}")]
    InvalidHmacKeyEncoding(hex::FromHexError),

    #[error("{field} could not be parsed: {source}")]
    InvalidNumber {
        field: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("shard root {path:?} is not usable: {source}")]
    UnreachableShardRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures that occur once the engine is running. Every variant here is
/// recoverable at some layer above where it is raised; `IngestError` never
/// aborts the process on its own.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("cannot read input file {path:?}: {source}")]
    InputIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("shard writer for prefix {prefix} failed: {source}")]
    ShardIo {
        prefix: String,
        #[source]
        source: std::io::Error,
    },

    #[error("writer for prefix {0} was closed and must be re-requested")]
    WriterClosed(String),

    #[error("stream cache used after close_all()")]
    CacheClosed,

    #[error("failed to persist progress store: {source}")]
    ProgressIo {
        #[source]
        source: std::io::Error,
    },
}
