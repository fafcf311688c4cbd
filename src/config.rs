//! Process-wide configuration, read once from the environment at startup.
//!
//! Every field here is resolved before the orchestrator's directory walk
//! begins; a malformed or missing mandatory value is a `ConfigError` and the
//! process exits without writing anything.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Resolved, validated startup configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// 32-byte HMAC key under which every email is keyed-hashed.
    pub hmac_key: [u8; 32],
    /// Root directory walked for `.txt`/`.TXT` input files.
    pub input_dir: PathBuf,
    /// Root directory under which `xx/xxxx.jsonl` shards are written.
    pub shard_dir: PathBuf,
    /// LRU capacity for concurrently open shard writers.
    pub max_streams: usize,
    /// Records buffered per writer before a forced flush.
    pub batch_size: usize,
    /// Timer-driven flush period per open writer.
    pub batch_interval: Duration,
    /// Worker task count.
    pub concurrency: usize,
    /// `tracing_subscriber::EnvFilter` default directive derived from `LOG_LEVEL`.
    pub log_level: String,
    /// Emit the normalized email in shard records. `false` emits `""` instead
    /// (privacy mode). Default: emit (spec.md §9 default).
    pub emit_email: bool,
    /// Skip the first line of every input file unconditionally. Default:
    /// do not skip (spec.md §9 default).
    pub skip_header: bool,
    /// File name for the progress store, relative to `shard_dir`.
    pub progress_file_name: String,
    /// File name for the multi-field audit log, relative to `shard_dir`.
    pub multi_field_log_name: String,
    /// File name for the skipped-files log, relative to `shard_dir`.
    pub skipped_log_name: String,
}

const DEFAULT_MAX_STREAMS: usize = 64;
const DEFAULT_BATCH_SIZE: usize = 500;
const DEFAULT_BATCH_INTERVAL_MS: u64 = 2000;
const DEFAULT_CONCURRENCY: usize = 2;

/// Name of the sentinel file that, when present in the working directory,
/// triggers the same graceful shutdown as SIGINT/SIGTERM.
pub const STOP_SENTINEL_NAME: &str = "STOP_INGESTION";

impl Config {
    /// Load and validate configuration from `std::env`. This is the only
    /// place environment variables are read; everything downstream takes a
    /// `&Config`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let hmac_key_hex = required_env("EMAIL_HASH_KEY")?;
        let hmac_key = decode_hmac_key(&hmac_key_hex)?;

        let input_dir = PathBuf::from(required_env("INPUT_DIR")?);
        let shard_dir = PathBuf::from(required_env("SHARD_DIR")?);

        let max_streams = parse_or_default("MAX_STREAMS", DEFAULT_MAX_STREAMS)?;
        let batch_size = parse_or_default("BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        let batch_interval_ms = parse_or_default("BATCH_INTERVAL_MS", DEFAULT_BATCH_INTERVAL_MS)?;
        let concurrency = parse_or_default("CONCURRENCY", DEFAULT_CONCURRENCY)?;

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string());

        let emit_email = bool_env("EMIT_EMAIL", true);
        let skip_header = bool_env("SKIP_HEADER", false);

        Ok(Self {
            hmac_key,
            input_dir,
            shard_dir,
            max_streams,
            batch_size,
            batch_interval: Duration::from_millis(batch_interval_ms),
            concurrency,
            log_level,
            emit_email,
            skip_header,
            progress_file_name: std::env::var("PROGRESS_FILE_NAME")
                .unwrap_or_else(|_| "ingest-progress.json".to_string()),
            multi_field_log_name: std::env::var("MULTI_FIELD_LOG_NAME")
                .unwrap_or_else(|_| "multi_field_files.log".to_string()),
            skipped_log_name: std::env::var("SKIPPED_LOG_NAME")
                .unwrap_or_else(|_| "skipped.log".to_string()),
        })
    }

    pub fn progress_file_path(&self) -> PathBuf {
        self.shard_dir.join(&self.progress_file_name)
    }

    pub fn multi_field_log_path(&self) -> PathBuf {
        self.shard_dir.join(&self.multi_field_log_name)
    }

    pub fn skipped_log_path(&self) -> PathBuf {
        self.shard_dir.join(&self.skipped_log_name)
    }
}

fn required_env(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnv(name))
}

fn decode_hmac_key(hex_str: &str) -> Result<[u8; 32], ConfigError> {
    let bytes = hex::decode(hex_str.trim()).map_err(ConfigError::InvalidHmacKeyEncoding)?;
    if bytes.len() != 32 {
        return Err(ConfigError::InvalidHmacKeyLength(bytes.len()));
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}

fn parse_or_default<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|source| ConfigError::InvalidNumber { field: name, source }),
        Err(_) => Ok(default),
    }
}

fn bool_env(name: &'static str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_hmac_key() {
        let err = decode_hmac_key("00112233").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidHmacKeyLength(4)));
    }

    #[test]
    fn accepts_32_byte_hmac_key() {
        let hex_str = "00".repeat(32);
        let key = decode_hmac_key(&hex_str).unwrap();
        assert_eq!(key, [0u8; 32]);
    }

    #[test]
    fn bool_env_recognizes_truthy_values() {
        assert!(matches!("true".to_ascii_lowercase().as_str(), "1" | "true" | "yes"));
    }
}
