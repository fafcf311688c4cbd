//! File processor (spec.md §4.6): reads one input file line by line,
//! normalizes and classifies each record, and routes it through the shard
//! stream cache. Returns per-file counters; a fatal I/O error aborts the
//! file but never the run.

use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{instrument, warn};

use crate::audit::MultiFieldLog;
use crate::classifier::classify;
use crate::config::Config;
use crate::error::IngestError;
use crate::normalize::{hash_email, normalize_email};
use crate::parser::{parse_line, LineOutcome};
use crate::stream_cache::StreamCache;
use crate::types::{FileCounters, ParsedRecord};

/// Read, parse, and route every line of `path`. Never returns `Err` for a
/// bad individual line — only for the file itself being unreadable.
#[instrument(skip(config, cache, multi_field_log), fields(path = %path.display()))]
pub async fn process_file(
    path: &Path,
    config: &Config,
    cache: &StreamCache,
    multi_field_log: &MultiFieldLog,
) -> Result<FileCounters, IngestError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|source| IngestError::InputIo { path: path.to_path_buf(), source })?;

    let mut lines = BufReader::new(file).lines();
    let mut counters = FileCounters::default();
    let mut line_index = 0usize;

    loop {
        let raw = lines
            .next_line()
            .await
            .map_err(|source| IngestError::InputIo { path: path.to_path_buf(), source })?;
        let Some(raw) = raw else { break };

        line_index += 1;
        if line_index == 1 && config.skip_header {
            continue;
        }

        let outcome = parse_line(&raw, path);
        let (email_raw, password_raw, is_multi_field) = match outcome {
            LineOutcome::Accepted { email, password } => (email, password, false),
            LineOutcome::MultiField { email, password } => (email, password, true),
            LineOutcome::SkippedEmpty => {
                counters.skipped_empty += 1;
                continue;
            }
            LineOutcome::SkippedFieldCount => {
                counters.skipped_field_count += 1;
                continue;
            }
            LineOutcome::SkippedNoEmail => {
                counters.skipped_no_email += 1;
                continue;
            }
            LineOutcome::SkippedOversize => {
                counters.skipped_oversize += 1;
                continue;
            }
        };

        let Some(email_norm) = normalize_email(&email_raw) else {
            counters.skipped_no_email += 1;
            continue;
        };

        if is_multi_field {
            multi_field_log.record_once(path).await?;
        }

        let email_hash = hash_email(&email_norm, &config.hmac_key);
        let (is_hash, hash_type) = classify(&password_raw);

        let record = ParsedRecord {
            raw_email: email_raw,
            raw_password: password_raw,
            email_norm,
            email_hash,
            is_hash,
            hash_type,
            source: path.to_path_buf(),
        };

        let prefix = record.shard_prefix().to_string();
        let shard_record = record.into_shard_record(config.emit_email);
        let line = match shard_record.to_jsonl_line() {
            Ok(line) => line,
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to encode record, skipping");
                counters.skipped_field_count += 1;
                continue;
            }
        };

        cache.submit(&prefix, line).await?;
        counters.accepted += 1;
    }

    Ok(counters)
}
