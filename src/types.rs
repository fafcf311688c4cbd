//! Shared data types that flow between the parser, classifier, hasher, and
//! the shard writers.

use std::path::PathBuf;

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Deserialize;

/// Credential hash family recognized by the classifier, or `Plaintext` if
/// none of the known patterns matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashType {
    Plaintext,
    Md5Hex,
    Sha1Hex,
    Sha256Hex,
    Sha512Hex,
    Bcrypt,
    Argon2,
    Md5Crypt,
    Sha256Crypt,
    Sha512Crypt,
    Ssha,
    Sha1Base64,
}

impl HashType {
    /// The exact wire string for this variant, per spec.md §3's enumerated set.
    pub fn as_str(self) -> &'static str {
        match self {
            HashType::Plaintext => "plaintext",
            HashType::Md5Hex => "md5-hex",
            HashType::Sha1Hex => "sha1-hex",
            HashType::Sha256Hex => "sha256-hex",
            HashType::Sha512Hex => "sha512-hex",
            HashType::Bcrypt => "bcrypt",
            HashType::Argon2 => "argon2",
            HashType::Md5Crypt => "md5-crypt",
            HashType::Sha256Crypt => "sha256-crypt",
            HashType::Sha512Crypt => "sha512-crypt",
            HashType::Ssha => "ssha",
            HashType::Sha1Base64 => "sha1-base64",
        }
    }
}

impl Serialize for HashType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A record after parsing, normalization, hashing, and classification, but
/// before it is routed to a shard writer.
#[derive(Debug, Clone)]
pub struct ParsedRecord {
    pub raw_email: String,
    pub raw_password: String,
    pub email_norm: String,
    pub email_hash: String,
    pub is_hash: bool,
    pub hash_type: HashType,
    pub source: PathBuf,
}

impl ParsedRecord {
    /// First four hex characters of `email_hash` — the shard prefix.
    pub fn shard_prefix(&self) -> &str {
        &self.email_hash[0..4]
    }

    /// Build the on-disk shard record, applying the configured email
    /// emission policy.
    pub fn into_shard_record(self, emit_email: bool) -> ShardRecord {
        ShardRecord {
            email_hash: self.email_hash,
            password: self.raw_password,
            is_hash: self.is_hash,
            hash_type: self.hash_type,
            email: if emit_email { self.email_norm } else { String::new() },
            source: self.source,
        }
    }
}

/// One line emitted to a shard file. Field order is pinned by a hand-written
/// `Serialize` impl rather than left to derive's struct-declaration order,
/// so the on-disk key order is stable across crate versions.
#[derive(Debug, Clone)]
pub struct ShardRecord {
    pub email_hash: String,
    pub password: String,
    pub is_hash: bool,
    pub hash_type: HashType,
    pub email: String,
    pub source: PathBuf,
}

impl Serialize for ShardRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ShardRecord", 6)?;
        state.serialize_field("email_hash", &self.email_hash)?;
        state.serialize_field("password", &self.password)?;
        state.serialize_field("is_hash", &self.is_hash)?;
        state.serialize_field("hash_type", &self.hash_type)?;
        state.serialize_field("email", &self.email)?;
        state.serialize_field("source", &self.source)?;
        state.end()
    }
}

impl ShardRecord {
    /// Encode as a single JSON line, `\n`-terminated, ready to hand to a
    /// `BatchWriter`.
    pub fn to_jsonl_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Per-file outcome counters returned by the file processor.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCounters {
    pub accepted: u64,
    pub skipped_empty: u64,
    pub skipped_field_count: u64,
    pub skipped_oversize: u64,
    pub skipped_no_email: u64,
}

impl FileCounters {
    pub fn total_skipped(&self) -> u64 {
        self.skipped_empty + self.skipped_field_count + self.skipped_oversize + self.skipped_no_email
    }

    pub fn merge(&mut self, other: FileCounters) {
        self.accepted += other.accepted;
        self.skipped_empty += other.skipped_empty;
        self.skipped_field_count += other.skipped_field_count;
        self.skipped_oversize += other.skipped_oversize;
        self.skipped_no_email += other.skipped_no_email;
    }
}
