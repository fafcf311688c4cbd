//! Email normalization and keyed hashing (spec.md §4.1).
//!
//! Both functions here are pure: no I/O, no allocation beyond what the
//! output strings and the HMAC state require.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Normalize a raw email per the five steps in spec.md §4.1. Returns `None`
/// if the result contains no `@` (step 5).
pub fn normalize_email(raw: &str) -> Option<String> {
    // 1. Trim ASCII whitespace.
    let trimmed = raw.trim_matches(|c: char| c.is_ascii_whitespace());

    // 2. Lowercase (ASCII).
    let lowered = trimmed.to_ascii_lowercase();

    // 3. Strip a leading run of non-alphanumeric characters.
    let stripped = lowered.trim_start_matches(|c: char| !c.is_ascii_alphanumeric());

    // 4. If `@` is present at position > 0, drop the `+tag` suffix of the
    // local part and rejoin.
    let normalized = match stripped.find('@') {
        Some(at_pos) if at_pos > 0 => {
            let (local, domain_with_at) = stripped.split_at(at_pos);
            let domain = &domain_with_at[1..];
            let local = match local.find('+') {
                Some(plus_pos) => &local[..plus_pos],
                None => local,
            };
            format!("{local}@{domain}")
        }
        _ => stripped.to_string(),
    };

    // 5. Reject anything without an `@`.
    if normalized.contains('@') {
        Some(normalized)
    } else {
        None
    }
}

/// HMAC-SHA-256 of `email_norm` under the process-wide 32-byte key, as a
/// 64-character lowercase hex digest.
pub fn hash_email(email_norm: &str, key: &[u8; 32]) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("32-byte key is always valid for HMAC-SHA256");
    mac.update(email_norm.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
