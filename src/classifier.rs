//! Credential classifier (spec.md §4.2): pattern-based recognition of
//! common password-hash families. Pure and allocation-light — each pattern
//! is compiled once and reused for the lifetime of the process.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::HashType;

struct Pattern {
    regex: Lazy<Regex>,
    hash_type: HashType,
}

macro_rules! pattern {
    ($re:expr, $hash_type:expr) => {
        Pattern {
            regex: Lazy::new(|| Regex::new($re).expect("classifier pattern is a valid regex")),
            hash_type: $hash_type,
        }
    };
}

// Decision order matters: first match wins (spec.md §4.2).
static PATTERNS: &[Pattern] = &[
    pattern!(r"^\$2[aby]\$\d{2}\$[A-Za-z0-9./]{53}$", HashType::Bcrypt),
    pattern!(r"^\$argon2(i|d|id)\$v=\d+\$.*\$.*\$.*$", HashType::Argon2),
    pattern!(r"^\$1\$[^$]+\$[A-Za-z0-9./]+$", HashType::Md5Crypt),
    pattern!(r"^\$5\$[^$]+\$[A-Za-z0-9./]+$", HashType::Sha256Crypt),
    pattern!(r"^\$6\$[^$]+\$[A-Za-z0-9./]+$", HashType::Sha512Crypt),
    pattern!(r"^\{SSHA\}[A-Za-z0-9+/=]+$", HashType::Ssha),
    pattern!(r"^\{SHA\}[A-Za-z0-9+/=]+$", HashType::Sha1Base64),
    pattern!(r"^[A-Fa-f0-9]{32}$", HashType::Md5Hex),
    pattern!(r"^[A-Fa-f0-9]{40}$", HashType::Sha1Hex),
    pattern!(r"^[A-Fa-f0-9]{64}$", HashType::Sha256Hex),
    pattern!(r"^[A-Fa-f0-9]{128}$", HashType::Sha512Hex),
];

/// Classify a trimmed credential string. Returns `(is_hash, hash_type)`;
/// `is_hash` is always `hash_type != Plaintext`.
pub fn classify(password: &str) -> (bool, HashType) {
    for candidate in PATTERNS {
        if candidate.regex.is_match(password) {
            return (true, candidate.hash_type);
        }
    }
    (false, HashType::Plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_is_not_a_hash() {
        let (is_hash, hash_type) = classify("hunter2");
        assert!(!is_hash);
        assert_eq!(hash_type, HashType::Plaintext);
    }

    #[test]
    fn recognizes_bcrypt() {
        let candidate = format!("$2y$12${}", "a".repeat(53));
        let (is_hash, hash_type) = classify(&candidate);
        assert!(is_hash);
        assert_eq!(hash_type, HashType::Bcrypt);
    }

    #[test]
    fn recognizes_md5_hex() {
        let (is_hash, hash_type) = classify(&"a".repeat(32));
        assert!(is_hash);
        assert_eq!(hash_type, HashType::Md5Hex);
    }

    #[test]
    fn recognizes_sha1_hex() {
        let (is_hash, hash_type) = classify(&"b".repeat(40));
        assert_eq!(hash_type, HashType::Sha1Hex);
        assert!(is_hash);
    }

    #[test]
    fn recognizes_sha256_hex() {
        let (_, hash_type) = classify(&"c".repeat(64));
        assert_eq!(hash_type, HashType::Sha256Hex);
    }

    #[test]
    fn recognizes_sha512_hex() {
        let (_, hash_type) = classify(&"d".repeat(128));
        assert_eq!(hash_type, HashType::Sha512Hex);
    }

    #[test]
    fn recognizes_ssha_and_sha1_base64() {
        assert_eq!(classify("{SSHA}abc123==").1, HashType::Ssha);
        assert_eq!(classify("{SHA}abc123==").1, HashType::Sha1Base64);
    }

    #[test]
    fn recognizes_unix_crypt_families() {
        assert_eq!(classify("$1$abcdefgh$somehashvalue123").1, HashType::Md5Crypt);
        assert_eq!(classify("$5$abcdefgh$somehashvalue123").1, HashType::Sha256Crypt);
        assert_eq!(classify("$6$abcdefgh$somehashvalue123").1, HashType::Sha512Crypt);
    }

    #[test]
    fn classification_totality_matches_is_hash_law() {
        for candidate in ["hunter2", &"a".repeat(32), &"b".repeat(40), "{SSHA}abc=="] {
            let (is_hash, hash_type) = classify(candidate);
            assert_eq!(is_hash, hash_type != HashType::Plaintext);
        }
    }
}
