//! Per-line field extraction with delimiter inference and field-count
//! policy (spec.md §4.3).

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Maximum combined byte length of `email + password + source_path` before a
/// line is rejected as oversize.
const MAX_COMBINED_LENGTH: usize = 4000;

static EMAIL_LIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\S+@\S+\.\S+$").expect("valid regex"));

/// Outcome of parsing a single line.
#[derive(Debug, PartialEq, Eq)]
pub enum LineOutcome {
    /// Exactly two non-empty fields, one of which looked like an email.
    Accepted { email: String, password: String },
    /// More than two `:`-separated fields were present; the line was still
    /// salvaged using a first-delimiter split, but the source file should be
    /// recorded in the multi-field audit log.
    MultiField { email: String, password: String },
    SkippedEmpty,
    SkippedFieldCount,
    SkippedNoEmail,
    SkippedOversize,
}

/// Strip a leading BOM and any control bytes (`0x00-0x1F`, `0x7F`), then trim
/// ASCII whitespace.
fn clean_line(raw: &str) -> String {
    let without_bom = raw.strip_prefix('\u{FEFF}').unwrap_or(raw);
    let without_control: String = without_bom
        .chars()
        .filter(|&c| !(c.is_control() && c != '\t'))
        .collect();
    without_control.trim().to_string()
}

/// Split `line` on the first occurrence of `delim`, returning the two
/// non-empty sides if both are present.
fn split_first(line: &str, delim: char) -> Option<(String, String)> {
    let pos = line.find(delim)?;
    let (left, right_with_delim) = line.split_at(pos);
    let right = &right_with_delim[delim.len_utf8()..];
    let left = left.trim();
    let right = right.trim();
    if left.is_empty() || right.is_empty() {
        None
    } else {
        Some((left.to_string(), right.to_string()))
    }
}

/// Split `line` on the first run of ASCII whitespace.
fn split_whitespace_run(line: &str) -> Option<(String, String)> {
    let mut parts = line.splitn(2, |c: char| c.is_ascii_whitespace());
    let first = parts.next()?.trim();
    let rest = parts.next().unwrap_or("").trim();
    if first.is_empty() || rest.is_empty() {
        None
    } else {
        Some((first.to_string(), rest.to_string()))
    }
}

/// Assign email/credential roles to a two-field candidate. Returns `None`
/// if neither field matches the email shape.
fn assign_roles(field_a: String, field_b: String) -> Option<(String, String)> {
    let a_is_email = EMAIL_LIKE.is_match(&field_a);
    let b_is_email = EMAIL_LIKE.is_match(&field_b);
    match (a_is_email, b_is_email) {
        (true, _) => Some((field_a, field_b)),
        (false, true) => Some((field_b, field_a)),
        (false, false) => None,
    }
}

/// Parse one raw input line into a `LineOutcome`, applying the oversize
/// guard against `source`.
pub fn parse_line(raw: &str, source: &Path) -> LineOutcome {
    let line = clean_line(raw);
    if line.is_empty() {
        return LineOutcome::SkippedEmpty;
    }

    let is_multi_field = line.matches(':').count() > 1;

    let two_fields = split_first(&line, ':')
        .or_else(|| split_first(&line, ';'))
        .or_else(|| split_whitespace_run(&line));

    let (field_a, field_b) = match two_fields {
        Some(fields) => fields,
        None => return LineOutcome::SkippedFieldCount,
    };

    let (email, password) = match assign_roles(field_a, field_b) {
        Some(roles) => roles,
        None => return LineOutcome::SkippedNoEmail,
    };

    let source_len = source.as_os_str().len();
    if email.len() + password.len() + source_len > MAX_COMBINED_LENGTH {
        return LineOutcome::SkippedOversize;
    }

    if is_multi_field {
        LineOutcome::MultiField { email, password }
    } else {
        LineOutcome::Accepted { email, password }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn src() -> &'static Path {
        Path::new("/in/a.txt")
    }

    #[test]
    fn basic_colon_line() {
        let outcome = parse_line("Alice+news@Example.com:hunter2", src());
        assert_eq!(
            outcome,
            LineOutcome::Accepted {
                email: "Alice+news@Example.com".to_string(),
                password: "hunter2".to_string(),
            }
        );
    }

    #[test]
    fn whitespace_delimited_line() {
        let outcome = parse_line("carol@y.io   mypw", src());
        assert_eq!(
            outcome,
            LineOutcome::Accepted { email: "carol@y.io".to_string(), password: "mypw".to_string() }
        );
    }

    #[test]
    fn multi_field_line_is_salvaged_and_flagged() {
        let outcome = parse_line("dave@z.io:pw:extra", src());
        assert_eq!(
            outcome,
            LineOutcome::MultiField { email: "dave@z.io".to_string(), password: "pw".to_string() }
        );
    }

    #[test]
    fn empty_line_is_skipped() {
        assert_eq!(parse_line("   ", src()), LineOutcome::SkippedEmpty);
        assert_eq!(parse_line("", src()), LineOutcome::SkippedEmpty);
    }

    #[test]
    fn line_without_email_pattern_is_skipped() {
        assert_eq!(parse_line("notanemail:alsonotanemail", src()), LineOutcome::SkippedNoEmail);
    }

    #[test]
    fn single_field_line_is_skipped() {
        assert_eq!(parse_line("justoneword", src()), LineOutcome::SkippedFieldCount);
    }

    #[test]
    fn oversize_boundary_at_4000_is_accepted_4001_is_skipped() {
        let source = Path::new("/in/a.txt");
        let source_len = source.as_os_str().len();
        let password_len = MAX_COMBINED_LENGTH - source_len - "e@x.co".len();
        let password = "p".repeat(password_len);
        let line = format!("e@x.co:{password}");
        assert!(matches!(parse_line(&line, source), LineOutcome::Accepted { .. }));

        let too_long_password = "p".repeat(password_len + 1);
        let line = format!("e@x.co:{too_long_password}");
        assert_eq!(parse_line(&line, source), LineOutcome::SkippedOversize);
    }

    #[test]
    fn strips_control_bytes_and_bom() {
        let outcome = parse_line("\u{FEFF}bob@x.io:\u{0007}secret", src());
        assert_eq!(
            outcome,
            LineOutcome::Accepted { email: "bob@x.io".to_string(), password: "secret".to_string() }
        );
    }
}
