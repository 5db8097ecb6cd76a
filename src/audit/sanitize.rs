//! Pure sanitization rules — kept free of I/O so they're testable
//! without a writer thread.

use crate::analyzer::patterns::{self, CompiledPattern};

const REDACTED: &str = "[REDACTED]";
const HEADER_MAX_LEN: usize = 200;
const SUBJECT_MAX_LEN: usize = 100;
const PREVIEW_MAX_BYTES: usize = 200;

fn is_redacted_header_name(name: &str) -> bool {
    matches!(name.to_lowercase().as_str(), "authorization" | "cookie" | "x-api-key")
}

/// Redacts Authorization/Cookie/X-API-Key outright, truncates anything else
/// past 200 chars with an ellipsis.
pub fn sanitize_header_value(name: &str, value: &str) -> String {
    if is_redacted_header_name(name) {
        return REDACTED.to_string();
    }
    if value.chars().count() > HEADER_MAX_LEN {
        let truncated: String = value.chars().take(HEADER_MAX_LEN).collect();
        format!("{truncated}...")
    } else {
        value.to_string()
    }
}

/// `password`/`token`/`secret`/`key`/`auth`/`credential` substring match on
/// a query/form field name (case-insensitive).
pub fn is_sensitive_field_name(key: &str) -> bool {
    let lower = key.to_lowercase();
    ["password", "token", "secret", "key", "auth", "credential"]
    .iter()
    .any(|needle| lower.contains(needle))
}

pub fn sanitize_field_value(key: &str, value: &str) -> String {
    if is_sensitive_field_name(key) {
        REDACTED.to_string()
    } else {
        value.to_string()
    }
}

pub fn truncate_subject(subject: &str) -> String {
    if subject.chars().count() > SUBJECT_MAX_LEN {
        subject.chars().take(SUBJECT_MAX_LEN).collect()
    } else {
        subject.to_string()
    }
}

/// `"size:<N> bytes"` plus, only for text payloads, a preview of at most
/// 200 bytes with every sensitive-pattern match masked out. Callers also
/// pass the already-masked hit tags separately as `sensitive_patterns`.
pub fn data_summary(body: &[u8], is_text: bool, patterns: &[CompiledPattern]) -> String {
    let mut summary = format!("size:{} bytes", body.len());
    if is_text {
        let preview_bytes = &body[..body.len().min(PREVIEW_MAX_BYTES)];
        let preview = String::from_utf8_lossy(preview_bytes);
        let redacted = patterns::redact(patterns, &preview);
        summary.push_str(&format!(" preview:{redacted}"));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_header_is_redacted() {
        assert_eq!(sanitize_header_value("Authorization", "Bearer abc"), REDACTED);
        assert_eq!(sanitize_header_value("cookie", "session=1"), REDACTED);
    }

    #[test]
    fn long_header_is_truncated() {
        let value = "a".repeat(250);
        let sanitized = sanitize_header_value("X-Custom", &value);
        assert!(sanitized.ends_with("..."));
        assert_eq!(sanitized.len(), HEADER_MAX_LEN + 3);
    }

    #[test]
    fn password_like_field_names_are_redacted() {
        assert_eq!(sanitize_field_value("user_password", "hunter2"), REDACTED);
        assert_eq!(sanitize_field_value("api_token", "xyz"), REDACTED);
        assert_eq!(sanitize_field_value("username", "alice"), "alice");
    }

    #[test]
    fn subject_truncates_past_100_chars() {
        let subject = "x".repeat(150);
        assert_eq!(truncate_subject(&subject).len(), 100);
    }

    #[test]
    fn data_summary_includes_preview_for_text_only() {
        let text = data_summary(b"hello world", true, &[]);
        assert!(text.contains("preview:hello world"));
        let binary = data_summary(&[0xff, 0xfe, 0x00], false, &[]);
        assert!(!binary.contains("preview"));
    }

    #[test]
    fn data_summary_never_exceeds_preview_bound() {
        let body = vec![b'x'; 10_000];
        let summary = data_summary(&body, true, &[]);
        assert!(summary.len() < 300);
    }

    #[test]
    fn data_summary_redacts_sensitive_matches_in_preview() {
        let configs = vec![crate::config::PatternConfig {
            name: "credit_card".into(),
            pattern: r"\b(?:\d[ -]*?){13,16}\b".into(),
            severity: "high".into(),
        }];
        let compiled = crate::analyzer::patterns::compile_patterns(&configs);
        let body = b"card number: 4111111111111111, thanks";
        let summary = data_summary(body, true, &compiled);
        assert!(!summary.contains("4111111111111111"));
        assert!(summary.contains("[REDACTED:credit_card]"));
    }
}
