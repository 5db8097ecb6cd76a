use regex::Regex;

use crate::config::PatternConfig;
use crate::model::Severity;

pub struct CompiledPattern {
    pub name: String,
    pub severity: Severity,
    pub regex: Regex,
}

fn parse_severity(s: &str) -> Severity {
    match s {
        "high" => Severity::High,
        "medium" => Severity::Medium,
        _ => Severity::Low,
    }
}

/// Precompiles the configured pattern set once at load time; read-only
/// thereafter.
pub fn compile_patterns(configs: &[PatternConfig]) -> Vec<CompiledPattern> {
    configs
    .iter()
    .filter_map(|c| {
        Regex::new(&c.pattern).ok().map(|regex| CompiledPattern {
            name: c.name.clone(),
            severity: parse_severity(&c.severity),
            regex,
        })
    })
    .collect()
}

/// Masks every match of every pattern out of `text`, returning a copy with
/// each hit replaced by a `[REDACTED:<pattern name>]` placeholder. Used to
/// scrub free-text previews before they leave the analyzer's trust boundary.
pub fn redact(patterns: &[CompiledPattern], text: &str) -> String {
    let mut out = text.to_string();
    for pattern in patterns {
        if pattern.regex.is_match(&out) {
            let placeholder = format!("[REDACTED:{}]", pattern.name);
            out = pattern.regex.replace_all(&out, placeholder.as_str()).into_owned();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_all_valid_patterns() {
        let configs = vec![PatternConfig {
            name: "email".into(),
            pattern: r"\w+@\w+\.\w+".into(),
            severity: "medium".into(),
        }];
        let compiled = compile_patterns(&configs);
        assert_eq!(compiled.len(), 1);
        assert!(compiled[0].regex.is_match("a@b.com"));
    }

    #[test]
    fn invalid_pattern_is_skipped_not_fatal() {
        let configs = vec![PatternConfig {
            name: "bad".into(),
            pattern: "(unclosed".into(),
            severity: "low".into(),
        }];
        assert!(compile_patterns(&configs).is_empty());
    }

    #[test]
    fn redact_masks_every_match_and_leaves_the_rest() {
        let configs = vec![PatternConfig {
            name: "credit_card".into(),
            pattern: r"\b(?:\d[ -]*?){13,16}\b".into(),
            severity: "high".into(),
        }];
        let compiled = compile_patterns(&configs);
        let redacted = redact(&compiled, "card number: 4111111111111111, thanks");
        assert!(!redacted.contains("4111111111111111"));
        assert!(redacted.contains("[REDACTED:credit_card]"));
        assert!(redacted.contains("thanks"));
    }

    #[test]
    fn redact_is_a_no_op_when_nothing_matches() {
        let compiled = compile_patterns(&[]);
        assert_eq!(redact(&compiled, "nothing sensitive here"), "nothing sensitive here");
    }
}
