//! Sensitive-data detection and content classification.

pub mod patterns;
pub mod scoring;

use std::time::{Duration, Instant};

use crate::config::{AnalyzerConfig, SizeLimitsConfig};
use crate::model::{AnalysisResult, ParsedData, Severity};

use patterns::{compile_patterns, CompiledPattern};

const PATTERN_TIMEOUT: Duration = Duration::from_millis(50);

pub struct Analyzer {
    patterns: Vec<CompiledPattern>,
    blocked_extensions: Vec<String>,
    monitored_extensions: Vec<String>,
    size_limits: SizeLimitsConfig,
}

impl Analyzer {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Analyzer {
            patterns: compile_patterns(&config.sensitive_data.patterns),
            blocked_extensions: config.file_types.blocked_extensions.clone(),
            monitored_extensions: config.file_types.monitored_extensions.clone(),
            size_limits: config.size_limits.clone(),
        }
    }

    /// Runs the full detection pipeline in its declared order: pattern
    /// detection, file-type checks, size bounds, classification, scoring,
    /// confidence.
    pub fn analyze(&self, data: &ParsedData) -> AnalysisResult {
        let mut hits = Vec::new();

        self.run_patterns(data, &mut hits);
        self.check_file_type(data, &mut hits);
        self.check_size_bounds(data, &mut hits);

        let categories = classify(&hits);
        let content_type = if scoring::is_text(&data.body) { "text".to_string() } else { "binary".to_string() };
        let base = scoring::base_score(&hits);
        let risk_score = base; // environmental multiplier is applied downstream by the scorer
        let confidence = scoring::confidence(&hits);
        let risk_level = scoring::risk_level(risk_score);

        AnalysisResult {
            risk_score,
            confidence,
            risk_level,
            categories,
            tags: hits.iter().map(|h| h.hit_type.clone()).collect(),
            content_type,
            hits,
        }
    }

    /// The compiled pattern set, exposed read-only so other modules (the
    /// audit trail's preview redaction) can reuse it without re-detecting
    /// hits through the full `analyze` pipeline.
    pub fn patterns(&self) -> &[CompiledPattern] {
        &self.patterns
    }

    /// Scrubs any sensitive-pattern match out of free text. Used to build an
    /// audit preview that can't leak raw content even when it's drawn from
    /// the unredacted body.
    pub fn redact(&self, text: &str) -> String {
        patterns::redact(&self.patterns, text)
    }

    fn run_patterns(&self, data: &ParsedData, hits: &mut Vec<crate::model::SensitiveHit>) {
        let fields = self.scannable_fields(data);
        for pattern in &self.patterns {
            let start = Instant::now();
            for (field_name, text, ambiguous) in &fields {
                for m in pattern.regex.find_iter(text) {
                    hits.push(crate::model::SensitiveHit {
                        hit_type: pattern.name.clone(),
                        severity: pattern.severity,
                        location: field_name.clone(),
                        masked_sample: mask(m.as_str()),
                        ambiguous_field: *ambiguous,
                    });
                }
            }
            if start.elapsed() > PATTERN_TIMEOUT {
                hits.push(crate::model::SensitiveHit {
                    hit_type: "pattern_timeout".into(),
                    severity: Severity::Low,
                    location: "engine".into(),
                    masked_sample: String::new(),
                    ambiguous_field: false,
                });
            }
        }
    }

    /// Fields scanned: body, URL query params, form fields,
    /// non-redacted headers, and protocol-specific text (SMTP subject, SQL
    /// query text). `ambiguous` marks free-text fields vs. structured ones.
    fn scannable_fields(&self, data: &ParsedData) -> Vec<(String, String, bool)> {
        let mut fields = Vec::new();
        if scoring::is_text(&data.body) {
            fields.push(("body".into(), String::from_utf8_lossy(&data.body).into_owned(), true));
        }
        if let Some(url) = &data.url {
            fields.push(("url".into(), url.clone(), false));
        }
        for (k, v) in &data.headers {
            if is_redacted_header(k) {
                continue;
            }
            fields.push((format!("header:{k}"), v.clone(), false));
        }
        if let Some(subject) = data.metadata.get("subject") {
            fields.push(("subject".into(), subject.clone(), true));
        }
        fields
    }

    fn check_file_type(&self, data: &ParsedData, hits: &mut Vec<crate::model::SensitiveHit>) {
        let Some(name) = data.metadata.get("file_name") else { return };
        let Some(ext) = name.rsplit('.').next() else { return };
        let ext = ext.to_lowercase();
        if self.blocked_extensions.iter().any(|e| e.trim_start_matches('.') == ext) {
            hits.push(crate::model::SensitiveHit {
                hit_type: "blocked_extension".into(),
                severity: Severity::High,
                location: "file_name".into(),
                masked_sample: format!("*.{ext}"),
                ambiguous_field: false,
            });
        } else if self.monitored_extensions.iter().any(|e| e.trim_start_matches('.') == ext) {
            hits.push(crate::model::SensitiveHit {
                hit_type: "monitored_extension".into(),
                severity: Severity::Low,
                location: "file_name".into(),
                masked_sample: format!("*.{ext}"),
                ambiguous_field: false,
            });
        }
    }

    fn check_size_bounds(&self, data: &ParsedData, hits: &mut Vec<crate::model::SensitiveHit>) {
        if data.body.len() > self.size_limits.max_content_size {
            hits.push(crate::model::SensitiveHit {
                hit_type: "oversize_content".into(),
                severity: Severity::Medium,
                location: "body".into(),
                masked_sample: format!("size:{} bytes", data.body.len()),
                ambiguous_field: false,
            });
        }
        if let Some(size) = data.metadata.get("file_size").and_then(|s| s.parse::<usize>().ok()) {
            if size > self.size_limits.max_attachment_size {
                hits.push(crate::model::SensitiveHit {
                    hit_type: "oversize_attachment".into(),
                    severity: Severity::Medium,
                    location: "attachment".into(),
                    masked_sample: format!("size:{size} bytes"),
                    ambiguous_field: false,
                });
            }
        }
    }
}

fn is_redacted_header(name: &str) -> bool {
    matches!(name.to_lowercase().as_str(), "authorization" | "cookie" | "x-api-key")
}

fn classify(hits: &[crate::model::SensitiveHit]) -> Vec<String> {
    let mut categories = Vec::new();
    for hit in hits {
        let category = match hit.hit_type.as_str() {
            "credit_card" | "ssn" | "chinese_id" => "pii",
            "email" => "pii",
            "iban" | "bank_account" => "financial",
            "password" | "api_key" | "secret" => "credentials",
            _ => continue,
        };
        if !categories.iter().any(|c: &String| c == category) {
            categories.push(category.to_string());
        }
    }
    categories
}

/// A detected value never leaves the Analyzer in cleartext; callers only
/// ever see this masked tag.
fn mask(value: &str) -> String {
    let tag = value.len().to_string();
    format!("***{tag}***")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerConfig;

    fn analyzer() -> Analyzer {
        Analyzer::new(&AnalyzerConfig::default())
    }

    fn parsed_with_body(body: &str) -> ParsedData {
        ParsedData {
            body: body.as_bytes().to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn detects_credit_card_in_body() {
        let result = analyzer().analyze(&parsed_with_body("card=4111111111111111"));
        assert!(result.hits.iter().any(|h| h.hit_type == "credit_card"));
        assert!(result.risk_score >= 0.3);
    }

    #[test]
    fn masked_sample_never_contains_raw_value() {
        let result = analyzer().analyze(&parsed_with_body("card=4111111111111111"));
        for hit in &result.hits {
            assert!(!hit.masked_sample.contains("4111111111111111"));
        }
    }

    #[test]
    fn clean_body_has_no_hits_and_low_risk() {
        let result = analyzer().analyze(&parsed_with_body("hello, just a normal message"));
        assert!(result.hits.is_empty());
        assert_eq!(result.risk_level, crate::model::RiskLevel::Low);
    }

    #[test]
    fn redacted_headers_are_not_scanned() {
        let mut data = parsed_with_body("nothing sensitive here");
        data.headers.insert("Authorization".into(), "Bearer 4111111111111111".into());
        let result = analyzer().analyze(&data);
        assert!(!result.hits.iter().any(|h| h.location == "header:Authorization"));
    }

    #[test]
    fn blocked_extension_contributes_high_severity_hit() {
        let mut cfg = AnalyzerConfig::default();
        cfg.file_types.blocked_extensions = vec!["exe".into()];
        let analyzer = Analyzer::new(&cfg);
        let mut data = parsed_with_body("");
        data.metadata.insert("file_name".into(), "payload.exe".into());
        let result = analyzer.analyze(&data);
        assert!(result.hits.iter().any(|h| h.hit_type == "blocked_extension"));
    }
}
