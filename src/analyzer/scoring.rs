//! Pure scoring functions, factored out so risk computation is unit
//! testable without constructing a full `Analyzer`.

use crate::model::{clamp01, RiskLevel, SensitiveHit};

/// `risk_score = clamp01(base_from_severity + environmental_multiplier)`
///. The environmental multiplier is applied by the caller (the
/// Policy Engine's scorer); here we only sum per-hit severity weights.
pub fn base_score(hits: &[SensitiveHit]) -> f64 {
    clamp01(hits.iter().map(|h| h.severity.weight()).sum())
}

/// Confidence is 1.0 minus the fraction of matches from ambiguous fields.
pub fn confidence(hits: &[SensitiveHit]) -> f64 {
    if hits.is_empty() {
        return 1.0;
    }
    let ambiguous = hits.iter().filter(|h| h.ambiguous_field).count() as f64;
    clamp01(1.0 - ambiguous / hits.len() as f64)
}

pub fn risk_level(score: f64) -> RiskLevel {
    RiskLevel::from_score(score)
}

/// Text-vs-binary heuristic : text if >=80% of the first 1000 bytes
/// are printable ASCII, tab, LF, or CR.
pub fn is_text(data: &[u8]) -> bool {
    let sample = &data[..data.len().min(1000)];
    if sample.is_empty() {
        return true;
    }
    let printable = sample
    .iter()
    .filter(|&&b| (0x20..=0x7e).contains(&b) || matches!(b, b'\t' | b'\n' | b'\r'))
    .count();
    (printable as f64 / sample.len() as f64) >= 0.8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Severity;

    fn hit(sev: Severity, ambiguous: bool) -> SensitiveHit {
        SensitiveHit {
            hit_type: "t".into(),
            severity: sev,
            location: "body".into(),
            masked_sample: "***".into(),
            ambiguous_field: ambiguous,
        }
    }

    #[test]
    fn base_score_sums_and_saturates() {
        let hits = vec![hit(Severity::High, false); 4];
        assert_eq!(base_score(&hits), 1.0); // 4*0.3 = 1.2, clamped
    }

    #[test]
    fn confidence_penalizes_ambiguous_hits() {
        let hits = vec![hit(Severity::Medium, true), hit(Severity::Medium, false)];
        assert_eq!(confidence(&hits), 0.5);
    }

    #[test]
    fn confidence_is_one_with_no_hits() {
        assert_eq!(confidence(&[]), 1.0);
    }

    #[test]
    fn text_heuristic_detects_binary() {
        let binary: Vec<u8> = (0..200).map(|i| (i % 256) as u8).collect();
        assert!(!is_text(&binary));
        assert!(is_text(b"hello world\r\nplain text"));
    }
}
