use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Bucket boundaries: [0,0.3)=low, [0.3,0.6)=medium,
    /// [0.6,0.85)=high, [0.85,1]=critical.
    pub fn from_score(score: f64) -> RiskLevel {
        if score >= 0.85 {
            RiskLevel::Critical
        } else if score >= 0.6 {
            RiskLevel::High
        } else if score >= 0.3 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn weight(self) -> f64 {
        match self {
            Severity::High => 0.3,
            Severity::Medium => 0.15,
            Severity::Low => 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitiveHit {
    pub hit_type: String,
    pub severity: Severity,
    pub location: String,
    pub masked_sample: String,
    /// True when the match came from a user-supplied free-text field
    /// rather than a structured field; drives the confidence penalty.
    pub ambiguous_field: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub risk_score: f64,
    pub confidence: f64,
    pub risk_level: RiskLevel,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub content_type: String,
    pub hits: Vec<SensitiveHit>,
}

impl AnalysisResult {
    pub fn has_sensitive_data(&self) -> bool {
        !self.hits.is_empty()
    }
}

pub fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_buckets_match_spec() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.29), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.3), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(0.59), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(0.6), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(0.84), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(0.85), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(1.0), RiskLevel::Critical);
    }

    #[test]
    fn clamp_saturates_at_one() {
        assert_eq!(clamp01(1.4), 1.0);
        assert_eq!(clamp01(-0.1), 0.0);
    }

    #[test]
    fn severity_weights_match_spec() {
        assert_eq!(Severity::High.weight(), 0.3);
        assert_eq!(Severity::Medium.weight(), 0.15);
        assert_eq!(Severity::Low.weight(), 0.05);
    }
}
