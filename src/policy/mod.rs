//! Rule matching, decision synthesis.

pub mod rule;
pub mod scorer;
pub mod store;

use std::time::Duration;

use uuid::Uuid;

use crate::config::Config;
use crate::model::{
    Action, AnalysisResult, DecisionContext, DeviceInfo, Environment, PacketInfo, ParsedData,
    PolicyDecision, RiskLevel, SessionInfo, UserInfo,
};

use rule::RuleManager;
use scorer::{MlScorer, RuleBasedScorer, Scorer};

pub struct PolicyEngine {
    rules: RuleManager,
    rule_scorer: RuleBasedScorer,
    ml_scorer: MlScorer,
    risk_audit_threshold: f64,
}

impl PolicyEngine {
    pub fn new(_config: &Config, rules: Vec<crate::model::PolicyRule>) -> Self {
        PolicyEngine {
            rules: RuleManager::new(rules),
            rule_scorer: RuleBasedScorer,
            ml_scorer: MlScorer,
            risk_audit_threshold: 0.6,
        }
    }

    pub fn rules(&self) -> &RuleManager {
        &self.rules
    }

    /// Decision algorithm.
    pub fn decide(
        &self,
        packet: &PacketInfo,
        parsed: &ParsedData,
        analysis: &AnalysisResult,
        elapsed: Duration,
    ) -> PolicyDecision {
        let ctx = DecisionContext {
            packet: packet.clone(),
            parsed: parsed.clone(),
            analysis: analysis.clone(),
            user: default_user(),
            device: default_device(),
            session: SessionInfo::default(),
            environment: default_environment(),
        };

        let snapshot = self.rules.snapshot();
        let matched = rule::matching_rules(&snapshot, &ctx);
        let matched_ids: Vec<String> = matched.iter().map(|r| r.id.clone()).collect();

        let ml_risk = if self.ml_scorer.is_ready() {
            self.ml_scorer.score(&ctx)
        } else {
            self.rule_scorer.score(&ctx)
        };
        // ML must never lower risk below the analyzer's own finding.
        let final_risk = ctx.analysis.risk_score.max(ml_risk);
        let risk_level = RiskLevel::from_score(final_risk);

        let (action, reason) = match rule::winning_action(&matched) {
            Some(action) => (action, format!("matched {} rule(s)", matched.len())),
            None if final_risk >= self.risk_audit_threshold => {
                (Action::Audit, "no rule matched; risk above audit threshold".to_string())
            }
            None => (Action::Allow, "no rule matched".to_string()),
        };

        PolicyDecision {
            id: Uuid::new_v4().to_string(),
            action,
            risk_level,
            risk_score: final_risk,
            confidence: ctx.analysis.confidence,
            matched_rule_ids: matched_ids,
            processing_time_ms: elapsed.as_millis() as u64,
            reason,
        }
    }

    /// Per-packet deadline exceeded: forward with
    /// allow and a reason field, counted by the caller.
    pub fn deadline_decision(&self, elapsed: Duration) -> PolicyDecision {
        PolicyDecision {
            id: Uuid::new_v4().to_string(),
            action: Action::Allow,
            risk_level: RiskLevel::Low,
            risk_score: 0.0,
            confidence: 0.0,
            matched_rule_ids: vec![],
            processing_time_ms: elapsed.as_millis() as u64,
            reason: "deadline_exceeded".into(),
        }
    }
}

// Until the host wires a real session/identity provider (out of scope per
// decisions evaluate against a neutral default context; rule
// conditions on user/device/environment fields simply never match.
fn default_user() -> UserInfo {
    UserInfo { id: String::new(), risk_level: "low".into() }
}

fn default_device() -> DeviceInfo {
    DeviceInfo { id: String::new(), compliant: true, trust_level: "high".into() }
}

fn default_environment() -> Environment {
    Environment { outside_working_hours: false, holiday: false }
}
