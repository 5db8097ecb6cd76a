//! ML/rule-based scorer. The default build has no model; this
//! crate never loads one, but keeps the
//! seam so a real model could plug in without touching the decision
//! algorithm.

use crate::model::{clamp01, DecisionContext};

pub trait Scorer: Send + Sync {
    fn is_ready(&self) -> bool;
    fn score(&self, ctx: &DecisionContext) -> f64;
}

/// Always active in this build. `risk = 0.6*analysis.risk_score +
/// user_weight + device_weight + env_weight`, clamped to 1.
pub struct RuleBasedScorer;

impl Scorer for RuleBasedScorer {
    fn is_ready(&self) -> bool {
        true
    }

    fn score(&self, ctx: &DecisionContext) -> f64 {
        let user_weight = match ctx.user.risk_level.as_str() {
            "high" => 0.3,
            "medium" => 0.2,
            "low" => 0.1,
            _ => 0.0,
        };
        let device_weight = if !ctx.device.compliant {
            0.2
        } else {
            match ctx.device.trust_level.as_str() {
                "low" => 0.2,
                "medium" => 0.1,
                _ => 0.0,
            }
        };
        let mut env_weight = 0.0;
        if ctx.environment.outside_working_hours {
            env_weight += 0.1;
        }
        if ctx.environment.holiday {
            env_weight += 0.05;
        }
        clamp01(0.6 * ctx.analysis.risk_score + user_weight + device_weight + env_weight)
    }
}

/// An untrained seam — `is_ready()` is always false so `PolicyEngine`
/// falls back to `RuleBasedScorer`. A missing model path silently engages
/// the fallback score; no model bytes are ever parsed by this crate.
pub struct MlScorer;

impl Scorer for MlScorer {
    fn is_ready(&self) -> bool {
        false
    }

    fn score(&self, _ctx: &DecisionContext) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnalysisResult, DeviceInfo, Direction, Environment, PacketInfo, ParsedData, ProcessInfo, RiskLevel, SessionInfo, Transport, UserInfo};

    fn base_ctx() -> DecisionContext {
        DecisionContext {
            packet: PacketInfo {
                id: "p".into(),
                captured_at_ms: 0,
                src_ip: "10.0.0.1".parse().unwrap(),
                src_port: 1,
                dst_ip: "1.1.1.1".parse().unwrap(),
                dst_port: 443,
                transport: Transport::Tcp,
                direction: Direction::Outbound,
                payload: vec![],
                size: 0,
                process: ProcessInfo::failed(),
                metadata: Default::default(),
            },
            parsed: ParsedData::default(),
            analysis: AnalysisResult {
                risk_score: 0.2,
                confidence: 1.0,
                risk_level: RiskLevel::Low,
                categories: vec![],
                tags: vec![],
                content_type: "text".into(),
                hits: vec![],
            },
            user: UserInfo { id: "u1".into(), risk_level: "low".into() },
            device: DeviceInfo { id: "d1".into(), compliant: true, trust_level: "high".into() },
            session: SessionInfo::default(),
            environment: Environment::default(),
        }
    }

    #[test]
    fn ml_scorer_is_never_ready() {
        assert!(!MlScorer.is_ready());
    }

    #[test]
    fn rule_based_scorer_combines_weights() {
        let mut ctx = base_ctx();
        ctx.user.risk_level = "high".into();
        ctx.device.compliant = false;
        ctx.environment.outside_working_hours = true;
        let score = RuleBasedScorer.score(&ctx);
        assert!((score - (0.6 * 0.2 + 0.3 + 0.2 + 0.1)).abs() < 1e-9);
    }

    #[test]
    fn score_never_exceeds_one() {
        let mut ctx = base_ctx();
        ctx.analysis.risk_score = 1.0;
        ctx.user.risk_level = "high".into();
        ctx.device.compliant = false;
        ctx.environment.outside_working_hours = true;
        ctx.environment.holiday = true;
        assert_eq!(RuleBasedScorer.score(&ctx), 1.0);
    }
}
