use serde::{Deserialize, Serialize};

use super::analysis::{AnalysisResult, RiskLevel};
use super::packet::PacketInfo;
use super::parsed::ParsedData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Allow,
    Audit,
    Alert,
    Block,
}

impl Action {
    /// Precedence used when resolving the first-match rule among the
    /// priority-ordered matched set: block > alert > audit > allow.
    pub fn precedence(self) -> u8 {
        match self {
            Action::Block => 3,
            Action::Alert => 2,
            Action::Audit => 1,
            Action::Allow => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Audit => "audit",
            Action::Alert => "alert",
            Action::Block => "block",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserInfo {
    pub id: String,
    pub risk_level: String, // "low" | "medium" | "high"
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeviceInfo {
    pub id: String,
    pub compliant: bool,
    pub trust_level: String, // "low" | "medium" | "high"
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionInfo {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Environment {
    pub outside_working_hours: bool,
    pub holiday: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionContext {
    pub packet: PacketInfo,
    pub parsed: ParsedData,
    pub analysis: AnalysisResult,
    pub user: UserInfo,
    pub device: DeviceInfo,
    pub session: SessionInfo,
    pub environment: Environment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub id: String,
    pub action: Action,
    pub risk_level: RiskLevel,
    pub risk_score: f64,
    pub confidence: f64,
    pub matched_rule_ids: Vec<String>,
    pub processing_time_ms: u64,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_precedence_orders_block_first() {
        assert!(Action::Block.precedence() > Action::Alert.precedence());
        assert!(Action::Alert.precedence() > Action::Audit.precedence());
        assert!(Action::Audit.precedence() > Action::Allow.precedence());
    }
}
