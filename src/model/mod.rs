//! Shared data model : the types that flow forward through the
//! pipeline and never get mutated by two stages at once.

mod analysis;
mod audit;
mod decision;
mod packet;
mod parsed;
mod rule;

pub use analysis::{clamp01, AnalysisResult, RiskLevel, SensitiveHit, Severity};
pub use audit::{AuditLog, AuditType};
pub use decision::{Action, DecisionContext, DeviceInfo, Environment, PolicyDecision, SessionInfo, UserInfo};
pub use packet::{Direction, FlowKey, PacketInfo, ProcessInfo, Transport};
pub use parsed::ParsedData;
pub use rule::{Condition, PolicyRule};
