use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditType {
    PolicyDecision,
    RuleChange,
    EngineEvent,
}

/// A single persisted line of the audit trail. `details` is a flat map so
/// the on-disk NDJSON shape stays field-for-field stable regardless of
/// which decision/event produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub audit_type: AuditType,
    pub action: String,
    pub result: String,
    pub user_id: String,
    pub device_id: String,
    pub details: HashMap<String, String>,
}
