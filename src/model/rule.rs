use serde::{Deserialize, Serialize};

use super::decision::Action;

/// A single condition in a rule's conjunction. Only the fields a condition
/// actually constrains are `Some`; an absent field is not checked.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Condition {
    pub protocol: Option<String>,
    pub direction: Option<String>,
    pub dest_cidr: Option<String>,
    pub dest_domain: Option<String>,
    pub port: Option<u16>,
    pub min_file_size: Option<u64>,
    pub file_extension: Option<String>,
    pub contains_sensitive: Option<bool>,
    pub min_hit_severity: Option<String>,
    pub min_hit_count: Option<usize>,
    pub user_risk_level: Option<String>,
    pub device_compliant: Option<bool>,
    pub outside_working_hours: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub rule_type: Action,
    pub priority: i32,
    pub enabled: bool,
    pub conditions: Vec<Condition>,
    pub action: Action,
    pub expression: Option<String>,
}

impl PolicyRule {
    pub fn new(id: impl Into<String>, name: impl Into<String>, action: Action) -> Self {
        PolicyRule {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            rule_type: action,
            priority: 0,
            enabled: true,
            conditions: vec![],
            action,
            expression: None,
        }
    }
}
