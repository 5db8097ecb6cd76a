//! Host control plane : the request/event surface a plugin host
//! drives after `DlpEngine::init` → `start()`. Every request returns a
//! `serde_json::Value` envelope — `{..fields}` on success or
//! `{success:false, error:{code,message}}` on failure — so a host can stay
//! transport-agnostic (stdio, IPC, FFI) about how it carries these calls.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::DlpError;
use crate::model::{Action, PolicyRule};
use crate::DlpEngine;

#[derive(Debug, Deserialize)]
struct RuleParams {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    pattern: Option<String>,
    action: Action,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Dispatches one host request by action name. Unknown actions return
/// `unknown_action` rather than panicking — a host that got ahead of this
/// core's supported surface should not bring the engine down.
pub fn handle_request(engine: &Arc<DlpEngine>, action: &str, params: Value) -> Value {
    let result = match action {
        "get_rules" => Ok(get_rules(engine)),
        "add_rule" => add_or_update_rule(engine, params, "add_error"),
        "update_rule" => add_or_update_rule(engine, params, "update_error"),
        "delete_rule" => delete_rule(engine, params),
        "scan_file" => scan_file(engine, params),
        "scan_directory" => scan_directory(engine, params),
        "scan_clipboard" => scan_clipboard(engine),
        "get_alerts" => Ok(alerts_envelope(engine.get_alerts())),
        "clear_alerts" => {
            engine.clear_alerts();
            Ok(json!({"status": "ok", "message": "alerts cleared"}))
        }
        _ => Err(DlpError::InvalidInput(format!("unknown action: {action}"))),
    };

    match result {
        Ok(mut value) => {
            if let Value::Object(ref mut map) = value {
                map.entry("success").or_insert(json!(true));
            }
            value
        }
        Err(e) => error_envelope(&e),
    }
}

/// Routes a consumed event (`system.startup`, `system.shutdown`,
/// `dlp.scan_request`). Unknown events are ignored.
pub fn handle_event(engine: &Arc<DlpEngine>, event: &str, params: Value) {
    match event {
        "system.startup" => engine.start(),
        "system.shutdown" => engine.stop(),
        "dlp.scan_request" => {
            if let Some(path) = params.get("path").and_then(|v| v.as_str()) {
                if let Err(e) = engine.scan_file(std::path::Path::new(path)) {
                    tracing::warn!("dlp.scan_request for {path} failed: {e}");
                }
            }
        }
        _ => {}
    }
}

fn get_rules(engine: &Arc<DlpEngine>) -> Value {
    let rules = engine.get_rules();
    json!({"rules": rules, "count": rules.len()})
}

fn add_or_update_rule(engine: &Arc<DlpEngine>, params: Value, error_code: &'static str) -> Result<Value, DlpError> {
    let params: RuleParams = serde_json::from_value(params)
    .map_err(|e| DlpError::InvalidInput(format!("{error_code}: {e}")))?;

    let mut rule = PolicyRule::new(params.id, params.name, params.action);
    rule.description = params.description;
    rule.enabled = params.enabled;
    // The minimal add/update surface only carries a freeform pattern, not a
    // structured condition set; it's stored unevaluated on `expression` and
    // `conditions` is left empty. A host that needs conditioned rules
    // publishes them directly via the rule-set config instead.
    rule.expression = params.pattern;

    engine.add_or_update_rule(rule.clone()).map_err(|e| DlpError::Database(format!("{error_code}: {e}")))?;
    Ok(json!({"rule": rule}))
}

fn delete_rule(engine: &Arc<DlpEngine>, params: Value) -> Result<Value, DlpError> {
    let id = params.get("id").and_then(|v| v.as_str()).ok_or_else(|| DlpError::InvalidInput("delete_error: missing id".into()))?;
    engine.delete_rule(id).map_err(|e| DlpError::Database(format!("delete_error: {e}")))?;
    Ok(json!({"id": id}))
}

fn scan_file(engine: &Arc<DlpEngine>, params: Value) -> Result<Value, DlpError> {
    let path = params.get("path").and_then(|v| v.as_str()).ok_or_else(|| DlpError::InvalidInput("scan_error: missing path".into()))?;
    let decision = engine.scan_file(std::path::Path::new(path)).map_err(|e| DlpError::ParseError(format!("scan_error: {e}")))?;
    Ok(alerts_from(vec![decision]))
}

fn scan_directory(engine: &Arc<DlpEngine>, params: Value) -> Result<Value, DlpError> {
    let directory = params.get("directory").and_then(|v| v.as_str()).ok_or_else(|| DlpError::InvalidInput("scan_error: missing directory".into()))?;
    let decisions = engine.scan_directory(std::path::Path::new(directory)).map_err(|e| DlpError::ParseError(format!("scan_error: {e}")))?;
    Ok(alerts_from(decisions))
}

fn scan_clipboard(engine: &Arc<DlpEngine>) -> Result<Value, DlpError> {
    let decision = engine.scan_clipboard()?;
    Ok(alerts_from(vec![decision]))
}

fn alerts_from(decisions: Vec<crate::model::PolicyDecision>) -> Value {
    let alerts: Vec<_> = decisions.into_iter().filter(|d| d.action != Action::Allow).collect();
    json!({"alerts": alerts, "count": alerts.len()})
}

fn alerts_envelope(alerts: Vec<crate::model::PolicyDecision>) -> Value {
    json!({"alerts": alerts, "count": alerts.len()})
}

fn error_envelope(e: &DlpError) -> Value {
    json!({
        "success": false,
        "error": {"code": e.host_code(), "message": e.to_string()},
    })
}
