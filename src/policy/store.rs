//! SQLite-backed rule persistence, following the same
//! `db/rules.rs` upsert/list/delete CRUD shape.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};

use crate::error::DlpResult;
use crate::model::{Action, PolicyRule};

pub struct RuleStore {
    conn: Mutex<Connection>,
}

impl RuleStore {
    pub fn open(path: &Path) -> DlpResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS policy_rules (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            rule_type TEXT NOT NULL,
            priority INTEGER NOT NULL,
            enabled INTEGER NOT NULL,
            conditions_json TEXT NOT NULL,
            action TEXT NOT NULL,
            expression TEXT
        )",
        [],
    )?;
    Ok(RuleStore { conn: Mutex::new(conn) })
}

pub fn open_in_memory() -> DlpResult<Self> {
    Self::open(Path::new(":memory:"))
}

/// Upsert via `INSERT OR REPLACE`.
pub fn save(&self, rule: &PolicyRule) -> DlpResult<()> {
    let conditions_json = serde_json::to_string(&rule.conditions)
    .map_err(|e| crate::error::DlpError::InvalidInput(e.to_string()))?;
    self.conn.lock().unwrap().execute(
        "INSERT OR REPLACE INTO policy_rules
        (id, name, description, rule_type, priority, enabled, conditions_json, action, expression)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            rule.id,
            rule.name,
            rule.description,
            action_to_str(rule.rule_type),
            rule.priority,
            rule.enabled as i64,
            conditions_json,
            action_to_str(rule.action),
            rule.expression,
        ],
    )?;
    Ok(())
}

pub fn delete(&self, id: &str) -> DlpResult<bool> {
    let changed = self.conn.lock().unwrap().execute("DELETE FROM policy_rules WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

pub fn load_all(&self) -> DlpResult<Vec<PolicyRule>> {
    let conn = self.conn.lock().unwrap();
    let mut stmt = conn.prepare(
        "SELECT id, name, description, rule_type, priority, enabled, conditions_json, action, expression
        FROM policy_rules",
    )?;
    let rows = stmt.query_map([], |row| {
        let conditions_json: String = row.get(6)?;
        let conditions = serde_json::from_str(&conditions_json).unwrap_or_default();
        Ok(PolicyRule {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            rule_type: action_from_str(&row.get::<_, String>(3)?),
            priority: row.get(4)?,
            enabled: row.get::<_, i64>(5)? != 0,
            conditions,
            action: action_from_str(&row.get::<_, String>(7)?),
            expression: row.get(8)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
}

fn action_to_str(a: Action) -> &'static str {
    a.as_str()
}

fn action_from_str(s: &str) -> Action {
    match s {
        "block" => Action::Block,
        "alert" => Action::Alert,
        "audit" => Action::Audit,
        _ => Action::Allow,
    }
}
