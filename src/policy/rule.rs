//! Rule storage and matching. Rules are published as an immutable
//! `Arc<Vec<PolicyRule>>` snapshot via `ArcSwap` so workers read without
//! contention and rule edits never produce a torn view.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::model::{Action, Condition, DecisionContext, PolicyRule};

pub struct RuleManager {
    snapshot: ArcSwap<Vec<PolicyRule>>,
}

impl RuleManager {
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        RuleManager {
            snapshot: ArcSwap::from_pointee(rules),
        }
    }

    pub fn snapshot(&self) -> Arc<Vec<PolicyRule>> {
        self.snapshot.load_full()
    }

    pub fn publish(&self, rules: Vec<PolicyRule>) {
        self.snapshot.store(Arc::new(rules));
    }

    pub fn add_or_replace(&self, rule: PolicyRule) {
        let mut rules = (*self.snapshot.load_full()).clone();
        if let Some(existing) = rules.iter_mut().find(|r| r.id == rule.id) {
            *existing = rule;
        } else {
            rules.push(rule);
        }
        self.publish(rules);
    }

    pub fn delete(&self, id: &str) -> bool {
        let mut rules = (*self.snapshot.load_full()).clone();
        let before = rules.len();
        rules.retain(|r| r.id != id);
        let removed = rules.len() != before;
        if removed {
            self.publish(rules);
        }
        removed
    }
}

/// Evaluates every enabled rule's conjunction of conditions against
/// `ctx`, returning the matched rules sorted by priority (desc) then rule
/// id (asc, lexicographic) as the final tiebreaker.
pub fn matching_rules<'a>(rules: &'a [PolicyRule], ctx: &DecisionContext) -> Vec<&'a PolicyRule> {
    let mut matched: Vec<&PolicyRule> = rules
    .iter()
    .filter(|r| r.enabled)
    .filter(|r| r.conditions.iter().all(|c| condition_matches(c, ctx)))
    .collect();
    matched.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
    matched
}

/// Resolves the winning action as the first matched rule's action. `matched`
/// is already sorted priority desc then id asc, so a higher-priority rule
/// always wins even when a lower-priority rule further down would have
/// chosen a more severe action.
pub fn winning_action(matched: &[&PolicyRule]) -> Option<Action> {
    matched.first().map(|r| r.action)
}

fn condition_matches(c: &Condition, ctx: &DecisionContext) -> bool {
    if let Some(proto) = &c.protocol {
        if !ctx.parsed.protocol.eq_ignore_ascii_case(proto) {
            return false;
        }
    }
    if let Some(dir) = &c.direction {
        let actual = match ctx.packet.direction {
            crate::model::Direction::Inbound => "inbound",
            crate::model::Direction::Outbound => "outbound",
        };
        if !actual.eq_ignore_ascii_case(dir) {
            return false;
        }
    }
    if let Some(cidr) = &c.dest_cidr {
        match cidr.parse::<ipnet::IpNet>() {
            Ok(net) if net.contains(&ctx.packet.dst_ip) => {}
            _ => return false,
        }
    }
    if let Some(port) = c.port {
        if ctx.packet.dst_port != port {
            return false;
        }
    }
    if let Some(min_size) = c.min_file_size {
        let size = ctx.parsed.metadata.get("file_size").and_then(|s| s.parse::<u64>().ok()).unwrap_or(ctx.packet.size as u64);
        if size < min_size {
            return false;
        }
    }
    if let Some(ext) = &c.file_extension {
        let name = ctx.parsed.metadata.get("file_name").cloned().unwrap_or_default();
        if !name.to_lowercase().ends_with(&ext.to_lowercase()) {
            return false;
        }
    }
    if let Some(want_sensitive) = c.contains_sensitive {
        if ctx.analysis.has_sensitive_data() != want_sensitive {
            return false;
        }
    }
    if let Some(min_sev) = &c.min_hit_severity {
        let threshold = severity_rank(min_sev);
        if !ctx.analysis.hits.iter().any(|h| severity_rank_of(h.severity) >= threshold) {
            return false;
        }
    }
    if let Some(min_count) = c.min_hit_count {
        if ctx.analysis.hits.len() < min_count {
            return false;
        }
    }
    if let Some(level) = &c.user_risk_level {
        if !ctx.user.risk_level.eq_ignore_ascii_case(level) {
            return false;
        }
    }
    if let Some(compliant) = c.device_compliant {
        if ctx.device.compliant != compliant {
            return false;
        }
    }
    if let Some(outside) = c.outside_working_hours {
        if ctx.environment.outside_working_hours != outside {
            return false;
        }
    }
    true
}

fn severity_rank(s: &str) -> u8 {
    match s {
        "high" => 2,
        "medium" => 1,
        _ => 0,
    }
}

fn severity_rank_of(s: crate::model::Severity) -> u8 {
    match s {
        crate::model::Severity::High => 2,
        crate::model::Severity::Medium => 1,
        crate::model::Severity::Low => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnalysisResult, Direction, PacketInfo, ParsedData, ProcessInfo, RiskLevel, Transport};

    fn ctx(protocol: &str, sensitive: bool) -> DecisionContext {
        DecisionContext {
            packet: PacketInfo {
                id: "p".into(),
                captured_at_ms: 0,
                src_ip: "10.0.0.1".parse().unwrap(),
                src_port: 1,
                dst_ip: "93.184.216.34".parse().unwrap(),
                dst_port: 443,
                transport: Transport::Tcp,
                direction: Direction::Outbound,
                payload: vec![],
                size: 0,
                process: ProcessInfo::failed(),
                metadata: Default::default(),
            },
            parsed: ParsedData {
                protocol: protocol.into(),
                ..Default::default()
            },
            analysis: AnalysisResult {
                risk_score: if sensitive { 0.4 } else { 0.0 },
                confidence: 1.0,
                risk_level: RiskLevel::Low,
                categories: vec![],
                tags: vec![],
                content_type: "text".into(),
                hits: if sensitive {
                    vec![crate::model::SensitiveHit {
                        hit_type: "credit_card".into(),
                        severity: crate::model::Severity::High,
                        location: "body".into(),
                        masked_sample: "***16***".into(),
                        ambiguous_field: true,
                    }]
                } else {
                    vec![]
                },
            },
            user: Default::default(),
            device: Default::default(),
            session: Default::default(),
            environment: Default::default(),
        }
    }

    #[test]
    fn priority_desc_then_id_asc_orders_matches() {
        let mut r1 = PolicyRule::new("B", "r1", Action::Audit);
        r1.priority = 5;
        let mut r2 = PolicyRule::new("A", "r2", Action::Audit);
        r2.priority = 5;
        let rules = [r1, r2];
        let matched = matching_rules(&rules, &ctx("HTTP", false));
        assert_eq!(matched[0].id, "A");
    }

    #[test]
    fn higher_priority_audit_wins_over_lower_priority_block() {
        let mut audit_rule = PolicyRule::new("audit1", "audit", Action::Audit);
        audit_rule.priority = 100;
        let block_rule = PolicyRule::new("block1", "block", Action::Block);
        let rules = [audit_rule, block_rule];
        let matched = matching_rules(&rules, &ctx("HTTP", true));
        assert_eq!(winning_action(&matched), Some(Action::Audit));
    }

    #[test]
    fn equal_priority_falls_back_to_severity_order() {
        let audit_rule = PolicyRule::new("b_audit", "audit", Action::Audit);
        let block_rule = PolicyRule::new("a_block", "block", Action::Block);
        let rules = [audit_rule, block_rule];
        let matched = matching_rules(&rules, &ctx("HTTP", true));
        assert_eq!(matched[0].id, "a_block");
        assert_eq!(winning_action(&matched), Some(Action::Block));
    }

    #[test]
    fn condition_on_sensitive_data_filters_rules() {
        let mut rule = PolicyRule::new("r1", "sensitive only", Action::Block);
        rule.conditions.push(Condition {
            contains_sensitive: Some(true),
            ..Default::default()
        });
        let matched_no = matching_rules(std::slice::from_ref(&rule), &ctx("HTTP", false));
        assert!(matched_no.is_empty());
        let matched_yes = matching_rules(std::slice::from_ref(&rule), &ctx("HTTP", true));
        assert_eq!(matched_yes.len(), 1);
    }

    #[test]
    fn rule_manager_publish_is_visible_to_subsequent_snapshot() {
        let manager = RuleManager::new(vec![]);
        manager.add_or_replace(PolicyRule::new("R1", "r1", Action::Alert));
        assert_eq!(manager.snapshot().len(), 1);
        assert!(manager.delete("R1"));
        assert_eq!(manager.snapshot().len(), 0);
    }
}
