//! Sentinel DLP core: packet capture, protocol reconstruction, sensitive-
//! data analysis, and policy-driven audit logging, exposed to a host
//! process through [`DlpEngine`]'s `init → start → requests → stop`
//! lifecycle.

pub mod analyzer;
pub mod audit;
pub mod config;
pub mod error;
pub mod host;
pub mod interceptor;
pub mod metrics;
pub mod model;
pub mod parser;
pub mod policy;
pub mod services;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use analyzer::Analyzer;
use audit::AuditLogger;
use config::Config;
use error::{DlpError, DlpResult};
use interceptor::{Interceptor, Pipeline};
use metrics::EngineMetrics;
use model::{PacketInfo, PolicyDecision, PolicyRule};
use policy::store::RuleStore;
use policy::PolicyEngine;

/// Installs a panic-hook + tracing_subscriber pattern: log the
/// panic via `tracing::error!` before re-invoking the default hook, and
/// initialize an `EnvFilter` from `RUST_LOG`/`SENTINEL_LOG` falling back to
/// a crate-scoped default.
pub fn init_logging() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("PANIC in sentinel-dlp: {info}");
        default_hook(info);
    }));

    let _ = tracing_subscriber::fmt()
    .with_env_filter(
        tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sentinel_dlp=info".into()),
    )
    .try_init();
}

/// The host-facing facade. Owns the pipeline, the background services, and
/// the in-memory alert buffer that backs `get_alerts`/`clear_alerts`.
pub struct DlpEngine {
    config: Config,
    store: Option<RuleStore>,
    pipeline: Arc<Pipeline>,
    audit: Arc<AuditLogger>,
    engine_metrics: Arc<EngineMetrics>,
    alerts: Mutex<Vec<PolicyDecision>>,
    interceptor: Mutex<Option<Interceptor>>,
    services: Mutex<Option<services::BackgroundServices>>,
    running: AtomicBool,
}

impl DlpEngine {
    /// `init(config)` : loads persisted rules if `rules_db_path` is
    /// configured, builds the pipeline, and opens the audit writer. Does
    /// not yet capture traffic — that's `start()`.
    pub fn init(config: Config) -> DlpResult<Arc<DlpEngine>> {
        let store = match &config.rules_db_path {
            Some(path) => Some(RuleStore::open(std::path::Path::new(path))?),
            None => None,
        };
        let initial_rules = match &store {
            Some(s) => s.load_all()?,
            None => Vec::new(),
        };

        let analyzer = Analyzer::new(&config.analyzer);
        let policy = PolicyEngine::new(&config, initial_rules);
        let audit = AuditLogger::start(&config.audit.log)?;

        let pipeline = Arc::new(Pipeline { analyzer, policy, audit: Arc::clone(&audit) });

        Ok(Arc::new(DlpEngine {
            config,
            store,
            pipeline,
            audit,
            engine_metrics: Arc::new(EngineMetrics::default()),
            alerts: Mutex::new(Vec::new()),
            interceptor: Mutex::new(None),
            services: Mutex::new(None),
            running: AtomicBool::new(false),
        }))
    }

    /// `start()` : spins up the worker pool and the background
    /// services (metrics ticker, flow eviction). Capture backends
    /// themselves are platform-specific and started by `services.rs`.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let interceptor = Interceptor::start(&self.config, Arc::clone(&self.pipeline));
        let services = services::BackgroundServices::start(Arc::clone(self), interceptor.metrics());
        *self.interceptor.lock().expect("interceptor mutex poisoned") = Some(interceptor);
        *self.services.lock().expect("services mutex poisoned") = Some(services);
        self.audit.log_engine_event("system.startup", "ok", Default::default());
        tracing::info!("sentinel-dlp engine started");
    }

    /// `stop()` : drains the interceptor's queue up to the configured
    /// deadline, stops background services, then flushes and closes the
    /// audit log.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.audit.log_engine_event("system.shutdown", "ok", Default::default());
        if let Some(services) = self.services.lock().expect("services mutex poisoned").take() {
            services.stop();
        }
        if let Some(interceptor) = self.interceptor.lock().expect("interceptor mutex poisoned").take() {
            interceptor.stop(Duration::from_secs(config::defaults::SHUTDOWN_DRAIN_DEADLINE_SECS));
        }
        self.audit.stop(Duration::from_secs(config::defaults::SHUTDOWN_DRAIN_DEADLINE_SECS));
        tracing::info!("sentinel-dlp engine stopped");
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn engine_metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.engine_metrics)
    }

    pub fn get_rules(&self) -> Vec<PolicyRule> {
        (*self.pipeline.policy.rules().snapshot()).clone()
    }

    pub fn add_or_update_rule(&self, rule: PolicyRule) -> DlpResult<()> {
        if let Some(store) = &self.store {
            store.save(&rule)?;
        }
        self.pipeline.policy.rules().add_or_replace(rule.clone());
        self.audit.log_rule_change(&rule.id, "add_or_update_rule", "ok");
        Ok(())
    }

    pub fn delete_rule(&self, id: &str) -> DlpResult<bool> {
        if let Some(store) = &self.store {
            store.delete(id)?;
        }
        let removed = self.pipeline.policy.rules().delete(id);
        self.audit.log_rule_change(id, "delete_rule", if removed { "ok" } else { "not_found" });
        Ok(removed)
    }

    /// Runs `path`'s bytes through the same `Analyzer` + `PolicyEngine`
    /// pipeline as live interception, on a pseudo-`PacketInfo` with
    /// `protocol="file"`. Safe to call concurrently with live
    /// capture: both paths only read the rule snapshot and append audit
    /// records.
    pub fn scan_file(&self, path: &std::path::Path) -> DlpResult<PolicyDecision> {
        let bytes = std::fs::read(path)?;
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("unknown").to_string();
        let decision = self.scan_bytes(bytes, &file_name);
        Ok(decision)
    }

    pub fn scan_directory(&self, dir: &std::path::Path) -> DlpResult<Vec<PolicyDecision>> {
        let mut decisions = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                decisions.push(self.scan_file(&entry.path())?);
            }
        }
        Ok(decisions)
    }

    /// Reads the OS clipboard (text only) and scans it the same way as a
    /// file. Headless environments without a display server return
    /// `CaptureUnavailable` rather than panicking — `arboard::Clipboard::new`
    /// fails gracefully there.
    pub fn scan_clipboard(&self) -> DlpResult<PolicyDecision> {
        let mut clipboard = arboard::Clipboard::new()
        .map_err(|e| DlpError::CaptureUnavailable(format!("clipboard unavailable: {e}")))?;
        let text = clipboard
        .get_text()
        .map_err(|e| DlpError::CaptureUnavailable(format!("clipboard read failed: {e}")))?;
        Ok(self.scan_bytes(text.into_bytes(), "clipboard"))
    }

    fn scan_bytes(&self, bytes: Vec<u8>, source_name: &str) -> PolicyDecision {
        let start = std::time::Instant::now();
        let mut metadata = std::collections::HashMap::new();
        metadata.insert("file_name".into(), source_name.to_string());
        metadata.insert("file_size".into(), bytes.len().to_string());

        let parsed = model::ParsedData {
            protocol: "file".into(),
            body: bytes,
            metadata,
            ..Default::default()
        };
        let packet = model::PacketInfo {
            id: uuid::Uuid::new_v4().to_string(),
            captured_at_ms: 0,
            src_ip: std::net::IpAddr::from([127, 0, 0, 1]),
            src_port: 0,
            dst_ip: std::net::IpAddr::from([127, 0, 0, 1]),
            dst_port: 0,
            transport: model::Transport::Tcp,
            direction: model::Direction::Outbound,
            payload: vec![],
            size: parsed.body.len(),
            process: model::ProcessInfo::failed(),
            metadata: Default::default(),
        };

        let analysis = self.pipeline.analyzer.analyze(&parsed);
        let decision = self.pipeline.policy.decide(&packet, &parsed, &analysis, start.elapsed());
        self.pipeline.audit.log_decision(&packet, &parsed, &decision, &analysis.tags, self.pipeline.analyzer.patterns());
        if decision.action != model::Action::Allow {
            self.alerts.lock().expect("alerts mutex poisoned").push(decision.clone());
        }
        decision
    }

    pub fn get_alerts(&self) -> Vec<PolicyDecision> {
        self.alerts.lock().expect("alerts mutex poisoned").clone()
    }

    pub fn clear_alerts(&self) {
        self.alerts.lock().expect("alerts mutex poisoned").clear();
    }

    pub fn enqueue_packet(&self, packet: PacketInfo) -> bool {
        match self.interceptor.lock().expect("interceptor mutex poisoned").as_ref() {
            Some(i) => i.enqueue(packet),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{Action, Condition};

    fn engine() -> Arc<DlpEngine> {
        DlpEngine::init(Config::default()).unwrap()
    }

    #[test]
    fn scan_file_with_credit_card_is_blocked_when_rule_present() {
        let engine = engine();
        let mut rule = PolicyRule::new("block_cards", "block cards", Action::Block);
        rule.conditions.push(Condition { contains_sensitive: Some(true),..Default::default() });
        engine.add_or_update_rule(rule).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leak.txt");
        std::fs::write(&path, "card number: 4111111111111111").unwrap();

        let decision = engine.scan_file(&path).unwrap();
        assert_eq!(decision.action, Action::Block);
        assert_eq!(engine.get_alerts().len(), 1);
    }

    #[test]
    fn scan_directory_scans_every_file() {
        let engine = engine();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("b.txt"), "world").unwrap();
        let decisions = engine.scan_directory(dir.path()).unwrap();
        assert_eq!(decisions.len(), 2);
    }

    #[test]
    fn clear_alerts_empties_the_buffer() {
        let engine = engine();
        let mut rule = PolicyRule::new("block_cards", "block cards", Action::Block);
        rule.conditions.push(Condition { contains_sensitive: Some(true),..Default::default() });
        engine.add_or_update_rule(rule).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leak.txt");
        std::fs::write(&path, "4111111111111111").unwrap();
        engine.scan_file(&path).unwrap();
        assert_eq!(engine.get_alerts().len(), 1);
        engine.clear_alerts();
        assert!(engine.get_alerts().is_empty());
    }

    #[test]
    fn delete_rule_reports_not_found_for_unknown_id() {
        let engine = engine();
        assert!(!engine.delete_rule("nonexistent").unwrap());
    }
}
