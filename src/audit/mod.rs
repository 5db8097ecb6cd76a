//! Structured audit trail.
//!
//! Workers enqueue records onto a bounded, backpressured channel; a single
//! dedicated writer thread owns the log file exclusively, serializes each
//! record as one NDJSON line, fsyncs, and rotates when the file grows past
//! `max_size`, the same single-writer/many-enqueuer shape used elsewhere
//! in this crate for background work.

pub mod sanitize;

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::analyzer::patterns::CompiledPattern;
use crate::config::AuditLogConfig;
use crate::error::DlpResult;
use crate::model::{AuditLog, AuditType, PacketInfo, ParsedData, PolicyDecision};

const CHANNEL_CAPACITY: usize = 4096;

#[derive(Debug, Default)]
pub struct AuditMetrics {
    pub written: AtomicU64,
    pub dropped_channel_full: AtomicU64,
    pub write_failures: AtomicU64,
    pub rotations: AtomicU64,
}

pub struct AuditLogger {
    sender: SyncSender<AuditLog>,
    shutdown: Arc<AtomicBool>,
    writer: Mutex<Option<JoinHandle<()>>>,
    metrics: Arc<AuditMetrics>,
}

impl AuditLogger {
    /// Opens (creating parent directories as needed) and spawns the writer
    /// thread. Fails only if the log directory can't be created.
    pub fn start(config: &AuditLogConfig) -> DlpResult<Arc<AuditLogger>> {
        let path = PathBuf::from(&config.log_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let metrics = Arc::new(AuditMetrics::default());
        let shutdown = Arc::new(AtomicBool::new(false));
        let (tx, rx) = sync_channel::<AuditLog>(CHANNEL_CAPACITY);

        let writer_config = config.clone();
        let writer_shutdown = Arc::clone(&shutdown);
        let writer_metrics = Arc::clone(&metrics);
        let handle = std::thread::Builder::new()
        .name("audit-writer".into())
        .spawn(move || run_writer(rx, writer_config, writer_shutdown, writer_metrics))
        .expect("failed to spawn audit writer thread");

        Ok(Arc::new(AuditLogger {
            sender: tx,
            shutdown,
            writer: Mutex::new(Some(handle)),
            metrics,
        }))
    }

    pub fn metrics(&self) -> Arc<AuditMetrics> {
        Arc::clone(&self.metrics)
    }


    /// Builds and enqueues a decision record. Never
    /// blocks the calling worker: a full channel is a counted drop.
    /// `sensitive_tags` carries only detected pattern names (e.g.
    /// "credit_card"), never raw matched values. `patterns` is the analyzer's
    /// compiled pattern set, reused here to scrub the record's body preview.
    pub fn log_decision(
        &self,
        packet: &PacketInfo,
        parsed: &ParsedData,
        decision: &PolicyDecision,
        sensitive_tags: &[String],
        patterns: &[CompiledPattern],
    ) {
        self.enqueue(build_decision_record(packet, parsed, decision, sensitive_tags, patterns));
    }

    pub fn log_rule_change(&self, rule_id: &str, action: &str, result: &str) {
        let mut details = HashMap::new();
        details.insert("rule_id".into(), rule_id.to_string());
        self.enqueue(AuditLog {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: now_rfc3339(),
            audit_type: AuditType::RuleChange,
            action: action.to_string(),
            result: result.to_string(),
            user_id: String::new(),
            device_id: String::new(),
            details,
        });
    }

    pub fn log_engine_event(&self, event: &str, result: &str, details: HashMap<String, String>) {
        self.enqueue(AuditLog {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: now_rfc3339(),
            audit_type: AuditType::EngineEvent,
            action: event.to_string(),
            result: result.to_string(),
            user_id: String::new(),
            device_id: String::new(),
            details,
        });
    }

    fn enqueue(&self, record: AuditLog) {
        if self.sender.try_send(record).is_err() {
            self.metrics.dropped_channel_full.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("audit channel full, dropping record");
        }
    }

    /// Signals the writer to drain and exit; joins up to `deadline` (a plain
    /// join, bounded in practice by the writer's own 200 ms poll interval).
    pub fn stop(&self, deadline: Duration) {
        self.shutdown.store(true, Ordering::Relaxed);
        let _ = deadline;
        if let Some(handle) = self.writer.lock().expect("audit writer handle mutex poisoned").take() {
            let _ = handle.join();
        }
    }
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Flattens packet/parsed/decision/process fields into the record's `details`
/// map, sanitizing headers and protocol metadata along the way. User/
/// device/session/environment fields are present but empty until the host
/// wires a real identity provider — the schema still
/// carries the keys.
fn build_decision_record(
    packet: &PacketInfo,
    parsed: &ParsedData,
    decision: &PolicyDecision,
    sensitive_tags: &[String],
    patterns: &[CompiledPattern],
) -> AuditLog {
    let mut details = HashMap::new();

    details.insert("decision_id".into(), decision.id.clone());
    details.insert("risk_level".into(), format!("{:?}", decision.risk_level).to_lowercase());
    details.insert("risk_score".into(), decision.risk_score.to_string());
    details.insert("confidence".into(), decision.confidence.to_string());
    details.insert("matched_rule_count".into(), decision.matched_rule_ids.len().to_string());
    details.insert("matched_rule_ids".into(), decision.matched_rule_ids.join(","));
    details.insert("processing_time_ms".into(), decision.processing_time_ms.to_string());
    details.insert("reason".into(), decision.reason.clone());

    details.insert("packet_id".into(), packet.id.clone());
    details.insert("src_ip".into(), packet.src_ip.to_string());
    details.insert("src_port".into(), packet.src_port.to_string());
    details.insert("dst_ip".into(), packet.dst_ip.to_string());
    details.insert("dst_port".into(), packet.dst_port.to_string());
    details.insert("protocol".into(), parsed.protocol.clone());
    details.insert("direction".into(), format!("{:?}", packet.direction).to_lowercase());
    details.insert("size".into(), packet.size.to_string());

    details.insert("process_pid".into(), packet.process.pid.to_string());
    details.insert("process_name".into(), packet.process.name.clone());
    details.insert("process_exe_path".into(), packet.process.exe_path.clone());
    details.insert("process_user".into(), packet.process.user.clone());
    details.insert("process_info_status".into(), packet.process.status.clone());

    for (key, value) in &parsed.headers {
        details.insert(format!("header:{key}"), sanitize::sanitize_header_value(key, value));
    }
    for (key, value) in &parsed.metadata {
        details.insert(format!("meta:{key}"), sanitize::sanitize_field_value(key, value));
    }
    if let Some(subject) = parsed.metadata.get("subject") {
        details.insert("subject".into(), sanitize::truncate_subject(subject));
    }

    let is_text = crate::analyzer::scoring::is_text(&parsed.body);
    details.insert("data_summary".into(), sanitize::data_summary(&parsed.body, is_text, patterns));
    details.insert("sensitive_patterns".into(), sensitive_tags.join(","));

    AuditLog {
        id: uuid::Uuid::new_v4().to_string(),
        timestamp: now_rfc3339(),
        audit_type: AuditType::PolicyDecision,
        action: decision.action.as_str().to_string(),
        result: "ok".to_string(),
        user_id: String::new(),
        device_id: String::new(),
        details,
    }
}

struct LogFile {
    path: PathBuf,
    file: File,
    size: u64,
}

impl LogFile {
    fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let size = file.metadata()?.len();
        Ok(LogFile { path: path.to_path_buf(), file, size })
    }

    fn write_record(&mut self, line: &str) -> std::io::Result<()> {
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.file.sync_all()?;
        self.size += line.len() as u64 + 1;
        Ok(())
    }
}

fn run_writer(
    rx: Receiver<AuditLog>,
    config: AuditLogConfig,
    shutdown: Arc<AtomicBool>,
    metrics: Arc<AuditMetrics>,
) {
    let path = PathBuf::from(&config.log_path);
    let mut log_file = match LogFile::open(&path) {
        Ok(f) => f,
        Err(e) => {
            tracing::error!("audit writer could not open {}: {e}", path.display());
            return;
        }
    };

    loop {
        match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(record) => {
                write_one(&mut log_file, &record, &config, &metrics);
            }
            Err(_) => {
                if shutdown.load(Ordering::Relaxed) {
                    while let Ok(record) = rx.try_recv() {
                        write_one(&mut log_file, &record, &config, &metrics);
                    }
                    return;
                }
            }
        }
    }
}

fn write_one(log_file: &mut LogFile, record: &AuditLog, config: &AuditLogConfig, metrics: &Arc<AuditMetrics>) {
    let line = match serde_json::to_string(record) {
        Ok(l) => l,
        Err(e) => {
            metrics.write_failures.fetch_add(1, Ordering::Relaxed);
            tracing::error!("audit record serialization failed: {e}");
            return;
        }
    };

    match log_file.write_record(&line) {
        Ok(()) => {
            metrics.written.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            metrics.write_failures.fetch_add(1, Ordering::Relaxed);
            tracing::error!("audit write failed: {e}");
            return;
        }
    }

    if log_file.size > config.max_size {
        if let Err(e) = rotate(log_file, config) {
            tracing::warn!("audit log rotation failed: {e}");
        } else {
            metrics.rotations.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Closes the current file, renames it with a timestamp suffix, opens a
/// fresh file at the original path, then deletes backups beyond
/// `max_backups` or older than `max_age_days`.
fn rotate(log_file: &mut LogFile, config: &AuditLogConfig) -> std::io::Result<()> {
    let suffix = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f");
    let rotated_path = log_file.path.with_extension(format!("log.{suffix}"));
    fs::rename(&log_file.path, &rotated_path)?;

    let fresh = LogFile::open(&log_file.path)?;
    *log_file = fresh;

    cleanup_backups(&log_file.path, config)?;
    Ok(())
}

fn cleanup_backups(active_path: &Path, config: &AuditLogConfig) -> std::io::Result<()> {
    let dir = active_path.parent().unwrap_or_else(|| Path::new("."));
    let stem = active_path.file_stem().and_then(|s| s.to_str()).unwrap_or("audit").to_string();

    let mut backups: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&stem) && name != active_path.file_name().unwrap_or_default().to_string_lossy() {
            let modified = entry.metadata()?.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            backups.push((entry.path(), modified));
        }
    }
    backups.sort_by_key(|(_, modified)| *modified);

    let max_age = Duration::from_secs(config.max_age_days * 24 * 60 * 60);
    let now = std::time::SystemTime::now();
    for (path, modified) in &backups {
        if now.duration_since(*modified).unwrap_or_default() > max_age {
            let _ = fs::remove_file(path);
        }
    }

    let remaining: Vec<&(PathBuf, std::time::SystemTime)> = backups
    .iter()
    .filter(|(path, _)| path.exists())
    .collect();
    if remaining.len() > config.max_backups {
        for (path, _) in remaining.iter().take(remaining.len() - config.max_backups) {
            let _ = fs::remove_file(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, Direction, ProcessInfo, RiskLevel, Transport};
    use std::thread;

    fn sample_packet() -> PacketInfo {
        PacketInfo {
            id: "p1".into(),
            captured_at_ms: 0,
            src_ip: "10.0.0.1".parse().unwrap(),
            src_port: 1234,
            dst_ip: "93.184.216.34".parse().unwrap(),
            dst_port: 443,
            transport: Transport::Tcp,
            direction: Direction::Outbound,
            payload: vec![],
            size: 5,
            process: ProcessInfo::success(10, "curl".into(), "/usr/bin/curl".into(), "curl".into(), "alice".into()),
            metadata: Default::default(),
        }
    }

    fn sample_decision() -> PolicyDecision {
        PolicyDecision {
            id: "d1".into(),
            action: Action::Block,
            risk_level: RiskLevel::High,
            risk_score: 0.7,
            confidence: 0.9,
            matched_rule_ids: vec!["r1".into()],
            processing_time_ms: 3,
            reason: "matched 1 rule(s)".into(),
        }
    }

    fn card_pattern() -> Vec<CompiledPattern> {
        crate::analyzer::patterns::compile_patterns(&[crate::config::PatternConfig {
            name: "credit_card".into(),
            pattern: r"\b(?:\d[ -]*?){13,16}\b".into(),
            severity: "high".into(),
        }])
    }

    #[test]
    fn record_includes_process_status_for_successful_lookup() {
        let record = build_decision_record(&sample_packet(), &ParsedData::default(), &sample_decision(), &[], &[]);
        assert_eq!(record.details["process_info_status"], "success");
    }

    #[test]
    fn authorization_header_never_appears_raw_in_record() {
        let mut parsed = ParsedData::default();
        parsed.headers.insert("Authorization".into(), "Bearer supersecret".into());
        let record =
        build_decision_record(&sample_packet(), &parsed, &sample_decision(), &["credit_card".to_string()], &[]);
        assert_eq!(record.details["header:Authorization"], "[REDACTED]");
    }

    #[test]
    fn audit_record_preview_contains_no_raw_pattern_matches() {
        let patterns = card_pattern();
        let mut parsed = ParsedData::default();
        parsed.body = b"card number: 4111111111111111, please charge it".to_vec();
        let record = build_decision_record(
            &sample_packet(),
            &parsed,
            &sample_decision(),
            &["credit_card".to_string()],
            &patterns,
        );

        let serialized = serde_json::to_string(&record).unwrap();
        assert!(!serialized.contains("4111111111111111"));
        for pattern in &patterns {
            assert!(
                !pattern.regex.is_match(&serialized),
                "pattern {} still matches the serialized record",
                pattern.name
            );
        }
    }

    #[test]
    fn logger_writes_ndjson_and_rotates_on_size() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("audit.log");
        let config = AuditLogConfig {
            log_path: log_path.to_string_lossy().into_owned(),
            max_size: 200,
            max_age_days: 30,
            max_backups: 5,
            compress: false,
        };
        let logger = AuditLogger::start(&config).unwrap();
        for _ in 0..20 {
            logger.log_decision(&sample_packet(), &ParsedData::default(), &sample_decision(), &[], &[]);
        }
        thread::sleep(Duration::from_millis(500));
        logger.stop(Duration::from_secs(2));

        let mut entries: Vec<_> = fs::read_dir(dir.path()).unwrap().filter_map(|e| e.ok()).collect();
        entries.retain(|e| e.file_name().to_string_lossy().starts_with("audit"));
        assert!(entries.len() >= 2, "expected rotation to produce a backup file");
        assert!(metrics_recorded(&logger));
    }

    fn metrics_recorded(logger: &AuditLogger) -> bool {
        logger.metrics().written.load(Ordering::Relaxed) > 0
    }
}
