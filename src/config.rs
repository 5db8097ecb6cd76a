//! Typed runtime configuration, loaded from TOML over built-in defaults.
//!
//! The enumerated option surface mirrors the host control-plane contract:
//! every dotted key named there (`interceptor.network.*`, `parsers.<proto>.*`,
//! `analyzer.*`, `rules.*`, `actions.*`, `performance.*`, `security.*`,
//! `audit.log.*`) has a corresponding typed field below with a sane default,
//! so `Config::default()` alone is enough to run the engine.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DlpError, DlpResult};

/// Fixed engine tunables that are not meant to be user-editable — collected
/// here so they can be found and adjusted in one place.
pub mod defaults {
    pub const QUEUE_SIZE: usize = 10_000;
    pub const WORKER_COUNT: usize = 8;
    pub const PROCESS_LOOKUP_DEADLINE_MS: u64 = 100;
    pub const PACKET_DEADLINE_MS: u64 = 2_000;
    pub const SHUTDOWN_DRAIN_DEADLINE_SECS: u64 = 5;
    pub const DROP_LOG_INTERVAL_SECS: u64 = 1;
    pub const AUDIT_WRITE_DEADLINE_MS: u64 = 500;
    pub const AUDIT_FAILURE_ESCALATION_COUNT: u32 = 10;
    pub const AUDIT_FAILURE_ESCALATION_WINDOW_SECS: u64 = 60;
    pub const FLOW_IDLE_TIMEOUT_SECS: u64 = 300;
    pub const PROCESS_CACHE_CAPACITY: usize = 512;

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn all_tunables_positive() {
            assert!(QUEUE_SIZE > 0);
            assert!(WORKER_COUNT > 0);
            assert!(PROCESS_LOOKUP_DEADLINE_MS > 0);
            assert!(PACKET_DEADLINE_MS > 0);
            assert!(SHUTDOWN_DRAIN_DEADLINE_SECS > 0);
            assert!(FLOW_IDLE_TIMEOUT_SECS > 0);
        }

        #[test]
        fn packet_deadline_exceeds_lookup_deadline() {
            assert!(PACKET_DEADLINE_MS > PROCESS_LOOKUP_DEADLINE_MS);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub enabled: bool,
    pub interface: Option<String>,
    pub filter: String,
    pub buffer_size: usize,
    pub channel_size: usize,
    pub worker_count: usize,
    pub priority: i32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interface: None,
            filter: "outbound".into(),
            buffer_size: 65536,
            channel_size: defaults::QUEUE_SIZE,
            worker_count: defaults::WORKER_COUNT,
            priority: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BypassConfig {
    pub cidrs: Vec<String>,
    pub ports: Vec<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptorConfig {
    pub network: NetworkConfig,
    pub bypass: BypassConfig,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            bypass: BypassConfig {
                cidrs: vec!["127.0.0.0/8".into(), "::1/128".into()],
                ports: vec![],
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub enabled: bool,
    pub max_body_size: usize,
    pub decode_gzip: bool,
    pub extract_forms: bool,
    pub extract_cookies: bool,
    pub tls_decrypt: bool,
    pub cert_store: Option<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_body_size: 10 * 1024 * 1024,
            decode_gzip: true,
            extract_forms: true,
            extract_cookies: true,
            tls_decrypt: false,
            cert_store: None,
        }
    }
}

fn default_parsers() -> HashMap<String, ParserConfig> {
    let mut m = HashMap::new();
    m.insert("http".into(), ParserConfig::default());
    m.insert(
        "smtp".into(),
        ParserConfig {
            max_body_size: 50 * 1024 * 1024,
            ..ParserConfig::default()
        },
    );
    m.insert(
        "ftp".into(),
        ParserConfig {
            max_body_size: 100 * 1024 * 1024,
            ..ParserConfig::default()
        },
    );
    m.insert("sql".into(), ParserConfig::default());
    m.insert("mq".into(), ParserConfig::default());
    m.insert("smb".into(), ParserConfig::default());
    m.insert("rpc".into(), ParserConfig::default());
    m
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    pub name: String,
    pub pattern: String,
    pub severity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitiveDataConfig {
    pub patterns: Vec<PatternConfig>,
}

impl Default for SensitiveDataConfig {
    fn default() -> Self {
        Self {
            patterns: vec![
                PatternConfig {
                    name: "credit_card".into(),
                    pattern: r"\b(?:\d[ -]*?){13,16}\b".into(),
                    severity: "high".into(),
                },
                PatternConfig {
                    name: "email".into(),
                    pattern: r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}".into(),
                    severity: "medium".into(),
                },
                PatternConfig {
                    name: "ssn".into(),
                    pattern: r"\b\d{3}-\d{2}-\d{4}\b".into(),
                    severity: "high".into(),
                },
                PatternConfig {
                    name: "chinese_id".into(),
                    pattern: r"\b[1-9]\d{5}(?:19|20)\d{2}(?:0[1-9]|1[0-2])(?:0[1-9]|[12]\d|3[01])\d{3}[\dXx]\b".into(),
                    severity: "high".into(),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FileTypesConfig {
    pub blocked_extensions: Vec<String>,
    pub monitored_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeLimitsConfig {
    pub max_content_size: usize,
    pub max_attachment_size: usize,
}

impl Default for SizeLimitsConfig {
    fn default() -> Self {
        Self {
            max_content_size: 25 * 1024 * 1024,
            max_attachment_size: 25 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub sensitive_data: SensitiveDataConfig,
    pub file_types: FileTypesConfig,
    pub size_limits: SizeLimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RulesConfig {
    pub block: Vec<String>,
    pub alert: Vec<String>,
    pub audit: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    pub enabled: bool,
    pub response_code: u16,
    pub response_message: String,
    pub channels: Vec<String>,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            response_code: 403,
            response_message: "Blocked by data loss prevention policy".into(),
            channels: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ActionsConfig {
    pub block: ActionConfig,
    pub alert: ActionConfig,
    pub audit: ActionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: defaults::PROCESS_CACHE_CAPACITY,
            ttl_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_packets_per_sec: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_packets_per_sec: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub max_concurrent_connections: usize,
    pub max_concurrent_parsers: usize,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_connections: 10_000,
            max_concurrent_parsers: defaults::WORKER_COUNT,
            cache: CacheConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DataMaskingConfig {
    pub enabled: bool,
    pub preview_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SecurityConfig {
    pub data_masking: DataMaskingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditLogConfig {
    pub log_path: String,
    pub max_size: u64,
    pub max_age_days: u64,
    pub max_backups: usize,
    pub compress: bool,
}

impl Default for AuditLogConfig {
    fn default() -> Self {
        Self {
            log_path: "logs/dlp_audit.log".into(),
            max_size: 100 * 1024 * 1024,
            max_age_days: 30,
            max_backups: 10,
            compress: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuditConfig {
    pub log: AuditLogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub interceptor: InterceptorConfig,
    pub parsers: HashMap<String, ParserConfig>,
    pub analyzer: AnalyzerConfig,
    pub rules: RulesConfig,
    pub actions: ActionsConfig,
    pub performance: PerformanceConfig,
    pub security: SecurityConfig,
    pub audit: AuditConfig,
    /// Opt-in rule-set durability. The persisted-state layout names only
    /// the audit log; when this is `None` (the default) rule edits live in
    /// `RuleManager`'s in-memory snapshot only and do not survive a
    /// restart. Set this to enable `policy::store::RuleStore`-backed
    /// persistence across restarts.
    pub rules_db_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interceptor: InterceptorConfig::default(),
            parsers: default_parsers(),
            analyzer: AnalyzerConfig::default(),
            rules: RulesConfig::default(),
            actions: ActionsConfig::default(),
            performance: PerformanceConfig::default(),
            security: SecurityConfig::default(),
            audit: AuditConfig::default(),
            rules_db_path: None,
        }
    }
}

impl Config {
    /// Loads a TOML config file, merging it over defaults. A missing file is
    /// not an error — the engine runs on defaults, matching the
    /// "config is optional, constants carry the default" posture.
    pub fn load(path: &Path) -> DlpResult<Config> {
        if !path.exists() {
            tracing::info!("no config file at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| DlpError::InvalidInput(format!("bad config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_builtin_patterns() {
        let cfg = Config::default();
        assert!(!cfg.analyzer.sensitive_data.patterns.is_empty());
    }

    #[test]
    fn default_config_enables_all_protocols() {
        let cfg = Config::default();
        assert!(cfg.parsers.get("http").unwrap().enabled);
        assert!(cfg.parsers.get("smtp").unwrap().max_body_size > cfg.parsers["http"].max_body_size);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = Config::load(Path::new("/nonexistent/sentinel-dlp.toml")).unwrap();
        assert_eq!(cfg.audit.log.max_backups, 10);
    }

    #[test]
    fn bypass_defaults_include_loopback() {
        let cfg = Config::default();
        assert!(cfg
            .interceptor
            .bypass
            .cidrs
            .iter()
            .any(|c| c == "127.0.0.0/8"));
    }

    #[test]
    fn load_parses_overrides_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sentinel-dlp.toml");
        std::fs::write(
            &path,
            r#"
 [interceptor.network]
 worker_count = 4
 "#,
        )
        .unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.interceptor.network.worker_count, 4);
    }
}
