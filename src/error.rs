//! Crate-wide error type.
//!
//! Mirrors the host control-plane contract: every variant maps to a
//! `kind()` string and serializes as `{kind, message}` so a failed request
//! can be wrapped directly into the `{success:false, error:{code,message}}`
//! envelope the host expects.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

#[derive(Debug, thiserror::Error)]
pub enum DlpError {
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("process lookup failed: {0}")]
    ProcessLookupFailed(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("pattern timeout: {0}")]
    PatternTimeout(String),

    #[error("rule evaluation error: {0}")]
    RuleEvaluationError(String),

    #[error("audit write failed: {0}")]
    AuditWriteFailed(String),

    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("shutdown timeout: {0}")]
    ShutdownTimeout(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl DlpError {
    pub fn kind(&self) -> &'static str {
        match self {
            DlpError::CaptureUnavailable(_) => "capture_unavailable",
            DlpError::ProcessLookupFailed(_) => "process_lookup_failed",
            DlpError::ParseError(_) => "parse_error",
            DlpError::PatternTimeout(_) => "pattern_timeout",
            DlpError::RuleEvaluationError(_) => "rule_evaluation_error",
            DlpError::AuditWriteFailed(_) => "audit_write_failed",
            DlpError::DeadlineExceeded(_) => "deadline_exceeded",
            DlpError::ShutdownTimeout(_) => "shutdown_timeout",
            DlpError::Database(_) => "database",
            DlpError::Io(_) => "io",
            DlpError::InvalidInput(_) => "invalid_input",
        }
    }

    /// Maps to the host's recognized error codes where one applies.
    pub fn host_code(&self) -> &'static str {
        match self {
            DlpError::InvalidInput(_) => "invalid_param",
            DlpError::Database(_) => "add_error",
            DlpError::ParseError(_) | DlpError::Io(_) => "scan_error",
            _ => "unknown_action",
        }
    }
}

impl Serialize for DlpError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
    S: Serializer,
    {
        let mut state = serializer.serialize_struct("DlpError", 2)?;
        state.serialize_field("kind", self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

impl From<anyhow::Error> for DlpError {
    fn from(e: anyhow::Error) -> Self {
        DlpError::Io(e.to_string())
    }
}

impl From<std::io::Error> for DlpError {
    fn from(e: std::io::Error) -> Self {
        DlpError::Io(e.to_string())
    }
}

impl From<rusqlite::Error> for DlpError {
    fn from(e: rusqlite::Error) -> Self {
        DlpError::Database(e.to_string())
    }
}

impl From<regex::Error> for DlpError {
    fn from(e: regex::Error) -> Self {
        DlpError::InvalidInput(format!("bad pattern: {e}"))
    }
}

pub type DlpResult<T> = Result<T, DlpError>;
