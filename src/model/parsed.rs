use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The reconstructed application-layer message produced by a protocol
/// parser. Per-protocol fields that don't apply to a given protocol are
/// simply left at their default and surfaced through `metadata` instead —
/// this is the "tagged union plus typed-scalar side table" re-architecture
/// called for in place of a generic string-keyed map.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ParsedData {
    pub protocol: String,
    pub content_type: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub status_code: Option<u16>,
    pub metadata: HashMap<String, String>,
}

impl ParsedData {
    pub fn unknown(raw: Vec<u8>) -> Self {
        let size = raw.len();
        let mut metadata = HashMap::new();
        metadata.insert("size".into(), size.to_string());
        ParsedData {
            protocol: "unknown".into(),
            content_type: String::new(),
            headers: HashMap::new(),
            body: raw,
            url: None,
            method: None,
            status_code: None,
            metadata,
        }
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.metadata.insert("parse_error".into(), reason.into());
        self
    }

    pub fn is_oversize(&self) -> bool {
        self.metadata.get("parse_error").map(|s| s == "oversize").unwrap_or(false)
    }
}
