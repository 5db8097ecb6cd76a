use std::collections::HashMap;

use super::ProtocolParser;
use crate::model::ParsedData;

/// Covers gRPC and GraphQL: both are "method/operation + payload size"
/// from this pipeline's point of view, so one parser serves both, keyed
/// by whichever framing it recognizes.
pub struct RpcParser;

impl ProtocolParser for RpcParser {
    fn name(&self) -> &'static str {
        "RPC"
    }

    fn ports(&self) -> &'static [u16] {
        &[50051]
    }

    fn max_message_size(&self) -> usize {
        8 * 1024 * 1024
    }

    fn probe(&self, buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        text.contains("\"query\"") || text.trim_start().starts_with("query ") || (!buf.is_empty() && buf[0] <= 1)
    }

    fn parse(&self, buf: &[u8]) -> Option<ParsedData> {
        if buf.is_empty() {
            return None;
        }
        let text = String::from_utf8_lossy(buf);
        let mut metadata = HashMap::new();
        metadata.insert("payload_size".into(), buf.len().to_string());

        let method = if let Some(op) = extract_graphql_operation(&text) {
            metadata.insert("dialect".into(), "graphql".into());
            op
        } else {
            metadata.insert("dialect".into(), "grpc".into());
            "unary_call".to_string()
        };

        Some(ParsedData {
            protocol: "RPC".into(),
            content_type: "application/grpc".into(),
            headers: HashMap::new(),
            body: buf.to_vec(),
            url: None,
            method: Some(method),
            status_code: None,
            metadata,
        })
    }
}

fn extract_graphql_operation(text: &str) -> Option<String> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') && text.contains("\"query\"") {
        return Some("query".into());
    }
    if trimmed.starts_with("query ") || trimmed.starts_with("mutation ") {
        return trimmed.split_whitespace().next().map(str::to_string);
    }
    None
}
