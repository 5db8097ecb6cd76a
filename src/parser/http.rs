use std::collections::HashMap;

use super::ProtocolParser;
use crate::model::ParsedData;

pub struct HttpParser;

const METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

impl ProtocolParser for HttpParser {
    fn name(&self) -> &'static str {
        "HTTP"
    }

    fn ports(&self) -> &'static [u16] {
        &[80, 443, 8080, 8443]
    }

    fn max_message_size(&self) -> usize {
        10 * 1024 * 1024
    }

    fn probe(&self, buf: &[u8]) -> bool {
        METHODS.iter().any(|m| buf.starts_with(m.as_bytes()))
    }

    fn parse(&self, buf: &[u8]) -> Option<ParsedData> {
        let text = String::from_utf8_lossy(buf);
        let header_end = text.find("\r\n\r\n")?;
        let (head, rest) = text.split_at(header_end);
        let body = rest.trim_start_matches("\r\n\r\n").as_bytes().to_vec();

        let mut lines = head.lines();
        let request_line = lines.next()?;
        let mut parts = request_line.split_whitespace();
        let method = parts.next()?.to_string();
        let url = parts.next().unwrap_or("/").to_string();

        let mut headers = HashMap::new();
        for line in lines {
            if let Some((k, v)) = line.split_once(':') {
                headers.insert(k.trim().to_string(), v.trim().to_string());
            }
        }

        let mut metadata = HashMap::new();
        metadata.insert(
            "user_agent".into(),
            headers.get("User-Agent").cloned().unwrap_or_default(),
        );
        metadata.insert(
            "cookies_count".into(),
            headers
            .get("Cookie")
            .map(|c| c.split(';').count())
            .unwrap_or(0)
            .to_string(),
        );
        metadata.insert(
            "auth_scheme".into(),
            headers
            .get("Authorization")
            .and_then(|a| a.split_whitespace().next())
            .unwrap_or("")
            .to_string(),
        );

        Some(ParsedData {
            protocol: "HTTP".into(),
            content_type: headers.get("Content-Type").cloned().unwrap_or_default(),
            headers,
            body,
            url: Some(url),
            method: Some(method),
            status_code: None,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_recognizes_get() {
        assert!(HttpParser.probe(b"GET / HTTP/1.1\r\n"));
        assert!(!HttpParser.probe(b"\x16\x03\x01not http"));
    }

    #[test]
    fn parses_method_url_and_body() {
        let req = b"POST /upload HTTP/1.1\r\nHost: example.com\r\nContent-Length: 19\r\n\r\ncard=4111111111111111";
        let parsed = HttpParser.parse(req).unwrap();
        assert_eq!(parsed.method.as_deref(), Some("POST"));
        assert_eq!(parsed.url.as_deref(), Some("/upload"));
        assert_eq!(parsed.body, b"card=4111111111111111");
    }

    #[test]
    fn incomplete_headers_return_none() {
        assert!(HttpParser.parse(b"GET / HTTP/1.1\r\nHost: example.com\r\n").is_none());
    }
}
