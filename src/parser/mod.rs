//! Protocol detection and application-layer reconstruction.
//!
//! Dispatch order: sticky flow assignment, then destination-port mapping,
//! then signature probes in a fixed order, then an opaque "unknown" parser.
//! Each flow gets a bounded rolling buffer; flows idle past the configured
//! timeout are evicted by `evict_idle`.

pub mod ftp;
pub mod http;
pub mod mq;
pub mod rpc;
pub mod smb;
pub mod smtp;
pub mod sql;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::model::{FlowKey, PacketInfo, ParsedData};

pub trait ProtocolParser: Send + Sync {
    fn name(&self) -> &'static str;
    fn ports(&self) -> &'static [u16];
    fn max_message_size(&self) -> usize;
    /// Lightweight signature probe used when no port mapping or sticky
    /// assignment claims the flow.
    fn probe(&self, buf: &[u8]) -> bool;
    /// Attempts to extract a complete message from `buf`. Returns `None`
    /// when more bytes are needed.
    fn parse(&self, buf: &[u8]) -> Option<ParsedData>;
}

struct FlowState {
    parser: &'static str,
    buffer: Vec<u8>,
    last_seen: Instant,
}

pub struct ParserRegistry {
    parsers: Vec<Box<dyn ProtocolParser>>,
    port_map: HashMap<u16, &'static str>,
    flows: HashMap<FlowKey, FlowState>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        let parsers: Vec<Box<dyn ProtocolParser>> = vec![
            Box::new(http::HttpParser),
            Box::new(smtp::SmtpParser),
            Box::new(ftp::FtpParser),
            Box::new(sql::SqlParser),
            Box::new(mq::MqParser),
            Box::new(smb::SmbParser),
            Box::new(rpc::RpcParser),
        ];
        let mut port_map = HashMap::new();
        for p in &parsers {
            for &port in p.ports() {
                port_map.insert(port, p.name());
            }
        }
        ParserRegistry {
            parsers,
            port_map,
            flows: HashMap::new(),
        }
    }

    fn find(&self, name: &str) -> Option<&dyn ProtocolParser> {
        self.parsers.iter().find(|p| p.name() == name).map(|p| p.as_ref())
    }

    /// Feeds one packet's payload through the dispatch + buffering pipeline,
    /// returning a complete `ParsedData` when a full message is ready.
    pub fn ingest(&mut self, packet: &PacketInfo) -> Option<ParsedData> {
        let flow_key = packet.flow_key();
        let parser_name = self.assign_parser(&flow_key, packet);

        let Some(parser_name) = parser_name else {
            return Some(ParsedData::unknown(packet.payload.clone()));
        };
        let parser = self.parsers.iter().find(|p| p.name() == parser_name).map(|p| p.as_ref())?;
        let parser_name_static = parser.name();

        let state = self.flows.entry(flow_key).or_insert_with(|| FlowState {
            parser: parser_name_static,
            buffer: Vec::new(),
            last_seen: Instant::now(),
        });
        state.last_seen = Instant::now();
        state.buffer.extend_from_slice(&packet.payload);

        if state.buffer.len() > parser.max_message_size() {
            let data = ParsedData::unknown(std::mem::take(&mut state.buffer)).with_error("oversize");
            return Some(ParsedData { protocol: parser.name().into(),..data });
        }

        match parser.parse(&state.buffer) {
            Some(parsed) => {
                state.buffer.clear();
                Some(parsed)
            }
            None => None,
        }
    }

    fn assign_parser(&mut self, flow_key: &FlowKey, packet: &PacketInfo) -> Option<&'static str> {
        if let Some(state) = self.flows.get(flow_key) {
            return Some(state.parser);
        }
        if let Some(&name) = self.port_map.get(&packet.dst_port) {
            return Some(name);
        }
        for parser in &self.parsers {
            if parser.probe(&packet.payload) {
                return Some(parser.name());
            }
        }
        None
    }

    /// Drops flow buffers that have not seen traffic within `timeout`.
    pub fn evict_idle(&mut self, timeout: Duration) {
        let now = Instant::now();
        self.flows.retain(|_, state| now.duration_since(state.last_seen) < timeout);
    }

    pub fn active_flow_count(&self) -> usize {
        self.flows.len()
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Direction, ProcessInfo, Transport};

    fn packet(dst_port: u16, payload: &[u8]) -> PacketInfo {
        PacketInfo {
            id: "p".into(),
            captured_at_ms: 0,
            src_ip: "10.0.0.1".parse().unwrap(),
            src_port: 50000,
            dst_ip: "93.184.216.34".parse().unwrap(),
            dst_port,
            transport: Transport::Tcp,
            direction: Direction::Outbound,
            payload: payload.to_vec(),
            size: payload.len(),
            process: ProcessInfo::failed(),
            metadata: Default::default(),
        }
    }

    #[test]
    fn unmapped_unknown_port_falls_back_to_unknown() {
        let mut registry = ParserRegistry::new();
        let parsed = registry.ingest(&packet(54321, b"\x00\x01binary")).unwrap();
        assert_eq!(parsed.protocol, "unknown");
    }

    #[test]
    fn http_dispatches_by_port_and_completes_on_full_request() {
        let mut registry = ParserRegistry::new();
        let req = b"GET /a HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let parsed = registry.ingest(&packet(80, req)).unwrap();
        assert_eq!(parsed.protocol, "HTTP");
    }

    #[test]
    fn flow_stays_sticky_to_first_assigned_parser() {
        let mut registry = ParserRegistry::new();
        let _ = registry.ingest(&packet(80, b"GET / HTTP/1.1\r\n"));
        assert_eq!(registry.active_flow_count(), 1);
        let _ = registry.ingest(&packet(80, b"Host: example.com\r\n\r\n"));
        assert_eq!(registry.active_flow_count(), 0, "buffer clears once a message completes");
    }

    #[test]
    fn idle_flows_are_evicted() {
        let mut registry = ParserRegistry::new();
        let _ = registry.ingest(&packet(80, b"GET / HTTP/1.1\r\n"));
        assert_eq!(registry.active_flow_count(), 1);
        registry.evict_idle(Duration::from_secs(0));
        assert_eq!(registry.active_flow_count(), 0);
    }
}
