//! Pure bypass-filter logic, factored out of the capture loop so it is
//! unit-testable without a capture device.

use std::net::IpAddr;

use ipnet::IpNet;

use crate::model::PacketInfo;

#[derive(Debug, Clone, Default)]
pub struct BypassFilter {
    cidrs: Vec<IpNet>,
    ports: Vec<u16>,
}

impl BypassFilter {
    pub fn new(cidrs: &[String], ports: &[u16]) -> Self {
        let parsed = cidrs
        .iter()
        .filter_map(|c| c.parse::<IpNet>().ok())
        .collect();
        BypassFilter {
            cidrs: parsed,
            ports: ports.to_vec(),
        }
    }

    /// A packet is bypassed when source OR destination matches a bypass
    /// CIDR, or source OR destination port is in the bypass port set.
    /// Must run before any parser allocates per-flow state, so bypassed
    /// traffic never costs the registry a flow-table entry.
    pub fn is_bypassed(&self, packet: &PacketInfo) -> bool {
        self.ip_matches(packet.src_ip) || self.ip_matches(packet.dst_ip) || self.port_matches(packet.src_port) || self.port_matches(packet.dst_port)
    }

    fn ip_matches(&self, ip: IpAddr) -> bool {
        self.cidrs.iter().any(|net| net.contains(&ip))
    }

    fn port_matches(&self, port: u16) -> bool {
        self.ports.contains(&port)
    }
}
