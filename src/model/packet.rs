use std::collections::HashMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Tcp,
    Udp,
    Icmp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Process attribution for a captured packet. `status` is either "success"
/// (every field populated) or "failed" (pid=0, name="unknown") —
/// the pipeline always continues past a lookup failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub exe_path: String,
    pub cmdline: String,
    pub user: String,
    pub status: String,
}

impl ProcessInfo {
    pub fn success(pid: u32, name: String, exe_path: String, cmdline: String, user: String) -> Self {
        Self {
            pid,
            name,
            exe_path,
            cmdline,
            user,
            status: "success".into(),
        }
    }

    pub fn failed() -> Self {
        Self {
            pid: 0,
            name: "unknown".into(),
            exe_path: String::new(),
            cmdline: String::new(),
            user: String::new(),
            status: "failed".into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketInfo {
    pub id: String,
    pub captured_at_ms: u64,
    pub src_ip: IpAddr,
    pub src_port: u16,
    pub dst_ip: IpAddr,
    pub dst_port: u16,
    pub transport: Transport,
    pub direction: Direction,
    pub payload: Vec<u8>,
    pub size: usize,
    pub process: ProcessInfo,
    pub metadata: HashMap<String, String>,
}

impl PacketInfo {
    /// The direction-normalized 5-tuple flows are keyed by (FlowKey below):
    /// outbound traffic keys on (src,dst); inbound keys on (dst,src) so both
    /// legs of a connection land in the same bucket.
    pub fn flow_key(&self) -> FlowKey {
        match self.direction {
            Direction::Outbound => FlowKey {
                local_ip: self.src_ip,
                local_port: self.src_port,
                remote_ip: self.dst_ip,
                remote_port: self.dst_port,
                transport: self.transport,
            },
            Direction::Inbound => FlowKey {
                local_ip: self.dst_ip,
                local_port: self.dst_port,
                remote_ip: self.src_ip,
                remote_port: self.src_port,
                transport: self.transport,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowKey {
    pub local_ip: IpAddr,
    pub local_port: u16,
    pub remote_ip: IpAddr,
    pub remote_port: u16,
    pub transport: Transport,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_packet(dir: Direction) -> PacketInfo {
        PacketInfo {
            id: "p1".into(),
            captured_at_ms: 0,
            src_ip: "10.0.0.1".parse().unwrap(),
            src_port: 5555,
            dst_ip: "93.184.216.34".parse().unwrap(),
            dst_port: 443,
            transport: Transport::Tcp,
            direction: dir,
            payload: vec![],
            size: 0,
            process: ProcessInfo::failed(),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn flow_key_normalizes_direction() {
        let out = sample_packet(Direction::Outbound).flow_key();
        let inb = sample_packet(Direction::Inbound).flow_key();
        assert_eq!(out, inb);
    }

    #[test]
    fn failed_process_info_has_zero_pid_and_unknown_name() {
        let p = ProcessInfo::failed();
        assert_eq!(p.pid, 0);
        assert_eq!(p.name, "unknown");
        assert!(!p.is_success());
    }
}
