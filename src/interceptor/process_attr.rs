//! Process attribution: resolves a packet's 4-tuple to the owning OS
//! process. Looks up a shared (transport, local port) → pid map refreshed
//! periodically by a platform backend, then fills in executable path,
//! command line and user via `sysinfo`. A per-worker LRU cache avoids
//! re-querying `sysinfo` for the same pid on every packet.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use sysinfo::{Pid, System};

use crate::model::{FlowKey, ProcessInfo, Transport};

#[cfg(target_os = "windows")]
use super::win_net_table;

pub type PortMap = DashMap<(Transport, u16), u32>;

/// Shared, refreshed out-of-band by a background thread; cheap to clone
/// and hand to every worker.
#[derive(Clone)]
pub struct ProcessAttributor {
    port_map: Arc<PortMap>,
    deadline: Duration,
}

impl ProcessAttributor {
    pub fn new(deadline: Duration) -> Self {
        ProcessAttributor {
            port_map: Arc::new(DashMap::new()),
            deadline,
        }
    }

    pub fn port_map(&self) -> Arc<PortMap> {
        Arc::clone(&self.port_map)
    }

    /// Refreshes the port→pid map using the current platform's socket
    /// table. Called periodically from a background thread, never on the
    /// per-packet hot path.
    pub fn refresh(&self) {
        #[cfg(target_os = "windows")]
        {
            win_net_table::refresh_port_map(&self.port_map);
        }
        #[cfg(target_os = "linux")]
        {
            refresh_from_proc(&self.port_map);
        }
        #[cfg(target_os = "macos")]
        {
            // sysinfo has no per-connection table on macOS; the port map
            // stays empty and lookups fall straight through to "failed".
        }
    }

    /// Resolves process info for the local endpoint of `flow`, bounded by
    /// `deadline`. Falls back to `ProcessInfo::failed()` on timeout or miss,
    /// and scenario 4 — the pipeline must continue either way.
    pub fn lookup(&self, flow: FlowKey, cache: &mut ProcessCache, sys: &mut System) -> ProcessInfo {
        let start = Instant::now();
        let pid = match self.port_map.get(&(flow.transport, flow.local_port)) {
            Some(p) => *p,
            None => return ProcessInfo::failed(),
        };
        if let Some(info) = cache.get(pid) {
            return info;
        }
        if start.elapsed() > self.deadline {
            return ProcessInfo::failed();
        }
        sys.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);
        let info = match sys.process(Pid::from_u32(pid)) {
            Some(proc) => ProcessInfo::success(
                pid,
                proc.name().to_string_lossy().into_owned(),
                proc.exe().map(|p| p.display().to_string()).unwrap_or_default(),
                proc.cmd().iter().map(|s| s.to_string_lossy().into_owned()).collect::<Vec<_>>().join(" "),
                proc.user_id().map(|u| u.to_string()).unwrap_or_default(),
            ),
            None => ProcessInfo::failed(),
        };
        cache.put(pid, info.clone());
        info
    }
}

#[cfg(target_os = "linux")]
fn refresh_from_proc(port_map: &PortMap) {
    port_map.clear();
    for (path, transport) in [
        ("/proc/net/tcp", Transport::Tcp),
        ("/proc/net/tcp6", Transport::Tcp),
        ("/proc/net/udp", Transport::Udp),
        ("/proc/net/udp6", Transport::Udp),
    ] {
        if let Ok(text) = std::fs::read_to_string(path) {
            for line in text.lines().skip(1) {
                let fields: Vec<&str> = line.split_whitespace().collect();
                if fields.len() < 10 {
                    continue;
                }
                let Some((_, port_hex)) = fields[1].split_once(':') else { continue };
                let Ok(port) = u16::from_str_radix(port_hex, 16) else { continue };
                let Ok(inode) = fields[9].parse::<u64>() else { continue };
                if let Some(pid) = pid_for_inode(inode) {
                    port_map.insert((transport, port), pid);
                }
            }
        }
    }
}

#[cfg(target_os = "linux")]
fn pid_for_inode(inode: u64) -> Option<u32> {
    let needle = format!("socket:[{inode}]");
    let entries = std::fs::read_dir("/proc").ok()?;
    for entry in entries.flatten() {
        let pid_str = entry.file_name();
        let Some(pid) = pid_str.to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };
        let fd_dir = entry.path().join("fd");
        if let Ok(fds) = std::fs::read_dir(&fd_dir) {
            for fd in fds.flatten() {
                if let Ok(link) = std::fs::read_link(fd.path()) {
                    if link.to_string_lossy() == needle {
                        return Some(pid);
                    }
                }
            }
        }
    }
    None
}

/// Bounded per-worker LRU; avoids a shared lock on the hot path.
pub struct ProcessCache {
    capacity: usize,
    order: VecDeque<u32>,
    entries: HashMap<u32, ProcessInfo>,
}

impl ProcessCache {
    pub fn new(capacity: usize) -> Self {
        ProcessCache {
            capacity,
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    pub fn get(&mut self, pid: u32) -> Option<ProcessInfo> {
        if let Some(info) = self.entries.get(&pid) {
            let info = info.clone();
            self.order.retain(|p| *p != pid);
            self.order.push_back(pid);
            return Some(info);
        }
        None
    }

    pub fn put(&mut self, pid: u32, info: ProcessInfo) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&pid) {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(pid);
        self.entries.insert(pid, info);
    }
}
