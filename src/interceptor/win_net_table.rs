//! Windows IP Helper FFI: refreshes a (transport, local port) → pid map by
//! walking the OS's TCP/UDP connection tables. Generalized from a port-only
//! map to transport-aware keys since the Interceptor needs both TCP and UDP
//! attribution.

#![cfg(target_os = "windows")]

use std::ffi::c_void;
use std::mem::size_of;

use dashmap::DashMap;

use crate::model::Transport;

type PortMap = DashMap<(Transport, u16), u32>;

#[repr(C)]
struct MibTcpRowOwnerPid {
    state: u32,
    local_addr: u32,
    local_port: [u8; 4],
    remote_addr: u32,
    remote_port: [u8; 4],
    owning_pid: u32,
}

#[repr(C)]
struct MibUdpRowOwnerPid {
    local_addr: u32,
    local_port: [u8; 4],
    owning_pid: u32,
}

const AF_INET: u32 = 2;
const TCP_TABLE_OWNER_PID_ALL: u32 = 5;
const UDP_TABLE_OWNER_PID: u32 = 1;

extern "system" {
    fn GetExtendedTcpTable(
        table: *mut c_void,
        size: *mut u32,
        order: i32,
        af: u32,
        table_class: u32,
        reserved: u32,
    ) -> u32;

    fn GetExtendedUdpTable(
        table: *mut c_void,
        size: *mut u32,
        order: i32,
        af: u32,
        table_class: u32,
        reserved: u32,
    ) -> u32;
}

fn be_port(raw: [u8; 4]) -> u16 {
    u16::from_be_bytes([raw[0], raw[1]])
}

/// Refreshes `port_map` from the current TCP and UDP owner-pid tables.
pub fn refresh_port_map(port_map: &PortMap) {
    port_map.clear();
    scan_tcp_table(port_map);
    scan_udp_table(port_map);
}

fn scan_tcp_table(port_map: &PortMap) {
    let mut size: u32 = 0;
    unsafe {
        GetExtendedTcpTable(
            std::ptr::null_mut(),
            &mut size,
            0,
            AF_INET,
            TCP_TABLE_OWNER_PID_ALL,
            0,
        );
        if size == 0 {
            return;
        }
        let mut buf = vec![0u8; size as usize];
        let rc = GetExtendedTcpTable(
            buf.as_mut_ptr() as *mut c_void,
            &mut size,
            0,
            AF_INET,
            TCP_TABLE_OWNER_PID_ALL,
            0,
        );
        if rc != 0 {
            return;
        }
        let count = *(buf.as_ptr() as *const u32) as usize;
        let rows_ptr = buf.as_ptr().add(size_of::<u32>()) as *const MibTcpRowOwnerPid;
        for i in 0..count {
            let row = &*rows_ptr.add(i);
            port_map.insert((Transport::Tcp, be_port(row.local_port)), row.owning_pid);
        }
    }
}

fn scan_udp_table(port_map: &PortMap) {
    let mut size: u32 = 0;
    unsafe {
        GetExtendedUdpTable(
            std::ptr::null_mut(),
            &mut size,
            0,
            AF_INET,
            UDP_TABLE_OWNER_PID,
            0,
        );
        if size == 0 {
            return;
        }
        let mut buf = vec![0u8; size as usize];
        let rc = GetExtendedUdpTable(
            buf.as_mut_ptr() as *mut c_void,
            &mut size,
            0,
            AF_INET,
            UDP_TABLE_OWNER_PID,
            0,
        );
        if rc != 0 {
            return;
        }
        let count = *(buf.as_ptr() as *const u32) as usize;
        let rows_ptr = buf.as_ptr().add(size_of::<u32>()) as *const MibUdpRowOwnerPid;
        for i in 0..count {
            let row = &*rows_ptr.add(i);
            port_map.insert((Transport::Udp, be_port(row.local_port)), row.owning_pid);
        }
    }
}
