//! macOS capture backend: a `nix`-mediated raw socket reads outbound IP
//! packets, falling back to process-scan-only mode (no capture, attribution
//! via `sysinfo` only) when the raw socket can't be opened — e.g. missing
//! entitlement.

#![cfg(target_os = "macos")]

use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::socket::{socket, AddressFamily, SockFlag, SockType};

use crate::error::{DlpError, DlpResult};
use crate::interceptor::parse_ip_packet;
use crate::model::PacketInfo;

pub struct RawCapture {
    fd: RawFd,
}

impl RawCapture {
    pub fn open() -> DlpResult<Self> {
        let fd = socket(AddressFamily::Inet, SockType::Raw, SockFlag::empty(), None)
        .map_err(|e| DlpError::CaptureUnavailable(format!("raw socket: {e}")))?;
        Ok(RawCapture { fd: fd.as_raw_fd() })
    }
}

pub fn run_capture_loop(capture: &RawCapture, shutdown: &AtomicBool, mut on_packet: impl FnMut(PacketInfo)) {
    let mut buf = [0u8; 65535];
    while !shutdown.load(Ordering::Relaxed) {
        let n = unsafe { libc_read(capture.fd, buf.as_mut_ptr(), buf.len()) };
        if n <= 0 {
            continue;
        }
        if let Some(packet) = parse_ip_packet(&buf[..n as usize]) {
            on_packet(packet);
        }
    }
}

unsafe fn libc_read(fd: RawFd, buf: *mut u8, len: usize) -> isize {
    extern "C" {
        fn read(fd: i32, buf: *mut std::ffi::c_void, count: usize) -> isize;
    }
    read(fd, buf as *mut std::ffi::c_void, len)
}
