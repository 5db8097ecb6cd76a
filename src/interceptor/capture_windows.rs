//! Windows capture backend using WinDivert in intercept mode. Generalized
//! from a byte-counting sniff loop to forward whole packets to the parser
//! stage and to support both capture and verdict-enforced reinjection.

#![cfg(target_os = "windows")]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use windivert::layer::NetworkLayer;
use windivert::WinDivert;

use crate::error::{DlpError, DlpResult};
use crate::interceptor::parse_ip_packet;
use crate::model::PacketInfo;

pub fn open(filter_expr: &str) -> DlpResult<WinDivert<NetworkLayer>> {
    WinDivert::network(filter_expr, 0, Default::default())
    .map_err(|e| DlpError::CaptureUnavailable(e.to_string()))
}

/// Runs the capture loop until `shutdown` is set, forwarding each captured
/// packet's parsed envelope to `on_packet`. Packets whose verdict is
/// "block" are simply not reinjected; everything else is sent back out.
pub fn run_capture_loop(
    wd: &mut WinDivert<NetworkLayer>,
    shutdown: &AtomicBool,
    mut on_packet: impl FnMut(PacketInfo) -> bool,
) {
    let mut buffer = vec![0u8; 65535];
    while !shutdown.load(Ordering::Relaxed) {
        let Ok(packet) = wd.recv(Some(&mut buffer)) else {
            continue;
        };
        let should_forward = match parse_ip_packet(&packet.data) {
            Some(envelope) => on_packet(envelope),
            None => true,
        };
        if should_forward {
            let _ = wd.send(&packet);
        }
    }
}
