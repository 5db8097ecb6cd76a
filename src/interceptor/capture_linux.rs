//! Linux capture backend: reads raw Ethernet frames off an interface with
//! `pnet_datalink` and hands the embedded IP packet to `parse_ip_packet`.
//! Grounded on the pack's use of `pnet` for userspace packet capture
//! (uw-ictd-haulage) since userspace interface capture on Linux has no
//! direct counterpart in the kernel-driver-based backends this crate
//! otherwise carries.

#![cfg(target_os = "linux")]

use std::sync::atomic::{AtomicBool, Ordering};

use pnet_datalink::{self, Channel, NetworkInterface};
use pnet_packet::ethernet::{EtherTypes, EthernetPacket};
use pnet_packet::Packet;

use crate::error::{DlpError, DlpResult};
use crate::interceptor::parse_ip_packet;
use crate::model::PacketInfo;

pub fn open(interface_name: &str) -> DlpResult<NetworkInterface> {
    pnet_datalink::interfaces()
    .into_iter()
    .find(|i| i.name == interface_name)
    .ok_or_else(|| DlpError::CaptureUnavailable(format!("no such interface: {interface_name}")))
}

pub fn run_capture_loop(interface: &NetworkInterface, shutdown: &AtomicBool, mut on_packet: impl FnMut(PacketInfo)) -> DlpResult<()> {
    let (_, mut rx) = match pnet_datalink::channel(interface, Default::default()) {
        Ok(Channel::Ethernet(tx, rx)) => (tx, rx),
        Ok(_) => return Err(DlpError::CaptureUnavailable("unsupported channel type".into())),
        Err(e) => return Err(DlpError::CaptureUnavailable(e.to_string())),
    };

    while !shutdown.load(Ordering::Relaxed) {
        let Ok(frame) = rx.next() else { continue };
        let Some(eth) = EthernetPacket::new(frame) else { continue };
        if eth.get_ethertype() != EtherTypes::Ipv4 && eth.get_ethertype() != EtherTypes::Ipv6 {
            continue;
        }
        if let Some(packet) = parse_ip_packet(eth.payload()) {
            on_packet(packet);
        }
    }
    Ok(())
}
