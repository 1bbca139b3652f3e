//! Wire-format codecs. Each sub-module owns one protocol; `classify`
//! implements the "dynamic dispatch via a tagged variant" design note
//! (spec.md §9) for the router, which has to tell ARP, IPv4, and DRM frames
//! apart at ingress.

pub mod arp;
pub mod blast;
pub mod bpdu;
pub mod drm;
pub mod ethernet;

pub use arp::{build_arp_reply, build_arp_request, parse_arp, ArpInfo};
pub use blast::{decode_seq, encode_ack_payload, encode_blast_payload, ACK_FILLER_LEN};
pub use bpdu::{Bpdu, BpduBuf};
pub use drm::Drm;
pub use ethernet::{
    build_udp_ipv4_frame, parse_ipv4, parse_udp_payload, reencapsulate_ipv4, Ipv4Info,
    BLAST_UDP_PORT,
};

use pnet::packet::ethernet::{EtherType, EthernetPacket};

/// Ethertype reserved for "slow protocols" (0x8809); reused as the carrier
/// for both BPDUs (switch-to-switch) and DRMs (router-to-router) per
/// spec.md's GLOSSARY. The two never appear on the same wire in this
/// workspace, so neither parser needs to guess which one it is looking at.
pub const SLOW_PROTOCOLS: EtherType = EtherType(0x8809);

pub fn is_slow_protocol(eth: &EthernetPacket) -> bool {
    eth.get_ethertype() == SLOW_PROTOCOLS
}

/// Decoded-once-at-ingress dispatch tag for the router's event loop
/// (spec.md §4.6: "Dispatch by header presence, in this order: ARP → IPv4
/// → dynamic-routing-message").
#[derive(Debug, Clone)]
pub enum FrameKind {
    Arp(ArpInfo),
    Ipv4(Ipv4Info),
    Drm(Drm),
    Other,
}

pub fn classify(eth: &EthernetPacket) -> FrameKind {
    if let Some(info) = parse_arp(eth) {
        return FrameKind::Arp(info);
    }
    if let Some(info) = parse_ipv4(eth) {
        return FrameKind::Ipv4(info);
    }
    if is_slow_protocol(eth) {
        if let Some(drm) = Drm::from_payload(eth.payload()) {
            return FrameKind::Drm(drm);
        }
    }
    FrameKind::Other
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::util::MacAddr;
    use std::net::Ipv4Addr;

    #[test]
    fn classifies_arp_ipv4_and_drm() {
        let arp_frame = build_arp_request(
            MacAddr(1, 0, 0, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
        );
        assert!(matches!(
            classify(&EthernetPacket::new(&arp_frame).unwrap()),
            FrameKind::Arp(_)
        ));

        let ip_frame = build_udp_ipv4_frame(
            MacAddr(1, 0, 0, 0, 0, 1),
            MacAddr(2, 0, 0, 0, 0, 2),
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
            64,
            &[1],
        );
        assert!(matches!(
            classify(&EthernetPacket::new(&ip_frame).unwrap()),
            FrameKind::Ipv4(_)
        ));

        let drm = Drm::new(
            Ipv4Addr::new(172, 16, 0, 0),
            Ipv4Addr::new(255, 255, 0, 0),
            Ipv4Addr::new(192, 168, 1, 2),
        );
        let drm_frame = drm.to_frame(MacAddr(1, 0, 0, 0, 0, 1));
        assert!(matches!(
            classify(&EthernetPacket::new(&drm_frame).unwrap()),
            FrameKind::Drm(_)
        ));
    }
}
