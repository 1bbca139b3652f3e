//! Bridge Protocol Data Unit framing (spec.md §6 "BPDU payload"), generalized
//! from the teacher's `Bpdu`/`BpduBuf` pair in `src/stp/bpdu.rs`: same
//! bytemuck-`Pod` packed struct and single-allocation reuse for the hot,
//! periodic emission path, but carrying the full `{root_id, hops_to_root,
//! switch_id}` triple spec.md needs (the teacher tracked only a bare
//! `root_cost`) and a broadcast destination per spec.md §4.2 rather than the
//! teacher's reserved 802.1D multicast address.

use bytemuck::{Pod, Zeroable};
use pnet::packet::ethernet::{EthernetPacket, MutableEthernetPacket};
use pnet::util::MacAddr;
use std::mem;

use super::SLOW_PROTOCOLS;

/// Wire layout: `root_mac(6) || pad(1) || hops_to_root(1) || switch_mac(6)`.
#[repr(C)]
#[derive(Pod, Zeroable, Copy, Clone, Debug, PartialEq, Eq)]
pub struct Bpdu {
    root_id: [u8; 6],
    _pad: u8,
    hops_to_root: u8,
    switch_id: [u8; 6],
}

/// A reusable buffer sized for exactly one BPDU frame, so the periodic
/// emission sweep (every port, every tick) doesn't allocate.
pub struct BpduBuf(Vec<u8>);

impl Bpdu {
    pub fn new(root_id: MacAddr, hops_to_root: u8, switch_id: MacAddr) -> Self {
        Bpdu {
            root_id: root_id.octets(),
            _pad: 0,
            hops_to_root,
            switch_id: switch_id.octets(),
        }
    }

    pub fn make_buf() -> BpduBuf {
        BpduBuf(vec![
            0u8;
            EthernetPacket::minimum_packet_size() + mem::size_of::<Bpdu>()
        ])
    }

    pub fn root_id(&self) -> MacAddr {
        self.root_id.into()
    }

    pub fn hops_to_root(&self) -> u8 {
        self.hops_to_root
    }

    pub fn switch_id(&self) -> MacAddr {
        self.switch_id.into()
    }

    /// Builds the broadcast-destined BPDU frame in `buf`, re-using its
    /// allocation across calls.
    pub fn write_frame<'a>(&self, buf: &'a mut BpduBuf, src_mac: MacAddr) -> EthernetPacket<'a> {
        let mut pkt = MutableEthernetPacket::new(&mut buf.0)
            .expect("BPDU buffer is sized for exactly one BPDU frame");
        pkt.set_source(src_mac);
        pkt.set_destination(MacAddr::broadcast());
        pkt.set_ethertype(SLOW_PROTOCOLS);
        pkt.set_payload(bytemuck::bytes_of(self));
        pkt.consume_to_immutable()
    }

    /// Parses a BPDU out of a frame already known to carry the
    /// slow-protocols ethertype.
    pub fn from_payload(payload: &[u8]) -> Option<Bpdu> {
        if payload.len() < mem::size_of::<Bpdu>() {
            return None;
        }
        Some(*bytemuck::from_bytes(&payload[..mem::size_of::<Bpdu>()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_wire_bytes() {
        let root = MacAddr(0x10, 0, 0, 0, 0, 0);
        let switch = MacAddr(0x20, 0, 0, 0, 0, 0);
        let bpdu = Bpdu::new(root, 3, switch);
        let mut buf = Bpdu::make_buf();
        let frame = bpdu.write_frame(&mut buf, switch);
        assert_eq!(frame.get_destination(), MacAddr::broadcast());
        assert_eq!(frame.get_ethertype(), SLOW_PROTOCOLS);

        let parsed = Bpdu::from_payload(frame.payload()).unwrap();
        assert_eq!(parsed.root_id(), root);
        assert_eq!(parsed.hops_to_root(), 3);
        assert_eq!(parsed.switch_id(), switch);
    }
}
