//! Dynamic Routing Message framing (spec.md §6 "Dynamic-routing message"),
//! built fresh in the teacher's idiom (bytemuck `Pod` struct + `pnet`
//! `MutableEthernetPacket`) even though the teacher has no L3 concept at
//! all — grounded on `original_source/lab2/dynamicroutingmessage.py`'s
//! `DynamicRoutingMessage`, which this reproduces as a packed struct instead
//! of Python's `struct.pack`.
//!
//! spec.md's prose says the payload is "27 bytes" but its own field
//! breakdown (`prefix(8) || pad(1) || mask(8) || pad(1) || next_hop(8)`)
//! sums to 26; this module follows the explicit field breakdown (decision
//! recorded in DESIGN.md).

use bytemuck::{Pod, Zeroable};
use pnet::packet::ethernet::{EthernetPacket, MutableEthernetPacket};
use pnet::util::MacAddr;
use std::mem;
use std::net::Ipv4Addr;

use super::SLOW_PROTOCOLS;

/// Wire layout: `prefix(8) || pad(1) || mask(8) || pad(1) || next_hop(8)`.
/// Only the low 4 bytes of each 8-byte field carry the address; the high 4
/// bytes are zero on the wire.
#[repr(C)]
#[derive(Pod, Zeroable, Copy, Clone, Debug, PartialEq, Eq)]
pub struct Drm {
    prefix: [u8; 8],
    _pad0: u8,
    mask: [u8; 8],
    _pad1: u8,
    next_hop: [u8; 8],
}

fn encode_field(addr: Ipv4Addr) -> [u8; 8] {
    let mut buf = [0u8; 8];
    buf[4..8].copy_from_slice(&addr.octets());
    buf
}

fn decode_field(buf: &[u8; 8]) -> Ipv4Addr {
    Ipv4Addr::new(buf[4], buf[5], buf[6], buf[7])
}

impl Drm {
    pub fn new(advertised_prefix: Ipv4Addr, advertised_mask: Ipv4Addr, next_hop: Ipv4Addr) -> Self {
        Drm {
            prefix: encode_field(advertised_prefix),
            _pad0: 0,
            mask: encode_field(advertised_mask),
            _pad1: 0,
            next_hop: encode_field(next_hop),
        }
    }

    pub fn advertised_prefix(&self) -> Ipv4Addr {
        decode_field(&self.prefix)
    }

    pub fn advertised_mask(&self) -> Ipv4Addr {
        decode_field(&self.mask)
    }

    pub fn next_hop(&self) -> Ipv4Addr {
        decode_field(&self.next_hop)
    }

    /// Builds a broadcast-destined DRM frame. DRMs are advertised rarely
    /// compared to BPDUs, so unlike `Bpdu` this allocates a fresh buffer
    /// per call rather than threading a reusable one through callers.
    pub fn to_frame(&self, src_mac: MacAddr) -> Vec<u8> {
        let mut buf = vec![0u8; EthernetPacket::minimum_packet_size() + mem::size_of::<Drm>()];
        let mut pkt = MutableEthernetPacket::new(&mut buf).expect("buffer sized for one DRM frame");
        pkt.set_source(src_mac);
        pkt.set_destination(MacAddr::broadcast());
        pkt.set_ethertype(SLOW_PROTOCOLS);
        pkt.set_payload(bytemuck::bytes_of(self));
        drop(pkt);
        buf
    }

    pub fn from_payload(payload: &[u8]) -> Option<Drm> {
        if payload.len() < mem::size_of::<Drm>() {
            return None;
        }
        Some(*bytemuck::from_bytes(&payload[..mem::size_of::<Drm>()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_wire_bytes() {
        let drm = Drm::new(
            Ipv4Addr::new(172, 16, 0, 0),
            Ipv4Addr::new(255, 255, 0, 0),
            Ipv4Addr::new(192, 168, 1, 2),
        );
        let frame = drm.to_frame(MacAddr(1, 2, 3, 4, 5, 6));
        let eth = EthernetPacket::new(&frame).unwrap();
        assert_eq!(eth.get_ethertype(), SLOW_PROTOCOLS);

        let parsed = Drm::from_payload(eth.payload()).unwrap();
        assert_eq!(parsed.advertised_prefix(), Ipv4Addr::new(172, 16, 0, 0));
        assert_eq!(parsed.advertised_mask(), Ipv4Addr::new(255, 255, 0, 0));
        assert_eq!(parsed.next_hop(), Ipv4Addr::new(192, 168, 1, 2));
    }
}
