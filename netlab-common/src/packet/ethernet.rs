//! Ethernet+IPv4(+UDP) framing helpers shared by the router, blaster,
//! blastee and middlebox. Builds on `pnet::packet::{ethernet,ipv4,udp}`
//! exactly as the teacher builds BPDUs on `pnet::packet::ethernet` — the
//! teacher never touches L3/L4, so this module is grounded on
//! `original_source/lab2/myrouter_part3.py::forward_ipv4` and
//! `original_source/lab3/{blaster,blastee,middlebox}.py` instead.

use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::{self, Ipv4Flags, Ipv4Packet, MutableIpv4Packet};
use pnet::packet::udp::{self, MutableUdpPacket, UdpPacket};
use pnet::util::MacAddr;
use std::net::Ipv4Addr;

/// Arbitrary fixed UDP port used for all blast/ACK traffic; spec.md leaves
/// the port number unspecified (non-goal: no port-based demultiplexing).
pub const BLAST_UDP_PORT: u16 = 9000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Info {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub ttl: u8,
}

pub fn parse_ipv4(eth: &EthernetPacket) -> Option<Ipv4Info> {
    if eth.get_ethertype() != EtherTypes::Ipv4 {
        return None;
    }
    let ip = Ipv4Packet::new(eth.payload())?;
    Some(Ipv4Info {
        src: ip.get_source(),
        dst: ip.get_destination(),
        ttl: ip.get_ttl(),
    })
}

/// Extracts the UDP payload bytes out of an Ethernet+IPv4+UDP frame.
pub fn parse_udp_payload(eth: &EthernetPacket) -> Option<Vec<u8>> {
    if eth.get_ethertype() != EtherTypes::Ipv4 {
        return None;
    }
    let ip = Ipv4Packet::new(eth.payload())?;
    if ip.get_next_level_protocol() != IpNextHeaderProtocols::Udp {
        return None;
    }
    let udp = UdpPacket::new(ip.payload())?;
    Some(udp.payload().to_vec())
}

/// Builds a fresh Ethernet+IPv4+UDP frame carrying `payload`, with UDP
/// source/destination both fixed at `BLAST_UDP_PORT` (spec.md has no port
/// negotiation; blaster/blastee/router/middlebox all assume one flow).
pub fn build_udp_ipv4_frame(
    src_mac: MacAddr,
    dst_mac: MacAddr,
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    ttl: u8,
    payload: &[u8],
) -> Vec<u8> {
    let eth_len = EthernetPacket::minimum_packet_size();
    let ip_hdr_len = Ipv4Packet::minimum_packet_size();
    let udp_len = UdpPacket::minimum_packet_size() + payload.len();
    let ip_len = ip_hdr_len + udp_len;
    let mut buf = vec![0u8; eth_len + ip_len];

    {
        let mut eth = MutableEthernetPacket::new(&mut buf).expect("buffer sized for one IPv4 frame");
        eth.set_source(src_mac);
        eth.set_destination(dst_mac);
        eth.set_ethertype(EtherTypes::Ipv4);
    }
    {
        let mut ip =
            MutableIpv4Packet::new(&mut buf[eth_len..eth_len + ip_len]).expect("sized for one IPv4 packet");
        ip.set_version(4);
        ip.set_header_length((ip_hdr_len / 4) as u8);
        ip.set_total_length(ip_len as u16);
        ip.set_ttl(ttl);
        ip.set_flags(Ipv4Flags::DontFragment);
        ip.set_next_level_protocol(IpNextHeaderProtocols::Udp);
        ip.set_source(src_ip);
        ip.set_destination(dst_ip);
        let checksum = ipv4::checksum(&ip.to_immutable());
        ip.set_checksum(checksum);
    }
    {
        let mut udp = MutableUdpPacket::new(&mut buf[eth_len + ip_hdr_len..eth_len + ip_len])
            .expect("sized for one UDP datagram");
        udp.set_source(BLAST_UDP_PORT);
        udp.set_destination(BLAST_UDP_PORT);
        udp.set_length(udp_len as u16);
        udp.set_payload(payload);
        let checksum = udp::ipv4_checksum(&udp.to_immutable(), &src_ip, &dst_ip);
        udp.set_checksum(checksum);
    }
    buf
}

/// Rewrites the Ethernet header of an existing IPv4 frame in place and
/// decrements its TTL by one (spec.md §4.6 step 3, §4.9 `update_pkt`).
/// Returns `None` if the frame is too short to hold an Ethernet+IPv4 header.
pub fn reencapsulate_ipv4(frame: &[u8], new_src: MacAddr, new_dst: MacAddr) -> Option<Vec<u8>> {
    let eth_len = EthernetPacket::minimum_packet_size();
    if frame.len() < eth_len + Ipv4Packet::minimum_packet_size() {
        return None;
    }
    let mut out = frame.to_vec();
    {
        let mut eth = MutableEthernetPacket::new(&mut out)?;
        eth.set_source(new_src);
        eth.set_destination(new_dst);
        eth.set_ethertype(EtherTypes::Ipv4);
    }
    {
        let mut ip = MutableIpv4Packet::new(&mut out[eth_len..])?;
        let ttl = ip.get_ttl();
        ip.set_ttl(ttl.saturating_sub(1));
        ip.set_checksum(0);
        let checksum = ipv4::checksum(&ip.to_immutable());
        ip.set_checksum(checksum);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn udp_ipv4_frame_round_trips() {
        let src_mac = MacAddr(1, 0, 0, 0, 0, 1);
        let dst_mac = MacAddr(2, 0, 0, 0, 0, 2);
        let src_ip = Ipv4Addr::new(10, 0, 0, 1);
        let dst_ip = Ipv4Addr::new(10, 0, 0, 2);
        let frame = build_udp_ipv4_frame(src_mac, dst_mac, src_ip, dst_ip, 64, &[1, 2, 3]);

        let eth = EthernetPacket::new(&frame).unwrap();
        assert_eq!(eth.get_destination(), dst_mac);
        let info = parse_ipv4(&eth).unwrap();
        assert_eq!(info.src, src_ip);
        assert_eq!(info.dst, dst_ip);
        assert_eq!(info.ttl, 64);
        assert_eq!(parse_udp_payload(&eth).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn reencapsulate_decrements_ttl_and_rewrites_eth() {
        let frame = build_udp_ipv4_frame(
            MacAddr(1, 0, 0, 0, 0, 1),
            MacAddr(2, 0, 0, 0, 0, 2),
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
            5,
            &[9],
        );
        let new_src = MacAddr(3, 0, 0, 0, 0, 3);
        let new_dst = MacAddr(4, 0, 0, 0, 0, 4);
        let out = reencapsulate_ipv4(&frame, new_src, new_dst).unwrap();
        let eth = EthernetPacket::new(&out).unwrap();
        assert_eq!(eth.get_source(), new_src);
        assert_eq!(eth.get_destination(), new_dst);
        let info = parse_ipv4(&eth).unwrap();
        assert_eq!(info.ttl, 4);
    }

    #[test]
    fn reencapsulate_rejects_short_frames() {
        let zero = MacAddr(0, 0, 0, 0, 0, 0);
        assert!(reencapsulate_ipv4(&[0u8; 4], zero, zero).is_none());
    }
}
