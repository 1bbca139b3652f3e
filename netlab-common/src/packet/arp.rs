//! ARP request/reply framing, used by both the router's `arp` resolver and
//! its test suite. Standard `pnet::packet::arp` wire format — grounded on
//! `original_source/lab2/myrouter_part3.py`'s `ARPContext.get_arp_request` /
//! `handle_arp_request`.

use pnet::packet::arp::{ArpHardwareTypes, ArpOperation, ArpOperations, ArpPacket, MutableArpPacket};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet::util::MacAddr;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpInfo {
    pub operation: ArpOperation,
    pub sender_mac: MacAddr,
    pub sender_ip: Ipv4Addr,
    pub target_mac: MacAddr,
    pub target_ip: Ipv4Addr,
}

pub fn parse_arp(eth: &EthernetPacket) -> Option<ArpInfo> {
    if eth.get_ethertype() != EtherTypes::Arp {
        return None;
    }
    let arp = ArpPacket::new(eth.payload())?;
    Some(ArpInfo {
        operation: arp.get_operation(),
        sender_mac: arp.get_sender_hw_addr(),
        sender_ip: arp.get_sender_proto_addr(),
        target_mac: arp.get_target_hw_addr(),
        target_ip: arp.get_target_proto_addr(),
    })
}

#[allow(clippy::too_many_arguments)]
fn build_arp_frame(
    eth_src: MacAddr,
    eth_dst: MacAddr,
    operation: ArpOperation,
    sender_mac: MacAddr,
    sender_ip: Ipv4Addr,
    target_mac: MacAddr,
    target_ip: Ipv4Addr,
) -> Vec<u8> {
    let eth_len = EthernetPacket::minimum_packet_size();
    let arp_len = ArpPacket::minimum_packet_size();
    let mut buf = vec![0u8; eth_len + arp_len];
    {
        let mut eth = MutableEthernetPacket::new(&mut buf).expect("buffer sized for one ARP frame");
        eth.set_source(eth_src);
        eth.set_destination(eth_dst);
        eth.set_ethertype(EtherTypes::Arp);
    }
    {
        let mut arp =
            MutableArpPacket::new(&mut buf[eth_len..]).expect("buffer sized for one ARP frame");
        arp.set_hardware_type(ArpHardwareTypes::Ethernet);
        arp.set_protocol_type(EtherTypes::Ipv4);
        arp.set_hw_addr_len(6);
        arp.set_proto_addr_len(4);
        arp.set_operation(operation);
        arp.set_sender_hw_addr(sender_mac);
        arp.set_sender_proto_addr(sender_ip);
        arp.set_target_hw_addr(target_mac);
        arp.set_target_proto_addr(target_ip);
    }
    buf
}

/// Broadcast ARP request: "who has `target_ip`?".
pub fn build_arp_request(src_mac: MacAddr, src_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Vec<u8> {
    build_arp_frame(
        src_mac,
        MacAddr::broadcast(),
        ArpOperations::Request,
        src_mac,
        src_ip,
        MacAddr(0, 0, 0, 0, 0, 0),
        target_ip,
    )
}

/// Unicast ARP reply answering a request from `dst_mac`/`dst_ip`.
pub fn build_arp_reply(
    src_mac: MacAddr,
    src_ip: Ipv4Addr,
    dst_mac: MacAddr,
    dst_ip: Ipv4Addr,
) -> Vec<u8> {
    build_arp_frame(
        src_mac,
        dst_mac,
        ArpOperations::Reply,
        src_mac,
        src_ip,
        dst_mac,
        dst_ip,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips() {
        let src_mac = MacAddr(1, 0, 0, 0, 0, 1);
        let src_ip = Ipv4Addr::new(10, 0, 0, 1);
        let target_ip = Ipv4Addr::new(10, 0, 0, 2);
        let frame = build_arp_request(src_mac, src_ip, target_ip);
        let eth = EthernetPacket::new(&frame).unwrap();
        assert_eq!(eth.get_destination(), MacAddr::broadcast());
        let info = parse_arp(&eth).unwrap();
        assert_eq!(info.operation, ArpOperations::Request);
        assert_eq!(info.sender_ip, src_ip);
        assert_eq!(info.target_ip, target_ip);
    }

    #[test]
    fn reply_round_trips() {
        let src_mac = MacAddr(1, 0, 0, 0, 0, 1);
        let dst_mac = MacAddr(2, 0, 0, 0, 0, 2);
        let frame = build_arp_reply(
            src_mac,
            Ipv4Addr::new(10, 0, 0, 1),
            dst_mac,
            Ipv4Addr::new(10, 0, 0, 2),
        );
        let eth = EthernetPacket::new(&frame).unwrap();
        assert_eq!(eth.get_destination(), dst_mac);
        let info = parse_arp(&eth).unwrap();
        assert_eq!(info.operation, ArpOperations::Reply);
        assert_eq!(info.sender_mac, src_mac);
    }
}
