//! Router event loop (spec.md §4.6), grounded on
//! `original_source/lab2/myrouter_part3.py::Router.router_main` and the
//! teacher's busy-loop structure in `EthRouter::run`
//! (`examples/cfzimmerman-stp-rs/src/stp/eth.rs`).

use anyhow::Result;
use log::{debug, warn};
use netlab_common::clock::Clock;
use netlab_common::config::StaticRoute;
use netlab_common::netio::{NetIo, RecvOutcome};
use netlab_common::packet::{classify, reencapsulate_ipv4, FrameKind, Ipv4Info};
use pnet::packet::ethernet::EthernetPacket;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::time::Duration;

use crate::arp::{ArpResolver, PumpAction};
use crate::forwarding_table::ForwardingTable;

const RECV_TIMEOUT: Duration = Duration::from_secs(1);

pub struct Router<N, C> {
    net: N,
    clock: C,
    table: ForwardingTable,
    arp: ArpResolver,
    local_ips: HashSet<Ipv4Addr>,
}

impl<N: NetIo, C: Clock> Router<N, C> {
    pub fn new(net: N, clock: C, table_capacity: usize, static_routes: Vec<StaticRoute>) -> Self {
        let mut table = ForwardingTable::new(table_capacity);
        let mut local_ips = HashSet::new();
        for iface in net.interfaces() {
            if let Some(ip) = iface.ip {
                local_ips.insert(ip);
            }
            if let (Some(ip), Some(mask)) = (iface.ip, iface.netmask) {
                table.add_entry(ip, mask, None, iface.mac, true);
            }
        }
        for route in static_routes {
            let Some(out_mac) = net.interface_by_name(&route.ifname).map(|i| i.mac) else {
                warn!("forwarding table names unknown interface {}", route.ifname);
                continue;
            };
            table.add_entry(route.prefix, route.mask, Some(route.next_hop), out_mac, false);
        }
        let arp = ArpResolver::new(net.interfaces());
        Router {
            net,
            clock,
            table,
            arp,
            local_ips,
        }
    }

    fn apply_pump_actions(&mut self, actions: Vec<PumpAction>) {
        for action in actions {
            let (PumpAction::Forward { out_port_mac, frame } | PumpAction::ArpRequest { out_port_mac, frame }) =
                action;
            let Some(port) = self.net.interface_by_mac(out_port_mac).map(|i| i.name.clone()) else {
                continue;
            };
            if let Err(e) = self.net.send(&port, &frame) {
                debug!("transient send failure on {port}: {e}");
            }
        }
    }

    /// spec.md §4.6 IPv4 dispatch.
    fn handle_ipv4(&mut self, frame: &[u8], info: Ipv4Info) {
        if self.local_ips.contains(&info.dst) {
            return;
        }
        let Some((out_port_mac, next_hop_ip)) = self.table.lookup(info.dst) else {
            return;
        };
        if let Some(mac) = self.arp.remote_mac(next_hop_ip) {
            if let Some(new_frame) = reencapsulate_ipv4(frame, out_port_mac, mac) {
                if let Some(port) = self.net.interface_by_mac(out_port_mac).map(|i| i.name.clone()) {
                    if let Err(e) = self.net.send(&port, &new_frame) {
                        debug!("transient send failure forwarding on {port}: {e}");
                    }
                }
            }
            return;
        }
        self.arp
            .enqueue(frame.to_vec(), out_port_mac, next_hop_ip, self.clock.now_ms());
    }

    /// Runs until `NetIo::recv` signals shutdown.
    pub fn run(mut self) -> Result<()> {
        loop {
            let now = self.clock.now_ms();
            let actions = self.arp.pump(now);
            self.apply_pump_actions(actions);

            match self.net.recv(RECV_TIMEOUT)? {
                RecvOutcome::Shutdown => return Ok(()),
                RecvOutcome::Timeout => continue,
                RecvOutcome::Frame { port, frame } => {
                    let Some(eth) = EthernetPacket::new(&frame) else {
                        warn!("dropping an unparseable frame received on {port}");
                        continue;
                    };
                    match classify(&eth) {
                        FrameKind::Arp(info) => {
                            if let Some(reply) = self.arp.handle_arp(&info) {
                                if let Err(e) = self.net.send(&port, &reply) {
                                    debug!("transient send failure replying to ARP on {port}: {e}");
                                }
                            }
                        }
                        FrameKind::Ipv4(info) => self.handle_ipv4(&frame, info),
                        FrameKind::Drm(drm) => {
                            if let Some(in_mac) = self.net.interface_by_name(&port).map(|i| i.mac) {
                                self.table.add_entry(
                                    drm.advertised_prefix(),
                                    drm.advertised_mask(),
                                    Some(drm.next_hop()),
                                    in_mac,
                                    false,
                                );
                            }
                        }
                        FrameKind::Other => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netlab_common::clock::VirtualClock;
    use netlab_common::netio::{Interface, MemoryNetIo};
    use netlab_common::packet::{build_udp_ipv4_frame, Drm};
    use pnet::util::MacAddr;

    fn iface(name: &str, mac_last: u8, ip_last: u8) -> Interface {
        Interface {
            name: name.to_string(),
            mac: MacAddr(0, 0, 0, 0, 0, mac_last),
            ip: Some(Ipv4Addr::new(10, 0, 0, ip_last)),
            netmask: Some(Ipv4Addr::new(255, 255, 255, 0)),
        }
    }

    /// Scenario S4 (spec.md §8): a static route via eth1 triggers an ARP
    /// request on eth1 for an ingress IPv4 frame with no existing cache
    /// entry.
    #[test]
    fn ingress_with_no_arp_entry_enqueues_and_pumps_a_request_on_the_route_port() {
        let net = MemoryNetIo::new(vec![iface("eth0", 1, 1), iface("eth1", 2, 2)]);
        let static_routes = vec![StaticRoute {
            prefix: Ipv4Addr::new(172, 16, 0, 0),
            mask: Ipv4Addr::new(255, 255, 0, 0),
            next_hop: Ipv4Addr::new(10, 0, 0, 254),
            ifname: "eth1".to_string(),
        }];
        let mut router = Router::new(net, VirtualClock::new(0), 5, static_routes);

        let frame = build_udp_ipv4_frame(
            MacAddr(0, 0, 0, 0, 0, 9),
            MacAddr(0, 0, 0, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 9),
            Ipv4Addr::new(172, 16, 254, 123),
            64,
            &[1],
        );
        router.handle_ipv4(&frame, Ipv4Info { src: Ipv4Addr::new(10, 0, 0, 9), dst: Ipv4Addr::new(172, 16, 254, 123), ttl: 64 });

        let actions = router.arp.pump(0);
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], PumpAction::ArpRequest { out_port_mac, .. } if out_port_mac == MacAddr(0, 0, 0, 0, 0, 2)));
    }

    #[test]
    fn dynamic_route_advertisement_overrides_next_hop() {
        let net = MemoryNetIo::new(vec![iface("eth0", 1, 1)]);
        let mut router = Router::new(net, VirtualClock::new(0), 5, vec![]);
        let drm = Drm::new(
            Ipv4Addr::new(172, 16, 0, 0),
            Ipv4Addr::new(255, 255, 0, 0),
            Ipv4Addr::new(192, 168, 1, 2),
        );
        let in_mac = MacAddr(0, 0, 0, 0, 0, 1);
        router
            .table
            .add_entry(drm.advertised_prefix(), drm.advertised_mask(), Some(drm.next_hop()), in_mac, false);
        let (_, next_hop) = router.table.lookup(Ipv4Addr::new(172, 16, 254, 123)).unwrap();
        assert_eq!(next_hop, Ipv4Addr::new(192, 168, 1, 2));
    }

    /// A frame destined for one of the router's own IPs is never forwarded,
    /// static route or not.
    #[test]
    fn ipv4_destined_for_a_local_ip_is_not_forwarded() {
        let net = MemoryNetIo::new(vec![iface("eth0", 1, 1), iface("eth1", 2, 2)]);
        let static_routes = vec![StaticRoute {
            prefix: Ipv4Addr::new(10, 0, 0, 0),
            mask: Ipv4Addr::new(255, 255, 255, 0),
            next_hop: Ipv4Addr::new(10, 0, 0, 254),
            ifname: "eth1".to_string(),
        }];
        let mut router = Router::new(net, VirtualClock::new(0), 5, static_routes);
        let frame = build_udp_ipv4_frame(
            MacAddr(0, 0, 0, 0, 0, 9),
            MacAddr(0, 0, 0, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 9),
            Ipv4Addr::new(10, 0, 0, 1),
            64,
            &[1],
        );
        router.handle_ipv4(
            &frame,
            Ipv4Info {
                src: Ipv4Addr::new(10, 0, 0, 9),
                dst: Ipv4Addr::new(10, 0, 0, 1),
                ttl: 64,
            },
        );
        assert!(router.arp.pump(0).is_empty());
    }
}
