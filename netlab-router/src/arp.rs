//! ARP resolver (spec.md §4.5): local/remote IP→MAC caches, a pending-packet
//! queue, and per-target-IP retry coalescing. Grounded on
//! `original_source/lab2/myrouter_part3.py`'s `ARPContext`/
//! `enqueue_packet`/`dequeue_packets`, rebuilt on `pnet::packet::arp`.

use netlab_common::netio::Interface;
use netlab_common::packet::{build_arp_reply, build_arp_request, reencapsulate_ipv4, ArpInfo};
use pnet::packet::arp::ArpOperations;
use pnet::util::MacAddr;
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;

const RETRY_INTERVAL_MS: u64 = 1_000;
const MAX_RETRIES: u32 = 3;

struct PendingEntry {
    packet: Vec<u8>,
    out_port_mac: MacAddr,
    target_ip: Ipv4Addr,
}

struct RetryState {
    arps_sent: u32,
    last_arp_time: u64,
}

/// An action `pump` wants performed; both variants are handled identically
/// by the caller (send `frame` on the interface owning `out_port_mac`), but
/// are kept distinct for logging/observability.
#[derive(Debug)]
pub enum PumpAction {
    Forward { out_port_mac: MacAddr, frame: Vec<u8> },
    ArpRequest { out_port_mac: MacAddr, frame: Vec<u8> },
}

pub struct ArpResolver {
    local_cache: HashMap<Ipv4Addr, MacAddr>,
    local_ip_of_mac: HashMap<MacAddr, Ipv4Addr>,
    remote_cache: HashMap<Ipv4Addr, MacAddr>,
    pending: Vec<PendingEntry>,
    retry_index: HashMap<Ipv4Addr, RetryState>,
}

impl ArpResolver {
    pub fn new(interfaces: &[Interface]) -> Self {
        let mut local_cache = HashMap::new();
        let mut local_ip_of_mac = HashMap::new();
        for iface in interfaces {
            if let Some(ip) = iface.ip {
                local_cache.insert(ip, iface.mac);
                local_ip_of_mac.insert(iface.mac, ip);
            }
        }
        ArpResolver {
            local_cache,
            local_ip_of_mac,
            remote_cache: HashMap::new(),
            pending: Vec::new(),
            retry_index: HashMap::new(),
        }
    }

    pub fn remote_mac(&self, ip: Ipv4Addr) -> Option<MacAddr> {
        self.remote_cache.get(&ip).copied()
    }

    /// spec.md §4.5 `handle_arp`. Returns the reply frame to send back on
    /// the ingress port, if this was a request for one of our own IPs.
    pub fn handle_arp(&mut self, info: &ArpInfo) -> Option<Vec<u8>> {
        if info.operation == ArpOperations::Request {
            let our_mac = *self.local_cache.get(&info.target_ip)?;
            return Some(build_arp_reply(
                our_mac,
                info.target_ip,
                info.sender_mac,
                info.sender_ip,
            ));
        }
        if info.operation == ArpOperations::Reply {
            self.remote_cache.insert(info.sender_ip, info.sender_mac);
        }
        None
    }

    /// spec.md §4.5 `enqueue`. The first pump for a fresh target IP fires
    /// immediately (`last_arp_time = now - 2s`).
    pub fn enqueue(&mut self, packet: Vec<u8>, out_port_mac: MacAddr, target_ip: Ipv4Addr, now_ms: u64) {
        self.pending.push(PendingEntry {
            packet,
            out_port_mac,
            target_ip,
        });
        self.retry_index.entry(target_ip).or_insert(RetryState {
            arps_sent: 0,
            last_arp_time: now_ms.saturating_sub(2_000),
        });
    }

    /// spec.md §4.5 `pump`. Fires at most one coalesced ARP request per
    /// distinct pending target IP per tick, then resolves/drops/keeps each
    /// queued packet against the (possibly just-updated) cache and retry
    /// state.
    pub fn pump(&mut self, now_ms: u64) -> Vec<PumpAction> {
        let mut actions = Vec::new();

        let targets: HashSet<Ipv4Addr> = self.pending.iter().map(|e| e.target_ip).collect();
        for target_ip in targets {
            if self.remote_cache.contains_key(&target_ip) {
                continue;
            }
            let due = {
                let retry = self.retry_index.entry(target_ip).or_insert(RetryState {
                    arps_sent: 0,
                    last_arp_time: now_ms.saturating_sub(2_000),
                });
                retry.arps_sent < MAX_RETRIES
                    && now_ms.saturating_sub(retry.last_arp_time) >= RETRY_INTERVAL_MS
            };
            if !due {
                continue;
            }
            let Some(out_port_mac) = self
                .pending
                .iter()
                .find(|e| e.target_ip == target_ip)
                .map(|e| e.out_port_mac)
            else {
                continue;
            };
            let Some(&src_ip) = self.local_ip_of_mac.get(&out_port_mac) else {
                continue;
            };
            let frame = build_arp_request(out_port_mac, src_ip, target_ip);
            let retry = self
                .retry_index
                .get_mut(&target_ip)
                .expect("retry state inserted above");
            retry.arps_sent += 1;
            retry.last_arp_time = now_ms;
            actions.push(PumpAction::ArpRequest { out_port_mac, frame });
        }

        let mut remaining = Vec::with_capacity(self.pending.len());
        for entry in self.pending.drain(..) {
            if let Some(&mac) = self.remote_cache.get(&entry.target_ip) {
                if let Some(frame) = reencapsulate_ipv4(&entry.packet, entry.out_port_mac, mac) {
                    actions.push(PumpAction::Forward {
                        out_port_mac: entry.out_port_mac,
                        frame,
                    });
                }
                continue;
            }
            let exhausted = self
                .retry_index
                .get(&entry.target_ip)
                .is_some_and(|r| r.arps_sent >= MAX_RETRIES);
            if exhausted {
                continue;
            }
            remaining.push(entry);
        }
        self.pending = remaining;

        let live: HashSet<Ipv4Addr> = self
            .pending
            .iter()
            .map(|e| e.target_ip)
            .chain(self.remote_cache.keys().copied())
            .collect();
        self.retry_index.retain(|ip, _| live.contains(ip));

        actions
    }
}
