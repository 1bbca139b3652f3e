//! Longest-prefix-match IPv4 forwarding table (spec.md §4.4). The teacher
//! has no L3 concept at all, so this is built fresh in the teacher's idiom —
//! a bounded FIFO keyed collection mirroring `netlab_switch::fib::Fib`'s
//! shape — grounded on
//! `original_source/lab2/myrouter_part3.py::ForwardingTable`.

use pnet::util::MacAddr;
use std::net::Ipv4Addr;

pub const DEFAULT_CAPACITY: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cidr {
    network: Ipv4Addr,
    mask: Ipv4Addr,
}

impl Cidr {
    fn new(prefix: Ipv4Addr, mask: Ipv4Addr) -> Self {
        let network = u32::from(prefix) & u32::from(mask);
        Cidr {
            network: Ipv4Addr::from(network),
            mask,
        }
    }

    fn prefix_len(&self) -> u32 {
        u32::from(self.mask).count_ones()
    }

    fn contains(&self, ip: Ipv4Addr) -> bool {
        (u32::from(ip) & u32::from(self.mask)) == u32::from(self.network)
    }
}

struct RouteEntry {
    cidr: Cidr,
    next_hop: Option<Ipv4Addr>,
    out_port_mac: MacAddr,
    is_local: bool,
}

/// Insertion-order-preserving collection of routes plus a small FIFO ring
/// over the non-local ones. Capacity is small (default 5) so `Vec::remove`
/// on eviction is fine; it keeps the temporal order the LPM tie-break
/// depends on intact, unlike a `swap_remove`.
pub struct ForwardingTable {
    capacity: usize,
    entries: Vec<RouteEntry>,
    ring: Vec<Option<Cidr>>,
    cursor: usize,
}

impl ForwardingTable {
    pub fn new(capacity: usize) -> Self {
        ForwardingTable {
            capacity,
            entries: Vec::new(),
            ring: vec![None; capacity],
            cursor: 0,
        }
    }

    /// spec.md §4.4 `add_entry`.
    pub fn add_entry(
        &mut self,
        prefix: Ipv4Addr,
        mask: Ipv4Addr,
        next_hop: Option<Ipv4Addr>,
        out_port_mac: MacAddr,
        is_local: bool,
    ) {
        let cidr = Cidr::new(prefix, mask);
        if let Some(existing) = self.entries.iter_mut().find(|e| e.cidr == cidr) {
            existing.next_hop = next_hop;
            existing.out_port_mac = out_port_mac;
            return;
        }

        if !is_local {
            if let Some(evicted) = self.ring[self.cursor].take() {
                if let Some(pos) = self.entries.iter().position(|e| e.cidr == evicted) {
                    self.entries.remove(pos);
                }
            }
            self.ring[self.cursor] = Some(cidr);
            self.cursor = (self.cursor + 1) % self.capacity;
        }

        self.entries.push(RouteEntry {
            cidr,
            next_hop,
            out_port_mac,
            is_local,
        });
    }

    /// spec.md §4.4 `lookup`. Ties on prefix length are broken in favor of
    /// the later insertion by scanning in insertion order and only
    /// replacing the running best on a `>=` comparison.
    pub fn lookup(&self, dst_ip: Ipv4Addr) -> Option<(MacAddr, Ipv4Addr)> {
        let mut best: Option<&RouteEntry> = None;
        for entry in &self.entries {
            if !entry.cidr.contains(dst_ip) {
                continue;
            }
            best = match best {
                None => Some(entry),
                Some(b) if entry.cidr.prefix_len() >= b.cidr.prefix_len() => Some(entry),
                other => other,
            };
        }
        let entry = best?;
        let next_hop = entry.next_hop.unwrap_or(dst_ip);
        Some((entry.out_port_mac, next_hop))
    }
}
