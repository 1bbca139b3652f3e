//! Spanning-tree root election (spec.md §4.2). Grounded on the teacher's
//! `EthRouter::run`/`reset_root` BPDU-comparison logic (`src/stp/eth.rs`),
//! generalized from the teacher's cost-only, two-state model to the full
//! `{root_id, hops_from_root, root_interface, root_switch_id}` context
//! spec.md §3 requires. Unlike the teacher, this engine never touches
//! `NetIo` directly — it returns the BPDU a caller should broadcast, so it
//! can be driven by a virtual clock and asserted against in isolation
//! (spec.md §9's "shared mutable context objects... no aliasing").

use netlab_common::packet::Bpdu;
use pnet::util::MacAddr;
use std::collections::HashSet;

const BPDU_RESEND_MS: u64 = 2_000;
const ROOT_TIMEOUT_MS: u64 = 10_000;

pub struct StpEngine {
    my_id: MacAddr,
    root_id: MacAddr,
    hops_from_root: u8,
    root_interface: Option<String>,
    root_switch_id: Option<MacAddr>,
    blocked_interfaces: HashSet<String>,
    time_last_tx: Option<u64>,
    time_last_rx: Option<u64>,
}

impl StpEngine {
    pub fn new(my_id: MacAddr) -> Self {
        StpEngine {
            my_id,
            root_id: my_id,
            hops_from_root: 0,
            root_interface: None,
            root_switch_id: None,
            blocked_interfaces: HashSet::new(),
            time_last_tx: None,
            time_last_rx: None,
        }
    }

    pub fn my_id(&self) -> MacAddr {
        self.my_id
    }

    pub fn root_id(&self) -> MacAddr {
        self.root_id
    }

    pub fn am_root(&self) -> bool {
        self.root_id == self.my_id
    }

    pub fn is_blocked(&self, port: &str) -> bool {
        self.blocked_interfaces.contains(port)
    }

    pub fn blocked_interfaces(&self) -> impl Iterator<Item = &str> {
        self.blocked_interfaces.iter().map(String::as_str)
    }

    /// spec.md §4.2 periodic emission. Returns the BPDU to broadcast on
    /// every interface, if one is due this tick.
    pub fn emit(&mut self, now_ms: u64) -> Option<Bpdu> {
        if self.am_root() {
            let due = self
                .time_last_tx
                .map_or(true, |t| now_ms.saturating_sub(t) >= BPDU_RESEND_MS);
            if !due {
                return None;
            }
            self.time_last_tx = Some(now_ms);
            return Some(Bpdu::new(self.my_id, 0, self.my_id));
        }

        let stale = self
            .time_last_rx
            .map_or(true, |t| now_ms.saturating_sub(t) >= ROOT_TIMEOUT_MS);
        if stale {
            self.blocked_interfaces.clear();
            self.root_id = self.my_id;
            self.hops_from_root = 0;
            self.root_interface = None;
            self.root_switch_id = None;
        }
        None
    }

    /// spec.md §4.2 BPDU reception. Returns the BPDU to forward out every
    /// interface except `in_port`, if the advertisement was accepted.
    /// Blocking is a no-op when self-rooted (spec.md §3): the root never
    /// blocks a port, mirroring
    /// `examples/original_source/lab1/myswitch_stp.py`'s
    /// `SpanningTreeContext.block`'s `if self.am_root(): return` guard.
    pub fn handle(
        &mut self,
        adv_root: MacAddr,
        adv_hops: u8,
        adv_switch: MacAddr,
        in_port: &str,
        now_ms: u64,
    ) -> Option<Bpdu> {
        if self.am_root() {
            return None;
        }
        self.time_last_rx = Some(now_ms);
        let adv_hops = adv_hops.saturating_add(1);

        let refresh_or_better =
            self.root_interface.as_deref() == Some(in_port) || adv_root < self.root_id;
        if refresh_or_better {
            return Some(self.accept(adv_root, adv_hops, adv_switch, in_port));
        }

        if adv_root > self.my_id {
            self.blocked_interfaces.remove(in_port);
            return None;
        }

        debug_assert_eq!(adv_root, self.root_id, "only the equal-root case remains");
        let better = adv_hops < self.hops_from_root
            || (adv_hops == self.hops_from_root
                && self.root_switch_id.map_or(true, |id| id > adv_switch));
        if better {
            if let Some(prev) = self.root_interface.clone() {
                if prev != in_port {
                    self.blocked_interfaces.insert(prev);
                }
            }
            return Some(self.accept(adv_root, adv_hops, adv_switch, in_port));
        }
        self.blocked_interfaces.insert(in_port.to_string());
        None
    }

    fn accept(&mut self, adv_root: MacAddr, adv_hops: u8, adv_switch: MacAddr, in_port: &str) -> Bpdu {
        self.root_id = adv_root;
        self.root_interface = Some(in_port.to_string());
        self.blocked_interfaces.remove(in_port);
        self.root_switch_id = Some(adv_switch);
        self.hops_from_root = adv_hops;
        Bpdu::new(adv_root, adv_hops, self.my_id)
    }
}
