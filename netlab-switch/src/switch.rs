//! Switch event loop (spec.md §4.3), generalizing the teacher's
//! `EthRouter::run`/`fwd_client` (`src/stp/eth.rs`) over the shared
//! `NetIo`/`Clock` abstractions instead of owning `pnet` channels directly,
//! so it can run against `MemoryNetIo` + `VirtualClock` in tests.

use anyhow::Result;
use log::{debug, warn};
use netlab_common::clock::Clock;
use netlab_common::netio::{NetIo, RecvOutcome};
use netlab_common::packet::{is_slow_protocol, Bpdu, BpduBuf};
use pnet::packet::ethernet::EthernetPacket;
use pnet::packet::Packet;
use pnet::util::MacAddr;
use std::time::Duration;

use crate::fib::Fib;
use crate::stp::StpEngine;

const RECV_TIMEOUT: Duration = Duration::from_secs(1);

pub struct Switch<N, C> {
    net: N,
    clock: C,
    fib: Fib,
    stp: StpEngine,
    bpdu_buf: BpduBuf,
    interface_macs: Vec<MacAddr>,
}

impl<N: NetIo, C: Clock> Switch<N, C> {
    pub fn new(net: N, clock: C, fib_capacity: usize) -> Self {
        let interface_macs: Vec<MacAddr> = net.interfaces().iter().map(|i| i.mac).collect();
        let my_id = *interface_macs
            .iter()
            .min()
            .expect("NetIo always exposes at least one interface");
        Switch {
            net,
            clock,
            fib: Fib::new(fib_capacity),
            stp: StpEngine::new(my_id),
            bpdu_buf: Bpdu::make_buf(),
            interface_macs,
        }
    }

    fn is_own_mac(&self, mac: MacAddr) -> bool {
        self.interface_macs.contains(&mac)
    }

    fn port_names(&self) -> Vec<String> {
        self.net.interfaces().iter().map(|i| i.name.clone()).collect()
    }

    /// Broadcasts `bpdu` on every interface, skipping `except` when set.
    fn broadcast_bpdu(&mut self, bpdu: Bpdu, except: Option<&str>) {
        for port in self.port_names() {
            if Some(port.as_str()) == except {
                continue;
            }
            let Some(src_mac) = self.net.interface_by_name(&port).map(|i| i.mac) else {
                continue;
            };
            let bytes = bpdu.write_frame(&mut self.bpdu_buf, src_mac).packet().to_vec();
            if let Err(e) = self.net.send(&port, &bytes) {
                debug!("transient send failure broadcasting a BPDU on {port}: {e}");
            }
        }
    }

    /// spec.md §4.3 step 2: learn, drop-if-mine, forward-or-flood under the
    /// blocked-port set.
    fn forward_data(&mut self, in_port: &str, eth: &EthernetPacket) {
        let src = eth.get_source();
        let dst = eth.get_destination();
        self.fib.update(src, in_port);

        if self.is_own_mac(dst) {
            return;
        }

        if let Some(out_port) = self.fib.lookup(dst).map(str::to_string) {
            if let Err(e) = self.net.send(&out_port, eth.packet()) {
                debug!("transient send failure forwarding on {out_port}: {e}");
            }
            return;
        }

        for port in self.port_names() {
            if port == in_port || self.stp.is_blocked(&port) {
                continue;
            }
            if let Err(e) = self.net.send(&port, eth.packet()) {
                debug!("transient send failure flooding on {port}: {e}");
            }
        }
    }

    /// Runs until `NetIo::recv` signals shutdown (spec.md §5 cooperative
    /// cancellation).
    pub fn run(mut self) -> Result<()> {
        loop {
            if let Some(bpdu) = self.stp.emit(self.clock.now_ms()) {
                self.broadcast_bpdu(bpdu, None);
            }

            match self.net.recv(RECV_TIMEOUT)? {
                RecvOutcome::Shutdown => return Ok(()),
                RecvOutcome::Timeout => continue,
                RecvOutcome::Frame { port, frame } => {
                    let Some(eth) = EthernetPacket::new(&frame) else {
                        warn!("dropping an unparseable frame received on {port}");
                        continue;
                    };

                    if is_slow_protocol(&eth) {
                        let Some(bpdu) = Bpdu::from_payload(eth.payload()) else {
                            warn!("dropping a malformed BPDU received on {port}");
                            continue;
                        };
                        let now = self.clock.now_ms();
                        if let Some(fwd) = self.stp.handle(
                            bpdu.root_id(),
                            bpdu.hops_to_root(),
                            bpdu.switch_id(),
                            &port,
                            now,
                        ) {
                            self.broadcast_bpdu(fwd, Some(&port));
                        }
                        continue;
                    }

                    self.forward_data(&port, &eth);
                }
            }
        }
    }
}
