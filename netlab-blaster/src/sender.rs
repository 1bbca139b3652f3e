//! Reliable sender (spec.md §4.7), grounded line-for-line on
//! `original_source/lab3/blaster.py`'s `Blaster` class, rebuilt around the
//! workspace's `NetIo`/`Clock` abstractions instead of switchyard's `net`.

use anyhow::Result;
use log::{debug, info};
use netlab_common::clock::Clock;
use netlab_common::config::BlasterParams;
use netlab_common::netio::{NetIo, RecvOutcome};
use netlab_common::packet::{build_udp_ipv4_frame, decode_seq, encode_blast_payload};
use pnet::util::MacAddr;
use std::time::Duration;

/// `40:00:00:00:00:01`, the blastee's fixed MAC in the lab topology —
/// preserved verbatim from `blaster.py`'s `target_ethaddr`.
const TARGET_ETHADDR: MacAddr = MacAddr(0x40, 0x00, 0x00, 0x00, 0x00, 0x01);

struct WindowEntry {
    acked: bool,
    ts_initial: u64,
    ts_last: u64,
}

#[derive(Default)]
struct Metrics {
    first_sent_ms: Option<u64>,
    last_ack_ms: Option<u64>,
    total_retrans: u64,
    num_timeouts: u64,
    total_payload_bytes: u64,
    min_rtt_ms: Option<f64>,
    max_rtt_ms: Option<f64>,
}

pub struct Sender<N, C> {
    net: N,
    clock: C,
    params: BlasterParams,
    window: Vec<Option<WindowEntry>>,
    lhs: u32,
    rhs: u32,
    timeout_ms: f64,
    est_rtt_ms: f64,
    metrics: Metrics,
    port: String,
    src_mac: MacAddr,
}

impl<N: NetIo, C: Clock> Sender<N, C> {
    /// spec.md §4.7: the blaster owns exactly one interface, mirroring
    /// `blaster.py`'s startup assertion.
    pub fn new(net: N, clock: C, params: BlasterParams) -> Result<Self> {
        let ifaces = net.interfaces();
        if ifaces.len() != 1 {
            anyhow::bail!("blaster must have exactly one interface, found {}", ifaces.len());
        }
        let port = ifaces[0].name.clone();
        let src_mac = ifaces[0].mac;
        let window_size = params.window_size as usize;
        let timeout_ms = 2.0 * params.est_rtt_ms;
        Ok(Sender {
            net,
            clock,
            est_rtt_ms: params.est_rtt_ms,
            timeout_ms,
            params,
            window: (0..window_size).map(|_| None).collect(),
            lhs: 1,
            rhs: 1,
            metrics: Metrics::default(),
            port,
            src_mac,
        })
    }

    fn should_stop(&self) -> bool {
        self.rhs > self.params.total_packets && self.lhs == self.rhs
    }

    fn slot(&self, seq: u32) -> usize {
        (seq % self.params.window_size) as usize
    }

    fn send_seq(&mut self, seq: u32) {
        let src_ip = self
            .net
            .interface_by_name(&self.port)
            .and_then(|i| i.ip)
            .unwrap_or(std::net::Ipv4Addr::UNSPECIFIED);
        let payload = encode_blast_payload(seq, self.params.length_per_blast);
        let frame = build_udp_ipv4_frame(
            self.src_mac,
            TARGET_ETHADDR,
            src_ip,
            self.params.blastee_ip,
            64,
            &payload,
        );
        if let Err(e) = self.net.send(&self.port, &frame) {
            debug!("transient send failure blasting seq {seq}: {e}");
            return;
        }
        self.metrics.total_payload_bytes += self.params.length_per_blast as u64;
        if self.metrics.first_sent_ms.is_none() {
            self.metrics.first_sent_ms = Some(self.clock.now_ms());
        }
    }

    /// spec.md §4.7 step 2. `ts_initial` is deliberately left untouched on
    /// retransmit (see the Design Note this mirrors) — only `ts_last` moves.
    fn retransmit_sweep(&mut self) {
        let now = self.clock.now_ms();
        for seq in self.lhs..self.rhs {
            let idx = self.slot(seq);
            let due = match &self.window[idx] {
                Some(entry) if !entry.acked => {
                    now.saturating_sub(entry.ts_last) as f64 > self.timeout_ms
                }
                _ => false,
            };
            if !due {
                continue;
            }
            self.send_seq(seq);
            if let Some(entry) = &mut self.window[idx] {
                entry.ts_last = now;
            }
            self.metrics.total_retrans += 1;
            self.metrics.num_timeouts += 1;
            debug!("retransmitted seq {seq}");
        }
    }

    /// spec.md §4.7 step 3.
    fn blast(&mut self) {
        while self.params.window_size as u32 > self.rhs.saturating_sub(self.lhs) && self.rhs <= self.params.total_packets {
            let seq = self.rhs;
            self.send_seq(seq);
            let now = self.clock.now_ms();
            let idx = self.slot(seq);
            self.window[idx] = Some(WindowEntry {
                acked: false,
                ts_initial: now,
                ts_last: now,
            });
            self.rhs += 1;
        }
    }

    /// spec.md §4.7 step 4.
    fn process_ack(&mut self, seq: u32) {
        if seq < self.lhs || seq >= self.rhs {
            debug!("ignored out-of-range ack for seq {seq}");
            return;
        }
        let now = self.clock.now_ms();
        let idx = self.slot(seq);
        let Some(entry) = &mut self.window[idx] else {
            return;
        };
        if entry.acked {
            return;
        }
        entry.acked = true;
        let rtt_ms = now.saturating_sub(entry.ts_initial) as f64;
        self.metrics.last_ack_ms = Some(now);
        self.metrics.min_rtt_ms = Some(self.metrics.min_rtt_ms.map_or(rtt_ms, |m| m.min(rtt_ms)));
        self.metrics.max_rtt_ms = Some(self.metrics.max_rtt_ms.map_or(rtt_ms, |m| m.max(rtt_ms)));
        self.est_rtt_ms = (1.0 - self.params.ewma_alpha) * self.est_rtt_ms + self.params.ewma_alpha * rtt_ms;
        self.timeout_ms = 2.0 * self.est_rtt_ms;
    }

    /// spec.md §4.7 step 5.
    fn advance_lhs(&mut self) {
        while self.lhs < self.rhs {
            let idx = self.slot(self.lhs);
            match &self.window[idx] {
                Some(entry) if entry.acked => self.lhs += 1,
                _ => break,
            }
        }
    }

    pub fn run(mut self) -> Result<()> {
        let recv_timeout = Duration::from_millis(self.params.recv_timeout_ms);
        loop {
            if self.should_stop() {
                info!(
                    "stopping - blasted and acked {} total packets",
                    self.params.total_packets
                );
                self.print_metrics();
                return Ok(());
            }

            self.retransmit_sweep();
            self.blast();

            match self.net.recv(recv_timeout)? {
                RecvOutcome::Timeout => continue,
                RecvOutcome::Shutdown => return Ok(()),
                RecvOutcome::Frame { frame, .. } => {
                    let Some(seq) = extract_ack_seq(&frame) else {
                        debug!("ignored a non-ack frame");
                        continue;
                    };
                    self.process_ack(seq);
                    self.advance_lhs();
                }
            }
        }
    }

    fn print_metrics(&self) {
        let total_tx_seconds = match (self.metrics.first_sent_ms, self.metrics.last_ack_ms) {
            (Some(first), Some(last)) => last.saturating_sub(first) as f64 / 1000.0,
            _ => 0.0,
        };
        println!("Total TX time (s): {total_tx_seconds}");
        println!("Number of reTX: {}", self.metrics.total_retrans);
        println!("Number of coarse TOs: {}", self.metrics.num_timeouts);
        if total_tx_seconds > 0.0 {
            println!(
                "Throughput (Bps): {}",
                self.metrics.total_payload_bytes as f64 / total_tx_seconds
            );
            println!(
                "Goodput (Bps): {}",
                (self.params.total_packets as f64 * self.params.length_per_blast as f64) / total_tx_seconds
            );
        } else {
            println!("Throughput (Bps): 0");
            println!("Goodput (Bps): 0");
        }
        println!("Final estRTT(ms): {}", self.est_rtt_ms);
        println!("Final TO(ms): {}", self.timeout_ms);
        println!("Min RTT(ms): {:?}", self.metrics.min_rtt_ms);
        println!("Max RTT(ms): {:?}", self.metrics.max_rtt_ms);
    }
}

fn extract_ack_seq(frame: &[u8]) -> Option<u32> {
    use pnet::packet::ethernet::EthernetPacket;
    let eth = EthernetPacket::new(frame)?;
    let info = netlab_common::packet::parse_udp_payload(&eth)?;
    decode_seq(&info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use netlab_common::clock::VirtualClock;
    use netlab_common::netio::{Interface, MemoryNetIo};
    use netlab_common::packet::encode_ack_payload;
    use std::net::Ipv4Addr;

    fn iface() -> Interface {
        Interface {
            name: "eth0".to_string(),
            mac: MacAddr(1, 1, 1, 1, 1, 1),
            ip: Some(Ipv4Addr::new(10, 0, 0, 1)),
            netmask: Some(Ipv4Addr::new(255, 255, 255, 0)),
        }
    }

    fn params() -> BlasterParams {
        BlasterParams {
            blastee_ip: Ipv4Addr::new(10, 0, 0, 2),
            total_packets: 5,
            length_per_blast: 8,
            window_size: 2,
            est_rtt_ms: 100.0,
            recv_timeout_ms: 100,
            ewma_alpha: 0.5,
        }
    }

    fn ack_frame(seq: u32) -> Vec<u8> {
        build_udp_ipv4_frame(
            TARGET_ETHADDR,
            MacAddr(1, 1, 1, 1, 1, 1),
            Ipv4Addr::new(10, 0, 0, 2),
            Ipv4Addr::new(10, 0, 0, 1),
            64,
            &encode_ack_payload(seq),
        )
    }

    /// Window monotonicity (spec.md §8 testable property 5).
    #[test]
    fn blast_never_exceeds_the_window_and_lhs_tracks_acks() {
        let net = MemoryNetIo::new(vec![iface()]);
        let mut sender = Sender::new(net, VirtualClock::new(0), params()).unwrap();
        sender.blast();
        assert_eq!((sender.lhs, sender.rhs), (1, 3));
        assert_eq!(sender.net.sent_on("eth0").len(), 2);

        sender.process_ack(1);
        sender.advance_lhs();
        assert_eq!((sender.lhs, sender.rhs), (2, 3));

        sender.blast();
        assert_eq!((sender.lhs, sender.rhs), (2, 4));
        assert!(sender.rhs - sender.lhs <= sender.params.window_size);
    }

    /// ACK idempotence (spec.md §8 testable property 6).
    #[test]
    fn processing_the_same_ack_twice_is_a_no_op_the_second_time() {
        let net = MemoryNetIo::new(vec![iface()]);
        let mut sender = Sender::new(net, VirtualClock::new(0), params()).unwrap();
        sender.blast();
        sender.process_ack(1);
        let est_after_first = sender.est_rtt_ms;
        sender.process_ack(1);
        assert_eq!(sender.est_rtt_ms, est_after_first);
    }

    #[test]
    fn out_of_range_acks_are_ignored() {
        let net = MemoryNetIo::new(vec![iface()]);
        let mut sender = Sender::new(net, VirtualClock::new(0), params()).unwrap();
        sender.blast();
        sender.process_ack(99);
        assert!(sender.window[sender.slot(1)].as_ref().map_or(true, |e| !e.acked));
    }

    /// Scenario S6 (spec.md §8): a clean run with no loss produces zero
    /// retransmits and leaves `lhs == rhs == N+1`.
    #[test]
    fn clean_run_reaches_completion_with_no_retransmits() {
        let net = MemoryNetIo::new(vec![iface()]);
        let clock = VirtualClock::new(0);
        let mut sender = Sender::new(net, clock, params()).unwrap();

        while !sender.should_stop() {
            sender.retransmit_sweep();
            sender.blast();
            let next_unacked = sender.lhs;
            if next_unacked < sender.rhs {
                sender.net.inject("eth0", ack_frame(next_unacked));
                if let RecvOutcome::Frame { frame, .. } =
                    sender.net.recv(Duration::from_millis(1)).unwrap()
                {
                    let seq = extract_ack_seq(&frame).unwrap();
                    sender.process_ack(seq);
                    sender.advance_lhs();
                }
            } else {
                break;
            }
        }
        assert_eq!(sender.lhs, sender.rhs);
        assert_eq!(sender.metrics.total_retrans, 0);
    }

    #[test]
    fn extract_ack_seq_reads_the_big_endian_sequence_number() {
        let frame = ack_frame(42);
        assert_eq!(extract_ack_seq(&frame), Some(42));
    }
}
