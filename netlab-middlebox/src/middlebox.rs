//! Lossy/delaying relay between blaster and blastee (spec.md §4.9),
//! grounded on `original_source/lab3/middlebox.py`. `rand`/`rand_distr`
//! realize the seeded Bernoulli drop and Gaussian delay the original gets
//! from `random.seed`/`random.randrange`/`random.gauss`.

use anyhow::Result;
use log::debug;
use netlab_common::config::MiddleboxParams;
use netlab_common::netio::{NetIo, RecvOutcome};
use netlab_common::packet::reencapsulate_ipv4;
use pnet::packet::ethernet::EthernetPacket;
use pnet::util::MacAddr;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::thread;
use std::time::Duration;

/// `10:00:00:00:00:01`, the blaster's fixed MAC in the lab topology.
const BLASTER_ETHADDR: MacAddr = MacAddr(0x10, 0x00, 0x00, 0x00, 0x00, 0x01);
/// `20:00:00:00:00:01`, the blastee's fixed MAC in the lab topology.
const BLASTEE_ETHADDR: MacAddr = MacAddr(0x20, 0x00, 0x00, 0x00, 0x00, 0x01);

const RECV_TIMEOUT: Duration = Duration::from_secs(1);

pub struct Middlebox<N> {
    net: N,
    blaster_port: String,
    blastee_port: String,
    params: MiddleboxParams,
    rng: StdRng,
}

impl<N: NetIo> Middlebox<N> {
    pub fn new(net: N, blaster_port: String, blastee_port: String, params: MiddleboxParams) -> Self {
        Middlebox {
            net,
            blaster_port,
            blastee_port,
            params,
            rng: StdRng::seed_from_u64(params.seed),
        }
    }

    fn is_ipv4_droppable(frame: &[u8]) -> bool {
        let Some(eth) = EthernetPacket::new(frame) else {
            return true;
        };
        match netlab_common::packet::parse_ipv4(&eth) {
            Some(info) => info.ttl <= 1,
            None => true,
        }
    }

    /// spec.md §4.9: Bernoulli drop at `p` percent.
    fn should_drop(&mut self) -> bool {
        self.rng.gen_range(0..100) < self.params.drop_percent as u32
    }

    /// spec.md §4.9: `max(0, Normal(dm, dstd))` ms.
    fn sample_delay_ms(&mut self) -> f64 {
        let normal = Normal::new(self.params.delay_mean_ms, self.params.delay_std_ms.max(0.0))
            .unwrap_or_else(|_| Normal::new(self.params.delay_mean_ms, 0.0).expect("zero std is always valid"));
        normal.sample(&mut self.rng).max(0.0)
    }

    fn forward_from_blaster(&mut self, frame: &[u8]) {
        if self.should_drop() {
            debug!("dropping a blaster-facing packet per the configured drop rate");
            return;
        }
        let delay_ms = self.sample_delay_ms();
        if delay_ms > 0.0 {
            thread::sleep(Duration::from_millis(delay_ms as u64));
        }
        let Some(out_mac) = self.net.interface_by_name(&self.blastee_port).map(|i| i.mac) else {
            return;
        };
        if let Some(out_frame) = reencapsulate_ipv4(frame, out_mac, BLASTEE_ETHADDR) {
            if let Err(e) = self.net.send(&self.blastee_port, &out_frame) {
                debug!("transient send failure forwarding to blastee: {e}");
            }
        }
    }

    /// ACKs are never dropped or delayed (spec.md §4.9).
    fn forward_from_blastee(&mut self, frame: &[u8]) {
        let Some(out_mac) = self.net.interface_by_name(&self.blaster_port).map(|i| i.mac) else {
            return;
        };
        if let Some(out_frame) = reencapsulate_ipv4(frame, out_mac, BLASTER_ETHADDR) {
            if let Err(e) = self.net.send(&self.blaster_port, &out_frame) {
                debug!("transient send failure forwarding to blaster: {e}");
            }
        }
    }

    pub fn run(mut self) -> Result<()> {
        loop {
            match self.net.recv(RECV_TIMEOUT)? {
                RecvOutcome::Timeout => continue,
                RecvOutcome::Shutdown => return Ok(()),
                RecvOutcome::Frame { port, frame } => {
                    if Self::is_ipv4_droppable(&frame) {
                        debug!("dropping a non-IPv4 or expired-TTL frame on {port}");
                        continue;
                    }
                    if port == self.blaster_port {
                        self.forward_from_blaster(&frame);
                    } else if port == self.blastee_port {
                        self.forward_from_blastee(&frame);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netlab_common::netio::{Interface, MemoryNetIo};
    use netlab_common::packet::build_udp_ipv4_frame;
    use std::net::Ipv4Addr;

    fn net() -> MemoryNetIo {
        MemoryNetIo::new(vec![
            Interface {
                name: "eth0".to_string(),
                mac: MacAddr(9, 0, 0, 0, 0, 1),
                ip: Some(Ipv4Addr::new(10, 0, 0, 1)),
                netmask: Some(Ipv4Addr::new(255, 255, 255, 0)),
            },
            Interface {
                name: "eth1".to_string(),
                mac: MacAddr(9, 0, 0, 0, 0, 2),
                ip: Some(Ipv4Addr::new(10, 0, 0, 2)),
                netmask: Some(Ipv4Addr::new(255, 255, 255, 0)),
            },
        ])
    }

    fn no_loss_params() -> MiddleboxParams {
        MiddleboxParams {
            seed: 42,
            drop_percent: 0,
            delay_mean_ms: 0.0,
            delay_std_ms: 0.0,
        }
    }

    /// Testable property 8 (spec.md §8): TTL <= 1 is always dropped.
    #[test]
    fn ttl_one_frame_is_dropped_never_forwarded() {
        let mut mbox = Middlebox::new(net(), "eth0".to_string(), "eth1".to_string(), no_loss_params());
        let frame = build_udp_ipv4_frame(
            MacAddr(1, 1, 1, 1, 1, 1),
            MacAddr(9, 0, 0, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 9),
            Ipv4Addr::new(10, 0, 0, 2),
            1,
            &[1],
        );
        assert!(Middlebox::<MemoryNetIo>::is_ipv4_droppable(&frame));
        mbox.forward_from_blaster(&frame);
        assert!(mbox.net.sent_on("eth1").is_empty());
    }

    #[test]
    fn zero_drop_rate_always_forwards_and_decrements_ttl() {
        let mut mbox = Middlebox::new(net(), "eth0".to_string(), "eth1".to_string(), no_loss_params());
        let frame = build_udp_ipv4_frame(
            MacAddr(1, 1, 1, 1, 1, 1),
            MacAddr(9, 0, 0, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 9),
            Ipv4Addr::new(10, 0, 0, 2),
            64,
            &[1],
        );
        mbox.forward_from_blaster(&frame);
        let sent = &mbox.net.sent_on("eth1")[0];
        let eth = EthernetPacket::new(sent).unwrap();
        assert_eq!(eth.get_destination(), BLASTEE_ETHADDR);
        assert_eq!(eth.get_source(), MacAddr(9, 0, 0, 0, 0, 2));
        let info = netlab_common::packet::parse_ipv4(&eth).unwrap();
        assert_eq!(info.ttl, 63);
    }

    /// Full drop rate (100%) always drops blaster-facing traffic.
    #[test]
    fn full_drop_rate_always_drops() {
        let params = MiddleboxParams {
            drop_percent: 100,
            ..no_loss_params()
        };
        let mut mbox = Middlebox::new(net(), "eth0".to_string(), "eth1".to_string(), params);
        let frame = build_udp_ipv4_frame(
            MacAddr(1, 1, 1, 1, 1, 1),
            MacAddr(9, 0, 0, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 9),
            Ipv4Addr::new(10, 0, 0, 2),
            64,
            &[1],
        );
        for _ in 0..20 {
            mbox.forward_from_blaster(&frame);
        }
        assert!(mbox.net.sent_on("eth1").is_empty());
    }

    #[test]
    fn blastee_facing_traffic_is_never_dropped_or_delayed() {
        let params = MiddleboxParams {
            drop_percent: 100,
            ..no_loss_params()
        };
        let mut mbox = Middlebox::new(net(), "eth0".to_string(), "eth1".to_string(), params);
        let frame = build_udp_ipv4_frame(
            MacAddr(2, 2, 2, 2, 2, 2),
            MacAddr(9, 0, 0, 0, 0, 2),
            Ipv4Addr::new(10, 0, 0, 2),
            Ipv4Addr::new(10, 0, 0, 1),
            64,
            &[9],
        );
        mbox.forward_from_blastee(&frame);
        assert_eq!(mbox.net.sent_on("eth0").len(), 1);
        let eth = EthernetPacket::new(&mbox.net.sent_on("eth0")[0]).unwrap();
        assert_eq!(eth.get_destination(), BLASTER_ETHADDR);
    }
}
