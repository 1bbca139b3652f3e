//! Reliable receiver (spec.md §4.8), grounded on
//! `original_source/lab3/blastee.py`'s `Blastee.ack`. Stateless: every
//! frame is acked by echoing its sequence number back to whoever sent it,
//! rather than to a hardcoded blaster address — the frame's own source
//! IP/MAC already name the right destination (decision recorded in
//! DESIGN.md).

use anyhow::Result;
use log::{debug, info};
use netlab_common::netio::{NetIo, RecvOutcome};
use netlab_common::packet::{build_udp_ipv4_frame, decode_seq, encode_ack_payload};
use pnet::packet::ethernet::EthernetPacket;
use std::time::Duration;

const RECV_TIMEOUT: Duration = Duration::from_secs(1);

pub struct Receiver<N> {
    net: N,
    port: String,
}

impl<N: NetIo> Receiver<N> {
    pub fn new(net: N) -> Result<Self> {
        let ifaces = net.interfaces();
        if ifaces.len() != 1 {
            anyhow::bail!("blastee must have exactly one interface, found {}", ifaces.len());
        }
        let port = ifaces[0].name.clone();
        Ok(Receiver { net, port })
    }

    fn ack(&mut self, frame: &[u8]) {
        let Some(eth) = EthernetPacket::new(frame) else {
            return;
        };
        let Some(info) = netlab_common::packet::parse_ipv4(&eth) else {
            return;
        };
        let Some(payload) = netlab_common::packet::parse_udp_payload(&eth) else {
            return;
        };
        let Some(seq) = decode_seq(&payload) else {
            debug!("ignored a udp frame with no decodable sequence number");
            return;
        };
        info!("got packet seq_num = {seq}");

        let my_mac = match self.net.interface_by_name(&self.port) {
            Some(iface) => iface.mac,
            None => return,
        };
        let my_ip = self.net.interface_by_name(&self.port).and_then(|i| i.ip);
        let Some(my_ip) = my_ip else { return };

        let reply = build_udp_ipv4_frame(
            my_mac,
            eth.get_source(),
            my_ip,
            info.src,
            64,
            &encode_ack_payload(seq),
        );
        if let Err(e) = self.net.send(&self.port, &reply) {
            debug!("transient send failure acking seq {seq}: {e}");
        }
    }

    pub fn run(mut self) -> Result<()> {
        loop {
            match self.net.recv(RECV_TIMEOUT)? {
                RecvOutcome::Timeout => continue,
                RecvOutcome::Shutdown => return Ok(()),
                RecvOutcome::Frame { frame, .. } => self.ack(&frame),
            }
        }
    }
}
