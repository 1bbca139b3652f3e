//! The `NetIo` façade (spec.md §6): interface enumeration, timed receive
//! with ingress port, best-effort send. spec.md treats this as "provided"
//! by an external harness; here it's built directly over `pnet::datalink`,
//! generalizing the teacher's single-interface `EthPort` (`src/stp/eth.rs`)
//! into a multi-interface registry any of the five binaries can use. A
//! `MemoryNetIo` test double implements the same trait for deterministic
//! unit tests (spec.md §8).

use anyhow::{bail, Result};
use pnet::datalink::{self, Channel::Ethernet, Config, DataLinkReceiver, DataLinkSender};
use pnet::ipnetwork::IpNetwork;
use pnet::util::MacAddr;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

/// The "interface descriptor" of spec.md §3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub mac: MacAddr,
    pub ip: Option<Ipv4Addr>,
    pub netmask: Option<Ipv4Addr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecvOutcome {
    Frame { port: String, frame: Vec<u8> },
    Timeout,
    Shutdown,
}

pub trait NetIo {
    fn interfaces(&self) -> &[Interface];

    fn interface_by_name(&self, name: &str) -> Option<&Interface> {
        self.interfaces().iter().find(|i| i.name == name)
    }

    fn interface_by_mac(&self, mac: MacAddr) -> Option<&Interface> {
        self.interfaces().iter().find(|i| i.mac == mac)
    }

    /// Blocks up to `timeout` for one frame, round-robining across
    /// interfaces in registration order.
    fn recv(&mut self, timeout: Duration) -> Result<RecvOutcome>;

    /// Best-effort send; failures are reported, never fatal to the caller
    /// (spec.md §7(a)).
    fn send(&mut self, port: &str, frame: &[u8]) -> Result<()>;

    fn request_shutdown(&mut self);
}

struct PortIo {
    tx: Box<dyn DataLinkSender>,
    rx: Box<dyn DataLinkReceiver>,
}

/// Raw-frame I/O over real host interfaces via `pnet::datalink`.
pub struct PnetNetIo {
    interfaces: Vec<Interface>,
    ports: Vec<PortIo>,
    shutdown: bool,
}

fn ipv4_of(ips: &[IpNetwork]) -> (Option<Ipv4Addr>, Option<Ipv4Addr>) {
    for net in ips {
        if let IpNetwork::V4(v4) = net {
            return (Some(v4.ip()), Some(v4.mask()));
        }
    }
    (None, None)
}

impl PnetNetIo {
    /// Discovers interfaces whose name passes `filter` and opens a raw
    /// Ethernet channel on each, mirroring the teacher's
    /// `EthRouter::build` interface-discovery pass (`src/stp/eth.rs`).
    /// `poll_interval` is the channel's read timeout and bounds how
    /// promptly `recv` notices its own deadline or a shutdown request —
    /// it should be no coarser than the finest timer a caller runs (1s for
    /// STP/ARP, `recv_timeout_ms` for the sender; spec.md §5).
    pub fn build(filter: impl Fn(&str) -> bool, poll_interval: Duration) -> Result<Self> {
        let mut interfaces = Vec::new();
        let mut ports = Vec::new();

        for intf in datalink::interfaces().into_iter().filter(|i| filter(&i.name)) {
            let Some(mac) = intf.mac else { continue };
            let cfg = Config {
                read_timeout: Some(poll_interval),
                ..Config::default()
            };
            let Ok(Ethernet(tx, rx)) = datalink::channel(&intf, cfg) else {
                bail!("failed to open an ethernet channel on interface {:?}", intf.name);
            };
            let (ip, netmask) = ipv4_of(&intf.ips);
            interfaces.push(Interface {
                name: intf.name.clone(),
                mac,
                ip,
                netmask,
            });
            ports.push(PortIo { tx, rx });
        }

        if interfaces.is_empty() {
            bail!("no viable ethernet interfaces matched the requested filter");
        }

        Ok(PnetNetIo {
            interfaces,
            ports,
            shutdown: false,
        })
    }
}

impl NetIo for PnetNetIo {
    fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    fn recv(&mut self, timeout: Duration) -> Result<RecvOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.shutdown {
                return Ok(RecvOutcome::Shutdown);
            }
            for (idx, port) in self.ports.iter_mut().enumerate() {
                match port.rx.next() {
                    Ok(bytes) => {
                        return Ok(RecvOutcome::Frame {
                            port: self.interfaces[idx].name.clone(),
                            frame: bytes.to_vec(),
                        });
                    }
                    Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                        continue;
                    }
                    Err(e) => bail!("i/o error receiving on {}: {e}", self.interfaces[idx].name),
                }
            }
            if Instant::now() >= deadline {
                return Ok(RecvOutcome::Timeout);
            }
        }
    }

    fn send(&mut self, port: &str, frame: &[u8]) -> Result<()> {
        let idx = self
            .interfaces
            .iter()
            .position(|i| i.name == port)
            .ok_or_else(|| anyhow::anyhow!("unknown output port: {port}"))?;
        match self.ports[idx]
            .tx
            .build_and_send(1, frame.len(), &mut |out| out.clone_from_slice(frame))
        {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => bail!("send failed on {port}: {e}"),
            None => bail!("send failed on {port}: no send buffer available"),
        }
    }

    fn request_shutdown(&mut self) {
        self.shutdown = true;
    }
}

/// In-process test double. Frames are injected per-port via `inject` and
/// sent frames are recorded per-port for assertions; nothing touches the
/// network.
pub struct MemoryNetIo {
    interfaces: Vec<Interface>,
    inbound: Vec<VecDeque<Vec<u8>>>,
    sent: Vec<Vec<Vec<u8>>>,
    shutdown: bool,
}

impl MemoryNetIo {
    pub fn new(interfaces: Vec<Interface>) -> Self {
        let n = interfaces.len();
        MemoryNetIo {
            interfaces,
            inbound: (0..n).map(|_| VecDeque::new()).collect(),
            sent: (0..n).map(|_| Vec::new()).collect(),
            shutdown: false,
        }
    }

    pub fn inject(&mut self, port: &str, frame: Vec<u8>) {
        if let Some(idx) = self.interfaces.iter().position(|i| i.name == port) {
            self.inbound[idx].push_back(frame);
        }
    }

    pub fn sent_on(&self, port: &str) -> &[Vec<u8>] {
        match self.interfaces.iter().position(|i| i.name == port) {
            Some(idx) => &self.sent[idx],
            None => &[],
        }
    }
}

impl NetIo for MemoryNetIo {
    fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    fn recv(&mut self, _timeout: Duration) -> Result<RecvOutcome> {
        if self.shutdown {
            return Ok(RecvOutcome::Shutdown);
        }
        for (idx, queue) in self.inbound.iter_mut().enumerate() {
            if let Some(frame) = queue.pop_front() {
                return Ok(RecvOutcome::Frame {
                    port: self.interfaces[idx].name.clone(),
                    frame,
                });
            }
        }
        Ok(RecvOutcome::Timeout)
    }

    fn send(&mut self, port: &str, frame: &[u8]) -> Result<()> {
        let idx = self
            .interfaces
            .iter()
            .position(|i| i.name == port)
            .ok_or_else(|| anyhow::anyhow!("unknown output port: {port}"))?;
        self.sent[idx].push(frame.to_vec());
        Ok(())
    }

    fn request_shutdown(&mut self) {
        self.shutdown = true;
    }
}
