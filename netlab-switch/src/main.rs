mod fib;
mod stp;
mod switch;

use anyhow::{Context, Result};
use netlab_common::clock::RealClock;
use netlab_common::logging;
use netlab_common::netio::{NetIo, PnetNetIo};
use std::time::Duration;
use switch::Switch;

/// `netlab-switch <switch-name>` (spec.md §6 CLI surface): interfaces are
/// discovered by filtering `pnet::datalink::interfaces()` to names
/// containing `<switch-name>-eth`, exactly as the teacher's
/// `EthRouter::build` does.
fn main() -> Result<()> {
    logging::init();

    let switch_name = std::env::args()
        .nth(1)
        .context("usage: netlab-switch <switch-name>")?;
    let suffix = format!("{switch_name}-eth");

    let net = PnetNetIo::build(|name| name.contains(&suffix), Duration::from_secs(1))
        .with_context(|| format!("bringing up interfaces for switch {switch_name}"))?;

    log::info!("switch {switch_name} up on {} interface(s)", net.interfaces().len());
    Switch::new(net, RealClock::new(), fib::DEFAULT_CAPACITY).run()
}
