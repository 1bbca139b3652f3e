mod sender;

use anyhow::{Context, Result};
use netlab_common::clock::RealClock;
use netlab_common::config::BlasterParams;
use netlab_common::logging;
use netlab_common::netio::PnetNetIo;
use sender::Sender;
use std::time::Duration;

const DEFAULT_PARAMS_PATH: &str = "blaster_params.txt";

/// `netlab-blaster <node-name> [params-file]` (spec.md §6 CLI surface).
fn main() -> Result<()> {
    logging::init();

    let mut args = std::env::args().skip(1);
    let node_name = args.next().context("usage: netlab-blaster <node-name> [params-file]")?;
    let params_path = args.next().unwrap_or_else(|| DEFAULT_PARAMS_PATH.to_string());

    let params = BlasterParams::load(&params_path)
        .with_context(|| format!("loading blaster params from {params_path}"))?;

    let suffix = format!("{node_name}-eth");
    let net = PnetNetIo::build(|name| name.contains(&suffix), Duration::from_millis(params.recv_timeout_ms))
        .with_context(|| format!("bringing up interfaces for blaster {node_name}"))?;

    Sender::new(net, RealClock::new(), params)?.run()
}
