mod middlebox;

use anyhow::{Context, Result};
use middlebox::Middlebox;
use netlab_common::config::MiddleboxParams;
use netlab_common::logging;
use netlab_common::netio::PnetNetIo;
use std::time::Duration;

const DEFAULT_PARAMS_PATH: &str = "middlebox_params.txt";

/// `netlab-middlebox <node-name> [params-file]` (spec.md §6 CLI surface).
/// `<node-name>-eth0` faces the blaster, `<node-name>-eth1` faces the
/// blastee, mirroring `original_source/lab3/middlebox.py`'s hardcoded
/// `middlebox-eth0`/`middlebox-eth1` device names.
fn main() -> Result<()> {
    logging::init();

    let mut args = std::env::args().skip(1);
    let node_name = args
        .next()
        .context("usage: netlab-middlebox <node-name> [params-file]")?;
    let params_path = args.next().unwrap_or_else(|| DEFAULT_PARAMS_PATH.to_string());

    let params = MiddleboxParams::load(&params_path)
        .with_context(|| format!("loading middlebox params from {params_path}"))?;

    let blaster_port = format!("{node_name}-eth0");
    let blastee_port = format!("{node_name}-eth1");
    let prefix = format!("{node_name}-eth");
    let net = PnetNetIo::build(|name| name.contains(&prefix), Duration::from_secs(1))
        .with_context(|| format!("bringing up interfaces for middlebox {node_name}"))?;

    Middlebox::new(net, blaster_port, blastee_port, params).run()
}
