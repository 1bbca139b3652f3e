mod receiver;

use anyhow::{Context, Result};
use netlab_common::logging;
use netlab_common::netio::PnetNetIo;
use receiver::Receiver;
use std::time::Duration;

/// `netlab-blastee <node-name>` (spec.md §6 CLI surface).
fn main() -> Result<()> {
    logging::init();

    let node_name = std::env::args()
        .nth(1)
        .context("usage: netlab-blastee <node-name>")?;
    let suffix = format!("{node_name}-eth");

    let net = PnetNetIo::build(|name| name.contains(&suffix), Duration::from_secs(1))
        .with_context(|| format!("bringing up interfaces for blastee {node_name}"))?;

    Receiver::new(net)?.run()
}
