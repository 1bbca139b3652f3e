mod arp;
mod forwarding_table;
mod router;

use anyhow::{Context, Result};
use netlab_common::clock::RealClock;
use netlab_common::config::load_forwarding_table;
use netlab_common::logging;
use netlab_common::netio::{NetIo, PnetNetIo};
use router::Router;
use std::time::Duration;

const DEFAULT_TABLE_PATH: &str = "forwarding_table.txt";

/// `netlab-router [forwarding_table.txt]` (spec.md §6 CLI surface): unlike
/// the switch/blaster/blastee/middlebox binaries, the router takes no
/// name argument — it brings up every non-loopback interface it can see,
/// mirroring `original_source/lab2/myrouter_part3.py::main`'s
/// `get_my_interfaces()` scan.
fn main() -> Result<()> {
    logging::init();

    let table_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_TABLE_PATH.to_string());
    let static_routes = load_forwarding_table(&table_path);
    log::info!("loaded {} static route(s) from {table_path}", static_routes.len());

    let net = PnetNetIo::build(|name| name != "lo", Duration::from_secs(1))
        .context("bringing up router interfaces")?;
    log::info!("router up on {} interface(s)", net.interfaces().len());

    Router::new(net, RealClock::new(), forwarding_table::DEFAULT_CAPACITY, static_routes).run()
}
