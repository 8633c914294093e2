//! rendezvous-net - run a local multi-role test network.
//!
//! Starts every instance of a run (validators, seeds, bridges, full nodes,
//! light nodes) against one in-memory coordination store with simulated
//! nodes, then prints one line per instance outcome.
//!
//! Configuration is loaded from environment variables (`RENDEZVOUS_*`), a
//! TOML file, and CLI arguments, in that order of precedence.
//!
//! # Usage
//!
//! ```bash
//! # Four validators, one bridge, one full node
//! rendezvous-net --validators 4 --bridges 1 --full-nodes 1
//!
//! # Seeds and light nodes syncing from full nodes
//! rendezvous-net --config run.toml --seeds 2 --light-nodes 3 --light-upstream full
//! ```
//!
//! The exit code is non-zero when any instance recorded a fatal failure.

mod args;
mod config;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use rendezvous::LocalNetwork;
use tracing::info;

use crate::args::Args;
use crate::config::init_tracing;
use crate::config::load_config;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();

    let args = Args::parse();
    let config = load_config(&args)?;
    info!(
        run_id = %config.run_id,
        instances = config.total_instances(),
        subnet = %config.subnet,
        "loaded run configuration"
    );

    let report = LocalNetwork::new(config).run().await?;
    print!("{report}");

    if report.has_fatal_failure() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
