//! CLI argument parsing for rendezvous-net.

use std::path::PathBuf;

use clap::Parser;
use rendezvous::LightUpstream;

#[derive(Parser, Debug)]
#[command(name = "rendezvous-net")]
pub struct Args {
    /// Path to TOML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Namespace for every coordination key of the run.
    #[arg(long)]
    pub run_id: Option<String>,

    /// Seed for the instance start order and start jitter.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Chain id written into every node config.
    #[arg(long)]
    pub chain_id: Option<String>,

    /// Number of validators. The first one builds genesis.
    #[arg(long)]
    pub validators: Option<u32>,

    /// Number of seed nodes.
    #[arg(long)]
    pub seeds: Option<u32>,

    /// Number of bridge nodes.
    #[arg(long)]
    pub bridges: Option<u32>,

    /// Number of full nodes. Requires at least one bridge.
    #[arg(long)]
    pub full_nodes: Option<u32>,

    /// Number of light nodes.
    #[arg(long)]
    pub light_nodes: Option<u32>,

    /// Tier light nodes sync from: "bridge" (default) or "full".
    #[arg(long)]
    pub light_upstream: Option<LightUpstream>,

    /// Root directory for node homes. Node configs are only recorded in
    /// memory when unset.
    #[arg(long)]
    pub home_dir: Option<PathBuf>,

    /// Whole-run timeout in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}
