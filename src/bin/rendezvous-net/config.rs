//! Configuration loading and tracing setup for rendezvous-net.

use anyhow::Context;
use anyhow::Result;
use rendezvous::RunConfig;

use crate::args::Args;

/// Initialize tracing subscriber with environment-based filtering.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).compact().init();
}

/// Run configuration holding only what was given on the command line.
pub fn build_cli_config(args: &Args) -> RunConfig {
    let defaults = RunConfig::default();
    RunConfig {
        run_id: args.run_id.clone().unwrap_or(defaults.run_id),
        seed: args.seed.unwrap_or(defaults.seed),
        chain_id: args.chain_id.clone().unwrap_or(defaults.chain_id),
        validators: args.validators.unwrap_or(defaults.validators),
        seeds: args.seeds.unwrap_or(defaults.seeds),
        bridges: args.bridges.unwrap_or(defaults.bridges),
        full_nodes: args.full_nodes.unwrap_or(defaults.full_nodes),
        light_nodes: args.light_nodes.unwrap_or(defaults.light_nodes),
        light_upstream: args.light_upstream.unwrap_or(defaults.light_upstream),
        home_dir: args.home_dir.clone(),
        timeout_secs: args.timeout_secs.unwrap_or(defaults.timeout_secs),
        ..defaults
    }
}

/// Load configuration with precedence env < TOML < CLI, then validate.
pub fn load_config(args: &Args) -> Result<RunConfig> {
    let mut config = RunConfig::from_env();

    if let Some(path) = &args.config {
        let file_config = RunConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?;
        config.merge(file_config);
    }

    config.merge(build_cli_config(args));
    config.validate().context("invalid run configuration")?;
    Ok(config)
}
