use std::{io, path::Path};

use anyhow::Context;
use env_logger::Env;

use paxos_kv::{config::Config, network::distributed};

/// Loads the cluster file and serves `node_id` until the process is killed.
pub fn run_node(config_path: &Path, node_id: u64) -> anyhow::Result<()> {
    let config = Config::load(config_path, node_id)
        .with_context(|| format!("loading {}", config_path.display()))?;

    // Initialize logger, RUST_LOG wins over the configured level.
    env_logger::Builder::from_env(
        Env::default().default_filter_or(config.log_level.to_string().to_lowercase()),
    )
    .init();

    distributed::run_node(config).context("node stopped")?;
    Ok(())
}

/// Interactive client mode: one command per line, `Q` to quit.
pub fn run_client(address: &str) -> anyhow::Result<()> {
    println!("Sending commands to {}. Commands: PUT k v | GET k | DELETE k | Q", address);
    let stdin = io::stdin();
    distributed::run_client(address, stdin.lock(), io::stdout())?;
    Ok(())
}
