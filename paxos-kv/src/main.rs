mod main_basic;
mod main_distributed;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[clap(about = "Replicated key-value store over multi-round Paxos")]
struct Args {
    #[clap(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Serve one cluster member.
    Node {
        #[clap(long)]
        config: PathBuf,
        #[clap(long)]
        node_id: u64,
    },
    /// Read commands from stdin and send them to a node.
    Client {
        #[clap(long)]
        address: String,
    },
    /// Run a scripted session against an in-process cluster.
    Demo {
        #[clap(long, default_value_t = 5)]
        nodes: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.mode {
        Mode::Node { config, node_id } => main_distributed::run_node(&config, node_id),
        Mode::Client { address } => {
            env_logger::init();
            main_distributed::run_client(&address)
        }
        Mode::Demo { nodes } => {
            env_logger::init();
            main_basic::run(nodes);
            Ok(())
        }
    }
}
