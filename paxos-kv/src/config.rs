use std::{fs, path::Path, time::Duration};

use log::LevelFilter;
use yaml_rust::{Yaml, YamlLoader};

use crate::{
    error::{PaxosError, Result},
    paxos::NodeId,
};

/// One member of the static cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub node_id: NodeId,
    pub address: String,
}

/// Periodic availability toggling for testing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultConfig {
    pub enabled: bool,
    pub interval: Duration,
}

impl Default for FaultConfig {
    fn default() -> Self {
        FaultConfig {
            enabled: false,
            interval: Duration::from_millis(5000),
        }
    }
}

pub struct Config {
    pub node: NodeConfig,
    pub remote_nodes: Vec<NodeConfig>,
    pub cluster_size: u64,
    pub log_level: LevelFilter,
    pub fault_injection: FaultConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P, this_id: NodeId) -> Result<Self> {
        let s = fs::read_to_string(&path)?;
        Self::from_yaml(&s, this_id)
    }

    pub fn from_yaml(s: &str, this_id: NodeId) -> Result<Self> {
        let docs = YamlLoader::load_from_str(s).map_err(|e| PaxosError::Config(e.to_string()))?;
        let doc = docs
            .first()
            .ok_or_else(|| PaxosError::Config("empty config".to_string()))?;

        let level_str = doc["log_level"].as_str().unwrap_or("info").to_lowercase();
        let log_level = match level_str.as_str() {
            "trace" => LevelFilter::Trace,
            "debug" => LevelFilter::Debug,
            "info" => LevelFilter::Info,
            "warn" | "warning" => LevelFilter::Warn,
            "error" => LevelFilter::Error,
            "off" => LevelFilter::Off,
            other => {
                return Err(PaxosError::Config(format!("unknown log_level `{}`", other)));
            }
        };

        let raw = doc["nodes"]
            .as_vec()
            .ok_or_else(|| PaxosError::Config("missing `nodes` list".to_string()))?;
        let mut nodes = raw
            .iter()
            .map(parse_node)
            .collect::<Result<Vec<NodeConfig>>>()?;
        nodes.sort_by_key(|n| n.node_id);

        // Ballots are derived from ids, so they must be exactly 0..n.
        for (expected, node) in nodes.iter().enumerate() {
            if node.node_id != expected as NodeId {
                return Err(PaxosError::Config(format!(
                    "node ids must be 0..{} without gaps or duplicates, found {}",
                    nodes.len(),
                    node.node_id
                )));
            }
        }

        let cluster_size = nodes.len() as u64;
        let node = nodes
            .iter()
            .find(|n| n.node_id == this_id)
            .cloned()
            .ok_or_else(|| PaxosError::Config(format!("node_id {} missing", this_id)))?;
        let remote_nodes = nodes.into_iter().filter(|n| n.node_id != this_id).collect();

        let f = &doc["fault_injection"];
        let defaults = FaultConfig::default();
        let fault_injection = FaultConfig {
            enabled: f["enabled"].as_bool().unwrap_or(defaults.enabled),
            interval: f["interval_ms"]
                .as_i64()
                .map(|ms| Duration::from_millis(ms.max(0) as u64))
                .unwrap_or(defaults.interval),
        };

        Ok(Config {
            node,
            remote_nodes,
            cluster_size,
            log_level,
            fault_injection,
        })
    }
}

fn parse_node(e: &Yaml) -> Result<NodeConfig> {
    let node_id = e["node_id"]
        .as_i64()
        .filter(|id| *id >= 0)
        .ok_or_else(|| PaxosError::Config("node entry without a valid `node_id`".to_string()))?;
    let address = e["address"]
        .as_str()
        .ok_or_else(|| PaxosError::Config(format!("node {} has no `address`", node_id)))?;
    Ok(NodeConfig {
        node_id: node_id as NodeId,
        address: address.to_string(),
    })
}
