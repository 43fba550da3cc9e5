use std::io::Write;
use std::time::Duration;

use log::LevelFilter;
use paxos_kv::config::Config;
use paxos_kv::error::PaxosError;

const CLUSTER: &str = "
log_level: debug
nodes:
  - node_id: 1
    address: 127.0.0.1:5001
  - node_id: 0
    address: 127.0.0.1:5000
  - node_id: 2
    address: 127.0.0.1:5002
fault_injection:
  enabled: true
  interval_ms: 250
";

/// Test loading a full cluster file from disk.
#[test]
fn load_cluster_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(CLUSTER.as_bytes()).unwrap();

    let config = Config::load(file.path(), 1).expect("valid config");
    assert_eq!(config.cluster_size, 3);
    assert_eq!(config.node.node_id, 1);
    assert_eq!(config.node.address, "127.0.0.1:5001");
    let remote: Vec<u64> = config.remote_nodes.iter().map(|n| n.node_id).collect();
    assert_eq!(remote, vec![0, 2]);
    assert_eq!(config.log_level, LevelFilter::Debug);
    assert!(config.fault_injection.enabled);
    assert_eq!(config.fault_injection.interval, Duration::from_millis(250));
}

/// Test that optional sections fall back to their defaults.
#[test]
fn defaults_apply() {
    let config = Config::from_yaml(
        "nodes:\n  - node_id: 0\n    address: 127.0.0.1:6000\n",
        0,
    )
    .expect("valid config");
    assert_eq!(config.cluster_size, 1);
    assert!(config.remote_nodes.is_empty());
    assert_eq!(config.log_level, LevelFilter::Info);
    assert!(!config.fault_injection.enabled);
    assert_eq!(config.fault_injection.interval, Duration::from_millis(5000));
}

/// Test that node ids must cover 0..n exactly.
#[test]
fn rejects_gapped_ids() {
    let yaml = "nodes:\n  - node_id: 0\n    address: a:1\n  - node_id: 2\n    address: a:2\n";
    assert!(matches!(
        Config::from_yaml(yaml, 0),
        Err(PaxosError::Config(_))
    ));
}

/// Test that the local node must be part of the cluster.
#[test]
fn rejects_unknown_node() {
    assert!(matches!(
        Config::from_yaml(CLUSTER, 7),
        Err(PaxosError::Config(_))
    ));
}

/// Test that malformed files are reported as config errors.
#[test]
fn rejects_bad_input() {
    assert!(matches!(
        Config::from_yaml("log_level: loud\nnodes: []\n", 0),
        Err(PaxosError::Config(_))
    ));
    assert!(matches!(
        Config::from_yaml("nodes:\n  - address: a:1\n", 0),
        Err(PaxosError::Config(_))
    ));
    assert!(matches!(
        Config::load("/definitely/not/here.yaml", 0),
        Err(PaxosError::Io(_))
    ));
}
