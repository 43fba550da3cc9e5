use std::io::{BufRead, BufReader, Cursor, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::LevelFilter;
use paxos_kv::config::{Config, FaultConfig, NodeConfig};
use paxos_kv::network::distributed::{build_node, run_client, serve, submit, PaxosMessage};
use paxos_kv::paxos::node::PaxosNode;
use paxos_kv::state_machine::Operation;

/// Starts `size` nodes on ephemeral ports and returns their addresses.
fn start_cluster(size: u64) -> (Vec<String>, Vec<Arc<PaxosNode>>) {
    let listeners: Vec<TcpListener> = (0..size)
        .map(|_| TcpListener::bind("127.0.0.1:0").expect("bind"))
        .collect();
    let members: Vec<NodeConfig> = listeners
        .iter()
        .enumerate()
        .map(|(i, l)| NodeConfig {
            node_id: i as u64,
            address: l.local_addr().unwrap().to_string(),
        })
        .collect();

    let mut nodes = Vec::new();
    for (listener, me) in listeners.into_iter().zip(members.iter()) {
        let config = Config {
            node: me.clone(),
            remote_nodes: members
                .iter()
                .filter(|m| m.node_id != me.node_id)
                .cloned()
                .collect(),
            cluster_size: size,
            log_level: LevelFilter::Info,
            fault_injection: FaultConfig::default(),
        };
        let node = build_node(&config);
        nodes.push(Arc::clone(&node));
        thread::spawn(move || serve(listener, node));
    }
    let addresses = members.into_iter().map(|m| m.address).collect();
    (addresses, nodes)
}

/// Test that commands replicate between nodes over TCP.
#[test]
fn commands_replicate_over_tcp() {
    let (addrs, nodes) = start_cluster(3);

    let put = submit(&addrs[0], Operation::put("a", "1")).expect("put");
    assert_eq!(put, "Successfully put the key a of value 1");

    let get = submit(&addrs[2], Operation::get("a")).expect("get");
    assert_eq!(get, "The value of key a is 1");

    for node in &nodes {
        assert_eq!(node.store_value("a").as_deref(), Some("1"));
    }
}

/// Test that a plain text line is served as a client command.
#[test]
fn plain_text_commands_are_accepted() {
    let (addrs, _nodes) = start_cluster(3);

    let ask = |line: &str| {
        let mut stream = TcpStream::connect(&addrs[1]).unwrap();
        stream.write_all(line.as_bytes()).unwrap();
        let mut response = String::new();
        BufReader::new(&stream).read_line(&mut response).unwrap();
        serde_json::from_str::<PaxosMessage>(&response).unwrap()
    };

    match ask("DELETE missing\n") {
        PaxosMessage::CommandResult { response } => {
            assert_eq!(response, "Key missing Not found in the store")
        }
        other => panic!("unexpected {:?}", other),
    }
    match ask("FROB x\n") {
        PaxosMessage::CommandResult { response } => assert_eq!(response, "Invalid Input"),
        other => panic!("unexpected {:?}", other),
    }
}

/// Test that a down node refuses peers and the rest still reach a majority.
#[test]
fn down_node_is_skipped() {
    let (addrs, nodes) = start_cluster(3);
    nodes[2].set_available(false);

    let put = submit(&addrs[0], Operation::put("k", "v")).expect("put");
    assert_eq!(put, "Successfully put the key k of value v");
    assert_eq!(
        submit(&addrs[2], Operation::get("k")).expect("get"),
        "target server is down"
    );

    nodes[1].set_available(false);
    assert_eq!(
        submit(&addrs[0], Operation::get("k")).expect("get"),
        "cannot communicate with majority"
    );
}

/// Test the interactive client loop.
#[test]
fn client_reads_until_quit() {
    let (addrs, _nodes) = start_cluster(3);
    let input = Cursor::new("PUT x 1\nbogus\nGET x\nQ\nGET never\n");
    let mut output = Vec::new();

    run_client(&addrs[0], input, &mut output).expect("client");

    let lines: Vec<String> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    assert_eq!(
        lines,
        vec![
            "Successfully put the key x of value 1",
            "Invalid Input",
            "The value of key x is 1",
        ]
    );
}

/// Test that an unreachable address is reported rather than hanging.
#[test]
fn submit_to_closed_port_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    thread::sleep(Duration::from_millis(10));
    assert!(submit(&addr, Operation::get("a")).is_err());
}
