use paxos_kv::{
    fault::FaultInjector,
    network::local::LocalCluster,
    paxos::NodeId,
    state_machine::Operation,
};

/// Drives a scripted session through an in-process cluster, including a
/// node that misses some rounds and has to catch up.
pub fn run(size: u64) {
    let size = size.max(1);
    println!(
        "Running Paxos key-value store on an in-process cluster of {} nodes...",
        size
    );
    let cluster = LocalCluster::new(size);
    let last: NodeId = size - 1;

    let script: Vec<(NodeId, &str)> = vec![
        (0, "PUT a 1"),
        (1 % size, "PUT b 2"),
        (0, "GET a"),
        (last, "DELETE missing"),
    ];
    submit_all(&cluster, &script);

    println!("--------------------------------------");
    println!("Node {} goes down for two commands.", last);
    cluster.set_down(&[last]);
    submit_all(&cluster, &[(0, "PUT a 3"), (0, "DELETE b")]);
    cluster.set_down(&[]);
    println!("Node {} is back at round {}.", last, cluster.node(last).frontier());
    submit_all(&cluster, &[(last, "GET a")]);

    println!("--------------------------------------");
    println!("Random faults for a few commands:");
    let mut injector = FaultInjector::new(cluster.nodes().to_vec());
    for i in 0..4 {
        if let Some((node, up)) = injector.step() {
            println!("  node {} is now {}", node, if up { "up" } else { "down" });
        }
        let command = format!("PUT k{} v{}", i, i);
        submit_all(&cluster, &[(i % size, command.as_str())]);
    }
    injector.heal();

    println!("--------------------------------------");
    println!("Committed frontier per node:");
    for node in cluster.nodes() {
        println!("  node {}: {}", node.node_id(), node.frontier());
    }
}

fn submit_all(cluster: &LocalCluster, script: &[(NodeId, &str)]) {
    for (node, command) in script {
        let response = match Operation::parse(command) {
            Ok(operation) => cluster.node(*node).client_response(operation),
            Err(e) => e.to_string(),
        };
        println!("node {} <- '{}': {}", node, command, response);
    }
}
