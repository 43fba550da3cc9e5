use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use log::{debug, info, warn};

use crate::{
    config::{Config, NodeConfig},
    error::{PaxosError, Result, INVALID_INPUT},
    fault::FaultInjector,
    paxos::{
        node::PaxosNode, AcceptReply, AcceptorTrait, Ballot, LearnerTrait, NodeId, Peer,
        PromiseReply, Round,
    },
    state_machine::Operation,
};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum PaxosMessage {
    Prepare {
        round: Round,
        ballot: Ballot,
        from: NodeId,
    },
    Promise(PromiseReply),
    AcceptRequest {
        round: Round,
        ballot: Ballot,
        operation: Operation,
        from: NodeId,
    },
    Accepted(AcceptReply),
    Learn {
        round: Round,
        ballot: Ballot,
        operation: Operation,
        from: NodeId,
    },
    Learned,
    Command {
        operation: Operation,
    },
    CommandResult {
        response: String,
    },
    /// The node is down or could not serve the request.
    Refused {
        reason: String,
    },
}

fn write_line<T: Serialize>(stream: &TcpStream, msg: &T) -> Result<()> {
    let mut writer = BufWriter::new(stream);
    let json = serde_json::to_string(msg)?;
    writer.write_all(json.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Send a message to a peer and wait for its response. Blocks without a
/// timeout; only a broken connection ends the wait.
pub fn send_and_receive(peer_addr: &str, msg: &PaxosMessage) -> Result<PaxosMessage> {
    let stream = TcpStream::connect(peer_addr)?;
    write_line(&stream, msg)?;

    let mut reader = BufReader::new(&stream);
    let mut response = String::new();
    if reader.read_line(&mut response)? == 0 {
        return Err(PaxosError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before a response",
        )));
    }
    let resp: PaxosMessage = serde_json::from_str(&response)?;
    Ok(resp)
}

/// A cluster member reached over TCP.
pub struct RemotePeer {
    from: NodeId,
    node: NodeConfig,
}

impl RemotePeer {
    pub fn new(from: NodeId, node: NodeConfig) -> Self {
        RemotePeer { from, node }
    }

    fn call(&self, msg: &PaxosMessage) -> Result<PaxosMessage> {
        match send_and_receive(&self.node.address, msg) {
            Ok(PaxosMessage::Refused { reason }) => Err(self.unreachable(reason)),
            Ok(resp) => Ok(resp),
            Err(e) => Err(self.unreachable(e.to_string())),
        }
    }

    fn unreachable(&self, reason: String) -> PaxosError {
        PaxosError::PeerUnreachable {
            peer: self.node.node_id,
            reason,
        }
    }

    fn unexpected(&self, resp: PaxosMessage) -> PaxosError {
        self.unreachable(format!("unexpected response {:?}", resp))
    }
}

impl AcceptorTrait for RemotePeer {
    fn promise(&self, round: Round, ballot: Ballot) -> Result<PromiseReply> {
        let msg = PaxosMessage::Prepare {
            round,
            ballot,
            from: self.from,
        };
        match self.call(&msg)? {
            PaxosMessage::Promise(reply) => Ok(reply),
            other => Err(self.unexpected(other)),
        }
    }

    fn accept(&self, round: Round, ballot: Ballot, operation: Operation) -> Result<AcceptReply> {
        let msg = PaxosMessage::AcceptRequest {
            round,
            ballot,
            operation,
            from: self.from,
        };
        match self.call(&msg)? {
            PaxosMessage::Accepted(reply) => Ok(reply),
            other => Err(self.unexpected(other)),
        }
    }
}

impl LearnerTrait for RemotePeer {
    fn learn(&self, round: Round, ballot: Ballot, operation: Operation) -> Result<()> {
        let msg = PaxosMessage::Learn {
            round,
            ballot,
            operation,
            from: self.from,
        };
        match self.call(&msg)? {
            PaxosMessage::Learned => Ok(()),
            other => Err(self.unexpected(other)),
        }
    }
}

impl Peer for RemotePeer {
    fn node_id(&self) -> NodeId {
        self.node.node_id
    }
}

/// Builds the node described by `config` with TCP handles to its peers.
pub fn build_node(config: &Config) -> Arc<PaxosNode> {
    let node = Arc::new(PaxosNode::new(config.node.node_id, config.cluster_size));
    let peers = config
        .remote_nodes
        .iter()
        .map(|remote| {
            Arc::new(RemotePeer::new(config.node.node_id, remote.clone())) as Arc<dyn Peer>
        })
        .collect();
    node.set_peers(peers);
    node
}

/// Run the node server (node mode).
pub fn run_node(config: Config) -> Result<()> {
    info!(
        "Starting node {} of {} on {}",
        config.node.node_id, config.cluster_size, config.node.address
    );
    let listener = TcpListener::bind(&config.node.address)?;
    let node = build_node(&config);

    // Kept alive for as long as the node serves.
    let _injector = config.fault_injection.enabled.then(|| {
        info!(
            "Node {}: fault injection every {:?}",
            config.node.node_id, config.fault_injection.interval
        );
        FaultInjector::new(vec![Arc::clone(&node)]).spawn(config.fault_injection.interval)
    });
    serve(listener, node)
}

/// Accepts connections forever, one handler thread per connection.
pub fn serve(listener: TcpListener, node: Arc<PaxosNode>) -> Result<()> {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let node = Arc::clone(&node);
                thread::spawn(move || {
                    if let Err(e) = handle_connection(stream, &node) {
                        warn!("Node {}: error handling connection: {}", node.node_id(), e);
                    }
                });
            }
            Err(e) => {
                warn!("Error accepting connection: {}", e);
            }
        }
    }
    Ok(())
}

/// Handle an incoming TCP connection.
fn handle_connection(stream: TcpStream, node: &PaxosNode) -> Result<()> {
    let mut reader = BufReader::new(&stream);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    // Anything that is not a protocol message is taken as a typed client command.
    let response = match serde_json::from_str::<PaxosMessage>(&line) {
        Ok(msg) => process_paxos_message(msg, node),
        Err(_) => {
            let response = match Operation::parse(&line) {
                Ok(operation) => node.client_response(operation),
                Err(_) => INVALID_INPUT.to_string(),
            };
            PaxosMessage::CommandResult { response }
        }
    };
    write_line(&stream, &response)
}

/// Process an incoming PaxosMessage and generate a response.
fn process_paxos_message(msg: PaxosMessage, node: &PaxosNode) -> PaxosMessage {
    let result = match msg {
        PaxosMessage::Prepare {
            round,
            ballot,
            from,
        } => {
            debug!(
                "Node {}: Prepare({}, {}) from node {}",
                node.node_id(),
                round,
                ballot,
                from
            );
            node.promise(round, ballot).map(PaxosMessage::Promise)
        }
        PaxosMessage::AcceptRequest {
            round,
            ballot,
            operation,
            from,
        } => {
            debug!(
                "Node {}: AcceptRequest({}, {}) from node {}",
                node.node_id(),
                round,
                ballot,
                from
            );
            node.accept(round, ballot, operation)
                .map(PaxosMessage::Accepted)
        }
        PaxosMessage::Learn {
            round,
            ballot,
            operation,
            from,
        } => {
            debug!(
                "Node {}: Learn({}, {}) from node {}",
                node.node_id(),
                round,
                ballot,
                from
            );
            node.learn(round, ballot, operation)
                .map(|_| PaxosMessage::Learned)
        }
        PaxosMessage::Command { operation } => Ok(PaxosMessage::CommandResult {
            response: node.client_response(operation),
        }),
        other => Ok(PaxosMessage::Refused {
            reason: format!("not a request: {:?}", other),
        }),
    };
    result.unwrap_or_else(|e| PaxosMessage::Refused {
        reason: e.to_string(),
    })
}

/// Submits one operation to the node at `target_addr`.
pub fn submit(target_addr: &str, operation: Operation) -> Result<String> {
    match send_and_receive(target_addr, &PaxosMessage::Command { operation })? {
        PaxosMessage::CommandResult { response } => Ok(response),
        PaxosMessage::Refused { reason } => Ok(reason),
        other => Err(PaxosError::Invariant(format!(
            "unexpected response {:?}",
            other
        ))),
    }
}

/// Interactive client: one command per line from `input`, `Q` quits.
pub fn run_client<R: BufRead, W: Write>(target_addr: &str, input: R, mut output: W) -> Result<()> {
    for line in input.lines() {
        let line = line?;
        let command = line.trim();
        if command == "Q" {
            break;
        }
        let response = match Operation::parse(command) {
            Ok(operation) => match submit(target_addr, operation) {
                Ok(response) => response,
                Err(e) => format!("Error: {}", e),
            },
            Err(_) => INVALID_INPUT.to_string(),
        };
        writeln!(output, "{}", response)?;
    }
    Ok(())
}
