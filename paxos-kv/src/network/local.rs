use std::sync::{Arc, Weak};

use crate::{
    error::{PaxosError, Result},
    paxos::{
        node::PaxosNode, AcceptReply, AcceptorTrait, Ballot, LearnerTrait, NodeId, Peer,
        PromiseReply, ProposerTrait, Round,
    },
    state_machine::Operation,
};

/// In-process handle to another node. A dropped node is unreachable.
pub struct LocalPeer {
    node_id: NodeId,
    node: Weak<PaxosNode>,
}

impl LocalPeer {
    pub fn new(node: &Arc<PaxosNode>) -> Self {
        LocalPeer {
            node_id: node.node_id(),
            node: Arc::downgrade(node),
        }
    }

    fn target(&self) -> Result<Arc<PaxosNode>> {
        self.node.upgrade().ok_or_else(|| PaxosError::PeerUnreachable {
            peer: self.node_id,
            reason: "node dropped".to_string(),
        })
    }
}

impl AcceptorTrait for LocalPeer {
    fn promise(&self, round: Round, ballot: Ballot) -> Result<PromiseReply> {
        self.target()?.promise(round, ballot)
    }

    fn accept(&self, round: Round, ballot: Ballot, operation: Operation) -> Result<AcceptReply> {
        self.target()?.accept(round, ballot, operation)
    }
}

impl LearnerTrait for LocalPeer {
    fn learn(&self, round: Round, ballot: Ballot, operation: Operation) -> Result<()> {
        self.target()?.learn(round, ballot, operation)
    }
}

impl Peer for LocalPeer {
    fn node_id(&self) -> NodeId {
        self.node_id
    }
}

/// A fully wired cluster of nodes living in one process.
pub struct LocalCluster {
    nodes: Vec<Arc<PaxosNode>>,
}

impl LocalCluster {
    pub fn new(size: u64) -> Self {
        let nodes: Vec<Arc<PaxosNode>> = (0..size)
            .map(|id| Arc::new(PaxosNode::new(id, size)))
            .collect();
        for node in &nodes {
            let peers = nodes
                .iter()
                .filter(|other| other.node_id() != node.node_id())
                .map(|other| Arc::new(LocalPeer::new(other)) as Arc<dyn Peer>)
                .collect();
            node.set_peers(peers);
        }
        LocalCluster { nodes }
    }

    pub fn node(&self, id: NodeId) -> &Arc<PaxosNode> {
        &self.nodes[id as usize]
    }

    pub fn nodes(&self) -> &[Arc<PaxosNode>] {
        &self.nodes
    }

    pub fn send_command(&self, id: NodeId, operation: Operation) -> Result<String> {
        self.node(id).send_command(operation)
    }

    /// Marks the given nodes down and every other node up.
    pub fn set_down(&self, down: &[NodeId]) {
        for node in &self.nodes {
            node.set_available(!down.contains(&node.node_id()));
        }
    }
}
