use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError, RwLock,
};

use log::{debug, info, warn};

use crate::{
    error::{PaxosError, Result, MAJORITY_UNREACHABLE},
    paxos::{consensus_log::ConsensusLog, majority, Ballot, NodeId, Peer, ProposerTrait, Round},
    state_machine::{Operation, ReplicatedStateMachine},
};

/// Mutable state of a node. Only ever touched under the node's mutex.
#[derive(Debug)]
pub struct NodeState {
    pub log: ConsensusLog,
    pub machine: ReplicatedStateMachine,
}

/// A cluster member playing proposer, acceptor and learner at once.
///
/// The state mutex is held for one state transition at a time and is never
/// held while calling into a peer or into another role of this node. That is
/// what lets an acceptor or learner handler drive proposer rounds to catch up
/// without deadlocking against itself.
pub struct PaxosNode {
    node_id: NodeId,
    cluster_size: u64,
    state: Mutex<NodeState>,
    peers: RwLock<Vec<Arc<dyn Peer>>>,
    down: AtomicBool,
}

impl PaxosNode {
    pub fn new(node_id: NodeId, cluster_size: u64) -> Self {
        assert!(
            node_id < cluster_size,
            "node id {} outside cluster of {}",
            node_id,
            cluster_size
        );
        PaxosNode {
            node_id,
            cluster_size,
            state: Mutex::new(NodeState {
                log: ConsensusLog::new(node_id),
                machine: ReplicatedStateMachine::new(),
            }),
            peers: RwLock::new(Vec::new()),
            down: AtomicBool::new(false),
        }
    }

    /// Installs the handles of every other member of the cluster.
    pub fn set_peers(&self, peers: Vec<Arc<dyn Peer>>) {
        info!("Node {}: wired to {} peers", self.node_id, peers.len());
        *self.peers.write().unwrap_or_else(PoisonError::into_inner) = peers;
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn cluster_size(&self) -> u64 {
        self.cluster_size
    }

    pub fn majority(&self) -> usize {
        majority(self.cluster_size)
    }

    pub fn set_available(&self, available: bool) {
        let was_down = self.down.swap(!available, Ordering::SeqCst);
        if was_down == available {
            info!(
                "Node {}: now {}",
                self.node_id,
                if available { "up" } else { "down" }
            );
        }
    }

    pub fn is_available(&self) -> bool {
        !self.down.load(Ordering::SeqCst)
    }

    /// Refuses the call while the node is in its simulated-down state.
    pub(crate) fn ensure_available(&self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(PaxosError::NodeUnavailable(self.node_id))
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn peers(&self) -> Vec<Arc<dyn Peer>> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Lowest round not yet decided here.
    pub fn frontier(&self) -> Round {
        self.state().log.frontier()
    }

    pub fn decided_response(&self, round: Round) -> Option<String> {
        self.state().log.decided_response(round)
    }

    pub fn decided_operation(&self, round: Round) -> Option<Operation> {
        self.state().log.decided_operation(round)
    }

    pub fn promised_ballot(&self, round: Round) -> Ballot {
        self.state()
            .log
            .record(round)
            .map_or(0, |record| record.promised_ballot)
    }

    pub fn store_value(&self, key: &str) -> Option<String> {
        self.state().machine.get(key).cloned()
    }

    /// Self-drives no-op rounds until the frontier reaches `round`.
    ///
    /// Stops early, leaving catch-up incomplete, when a round has no value to
    /// adopt or cannot reach a quorum; the caller answers regardless.
    pub(crate) fn catch_up(&self, round: Round) {
        loop {
            let frontier = self.frontier();
            if frontier >= round {
                return;
            }
            debug!(
                "Node {}: behind at round {}, catching up to {}",
                self.node_id, frontier, round
            );
            match self.run_attempt(None) {
                Ok(_) if self.frontier() > frontier => continue,
                Ok(_) => {
                    debug!(
                        "Node {}: nothing to learn for round {}, catch-up stops",
                        self.node_id, frontier
                    );
                    return;
                }
                Err(e) => {
                    warn!(
                        "Node {}: catch-up at round {} abandoned: {}",
                        self.node_id, frontier, e
                    );
                    return;
                }
            }
        }
    }

    /// Client-facing entry point returning the user-visible string.
    pub fn client_response(&self, operation: Operation) -> String {
        match self.send_command(operation) {
            Ok(response) => response,
            Err(PaxosError::QuorumUnavailable) => MAJORITY_UNREACHABLE.to_string(),
            Err(PaxosError::NodeUnavailable(_)) => "target server is down".to_string(),
            Err(e) => e.to_string(),
        }
    }
}
