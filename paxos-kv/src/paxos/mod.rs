pub mod acceptor;
pub mod ballot;
pub mod consensus_log;
pub mod learner;
pub mod node;
pub mod proposer;

use serde::{Deserialize, Serialize};

use crate::{error::Result, state_machine::Operation};

pub type NodeId = u64;
pub type Round = u64;
pub type Ballot = u64;

/// Smallest number of members (self included) that forms a quorum.
pub fn majority(cluster_size: u64) -> usize {
    (cluster_size / 2 + 1) as usize
}

/// The highest-ballot value an acceptor has accepted for a round.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AcceptedEntry {
    pub ballot: Ballot,
    pub operation: Operation,
}

/// Answer to a phase-1 `promise` request.
///
/// Carries the acceptor's current accepted entry whether or not the promise
/// was granted, so that proposers always learn about accepted values.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PromiseReply {
    pub ack: bool,
    pub promised_ballot: Ballot,
    pub accepted: Option<AcceptedEntry>,
}

/// Answer to a phase-2 `accept` request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AcceptReply {
    pub ack: bool,
    pub promised_ballot: Ballot,
}

pub trait AcceptorTrait {
    /// Phase 1: promise not to accept anything numbered below `ballot` in `round`.
    fn promise(&self, round: Round, ballot: Ballot) -> Result<PromiseReply>;
    /// Phase 2: accept `operation` for `round` unless a higher ballot was promised.
    fn accept(&self, round: Round, ballot: Ballot, operation: Operation) -> Result<AcceptReply>;
}

pub trait LearnerTrait {
    /// Notification that some acceptor accepted `operation` at `ballot`.
    fn learn(&self, round: Round, ballot: Ballot, operation: Operation) -> Result<()>;
}

pub trait ProposerTrait {
    /// Runs consensus rounds until `operation` is applied, returning its outcome.
    fn send_command(&self, operation: Operation) -> Result<String>;
}

/// A cluster member reachable by the local proposer and acceptor.
pub trait Peer: AcceptorTrait + LearnerTrait + Send + Sync {
    fn node_id(&self) -> NodeId;
}
