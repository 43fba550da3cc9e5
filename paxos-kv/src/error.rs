use thiserror::Error;

use crate::paxos::NodeId;

/// Message returned to clients when a round cannot gather a quorum.
pub const MAJORITY_UNREACHABLE: &str = "cannot communicate with majority";

/// Message returned to clients for malformed commands.
pub const INVALID_INPUT: &str = "Invalid Input";

#[derive(Error, Debug)]
pub enum PaxosError {
    /// The target node is in its simulated-down state.
    #[error("node {0} is down")]
    NodeUnavailable(NodeId),

    #[error("cannot reach node {peer}: {reason}")]
    PeerUnreachable { peer: NodeId, reason: String },

    #[error("cannot communicate with majority")]
    QuorumUnavailable,

    #[error("Invalid Input: {0}")]
    InvalidOperation(String),

    /// A protocol-logic bug, never a runtime condition.
    #[error("internal invariant violated: {0}")]
    Invariant(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl PaxosError {
    /// Whether a caller should count this failure as an abstention.
    pub fn is_abstention(&self) -> bool {
        matches!(
            self,
            PaxosError::NodeUnavailable(_) | PaxosError::PeerUnreachable { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PaxosError>;
