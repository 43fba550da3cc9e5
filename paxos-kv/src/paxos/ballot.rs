use crate::paxos::{Ballot, NodeId};

/// Returns the smallest ballot strictly above `observed` owned by `node_id`.
///
/// Ballots of node `i` are exactly the numbers congruent to `i` modulo
/// `cluster_size`, so two distinct nodes never produce the same ballot.
pub fn next_higher_ballot(observed: Ballot, cluster_size: u64, node_id: NodeId) -> Ballot {
    (observed / cluster_size + 1) * cluster_size + node_id
}
