use std::collections::BTreeMap;

use crate::{
    paxos::{AcceptedEntry, Ballot, NodeId, Round},
    state_machine::Operation,
};

/// Learner bookkeeping for the highest ballot seen in a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnerTally {
    pub ballot: Ballot,
    pub count: usize,
    pub operation: Operation,
}

/// Everything one node knows about one round, across all three roles.
#[derive(Debug, Clone)]
pub struct RoundRecord {
    pub round: Round,

    // proposer
    pub proposer_ballot: Ballot,
    pub proposed_operation: Option<Operation>,

    // acceptor
    pub promised_ballot: Ballot,
    pub accepted: Option<AcceptedEntry>,

    // learner
    pub learner_tally: Option<LearnerTally>,
    /// Value known to be chosen but not yet applied.
    pub chosen: Option<Operation>,
    pub decided: bool,
    pub client_response: Option<String>,
}

impl RoundRecord {
    pub fn new(round: Round, node_id: NodeId) -> Self {
        RoundRecord {
            round,
            proposer_ballot: node_id,
            proposed_operation: None,
            promised_ballot: 0,
            accepted: None,
            learner_tally: None,
            chosen: None,
            decided: false,
            client_response: None,
        }
    }
}

/// Per-node table of rounds plus the committed frontier.
#[derive(Debug)]
pub struct ConsensusLog {
    node_id: NodeId,
    rounds: BTreeMap<Round, RoundRecord>,
    /// Lowest round not yet decided on this node.
    frontier: Round,
}

impl ConsensusLog {
    pub fn new(node_id: NodeId) -> Self {
        ConsensusLog {
            node_id,
            rounds: BTreeMap::new(),
            frontier: 0,
        }
    }

    pub fn frontier(&self) -> Round {
        self.frontier
    }

    pub fn record(&self, round: Round) -> Option<&RoundRecord> {
        self.rounds.get(&round)
    }

    /// Returns the record for `round`, creating an empty one on first use.
    pub fn record_mut(&mut self, round: Round) -> &mut RoundRecord {
        let node_id = self.node_id;
        self.rounds
            .entry(round)
            .or_insert_with(|| RoundRecord::new(round, node_id))
    }

    /// The frontier round together with its chosen value, if it has one.
    pub fn pending_at_frontier(&self) -> Option<(Round, Operation)> {
        let record = self.rounds.get(&self.frontier)?;
        if record.decided {
            return None;
        }
        record
            .chosen
            .clone()
            .map(|operation| (self.frontier, operation))
    }

    /// Marks `round` decided with its response and moves the frontier past
    /// every decided round.
    pub fn decide(&mut self, round: Round, response: String) {
        let record = self.record_mut(round);
        if record.decided {
            return;
        }
        record.decided = true;
        record.client_response = Some(response);
        while self.rounds.get(&self.frontier).is_some_and(|r| r.decided) {
            self.frontier += 1;
        }
    }

    pub fn decided_response(&self, round: Round) -> Option<String> {
        self.rounds
            .get(&round)
            .filter(|r| r.decided)
            .and_then(|r| r.client_response.clone())
    }

    pub fn decided_operation(&self, round: Round) -> Option<Operation> {
        self.rounds
            .get(&round)
            .filter(|r| r.decided)
            .and_then(|r| r.chosen.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_created_lazily_with_seeded_ballot() {
        let mut log = ConsensusLog::new(3);
        assert!(log.record(4).is_none());
        let record = log.record_mut(4);
        assert_eq!(record.proposer_ballot, 3);
        assert_eq!(record.promised_ballot, 0);
        assert!(!record.decided);
        assert!(log.record(4).is_some());
    }

    #[test]
    fn frontier_only_moves_over_decided_rounds() {
        let mut log = ConsensusLog::new(0);
        log.decide(1, "one".to_string());
        assert_eq!(log.frontier(), 0);
        log.decide(0, "zero".to_string());
        assert_eq!(log.frontier(), 2);
        log.decide(0, "again".to_string());
        assert_eq!(log.decided_response(0).as_deref(), Some("zero"));
    }
}
