use log::{debug, info, warn};

use crate::{
    error::Result,
    paxos::{
        node::PaxosNode, AcceptReply, AcceptedEntry, AcceptorTrait, Ballot, LearnerTrait,
        PromiseReply, Round,
    },
    state_machine::Operation,
};

impl AcceptorTrait for PaxosNode {
    fn promise(&self, round: Round, ballot: Ballot) -> Result<PromiseReply> {
        self.ensure_available()?;
        self.catch_up(round);

        let mut state = self.state();
        let record = state.log.record_mut(round);
        let accepted = record.accepted.clone();
        if ballot > record.promised_ballot {
            record.promised_ballot = ballot;
            debug!(
                "Acceptor {}: promised ballot {} in round {}",
                self.node_id(),
                ballot,
                round
            );
            Ok(PromiseReply {
                ack: true,
                promised_ballot: ballot,
                accepted,
            })
        } else {
            warn!(
                "Acceptor {}: rejected prepare for ballot {} in round {} (already promised {})",
                self.node_id(),
                ballot,
                round,
                record.promised_ballot
            );
            Ok(PromiseReply {
                ack: false,
                promised_ballot: record.promised_ballot,
                accepted,
            })
        }
    }

    fn accept(&self, round: Round, ballot: Ballot, operation: Operation) -> Result<AcceptReply> {
        self.ensure_available()?;
        self.catch_up(round);

        {
            let mut state = self.state();
            let record = state.log.record_mut(round);
            if ballot < record.promised_ballot {
                warn!(
                    "Acceptor {}: rejected accept for ballot {} in round {} (promised {})",
                    self.node_id(),
                    ballot,
                    round,
                    record.promised_ballot
                );
                return Ok(AcceptReply {
                    ack: false,
                    promised_ballot: record.promised_ballot,
                });
            }
            record.promised_ballot = ballot;
            record.accepted = Some(AcceptedEntry {
                ballot,
                operation: operation.clone(),
            });
            info!(
                "Acceptor {}: accepted ballot {} in round {} with '{}'",
                self.node_id(),
                ballot,
                round,
                operation
            );
        }

        self.broadcast_learn(round, ballot, &operation);
        Ok(AcceptReply {
            ack: true,
            promised_ballot: ballot,
        })
    }
}

impl PaxosNode {
    /// Tells every learner, this node included, about an accepted value.
    /// Unreachable learners are skipped.
    fn broadcast_learn(&self, round: Round, ballot: Ballot, operation: &Operation) {
        if let Err(e) = self.learn(round, ballot, operation.clone()) {
            debug!("Acceptor {}: local learner refused: {}", self.node_id(), e);
        }
        for peer in self.peers() {
            if let Err(e) = peer.learn(round, ballot, operation.clone()) {
                debug!(
                    "Acceptor {}: learner {} skipped: {}",
                    self.node_id(),
                    peer.node_id(),
                    e
                );
            }
        }
    }
}
