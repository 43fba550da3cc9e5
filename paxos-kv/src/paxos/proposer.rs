use log::{debug, error, info, warn};

use crate::{
    error::{PaxosError, Result},
    paxos::{
        ballot::next_higher_ballot, node::PaxosNode, AcceptorTrait, Ballot, ProposerTrait, Round,
    },
    state_machine::Operation,
};

/// How a single driven round ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// The round is decided with the caller's intent (or, for a no-op, with
    /// whatever value was adopted); carries the client response.
    Chosen(String),
    /// The round was used to commit a value some acceptor had already
    /// accepted; the caller's own operation still needs a round.
    Superseded,
    /// No-op round where no acceptor reported a value: nothing to commit.
    Vacant,
}

/// The value carried into phase 2.
#[derive(Debug, Clone)]
struct Adopted {
    operation: Operation,
    /// Whether an acceptor reported it rather than it being our own intent.
    reported: bool,
}

struct Prepared {
    acks: usize,
    adopted: Option<Adopted>,
    highest_nack: Option<Ballot>,
}

struct AcceptTally {
    acks: usize,
    highest_nack: Option<Ballot>,
}

impl ProposerTrait for PaxosNode {
    fn send_command(&self, operation: Operation) -> Result<String> {
        self.ensure_available()?;
        info!("Proposer {}: client command '{}'", self.node_id(), operation);
        loop {
            match self.run_attempt(Some(&operation))? {
                RoundOutcome::Chosen(response) => return Ok(response),
                RoundOutcome::Superseded => {
                    info!(
                        "Proposer {}: '{}' lost its round, retrying in round {}",
                        self.node_id(),
                        operation,
                        self.frontier()
                    );
                }
                RoundOutcome::Vacant => {
                    return Err(PaxosError::Invariant(format!(
                        "round without a value while proposing '{}'",
                        operation
                    )))
                }
            }
        }
    }
}

impl PaxosNode {
    /// Starts an attempt at the current frontier.
    pub(crate) fn run_attempt(&self, intent: Option<&Operation>) -> Result<RoundOutcome> {
        let round = self.frontier();
        self.drive_round(round, intent)
    }

    /// Runs full two-phase Paxos for `round` with a fresh ballot until the
    /// round is decided or a quorum cannot be reached. Nacks escalate the
    /// ballot and restart phase 1.
    pub fn drive_round(&self, round: Round, intent: Option<&Operation>) -> Result<RoundOutcome> {
        let majority = self.majority();
        let mut ballot = {
            let mut state = self.state();
            let record = state.log.record_mut(round);
            record.proposer_ballot += self.cluster_size();
            if record.proposed_operation.is_none() {
                record.proposed_operation = intent.cloned();
            }
            record.proposer_ballot
        };

        // Set once this call has put its own intent into phase 2. From then on
        // a reported entry carrying the intent is this call's own value coming
        // back after an escalation, not a competing proposal.
        let mut sent_intent = false;

        loop {
            let prepared = self.prepare(round, ballot);
            if let Some(promised) = prepared.highest_nack {
                ballot = self.escalate(round, promised);
                continue;
            }
            if prepared.acks < majority {
                warn!(
                    "Proposer {}: {} of {} promises for round {}",
                    self.node_id(),
                    prepared.acks,
                    majority,
                    round
                );
                return Err(PaxosError::QuorumUnavailable);
            }

            let adopted = match prepared.adopted {
                Some(adopted) if sent_intent && intent == Some(&adopted.operation) => Adopted {
                    reported: false,
                    ..adopted
                },
                Some(adopted) => adopted,
                None => match intent.cloned().or_else(|| self.proposed_operation(round)) {
                    Some(operation) => Adopted {
                        operation,
                        reported: false,
                    },
                    None => return Ok(RoundOutcome::Vacant),
                },
            };

            if intent.is_some() && !adopted.reported {
                sent_intent = true;
            }
            let accepted = self.accept_request(round, ballot, &adopted.operation);
            if accepted.acks < majority {
                if let Some(promised) = accepted.highest_nack {
                    ballot = self.escalate(round, promised);
                    continue;
                }
                warn!(
                    "Proposer {}: {} of {} accepts for round {}",
                    self.node_id(),
                    accepted.acks,
                    majority,
                    round
                );
                return Err(PaxosError::QuorumUnavailable);
            }

            let response = self.apply_chosen(round, adopted.operation)?;
            if intent.is_some() && adopted.reported {
                return Ok(RoundOutcome::Superseded);
            }
            return Ok(RoundOutcome::Chosen(response));
        }
    }

    fn proposed_operation(&self, round: Round) -> Option<Operation> {
        self.state()
            .log
            .record(round)
            .and_then(|record| record.proposed_operation.clone())
    }

    /// Moves this node's ballot for `round` past a competing promise.
    fn escalate(&self, round: Round, promised: Ballot) -> Ballot {
        let next = next_higher_ballot(promised, self.cluster_size(), self.node_id());
        let mut state = self.state();
        let record = state.log.record_mut(round);
        record.proposer_ballot = record.proposer_ballot.max(next);
        debug!(
            "Proposer {}: round {} escalated past {} to ballot {}",
            self.node_id(),
            round,
            promised,
            record.proposer_ballot
        );
        record.proposer_ballot
    }

    /// Phase 1: collects promises and the highest-ballot accepted value.
    fn prepare(&self, round: Round, ballot: Ballot) -> Prepared {
        let mut prepared = Prepared {
            acks: 0,
            adopted: None,
            highest_nack: None,
        };
        let mut adopted_ballot = 0;

        let replies = std::iter::once(self.promise(round, ballot)).chain(
            self.peers()
                .into_iter()
                .map(|peer| peer.promise(round, ballot)),
        );
        for reply in replies {
            let reply = match reply {
                Ok(reply) => reply,
                Err(e) => {
                    self.abstained("promise", round, &e);
                    continue;
                }
            };
            if let Some(entry) = reply.accepted {
                if entry.ballot > adopted_ballot {
                    adopted_ballot = entry.ballot;
                    prepared.adopted = Some(Adopted {
                        operation: entry.operation,
                        reported: true,
                    });
                }
            }
            if reply.ack {
                prepared.acks += 1;
            } else if prepared.highest_nack < Some(reply.promised_ballot) {
                prepared.highest_nack = Some(reply.promised_ballot);
            }
        }
        debug!(
            "Proposer {}: round {} ballot {}: {} promises",
            self.node_id(),
            round,
            ballot,
            prepared.acks
        );
        prepared
    }

    /// Phase 2: asks every acceptor to accept `operation`.
    fn accept_request(&self, round: Round, ballot: Ballot, operation: &Operation) -> AcceptTally {
        let mut tally = AcceptTally {
            acks: 0,
            highest_nack: None,
        };
        let replies = std::iter::once(self.accept(round, ballot, operation.clone())).chain(
            self.peers()
                .into_iter()
                .map(|peer| peer.accept(round, ballot, operation.clone())),
        );
        for reply in replies {
            match reply {
                Ok(reply) if reply.ack => tally.acks += 1,
                Ok(reply) => {
                    if tally.highest_nack < Some(reply.promised_ballot) {
                        tally.highest_nack = Some(reply.promised_ballot);
                    }
                }
                Err(e) => self.abstained("accept", round, &e),
            }
        }
        debug!(
            "Proposer {}: round {} ballot {}: {} accepts",
            self.node_id(),
            round,
            ballot,
            tally.acks
        );
        tally
    }

    fn apply_chosen(&self, round: Round, operation: Operation) -> Result<String> {
        let mut state = self.state();
        let state = &mut *state;
        match state.machine.commit(&mut state.log, round, operation) {
            Some(response) => Ok(response),
            None => {
                let msg = format!(
                    "round {} chosen ahead of frontier {}",
                    round,
                    state.log.frontier()
                );
                error!("Proposer {}: {}", self.node_id(), msg);
                Err(PaxosError::Invariant(msg))
            }
        }
    }

    fn abstained(&self, phase: &str, round: Round, e: &PaxosError) {
        if e.is_abstention() {
            debug!(
                "Proposer {}: no {} vote in round {}: {}",
                self.node_id(),
                phase,
                round,
                e
            );
        } else {
            error!(
                "Proposer {}: {} in round {} failed: {}",
                self.node_id(),
                phase,
                round,
                e
            );
        }
    }
}
