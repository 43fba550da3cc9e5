use std::cmp::Ordering;

use log::{debug, info};

use crate::{
    error::Result,
    paxos::{consensus_log::LearnerTally, node::PaxosNode, Ballot, LearnerTrait, Round},
    state_machine::Operation,
};

impl LearnerTrait for PaxosNode {
    fn learn(&self, round: Round, ballot: Ballot, operation: Operation) -> Result<()> {
        self.ensure_available()?;
        self.catch_up(round);

        let majority = self.majority();
        let mut state = self.state();
        let state = &mut *state;
        let record = state.log.record_mut(round);

        let tracked = record.learner_tally.as_ref().map_or(0, |t| t.ballot);
        let reached = match ballot.cmp(&tracked) {
            Ordering::Greater => {
                record.learner_tally = Some(LearnerTally {
                    ballot,
                    count: 1,
                    operation: operation.clone(),
                });
                1 >= majority
            }
            Ordering::Equal => match record.learner_tally.as_mut() {
                Some(tally) => {
                    tally.count += 1;
                    tally.count >= majority
                }
                None => false,
            },
            Ordering::Less => {
                debug!(
                    "Learner {}: stale ballot {} in round {} (tracking {})",
                    self.node_id(),
                    ballot,
                    round,
                    tracked
                );
                false
            }
        };

        if reached {
            debug!(
                "Learner {}: majority for ballot {} in round {}",
                self.node_id(),
                ballot,
                round
            );
            if state
                .machine
                .commit(&mut state.log, round, operation)
                .is_none()
            {
                info!(
                    "Learner {}: round {} chosen ahead of frontier {}",
                    self.node_id(),
                    round,
                    state.log.frontier()
                );
            }
        }
        Ok(())
    }
}
