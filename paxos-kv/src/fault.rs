use std::{
    sync::{
        mpsc::{self, RecvTimeoutError},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::paxos::{node::PaxosNode, NodeId};

/// Randomly takes nodes down and brings them back, modelling crash/recover
/// faults without losing any node state.
pub struct FaultInjector {
    targets: Vec<Arc<PaxosNode>>,
    rng: StdRng,
}

impl FaultInjector {
    pub fn new(targets: Vec<Arc<PaxosNode>>) -> Self {
        FaultInjector {
            targets,
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn with_seed(targets: Vec<Arc<PaxosNode>>, seed: u64) -> Self {
        FaultInjector {
            targets,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Picks one node at random and sets it down with probability one half,
    /// up otherwise. Returns the node and its new availability.
    pub fn step(&mut self) -> Option<(NodeId, bool)> {
        if self.targets.is_empty() {
            return None;
        }
        let idx = self.rng.random_range(0..self.targets.len());
        let available = !self.rng.random_bool(0.5);
        let node = &self.targets[idx];
        node.set_available(available);
        Some((node.node_id(), available))
    }

    /// Marks every target available again.
    pub fn heal(&self) {
        for node in &self.targets {
            node.set_available(true);
        }
    }

    /// Runs `step` every `interval` on a background thread.
    pub fn spawn(mut self, interval: Duration) -> FaultHandle {
        let (stop, stopped) = mpsc::channel::<()>();
        let thread = thread::spawn(move || {
            while let Err(RecvTimeoutError::Timeout) = stopped.recv_timeout(interval) {
                if let Some((node_id, available)) = self.step() {
                    info!(
                        "Fault injector: node {} {}",
                        node_id,
                        if available { "up" } else { "down" }
                    );
                }
            }
            self.heal();
        });
        FaultHandle {
            stop: Some(stop),
            thread: Some(thread),
        }
    }
}

/// Stops the injector and heals its targets when dropped.
pub struct FaultHandle {
    stop: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl FaultHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        drop(self.stop.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Fault injector thread panicked");
            }
        }
    }
}

impl Drop for FaultHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
