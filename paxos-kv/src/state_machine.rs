use std::{collections::HashMap, fmt};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    error::{PaxosError, Result},
    paxos::{consensus_log::ConsensusLog, Round},
};

/// Kinds of operations the replicated store understands.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpKind {
    Get,
    Put,
    Delete,
}

/// A client operation, agreed upon once per round.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Operation {
    pub kind: OpKind,
    pub key: String,
    /// Present only for `PUT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Operation {
    pub fn get(key: impl Into<String>) -> Self {
        Operation {
            kind: OpKind::Get,
            key: key.into(),
            value: None,
        }
    }

    pub fn put(key: impl Into<String>, value: impl Into<String>) -> Self {
        Operation {
            kind: OpKind::Put,
            key: key.into(),
            value: Some(value.into()),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Operation {
            kind: OpKind::Delete,
            key: key.into(),
            value: None,
        }
    }

    /// Parses a client command.
    /// Expected formats:
    /// - "GET key"
    /// - "DELETE key"
    /// - "PUT key value"
    pub fn parse(input: &str) -> Result<Self> {
        let parts: Vec<&str> = input.split_whitespace().collect();
        if parts.is_empty() {
            return Err(PaxosError::InvalidOperation("empty command".to_string()));
        }
        match (parts[0].to_uppercase().as_str(), parts.len()) {
            ("GET", 2) => Ok(Operation::get(parts[1])),
            ("DELETE", 2) => Ok(Operation::delete(parts[1])),
            ("PUT", 3) => Ok(Operation::put(parts[1], parts[2])),
            ("GET" | "DELETE", _) => Err(PaxosError::InvalidOperation(format!(
                "{} takes exactly one argument",
                parts[0]
            ))),
            ("PUT", _) => Err(PaxosError::InvalidOperation(
                "PUT takes exactly two arguments".to_string(),
            )),
            _ => Err(PaxosError::InvalidOperation(format!(
                "unknown command '{}'",
                parts[0]
            ))),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.value) {
            (OpKind::Put, Some(value)) => write!(f, "PUT {} {}", self.key, value),
            (OpKind::Put, None) => write!(f, "PUT {}", self.key),
            (OpKind::Get, _) => write!(f, "GET {}", self.key),
            (OpKind::Delete, _) => write!(f, "DELETE {}", self.key),
        }
    }
}

/// A simple key–value store.
#[derive(Debug, Default)]
pub struct KVStore {
    pub store: HashMap<String, String>,
}

impl KVStore {
    pub fn new() -> Self {
        KVStore {
            store: HashMap::new(),
        }
    }

    /// Applies an operation and describes the outcome for the client.
    pub fn apply(&mut self, operation: &Operation) -> String {
        let key = &operation.key;
        match operation.kind {
            OpKind::Put => {
                let value = operation.value.clone().unwrap_or_default();
                let response = format!("Successfully put the key {} of value {}", key, value);
                self.store.insert(key.clone(), value);
                response
            }
            OpKind::Delete => match self.store.remove(key) {
                Some(_) => format!("Successfully deleted the key {}", key),
                None => not_found(key),
            },
            OpKind::Get => match self.store.get(key) {
                Some(value) => format!("The value of key {} is {}", key, value),
                None => not_found(key),
            },
        }
    }
}

fn not_found(key: &str) -> String {
    format!("Key {} Not found in the store", key)
}

/// Applies decided operations to the store, once per round and in round order.
#[derive(Debug, Default)]
pub struct ReplicatedStateMachine {
    kv: KVStore,
}

impl ReplicatedStateMachine {
    pub fn new() -> Self {
        ReplicatedStateMachine { kv: KVStore::new() }
    }

    /// Records `operation` as the value chosen for `round` and applies every
    /// chosen round from the committed frontier onwards.
    ///
    /// Returns the client response for `round` once it is decided. An already
    /// decided round returns its cached response without touching the store.
    /// `None` means an earlier round is still undecided on this node; the
    /// value stays chosen and is applied as soon as the frontier reaches it.
    pub fn commit(
        &mut self,
        log: &mut ConsensusLog,
        round: Round,
        operation: Operation,
    ) -> Option<String> {
        let record = log.record_mut(round);
        if record.decided {
            return record.client_response.clone();
        }
        if record.chosen.is_none() {
            record.chosen = Some(operation);
        }

        while let Some((next, op)) = log.pending_at_frontier() {
            let response = self.kv.apply(&op);
            info!("Applied round {}: {} -> {}", next, op, response);
            log.decide(next, response);
        }

        let response = log.decided_response(round);
        if response.is_none() {
            debug!(
                "Round {} chosen but waiting for frontier {}",
                round,
                log.frontier()
            );
        }
        response
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.kv.store.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_the_three_command_shapes() {
        assert_eq!(Operation::parse("PUT a 1").unwrap(), Operation::put("a", "1"));
        assert_eq!(Operation::parse("get a").unwrap(), Operation::get("a"));
        assert_eq!(
            Operation::parse("  DELETE   a ").unwrap(),
            Operation::delete("a")
        );
    }

    #[test]
    fn parse_rejects_malformed_commands() {
        for input in ["", "PUT a", "GET", "GET a b", "DELETE", "PUT a 1 2", "SET a 1"] {
            assert!(
                matches!(
                    Operation::parse(input),
                    Err(PaxosError::InvalidOperation(_))
                ),
                "'{}' should be rejected",
                input
            );
        }
    }

    #[test]
    fn operation_wire_shape_omits_value_unless_put() {
        let json = serde_json::to_string(&Operation::get("a")).unwrap();
        assert_eq!(json, r#"{"kind":"GET","key":"a"}"#);
        let json = serde_json::to_string(&Operation::put("a", "1")).unwrap();
        assert_eq!(json, r#"{"kind":"PUT","key":"a","value":"1"}"#);
    }

    #[test]
    fn kv_store_responses() {
        let mut kv = KVStore::new();
        assert_eq!(
            kv.apply(&Operation::delete("missing")),
            "Key missing Not found in the store"
        );
        assert_eq!(
            kv.apply(&Operation::put("a", "1")),
            "Successfully put the key a of value 1"
        );
        assert_eq!(kv.apply(&Operation::get("a")), "The value of key a is 1");
        assert_eq!(
            kv.apply(&Operation::delete("a")),
            "Successfully deleted the key a"
        );
        assert_eq!(kv.apply(&Operation::get("a")), "Key a Not found in the store");
    }

    #[test]
    fn commit_is_idempotent_per_round() {
        let mut log = ConsensusLog::new(0);
        let mut machine = ReplicatedStateMachine::new();

        let first = machine.commit(&mut log, 0, Operation::delete("a"));
        machine.kv.store.insert("a".to_string(), "x".to_string());
        let second = machine.commit(&mut log, 0, Operation::delete("a"));

        assert_eq!(first.as_deref(), Some("Key a Not found in the store"));
        assert_eq!(first, second);
        assert_eq!(machine.get("a").map(String::as_str), Some("x"));
        assert_eq!(log.frontier(), 1);
    }

    #[test]
    fn commit_waits_for_earlier_rounds() {
        let mut log = ConsensusLog::new(0);
        let mut machine = ReplicatedStateMachine::new();

        assert_eq!(machine.commit(&mut log, 1, Operation::get("a")), None);
        assert_eq!(log.frontier(), 0);

        let response = machine.commit(&mut log, 0, Operation::put("a", "1"));
        assert_eq!(
            response.as_deref(),
            Some("Successfully put the key a of value 1")
        );
        assert_eq!(log.frontier(), 2);
        assert_eq!(
            log.decided_response(1).as_deref(),
            Some("The value of key a is 1")
        );
    }
}
