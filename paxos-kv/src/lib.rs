pub mod config;
pub mod error;
pub mod fault;
pub mod network;
pub mod paxos;
pub mod state_machine;
