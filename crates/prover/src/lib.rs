//! Prover agent: acquires proving tasks, drives the proof engine and submits
//! signed results to the coordinator.

pub mod agent;
pub mod chain;
pub mod coordinator;
pub mod engine;
pub mod errors;
pub mod keys;

pub use agent::{ProverAgent, AGENT_VERSION};
