//! Settlement relayer: commits batches to L1, finalizes them with their
//! proofs, keeps the L1 gas price oracle current and reconciles transaction
//! confirmations with the stored batch and message state.

pub mod counters;
pub mod gas_oracle;
pub mod reconcile;
pub mod registry;
pub mod relayer;
pub mod scheduler;
pub mod sender;

#[cfg(test)]
pub(crate) mod test_utils;

pub use counters::{CountersSnapshot, RelayerCounters};
pub use reconcile::ConfirmationChannels;
pub use relayer::{RelayerSenders, SettlementRelayer};
pub use scheduler::spawn_relayer_tasks;
