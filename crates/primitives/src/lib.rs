//! Shared types for the prover agent and the settlement relayer.
//!
//! Everything here is plain data plus the few pure functions both sides agree
//! on: proof task payloads, the signed proof envelope, batch lifecycle
//! statuses and the rollup contract calls.

pub mod batch;
pub mod contracts;
pub mod proof;
pub mod task;
pub mod trace;
pub mod words;

pub use alloy_primitives::{keccak256, Address, Bytes, B256, U256, U64};
