//! Storage interfaces for the prover agent and the settlement relayer.
//!
//! Only the traits and their error type live here; `tessera-rocksdb` carries
//! the durable implementations and the `stubs` feature provides in-memory ones
//! for tests.

pub mod errors;
pub mod traits;
pub mod types;

#[cfg(feature = "stubs")]
pub mod stubs;

/// Wrapper result type for database operations.
pub type DbResult<T> = anyhow::Result<T, errors::DbError>;

pub use errors::DbError;
