//! Rockbound-backed implementations of the `tessera-db` traits.

pub mod batch;
pub mod prover;

pub mod macros;
pub mod utils;

#[cfg(feature = "test_utils")]
pub mod test_utils;

use rockbound::{schema::ColumnFamilyName, Schema};

pub const ROCKSDB_NAME: &str = "tessera";

pub const PROVER_COLUMN_FAMILIES: &[ColumnFamilyName] =
    &[prover::schemas::ProverTaskSchema::COLUMN_FAMILY_NAME];

pub const RELAYER_COLUMN_FAMILIES: &[ColumnFamilyName] = &[
    batch::schemas::BatchSchema::COLUMN_FAMILY_NAME,
    batch::schemas::BatchHashIndexSchema::COLUMN_FAMILY_NAME,
    batch::schemas::BatchProofSchema::COLUMN_FAMILY_NAME,
    batch::schemas::RelayMessageSchema::COLUMN_FAMILY_NAME,
];

// Re-exports
pub use batch::db::RBBatchDb;
pub use prover::db::ProverTaskDb;
pub use utils::open_rocksdb_database;

/// database operations configuration
#[derive(Clone, Copy, Debug)]
pub struct DbOpsConfig {
    pub retry_count: u16,
}

impl DbOpsConfig {
    pub fn new(retry_count: u16) -> Self {
        Self { retry_count }
    }
}
