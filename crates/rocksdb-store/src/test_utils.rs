use std::sync::Arc;

use rockbound::{rocksdb, OptimisticTransactionDB};
use tempfile::TempDir;

use crate::{DbOpsConfig, PROVER_COLUMN_FAMILIES, RELAYER_COLUMN_FAMILIES, ROCKSDB_NAME};

/// Opens a database with every column family in a fresh temp dir.
pub fn get_rocksdb_tmp_instance() -> anyhow::Result<(Arc<OptimisticTransactionDB>, DbOpsConfig)> {
    let cfs = PROVER_COLUMN_FAMILIES
        .iter()
        .chain(RELAYER_COLUMN_FAMILIES.iter())
        .map(|s| s.to_string());

    let mut opts = rocksdb::Options::default();
    opts.create_missing_column_families(true);
    opts.create_if_missing(true);

    let temp_dir = TempDir::new()?;
    let rbdb = OptimisticTransactionDB::open(temp_dir.into_path(), ROCKSDB_NAME, cfs, &opts)?;

    Ok((Arc::new(rbdb), DbOpsConfig::new(5)))
}
