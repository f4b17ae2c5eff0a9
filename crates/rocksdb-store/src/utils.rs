use std::{fs, path::Path, sync::Arc};

use rockbound::{rocksdb, schema::ColumnFamilyName, OptimisticTransactionDB};
use tracing::*;

use crate::ROCKSDB_NAME;

/// Opens (creating if needed) the database under `datadir` with the given
/// column families.
pub fn open_rocksdb_database(
    datadir: &Path,
    cfs: &[ColumnFamilyName],
) -> anyhow::Result<Arc<OptimisticTransactionDB>> {
    if !datadir.exists() {
        fs::create_dir_all(datadir)?;
    }

    let mut opts = rocksdb::Options::default();
    opts.create_if_missing(true);
    opts.create_missing_column_families(true);

    let rbdb = OptimisticTransactionDB::open(
        datadir,
        ROCKSDB_NAME,
        cfs.iter().map(|s| s.to_string()),
        &opts,
    )?;
    info!(path = %datadir.display(), "opened database");

    Ok(Arc::new(rbdb))
}
