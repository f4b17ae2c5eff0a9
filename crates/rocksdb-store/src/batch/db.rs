use std::sync::Arc;

use rockbound::{
    utils::get_last, OptimisticTransactionDB, SchemaDBOperationsExt, TransactionRetry,
};
use tessera_db::{
    errors::DbError,
    traits::BatchDatabase,
    types::{MessageRecord, ProofBuffers},
    DbResult,
};
use tessera_primitives::{
    batch::{BatchRecord, GasOracleStatus, MsgStatus, ProvingStatus, RollupStatus},
    B256,
};
use tracing::*;

use super::schemas::{BatchHashIndexSchema, BatchProofSchema, BatchSchema, RelayMessageSchema};
use crate::DbOpsConfig;

pub struct RBBatchDb {
    db: Arc<OptimisticTransactionDB>,
    ops: DbOpsConfig,
}

impl RBBatchDb {
    pub fn new(db: Arc<OptimisticTransactionDB>, ops: DbOpsConfig) -> Self {
        Self { db, ops }
    }

    /// Scans batches in index order, keeping those matching `filter`.
    fn scan_batches(
        &self,
        limit: usize,
        filter: impl Fn(&BatchRecord) -> bool,
    ) -> DbResult<Vec<BatchRecord>> {
        let mut iterator = self.db.iter::<BatchSchema>()?;
        iterator.seek_to_first();

        let mut found = Vec::new();
        for res in iterator {
            if found.len() >= limit {
                break;
            }
            let (_, record) = res?.into_tuple();
            if filter(&record) {
                found.push(record);
            }
        }

        Ok(found)
    }

    /// Re-reads the batch inside an optimistic transaction and applies `f` to
    /// it. Nothing is written if `f` fails.
    fn update_batch(
        &self,
        hash: B256,
        f: impl Fn(&mut BatchRecord) -> DbResult<()>,
    ) -> DbResult<()> {
        self.update_batch_if(hash, |record| f(record).map(|()| true))
            .map(|_| ())
    }

    /// Like [`Self::update_batch`], but `f` reports whether it changed the
    /// record. Nothing is written when it returns `false`.
    fn update_batch_if(
        &self,
        hash: B256,
        f: impl Fn(&mut BatchRecord) -> DbResult<bool>,
    ) -> DbResult<bool> {
        self.db
            .with_optimistic_txn(TransactionRetry::Count(self.ops.retry_count), |txn| {
                let idx = txn
                    .get::<BatchHashIndexSchema>(&hash)?
                    .ok_or(DbError::BatchNotFound(hash))?;
                let mut record = txn
                    .get::<BatchSchema>(&idx)?
                    .ok_or(DbError::BatchNotFound(hash))?;

                if !f(&mut record)? {
                    return Ok::<bool, DbError>(false);
                }
                txn.put::<BatchSchema>(&idx, &record)?;

                Ok(true)
            })
            .map_err(|e: rockbound::TransactionError<_>| DbError::TransactionError(e.to_string()))
    }
}

fn rollup_transition(record: &mut BatchRecord, status: RollupStatus) -> DbResult<()> {
    record
        .rollup_status
        .transition(status)
        .map_err(|source| DbError::InvalidStatus {
            hash: record.hash,
            source,
        })
}

impl BatchDatabase for RBBatchDb {
    fn get_latest_batch(&self) -> DbResult<Option<BatchRecord>> {
        Ok(get_last::<BatchSchema>(self.db.as_ref())?.map(|(_, record)| record))
    }

    fn get_batch_by_hash(&self, hash: B256) -> DbResult<Option<BatchRecord>> {
        match self.db.get::<BatchHashIndexSchema>(&hash)? {
            Some(idx) => Ok(self.db.get::<BatchSchema>(&idx)?),
            None => Ok(None),
        }
    }

    fn get_committed_batches(&self, limit: usize) -> DbResult<Vec<B256>> {
        let committed =
            self.scan_batches(limit, |b| b.rollup_status == RollupStatus::Committed)?;
        Ok(committed.into_iter().map(|b| b.hash).collect())
    }

    fn get_pending_batches(&self, limit: usize) -> DbResult<Vec<BatchRecord>> {
        self.scan_batches(limit, |b| b.rollup_status == RollupStatus::Pending)
    }

    fn get_latest_finalizing_or_finalized_batch(&self) -> DbResult<Option<BatchRecord>> {
        let mut iterator = self.db.iter::<BatchSchema>()?;
        iterator.seek_to_last();

        for res in iterator.rev() {
            let (_, record) = res?.into_tuple();
            if matches!(
                record.rollup_status,
                RollupStatus::Finalizing | RollupStatus::Finalized
            ) {
                return Ok(Some(record));
            }
        }

        Ok(None)
    }

    fn update_skipped_batches(&self) -> DbResult<u64> {
        let stale = self.scan_batches(usize::MAX, |b| {
            b.rollup_status == RollupStatus::Committed
                && matches!(
                    b.proving_status,
                    ProvingStatus::Failed | ProvingStatus::Skipped
                )
        })?;

        let mut count = 0;
        for record in stale {
            // the batch may have moved on since the scan
            let res = self.update_batch_if(record.hash, |current| {
                if current.rollup_status != RollupStatus::Committed {
                    return Ok(false);
                }
                rollup_transition(current, RollupStatus::FinalizationSkipped)?;
                Ok(true)
            });

            match res {
                Ok(true) => count += 1,
                Ok(false) => {}
                Err(e) => warn!(batch_hash = %record.hash, err = %e, "failed to skip stale batch"),
            }
        }

        Ok(count)
    }

    fn update_rollup_status(&self, hash: B256, status: RollupStatus) -> DbResult<()> {
        self.update_batch(hash, |record| rollup_transition(record, status))
    }

    fn update_commit_tx_hash_and_rollup_status(
        &self,
        hash: B256,
        tx_hash: B256,
        status: RollupStatus,
    ) -> DbResult<()> {
        self.update_batch(hash, |record| {
            rollup_transition(record, status)?;
            record.commit_tx_hash = Some(tx_hash);
            Ok(())
        })
    }

    fn update_finalize_tx_hash_and_rollup_status(
        &self,
        hash: B256,
        tx_hash: B256,
        status: RollupStatus,
    ) -> DbResult<()> {
        self.update_batch(hash, |record| {
            rollup_transition(record, status)?;
            record.finalize_tx_hash = Some(tx_hash);
            Ok(())
        })
    }

    fn update_gas_oracle_status_and_tx_hash(
        &self,
        hash: B256,
        status: GasOracleStatus,
        tx_hash: B256,
    ) -> DbResult<()> {
        self.update_batch(hash, |record| {
            record
                .gas_oracle_status
                .transition(status)
                .map_err(|source| DbError::InvalidStatus { hash, source })?;
            record.oracle_tx_hash = Some(tx_hash);
            Ok(())
        })
    }

    fn get_proof_buffers(&self, hash: B256) -> DbResult<Option<ProofBuffers>> {
        Ok(self.db.get::<BatchProofSchema>(&hash)?)
    }

    fn update_message_status_and_l1_hash(
        &self,
        msg_hash: B256,
        status: MsgStatus,
        layer1_hash: Option<B256>,
    ) -> DbResult<()> {
        let record = MessageRecord {
            status,
            layer1_hash,
        };
        self.db.put::<RelayMessageSchema>(&msg_hash, &record)?;
        Ok(())
    }

    fn get_message(&self, msg_hash: B256) -> DbResult<Option<MessageRecord>> {
        Ok(self.db.get::<RelayMessageSchema>(&msg_hash)?)
    }

    fn insert_batch(&self, record: BatchRecord) -> DbResult<()> {
        self.db
            .with_optimistic_txn(TransactionRetry::Count(self.ops.retry_count), |txn| {
                let idx = record.index();
                if txn.get::<BatchHashIndexSchema>(&record.hash)?.is_some()
                    || txn.get::<BatchSchema>(&idx)?.is_some()
                {
                    return Err(DbError::BatchExists(record.hash));
                }

                txn.put::<BatchHashIndexSchema>(&record.hash, &idx)?;
                txn.put::<BatchSchema>(&idx, &record)?;

                Ok::<(), DbError>(())
            })
            .map_err(|e: rockbound::TransactionError<_>| DbError::TransactionError(e.to_string()))
    }

    fn update_proving_status(&self, hash: B256, status: ProvingStatus) -> DbResult<()> {
        self.update_batch(hash, |record| {
            record.proving_status = status;
            Ok(())
        })
    }

    fn put_proof_buffers(&self, hash: B256, buffers: ProofBuffers) -> DbResult<()> {
        self.db
            .with_optimistic_txn(TransactionRetry::Count(self.ops.retry_count), |txn| {
                if txn.get::<BatchHashIndexSchema>(&hash)?.is_none() {
                    return Err(DbError::BatchNotFound(hash));
                }
                txn.put::<BatchProofSchema>(&hash, &buffers)?;

                Ok::<(), DbError>(())
            })
            .map_err(|e: rockbound::TransactionError<_>| DbError::TransactionError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use tessera_primitives::batch::BatchHeader;

    use super::*;
    use crate::test_utils::get_rocksdb_tmp_instance;

    fn setup_db() -> RBBatchDb {
        let (db, db_ops) = get_rocksdb_tmp_instance().unwrap();
        RBBatchDb::new(db, db_ops)
    }

    fn batch(index: u64) -> BatchRecord {
        let header = BatchHeader {
            index,
            parent_batch_hash: B256::with_last_byte(index.saturating_sub(1) as u8),
            prev_state_root: B256::repeat_byte(1),
            post_state_root: B256::repeat_byte(2),
            withdraw_root: B256::ZERO,
            data_hash: B256::repeat_byte(3),
        };
        BatchRecord::new(B256::with_last_byte(index as u8), header, 1_000 + index)
    }

    fn insert_committed(db: &RBBatchDb, index: u64) -> B256 {
        let record = batch(index);
        let hash = record.hash;
        db.insert_batch(record).unwrap();
        db.update_commit_tx_hash_and_rollup_status(hash, B256::ZERO, RollupStatus::Committing)
            .unwrap();
        db.update_commit_tx_hash_and_rollup_status(hash, B256::ZERO, RollupStatus::Committed)
            .unwrap();
        hash
    }

    #[test]
    fn test_insert_and_lookup() {
        let db = setup_db();
        let record = batch(1);
        db.insert_batch(record.clone()).unwrap();

        assert_eq!(db.get_batch_by_hash(record.hash).unwrap(), Some(record.clone()));
        assert!(db.insert_batch(record).is_err());
        assert_eq!(db.get_batch_by_hash(B256::repeat_byte(0xee)).unwrap(), None);
    }

    #[test]
    fn test_latest_batch_uses_numeric_order() {
        let db = setup_db();
        // 256 sorts before 3 under little-endian keys
        for idx in [3, 256, 7] {
            let mut record = batch(idx);
            record.hash = B256::left_padding_from(&idx.to_be_bytes());
            db.insert_batch(record).unwrap();
        }

        assert_eq!(db.get_latest_batch().unwrap().unwrap().index(), 256);
    }

    #[test]
    fn test_committed_batches_in_index_order() {
        let db = setup_db();
        let h2 = insert_committed(&db, 2);
        let h1 = insert_committed(&db, 1);
        db.insert_batch(batch(3)).unwrap();
        let h4 = insert_committed(&db, 4);

        assert_eq!(db.get_committed_batches(10).unwrap(), vec![h1, h2, h4]);
        assert_eq!(db.get_committed_batches(1).unwrap(), vec![h1]);
        assert_eq!(db.get_pending_batches(10).unwrap().len(), 1);
    }

    #[test]
    fn test_terminal_status_not_overwritten() {
        let db = setup_db();
        let hash = insert_committed(&db, 1);
        db.update_rollup_status(hash, RollupStatus::FinalizationSkipped)
            .unwrap();

        let res = db.update_finalize_tx_hash_and_rollup_status(
            hash,
            B256::repeat_byte(9),
            RollupStatus::Finalizing,
        );

        assert!(res.is_err());
        let stored = db.get_batch_by_hash(hash).unwrap().unwrap();
        assert_eq!(stored.rollup_status, RollupStatus::FinalizationSkipped);
        assert_eq!(stored.finalize_tx_hash, None);
    }

    #[test]
    fn test_skip_sweep_only_touches_unprovable_committed() {
        let db = setup_db();
        let failed = insert_committed(&db, 1);
        let skipped = insert_committed(&db, 2);
        let verified = insert_committed(&db, 3);
        db.update_proving_status(failed, ProvingStatus::Failed).unwrap();
        db.update_proving_status(skipped, ProvingStatus::Skipped).unwrap();
        db.update_proving_status(verified, ProvingStatus::Verified).unwrap();

        let pending = batch(4);
        let pending_hash = pending.hash;
        db.insert_batch(pending).unwrap();
        db.update_proving_status(pending_hash, ProvingStatus::Failed).unwrap();

        assert_eq!(db.update_skipped_batches().unwrap(), 2);
        assert_eq!(db.get_committed_batches(10).unwrap(), vec![verified]);
        let pending = db.get_batch_by_hash(pending_hash).unwrap().unwrap();
        assert_eq!(pending.rollup_status, RollupStatus::Pending);
    }

    #[test]
    fn test_skip_sweep_counts_only_real_transitions() {
        let db = setup_db();
        let failed = insert_committed(&db, 1);
        db.update_proving_status(failed, ProvingStatus::Failed).unwrap();

        assert_eq!(db.update_skipped_batches().unwrap(), 1);
        // already skipped, nothing left to sweep
        assert_eq!(db.update_skipped_batches().unwrap(), 0);
    }

    #[test]
    fn test_conditional_update_leaves_moved_batch_alone() {
        let db = setup_db();
        let hash = insert_committed(&db, 1);
        db.update_proving_status(hash, ProvingStatus::Failed).unwrap();
        // the batch moves on between the sweep's scan and its update
        db.update_finalize_tx_hash_and_rollup_status(hash, B256::ZERO, RollupStatus::Finalizing)
            .unwrap();

        let changed = db
            .update_batch_if(hash, |current| {
                if current.rollup_status != RollupStatus::Committed {
                    return Ok(false);
                }
                rollup_transition(current, RollupStatus::FinalizationSkipped)?;
                Ok(true)
            })
            .unwrap();

        assert!(!changed);
        let stored = db.get_batch_by_hash(hash).unwrap().unwrap();
        assert_eq!(stored.rollup_status, RollupStatus::Finalizing);
        assert_eq!(db.update_skipped_batches().unwrap(), 0);
    }

    #[test]
    fn test_latest_finalizing_or_finalized() {
        let db = setup_db();
        assert_eq!(db.get_latest_finalizing_or_finalized_batch().unwrap(), None);

        let h1 = insert_committed(&db, 1);
        let h2 = insert_committed(&db, 2);
        insert_committed(&db, 3);
        db.update_finalize_tx_hash_and_rollup_status(h1, B256::ZERO, RollupStatus::Finalized)
            .unwrap();
        db.update_finalize_tx_hash_and_rollup_status(h2, B256::ZERO, RollupStatus::Finalizing)
            .unwrap();

        let latest = db.get_latest_finalizing_or_finalized_batch().unwrap();
        assert_eq!(latest.map(|b| b.hash), Some(h2));
    }

    #[test]
    fn test_gas_oracle_and_message_updates() {
        let db = setup_db();
        let record = batch(1);
        let hash = record.hash;
        db.insert_batch(record).unwrap();

        db.update_gas_oracle_status_and_tx_hash(hash, GasOracleStatus::Importing, B256::repeat_byte(5))
            .unwrap();
        db.update_gas_oracle_status_and_tx_hash(hash, GasOracleStatus::Imported, B256::repeat_byte(6))
            .unwrap();
        let stored = db.get_batch_by_hash(hash).unwrap().unwrap();
        assert_eq!(stored.gas_oracle_status, GasOracleStatus::Imported);
        assert_eq!(stored.oracle_tx_hash, Some(B256::repeat_byte(6)));

        let msg = B256::repeat_byte(0x42);
        db.update_message_status_and_l1_hash(msg, MsgStatus::Confirmed, Some(B256::repeat_byte(7)))
            .unwrap();
        assert_eq!(
            db.get_message(msg).unwrap(),
            Some(MessageRecord {
                status: MsgStatus::Confirmed,
                layer1_hash: Some(B256::repeat_byte(7)),
            })
        );
    }

    #[test]
    fn test_proof_buffers_require_known_batch() {
        let db = setup_db();
        let buffers = ProofBuffers {
            proof: vec![1; 64],
            instances: vec![2; 32],
        };
        assert!(db.put_proof_buffers(B256::ZERO, buffers.clone()).is_err());

        let record = batch(1);
        let hash = record.hash;
        db.insert_batch(record).unwrap();
        db.put_proof_buffers(hash, buffers.clone()).unwrap();

        assert_eq!(db.get_proof_buffers(hash).unwrap(), Some(buffers));
    }
}
