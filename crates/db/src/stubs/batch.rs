use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use tessera_primitives::{
    batch::{BatchRecord, GasOracleStatus, MsgStatus, ProvingStatus, RollupStatus},
    B256,
};

use crate::{
    errors::DbError,
    traits::BatchDatabase,
    types::{MessageRecord, ProofBuffers},
    DbResult,
};

#[derive(Debug, Default)]
struct State {
    batches: BTreeMap<u64, BatchRecord>,
    index_by_hash: HashMap<B256, u64>,
    proofs: HashMap<B256, ProofBuffers>,
    messages: HashMap<B256, MessageRecord>,
}

impl State {
    fn batch_mut(&mut self, hash: B256) -> DbResult<&mut BatchRecord> {
        let idx = self
            .index_by_hash
            .get(&hash)
            .copied()
            .ok_or(DbError::BatchNotFound(hash))?;
        self.batches
            .get_mut(&idx)
            .ok_or(DbError::BatchNotFound(hash))
    }
}

/// Batch store kept in memory behind one lock.
#[derive(Debug, Default)]
pub struct StubBatchDb {
    state: Mutex<State>,
}

impl StubBatchDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn update_batch(
        &self,
        hash: B256,
        f: impl FnOnce(&mut BatchRecord) -> DbResult<()>,
    ) -> DbResult<()> {
        let mut state = self.state.lock();
        let record = state.batch_mut(hash)?;
        // apply to a copy so a rejected transition leaves the record intact
        let mut updated = record.clone();
        f(&mut updated)?;
        *record = updated;
        Ok(())
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

impl BatchDatabase for StubBatchDb {
    fn get_latest_batch(&self) -> DbResult<Option<BatchRecord>> {
        let state = self.state.lock();
        Ok(state.batches.values().next_back().cloned())
    }

    fn get_batch_by_hash(&self, hash: B256) -> DbResult<Option<BatchRecord>> {
        let state = self.state.lock();
        Ok(state
            .index_by_hash
            .get(&hash)
            .and_then(|idx| state.batches.get(idx))
            .cloned())
    }

    fn get_committed_batches(&self, limit: usize) -> DbResult<Vec<B256>> {
        let state = self.state.lock();
        Ok(state
            .batches
            .values()
            .filter(|b| b.rollup_status == RollupStatus::Committed)
            .take(limit)
            .map(|b| b.hash)
            .collect())
    }

    fn get_pending_batches(&self, limit: usize) -> DbResult<Vec<BatchRecord>> {
        let state = self.state.lock();
        Ok(state
            .batches
            .values()
            .filter(|b| b.rollup_status == RollupStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }

    fn get_latest_finalizing_or_finalized_batch(&self) -> DbResult<Option<BatchRecord>> {
        let state = self.state.lock();
        Ok(state
            .batches
            .values()
            .rev()
            .find(|b| {
                matches!(
                    b.rollup_status,
                    RollupStatus::Finalizing | RollupStatus::Finalized
                )
            })
            .cloned())
    }

    fn update_skipped_batches(&self) -> DbResult<u64> {
        let mut state = self.state.lock();
        let mut count = 0;
        for record in state.batches.values_mut() {
            if record.rollup_status == RollupStatus::Committed
                && matches!(
                    record.proving_status,
                    ProvingStatus::Failed | ProvingStatus::Skipped
                )
            {
                record.rollup_status = RollupStatus::FinalizationSkipped;
                count += 1;
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
        Ok(self.state.lock().proofs.get(&hash).cloned())
    }

    fn update_message_status_and_l1_hash(
        &self,
        msg_hash: B256,
        status: MsgStatus,
        layer1_hash: Option<B256>,
    ) -> DbResult<()> {
        self.state.lock().messages.insert(
            msg_hash,
            MessageRecord {
                status,
                layer1_hash,
            },
        );
        Ok(())
    }

    fn get_message(&self, msg_hash: B256) -> DbResult<Option<MessageRecord>> {
        Ok(self.state.lock().messages.get(&msg_hash).cloned())
    }

    fn insert_batch(&self, record: BatchRecord) -> DbResult<()> {
        let mut state = self.state.lock();
        if state.index_by_hash.contains_key(&record.hash)
            || state.batches.contains_key(&record.index())
        {
            return Err(DbError::BatchExists(record.hash));
        }
        state.index_by_hash.insert(record.hash, record.index());
        state.batches.insert(record.index(), record);
        Ok(())
    }

    fn update_proving_status(&self, hash: B256, status: ProvingStatus) -> DbResult<()> {
        self.update_batch(hash, |record| {
            record.proving_status = status;
            Ok(())
        })
    }

    fn put_proof_buffers(&self, hash: B256, buffers: ProofBuffers) -> DbResult<()> {
        let mut state = self.state.lock();
        if !state.index_by_hash.contains_key(&hash) {
            return Err(DbError::BatchNotFound(hash));
        }
        state.proofs.insert(hash, buffers);
        Ok(())
    }
}
