//! Trait definitions for the storage the agent and relayer depend on.

#[cfg(feature = "mocks")]
use mockall::automock;
use tessera_primitives::{
    batch::{BatchRecord, GasOracleStatus, MsgStatus, ProvingStatus, RollupStatus},
    task::ProvingTask,
    B256,
};

use crate::{
    types::{MessageRecord, ProofBuffers},
    DbResult,
};

/// Crash-safe queue holding the task the agent is currently working on.
///
/// The queue has a single slot: at most one task is resident at any time, and
/// it stays resident until explicitly deleted.
#[cfg_attr(feature = "mocks", automock)]
pub trait ProverTaskQueue: Send + Sync + 'static {
    /// Returns the resident task, `None` if the queue is empty.
    fn peek_task(&self) -> DbResult<Option<ProvingTask>>;

    /// Persists `task` with its retry counter set to `retry_count`.
    ///
    /// Inserts the task when the slot is empty so that a freshly fetched task
    /// becomes durable before its first attempt. Fails with
    /// [`DbError::QueueOccupied`](crate::DbError::QueueOccupied) if a
    /// different task is resident.
    fn update_retry_count(&self, task: &ProvingTask, retry_count: u32) -> DbResult<()>;

    /// Removes the task. Deleting an absent task is not an error.
    fn delete_task(&self, task_id: &str) -> DbResult<()>;

    /// Closes the handle; later calls fail with `Closed`.
    fn close(&self) -> DbResult<()>;
}

/// Batch metadata as seen by the relayer.
///
/// Every status write is a conditional update validated by the status
/// transition rules, so a batch in a terminal state is never overwritten.
#[cfg_attr(feature = "mocks", automock)]
pub trait BatchDatabase: Send + Sync + 'static {
    /// Batch with the highest index.
    fn get_latest_batch(&self) -> DbResult<Option<BatchRecord>>;

    fn get_batch_by_hash(&self, hash: B256) -> DbResult<Option<BatchRecord>>;

    /// Hashes of batches in `Committed` state, lowest index first.
    fn get_committed_batches(&self, limit: usize) -> DbResult<Vec<B256>>;

    /// Batches in `Pending` rollup state, lowest index first.
    fn get_pending_batches(&self, limit: usize) -> DbResult<Vec<BatchRecord>>;

    /// Highest-index batch that is `Finalizing` or `Finalized`.
    fn get_latest_finalizing_or_finalized_batch(&self) -> DbResult<Option<BatchRecord>>;

    /// Moves committed batches whose proving failed or was skipped to
    /// `FinalizationSkipped`, returning how many were moved.
    fn update_skipped_batches(&self) -> DbResult<u64>;

    fn update_rollup_status(&self, hash: B256, status: RollupStatus) -> DbResult<()>;

    fn update_commit_tx_hash_and_rollup_status(
        &self,
        hash: B256,
        tx_hash: B256,
        status: RollupStatus,
    ) -> DbResult<()>;

    fn update_finalize_tx_hash_and_rollup_status(
        &self,
        hash: B256,
        tx_hash: B256,
        status: RollupStatus,
    ) -> DbResult<()>;

    fn update_gas_oracle_status_and_tx_hash(
        &self,
        hash: B256,
        status: GasOracleStatus,
        tx_hash: B256,
    ) -> DbResult<()>;

    fn get_proof_buffers(&self, hash: B256) -> DbResult<Option<ProofBuffers>>;

    /// Upserts the relay state of a message.
    fn update_message_status_and_l1_hash(
        &self,
        msg_hash: B256,
        status: MsgStatus,
        layer1_hash: Option<B256>,
    ) -> DbResult<()>;

    fn get_message(&self, msg_hash: B256) -> DbResult<Option<MessageRecord>>;

    // Writes owned by the batch proposer and the proving subsystem.

    fn insert_batch(&self, record: BatchRecord) -> DbResult<()>;

    fn update_proving_status(&self, hash: B256, status: ProvingStatus) -> DbResult<()>;

    fn put_proof_buffers(&self, hash: B256, buffers: ProofBuffers) -> DbResult<()>;
}
