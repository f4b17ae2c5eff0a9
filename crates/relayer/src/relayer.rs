//! Drives batches through commit and finalization on L1 and keeps the gas
//! price oracle current.

use std::sync::Arc;

use tessera_config::{ContractsConfig, GasOracleConfig};
use tessera_db::traits::BatchDatabase;
use tessera_primitives::{
    batch::{BatchRecord, GasOracleStatus, MsgStatus, ProvingStatus, RollupStatus},
    contracts::{encode_commit_batches, encode_finalize_batch, encode_set_l2_base_fee},
    keccak256,
    words::buffer_to_words,
    Bytes, B256, U256,
};
use tracing::*;

use crate::{
    counters::RelayerCounters,
    gas_oracle::{should_update_gas_price, GasOracleState, GasPriceSource},
    registry::PendingTxRegistry,
    sender::TxSender,
};

/// One sender per purpose so their nonces never contend.
pub struct RelayerSenders<S> {
    pub message: Arc<S>,
    pub rollup: Arc<S>,
    pub gas_oracle: Arc<S>,
}

/// Correlation ID of a commit transaction: keccak256 over the concatenated
/// batch hashes, so resubmitting the same batches collides in the sender.
pub fn commit_tx_id<'a>(hashes: impl IntoIterator<Item = &'a B256>) -> String {
    let mut buf = Vec::new();
    for hash in hashes {
        buf.extend_from_slice(hash.as_slice());
    }
    keccak256(buf).to_string()
}

/// Correlation ID of a finalize transaction, suffixed so it never equals the
/// ID of a commit.
pub fn finalize_tx_id(batch_hash: B256) -> String {
    format!("{batch_hash}-finalize")
}

pub struct SettlementRelayer<D, S, G> {
    pub(crate) db: Arc<D>,
    gas_source: G,
    senders: RelayerSenders<S>,
    contracts: ContractsConfig,
    gas_oracle: GasOracleConfig,
    finalize_batch_interval_sec: u64,

    /// Relay message hash per correlation ID.
    pub(crate) processing_messages: PendingTxRegistry<B256>,
    /// Hashes of the batches in each commit transaction.
    pub(crate) processing_commits: PendingTxRegistry<Vec<B256>>,
    /// Batch hash per finalize transaction.
    pub(crate) processing_finalizations: PendingTxRegistry<B256>,

    pub(crate) counters: RelayerCounters,
}

impl<D, S, G> SettlementRelayer<D, S, G>
where
    D: BatchDatabase,
    S: TxSender,
    G: GasPriceSource,
{
    pub fn new(
        db: Arc<D>,
        gas_source: G,
        senders: RelayerSenders<S>,
        contracts: ContractsConfig,
        gas_oracle: GasOracleConfig,
        finalize_batch_interval_sec: u64,
    ) -> Self {
        Self {
            db,
            gas_source,
            senders,
            contracts,
            gas_oracle,
            finalize_batch_interval_sec,
            processing_messages: PendingTxRegistry::new(),
            processing_commits: PendingTxRegistry::new(),
            processing_finalizations: PendingTxRegistry::new(),
            counters: RelayerCounters::default(),
        }
    }

    pub fn counters(&self) -> &RelayerCounters {
        &self.counters
    }

    /// Imports the L2 gas price to the L1 oracle if the latest batch still
    /// waits for it and the price moved enough since the last import.
    pub async fn process_gas_price_oracle(&self, state: &mut GasOracleState) {
        let batch = match self.db.get_latest_batch() {
            Ok(Some(batch)) => batch,
            Ok(None) => return,
            Err(e) => {
                error!(err = %e, "failed to get latest batch");
                return;
            }
        };

        if batch.gas_oracle_status != GasOracleStatus::Pending {
            return;
        }

        let price = match self.gas_source.suggest_gas_price().await {
            Ok(price) => price,
            Err(e) => {
                error!(err = %e, "failed to fetch suggested gas price from l2");
                return;
            }
        };

        if !should_update_gas_price(state.last_price(), price, &self.gas_oracle) {
            return;
        }

        let data = encode_set_l2_base_fee(u128::from(price));
        let tx_hash = match self
            .senders
            .gas_oracle
            .send_transaction(
                &batch.hash.to_string(),
                self.contracts.gas_price_oracle,
                U256::ZERO,
                data,
                0,
            )
            .await
        {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                if !e.is_backpressure() {
                    error!(batch_hash = %batch.hash, err = %e, "failed to send setL2BaseFee tx");
                }
                return;
            }
        };

        if let Err(e) = self.db.update_gas_oracle_status_and_tx_hash(
            batch.hash,
            GasOracleStatus::Importing,
            tx_hash,
        ) {
            error!(batch_hash = %batch.hash, err = %e, "failed to record gas oracle import");
            return;
        }

        state.record(price);
        info!(%tx_hash, gas_price = %price, "updated l2 gas price");
    }

    /// Commits the oldest pending batches, at most `limit` of them.
    pub async fn process_pending_batches(&self, limit: usize) {
        match self.db.get_pending_batches(limit) {
            Ok(batches) if batches.is_empty() => {}
            Ok(batches) => self.send_commit_tx(&batches).await,
            Err(e) => error!(err = %e, "failed to fetch pending batches"),
        }
    }

    /// Commits `batches` in one `commitBatches` transaction. Batches must be
    /// in ascending index order.
    pub async fn send_commit_tx(&self, batches: &[BatchRecord]) {
        let (Some(first), Some(last)) = (batches.first(), batches.last()) else {
            warn!("send_commit_tx called with no batches");
            return;
        };

        let calldata = encode_commit_batches(batches.iter().map(|b| &b.header));
        let hashes = batches.iter().map(|b| b.hash).collect::<Vec<_>>();
        let tx_id = commit_tx_id(&hashes);

        let tx_hash = match self
            .senders
            .rollup
            .send_transaction(&tx_id, self.contracts.rollup, U256::ZERO, calldata, 0)
            .await
        {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                if !e.is_backpressure() {
                    error!(err = %e, start_batch_index = %first.index(), end_batch_index = %last.index(), "failed to send commitBatches tx");
                }
                return;
            }
        };

        RelayerCounters::add(&self.counters.batches_committed, hashes.len() as u64);
        info!(%tx_hash, start_batch_index = %first.index(), end_batch_index = %last.index(), "sent commitBatches tx");

        // registered before the status writes so an early confirmation is not lost
        self.processing_commits.insert(tx_id, hashes.clone());

        for batch in batches {
            if let Err(e) = self.db.update_commit_tx_hash_and_rollup_status(
                batch.hash,
                tx_hash,
                RollupStatus::Committing,
            ) {
                error!(batch_hash = %batch.hash, index = %batch.index(), err = %e, "failed to mark batch committing");
            }
        }
    }

    /// Finalizes the oldest committed batch once its proof is verified.
    pub async fn process_committed_batches(&self) {
        match self.db.update_skipped_batches() {
            Ok(0) => {}
            Ok(count) => {
                RelayerCounters::add(&self.counters.batches_skipped, count);
                info!(%count, "skipping batches");
            }
            Err(e) => error!(err = %e, "failed to update skipped batches"),
        }

        let hash = match self.db.get_committed_batches(1) {
            Ok(hashes) => match hashes.first() {
                Some(hash) => *hash,
                None => return,
            },
            Err(e) => {
                error!(err = %e, "failed to fetch committed batches");
                return;
            }
        };

        let batch = match self.db.get_batch_by_hash(hash) {
            Ok(Some(batch)) => batch,
            Ok(None) => {
                error!(batch_hash = %hash, "committed batch disappeared");
                return;
            }
            Err(e) => {
                error!(batch_hash = %hash, err = %e, "failed to fetch committed batch");
                return;
            }
        };

        match batch.proving_status {
            // proof not ready yet
            ProvingStatus::Unassigned | ProvingStatus::Assigned => {}

            // received but not verified, never finalize on it
            ProvingStatus::Proved => {}

            ProvingStatus::Failed | ProvingStatus::Skipped => self.mark_finalization_skipped(hash),

            ProvingStatus::Verified => self.finalize_batch(&batch).await,
        }
    }

    async fn finalize_batch(&self, batch: &BatchRecord) {
        let hash = batch.hash;
        info!(batch_hash = %hash, "start to roll up zk proof");

        match self.db.get_latest_finalizing_or_finalized_batch() {
            Ok(Some(previous))
                if batch.created_at.saturating_sub(previous.created_at)
                    < self.finalize_batch_interval_sec =>
            {
                info!(
                    batch_hash = %hash,
                    created_at = %batch.created_at,
                    last_finalizing_hash = %previous.hash,
                    last_finalizing_status = ?previous.rollup_status,
                    last_finalizing_created_at = %previous.created_at,
                    "not enough time passed, skipping"
                );
                self.mark_finalization_skipped(hash);
                return;
            }
            // no finalized batch yet is the expected initial state
            Ok(_) => {}
            Err(e) => {
                error!(err = %e, "failed to get latest finalized batch");
                return;
            }
        }

        let guard = SkipGuard::new(self, hash);

        let buffers = match self.db.get_proof_buffers(hash) {
            Ok(Some(buffers)) => buffers,
            Ok(None) => {
                warn!(batch_hash = %hash, "proof or instance not ready");
                return;
            }
            Err(e) => {
                warn!(batch_hash = %hash, err = %e, "failed to get proof");
                return;
            }
        };

        let proof = match buffer_to_words(&buffers.proof) {
            Ok(words) => words,
            Err(e) => {
                error!(batch_hash = %hash, err = %e, "proof buffer has wrong length");
                return;
            }
        };
        let instances = match buffer_to_words(&buffers.instances) {
            Ok(words) => words,
            Err(e) => {
                error!(batch_hash = %hash, err = %e, "instance buffer has wrong length");
                return;
            }
        };

        let calldata = encode_finalize_batch(hash, proof, instances);
        let tx_id = finalize_tx_id(hash);

        let tx_hash = match self
            .senders
            .rollup
            .send_transaction(&tx_id, self.contracts.rollup, U256::ZERO, calldata, 0)
            .await
        {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                if !e.is_backpressure() {
                    error!(batch_hash = %hash, err = %e, "failed to send finalizeBatchWithProof tx");
                }
                return;
            }
        };

        guard.disarm();
        RelayerCounters::add(&self.counters.batches_finalized, 1);
        info!(batch_hash = %hash, %tx_hash, "sent finalizeBatchWithProof tx");

        self.processing_finalizations.insert(tx_id, hash);
        if let Err(e) = self.db.update_finalize_tx_hash_and_rollup_status(
            hash,
            tx_hash,
            RollupStatus::Finalizing,
        ) {
            warn!(batch_hash = %hash, err = %e, "failed to mark batch finalizing");
        }
    }

    /// Relays a pre-encoded L2 to L1 message call through the message sender.
    pub async fn send_relay_message(&self, msg_hash: B256, calldata: Bytes, gas_limit: u64) {
        let tx_id = msg_hash.to_string();
        let tx_hash = match self
            .senders
            .message
            .send_transaction(&tx_id, self.contracts.messenger, U256::ZERO, calldata, gas_limit)
            .await
        {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                if !e.is_backpressure() {
                    error!(%msg_hash, err = %e, "failed to send relay message tx");
                }
                return;
            }
        };

        RelayerCounters::add(&self.counters.msgs_relayed, 1);
        self.processing_messages.insert(tx_id, msg_hash);
        if let Err(e) =
            self.db
                .update_message_status_and_l1_hash(msg_hash, MsgStatus::Submitted, Some(tx_hash))
        {
            warn!(%msg_hash, err = %e, "failed to mark message submitted");
        }
        info!(%msg_hash, %tx_hash, "relayed message");
    }

    fn mark_finalization_skipped(&self, hash: B256) {
        if let Err(e) = self
            .db
            .update_rollup_status(hash, RollupStatus::FinalizationSkipped)
        {
            warn!(batch_hash = %hash, err = %e, "failed to mark batch finalization skipped");
        }
    }
}

/// Marks the batch `FinalizationSkipped` on drop unless disarmed, so a
/// verified batch never stalls after a failed finalize attempt.
struct SkipGuard<'a, D, S, G>
where
    D: BatchDatabase,
    S: TxSender,
    G: GasPriceSource,
{
    relayer: &'a SettlementRelayer<D, S, G>,
    hash: B256,
    armed: bool,
}

impl<'a, D, S, G> SkipGuard<'a, D, S, G>
where
    D: BatchDatabase,
    S: TxSender,
    G: GasPriceSource,
{
    fn new(relayer: &'a SettlementRelayer<D, S, G>, hash: B256) -> Self {
        Self {
            relayer,
            hash,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<D, S, G> Drop for SkipGuard<'_, D, S, G>
where
    D: BatchDatabase,
    S: TxSender,
    G: GasPriceSource,
{
    fn drop(&mut self) {
        if self.armed {
            info!(batch_hash = %self.hash, "failed to upload the proof, marking finalization skipped");
            self.relayer.mark_finalization_skipped(self.hash);
        }
    }
}
