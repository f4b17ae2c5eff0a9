//! Applies transaction confirmations from the senders to the batch and message
//! records.

use std::{str::FromStr, sync::Arc};

use tessera_db::traits::BatchDatabase;
use tessera_primitives::{
    batch::{GasOracleStatus, MsgStatus, RollupStatus},
    B256,
};
use tessera_tasks::ShutdownGuard;
use tokio::sync::mpsc;
use tracing::*;

use crate::{
    counters::RelayerCounters,
    gas_oracle::GasPriceSource,
    relayer::SettlementRelayer,
    sender::{Confirmation, TxSender},
};

/// Confirmation streams of the three senders.
pub struct ConfirmationChannels {
    pub message: mpsc::Receiver<Confirmation>,
    pub rollup: mpsc::Receiver<Confirmation>,
    pub gas_oracle: mpsc::Receiver<Confirmation>,
}

impl<D, S, G> SettlementRelayer<D, S, G>
where
    D: BatchDatabase,
    S: TxSender,
    G: GasPriceSource,
{
    /// Resolves a message, commit or finalize confirmation against the
    /// in-flight registries. Confirmations nobody is waiting for are dropped.
    pub fn handle_confirmation(&self, cfm: &Confirmation) {
        debug!(id = %cfm.id, tx_hash = %cfm.tx_hash, success = %cfm.is_successful, "got confirmation");
        let mut matched = false;

        if let Some(msg_hash) = self.processing_messages.take(&cfm.id) {
            matched = true;
            RelayerCounters::add(&self.counters.msgs_relayed_confirmed, 1);
            let status = if cfm.is_successful {
                MsgStatus::Confirmed
            } else {
                MsgStatus::RelayFailed
            };
            if let Err(e) =
                self.db
                    .update_message_status_and_l1_hash(msg_hash, status, Some(cfm.tx_hash))
            {
                warn!(%msg_hash, err = %e, "failed to update message status");
            }
        }

        if let Some(hashes) = self.processing_commits.take(&cfm.id) {
            matched = true;
            RelayerCounters::add(
                &self.counters.batches_committed_confirmed,
                hashes.len() as u64,
            );
            let status = if cfm.is_successful {
                RollupStatus::Committed
            } else {
                RollupStatus::CommitFailed
            };
            for hash in hashes {
                if let Err(e) =
                    self.db
                        .update_commit_tx_hash_and_rollup_status(hash, cfm.tx_hash, status)
                {
                    warn!(batch_hash = %hash, ?status, err = %e, "failed to update commit status");
                }
            }
        }

        if let Some(hash) = self.processing_finalizations.take(&cfm.id) {
            matched = true;
            RelayerCounters::add(&self.counters.batches_finalized_confirmed, 1);
            let status = if cfm.is_successful {
                RollupStatus::Finalized
            } else {
                RollupStatus::FinalizeFailed
            };
            if let Err(e) =
                self.db
                    .update_finalize_tx_hash_and_rollup_status(hash, cfm.tx_hash, status)
            {
                warn!(batch_hash = %hash, ?status, err = %e, "failed to update finalize status");
            }
        }

        if !matched {
            debug!(id = %cfm.id, "confirmation matched no pending tx, dropping");
        }
    }

    /// The correlation ID of a gas oracle update is the hash of the batch it
    /// was anchored on.
    pub fn handle_gas_oracle_confirmation(&self, cfm: &Confirmation) {
        let hash = match B256::from_str(&cfm.id) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(id = %cfm.id, err = %e, "gas oracle confirmation id is not a batch hash");
                return;
            }
        };

        let status = if cfm.is_successful {
            GasOracleStatus::Imported
        } else {
            GasOracleStatus::Failed
        };

        match self
            .db
            .update_gas_oracle_status_and_tx_hash(hash, status, cfm.tx_hash)
        {
            Ok(()) => info!(batch_hash = %hash, ?status, tx_hash = %cfm.tx_hash, "gas oracle update confirmed"),
            Err(e) => warn!(batch_hash = %hash, err = %e, "failed to update gas oracle status"),
        }
    }
}

/// Drains the sender confirmation channels until shutdown or until any of them
/// closes.
pub async fn run_confirmation_loop<D, S, G>(
    relayer: Arc<SettlementRelayer<D, S, G>>,
    mut channels: ConfirmationChannels,
    shutdown: ShutdownGuard,
) where
    D: BatchDatabase,
    S: TxSender,
    G: GasPriceSource,
{
    info!("confirmation loop started");
    loop {
        tokio::select! {
            _ = shutdown.wait_for_shutdown() => {
                info!("confirmation loop got shutdown signal");
                break;
            }
            cfm = channels.message.recv() => match cfm {
                Some(cfm) => relayer.handle_confirmation(&cfm),
                None => {
                    warn!("message sender confirmation channel closed");
                    break;
                }
            },
            cfm = channels.rollup.recv() => match cfm {
                Some(cfm) => relayer.handle_confirmation(&cfm),
                None => {
                    warn!("rollup sender confirmation channel closed");
                    break;
                }
            },
            cfm = channels.gas_oracle.recv() => match cfm {
                Some(cfm) => relayer.handle_gas_oracle_confirmation(&cfm),
                None => {
                    warn!("gas oracle sender confirmation channel closed");
                    break;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tessera_db::traits::BatchDatabase;
    use tessera_primitives::batch::ProvingStatus;
    use tessera_tasks::TaskManager;

    use super::*;
    use crate::{
        gas_oracle::{GasOracleState, MockGasPriceSource},
        relayer::{commit_tx_id, finalize_tx_id},
        test_utils::{make_batch, make_relayer},
    };

    fn cfm(id: impl Into<String>, tx_hash: B256, is_successful: bool) -> Confirmation {
        Confirmation {
            id: id.into(),
            tx_hash,
            is_successful,
        }
    }

    #[tokio::test]
    async fn test_commit_confirmation_resolves_once() {
        let (relayer, db, senders) = make_relayer(MockGasPriceSource::new(), 0);
        let batches = (0..2).map(|i| make_batch(i, 10)).collect::<Vec<_>>();
        for b in &batches {
            db.insert_batch(b.clone()).unwrap();
        }
        relayer.send_commit_tx(&batches).await;
        let sent = senders.rollup.sent();

        let confirmation = cfm(sent[0].id.clone(), sent[0].tx_hash, true);
        relayer.handle_confirmation(&confirmation);

        for b in &batches {
            let stored = db.get_batch_by_hash(b.hash).unwrap().unwrap();
            assert_eq!(stored.rollup_status, RollupStatus::Committed);
        }
        assert!(relayer.processing_commits.is_empty());
        assert_eq!(relayer.counters().snapshot().batches_committed_confirmed, 2);

        // a duplicate finds nothing to resolve
        relayer.handle_confirmation(&confirmation);
        assert_eq!(relayer.counters().snapshot().batches_committed_confirmed, 2);
    }

    #[tokio::test]
    async fn test_failed_commit_confirmation() {
        let (relayer, db, _senders) = make_relayer(MockGasPriceSource::new(), 0);
        let batch = make_batch(0, 10);
        db.insert_batch(batch.clone()).unwrap();
        relayer.send_commit_tx(std::slice::from_ref(&batch)).await;

        let id = commit_tx_id(&[batch.hash]);
        relayer.handle_confirmation(&cfm(id, B256::repeat_byte(9), false));

        let stored = db.get_batch_by_hash(batch.hash).unwrap().unwrap();
        assert_eq!(stored.rollup_status, RollupStatus::CommitFailed);
        assert_eq!(stored.commit_tx_hash, Some(B256::repeat_byte(9)));
        // reverted commits are still confirmations
        assert_eq!(relayer.counters().snapshot().batches_committed_confirmed, 1);
    }

    #[tokio::test]
    async fn test_confirmation_before_status_write() {
        let (relayer, db, _senders) = make_relayer(MockGasPriceSource::new(), 0);
        let batch = make_batch(0, 10);
        db.insert_batch(batch.clone()).unwrap();

        // the commit was sent but its Committing write has not landed yet
        let id = commit_tx_id(&[batch.hash]);
        relayer.processing_commits.insert(id.clone(), vec![batch.hash]);
        relayer.handle_confirmation(&cfm(id, B256::repeat_byte(3), true));

        let stored = db.get_batch_by_hash(batch.hash).unwrap().unwrap();
        assert_eq!(stored.rollup_status, RollupStatus::Committed);

        // the late in-flight write is rejected
        assert!(db
            .update_commit_tx_hash_and_rollup_status(
                batch.hash,
                B256::repeat_byte(3),
                RollupStatus::Committing
            )
            .is_err());
    }

    #[tokio::test]
    async fn test_finalize_confirmation() {
        let (relayer, db, _senders) = make_relayer(MockGasPriceSource::new(), 0);
        let batch = make_batch(0, 10);
        db.insert_batch(batch.clone()).unwrap();
        db.update_rollup_status(batch.hash, RollupStatus::Committed)
            .unwrap();
        db.update_proving_status(batch.hash, ProvingStatus::Verified)
            .unwrap();
        db.update_rollup_status(batch.hash, RollupStatus::Finalizing)
            .unwrap();

        let id = finalize_tx_id(batch.hash);
        relayer.processing_finalizations.insert(id.clone(), batch.hash);
        relayer.handle_confirmation(&cfm(id, B256::repeat_byte(4), true));

        let stored = db.get_batch_by_hash(batch.hash).unwrap().unwrap();
        assert_eq!(stored.rollup_status, RollupStatus::Finalized);
        assert_eq!(stored.finalize_tx_hash, Some(B256::repeat_byte(4)));
        assert_eq!(relayer.counters().snapshot().batches_finalized_confirmed, 1);
    }

    #[tokio::test]
    async fn test_message_confirmation() {
        let (relayer, db, _senders) = make_relayer(MockGasPriceSource::new(), 0);
        let msg_hash = B256::repeat_byte(0x42);
        relayer.processing_messages.insert(msg_hash.to_string(), msg_hash);

        relayer.handle_confirmation(&cfm(msg_hash.to_string(), B256::repeat_byte(5), false));

        let record = db.get_message(msg_hash).unwrap().unwrap();
        assert_eq!(record.status, MsgStatus::RelayFailed);
        assert_eq!(record.layer1_hash, Some(B256::repeat_byte(5)));
        assert_eq!(relayer.counters().snapshot().msgs_relayed_confirmed, 1);
    }

    #[tokio::test]
    async fn test_failed_finalize_confirmation_counted() {
        let (relayer, db, _senders) = make_relayer(MockGasPriceSource::new(), 0);
        let batch = make_batch(0, 10);
        db.insert_batch(batch.clone()).unwrap();
        db.update_rollup_status(batch.hash, RollupStatus::Committed)
            .unwrap();
        db.update_proving_status(batch.hash, ProvingStatus::Verified)
            .unwrap();
        db.update_rollup_status(batch.hash, RollupStatus::Finalizing)
            .unwrap();

        let id = finalize_tx_id(batch.hash);
        relayer.processing_finalizations.insert(id.clone(), batch.hash);
        relayer.handle_confirmation(&cfm(id, B256::repeat_byte(6), false));

        let stored = db.get_batch_by_hash(batch.hash).unwrap().unwrap();
        assert_eq!(stored.rollup_status, RollupStatus::FinalizeFailed);
        assert!(relayer.processing_finalizations.is_empty());
        assert_eq!(relayer.counters().snapshot().batches_finalized_confirmed, 1);
    }

    #[tokio::test]
    async fn test_unmatched_confirmation_dropped() {
        let (relayer, db, _senders) = make_relayer(MockGasPriceSource::new(), 0);
        let batch = make_batch(0, 10);
        db.insert_batch(batch.clone()).unwrap();

        relayer.handle_confirmation(&cfm("unknown", B256::repeat_byte(1), true));

        let stored = db.get_batch_by_hash(batch.hash).unwrap().unwrap();
        assert_eq!(stored.rollup_status, RollupStatus::Pending);
        assert_eq!(relayer.counters().snapshot(), Default::default());
    }

    #[tokio::test]
    async fn test_gas_oracle_confirmation() {
        let (relayer, db, _senders) = make_relayer(MockGasPriceSource::new(), 0);
        let ok = make_batch(0, 10);
        let failed = make_batch(1, 10);
        db.insert_batch(ok.clone()).unwrap();
        db.insert_batch(failed.clone()).unwrap();

        relayer.handle_gas_oracle_confirmation(&cfm(ok.hash.to_string(), B256::repeat_byte(1), true));
        relayer.handle_gas_oracle_confirmation(&cfm(failed.hash.to_string(), B256::repeat_byte(2), false));
        relayer.handle_gas_oracle_confirmation(&cfm("not-a-hash", B256::repeat_byte(3), true));

        let stored = db.get_batch_by_hash(ok.hash).unwrap().unwrap();
        assert_eq!(stored.gas_oracle_status, GasOracleStatus::Imported);
        assert_eq!(stored.oracle_tx_hash, Some(B256::repeat_byte(1)));
        let stored = db.get_batch_by_hash(failed.hash).unwrap().unwrap();
        assert_eq!(stored.gas_oracle_status, GasOracleStatus::Failed);
    }

    #[test]
    fn test_loop_drains_channels_until_shutdown() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let manager = TaskManager::new(runtime.handle().clone());
        let executor = manager.executor();

        let mut gas = MockGasPriceSource::new();
        gas.expect_suggest_gas_price().returning(|| Ok(1_000));
        let (relayer, db, senders) = make_relayer(gas, 0);
        let relayer = Arc::new(relayer);

        let batch = make_batch(0, 10);
        db.insert_batch(batch.clone()).unwrap();
        runtime.block_on(async {
            relayer
                .process_gas_price_oracle(&mut GasOracleState::default())
                .await;
            relayer.send_commit_tx(std::slice::from_ref(&batch)).await;
        });

        let (message_tx, message) = mpsc::channel(4);
        let (rollup_tx, rollup) = mpsc::channel(4);
        let (gas_tx, gas_oracle) = mpsc::channel(4);
        let channels = ConfirmationChannels {
            message,
            rollup,
            gas_oracle,
        };

        let rel = relayer.clone();
        executor.spawn_critical_async_with_shutdown("confirmations", |shutdown| {
            run_confirmation_loop(rel, channels, shutdown)
        });

        let commit = senders.rollup.sent()[0].clone();
        let oracle = senders.gas_oracle.sent()[0].clone();
        runtime.block_on(async {
            rollup_tx
                .send(cfm(commit.id, commit.tx_hash, true))
                .await
                .unwrap();
            gas_tx
                .send(cfm(oracle.id, oracle.tx_hash, true))
                .await
                .unwrap();
        });

        let shutdown_sig = manager.shutdown_signal();
        let db_check = db.clone();
        let hash = batch.hash;
        runtime.spawn(async move {
            for _ in 0..200 {
                let stored = db_check.get_batch_by_hash(hash).unwrap().unwrap();
                if stored.rollup_status == RollupStatus::Committed
                    && stored.gas_oracle_status == GasOracleStatus::Imported
                {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            shutdown_sig.send();
        });

        manager.monitor(Some(Duration::from_secs(5))).unwrap();

        let stored = db.get_batch_by_hash(batch.hash).unwrap().unwrap();
        assert_eq!(stored.rollup_status, RollupStatus::Committed);
        assert_eq!(stored.gas_oracle_status, GasOracleStatus::Imported);
        drop(message_tx);
    }
}
