//! Periodic drivers of the relayer submitters.
//!
//! Each loop runs its job to completion once per tick. Shutdown is only
//! observed between runs, so a transaction that was sent always gets its
//! status write.

use std::{sync::Arc, time::Duration};

use tessera_config::ScheduleConfig;
use tessera_db::traits::BatchDatabase;
use tessera_tasks::{ShutdownGuard, TaskExecutor};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::*;

use crate::{
    gas_oracle::{GasOracleState, GasPriceSource},
    reconcile::{run_confirmation_loop, ConfirmationChannels},
    relayer::SettlementRelayer,
    sender::TxSender,
};

fn ticker(period_ms: u64) -> Interval {
    let mut ticker = tokio::time::interval(Duration::from_millis(period_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Waits for the next tick. Returns `false` once shutdown was signalled.
async fn tick_until_shutdown(ticker: &mut Interval, shutdown: &ShutdownGuard) -> bool {
    tokio::select! {
        _ = ticker.tick() => !shutdown.should_shutdown(),
        _ = shutdown.wait_for_shutdown() => false,
    }
}

pub async fn run_gas_oracle_loop<D, S, G>(
    relayer: Arc<SettlementRelayer<D, S, G>>,
    period_ms: u64,
    shutdown: ShutdownGuard,
) where
    D: BatchDatabase,
    S: TxSender,
    G: GasPriceSource,
{
    let mut ticker = ticker(period_ms);
    let mut state = GasOracleState::default();
    while tick_until_shutdown(&mut ticker, &shutdown).await {
        relayer.process_gas_price_oracle(&mut state).await;
    }
    info!("gas oracle loop exiting");
}

pub async fn run_commit_loop<D, S, G>(
    relayer: Arc<SettlementRelayer<D, S, G>>,
    period_ms: u64,
    batch_limit: usize,
    shutdown: ShutdownGuard,
) where
    D: BatchDatabase,
    S: TxSender,
    G: GasPriceSource,
{
    let mut ticker = ticker(period_ms);
    while tick_until_shutdown(&mut ticker, &shutdown).await {
        relayer.process_pending_batches(batch_limit).await;
    }
    info!("commit loop exiting");
}

pub async fn run_finalize_loop<D, S, G>(
    relayer: Arc<SettlementRelayer<D, S, G>>,
    period_ms: u64,
    shutdown: ShutdownGuard,
) where
    D: BatchDatabase,
    S: TxSender,
    G: GasPriceSource,
{
    let mut ticker = ticker(period_ms);
    while tick_until_shutdown(&mut ticker, &shutdown).await {
        relayer.process_committed_batches().await;
    }
    info!("finalize loop exiting");
}

/// Spawns the three submitter loops and the confirmation loop as critical
/// tasks.
pub fn spawn_relayer_tasks<D, S, G>(
    executor: &TaskExecutor,
    relayer: Arc<SettlementRelayer<D, S, G>>,
    schedule: &ScheduleConfig,
    channels: ConfirmationChannels,
) where
    D: BatchDatabase,
    S: TxSender,
    G: GasPriceSource,
{
    let rel = relayer.clone();
    let period = schedule.gas_oracle_interval_ms;
    executor.spawn_critical_async_with_shutdown("gas_oracle_updater", move |shutdown| {
        run_gas_oracle_loop(rel, period, shutdown)
    });

    let rel = relayer.clone();
    let period = schedule.commit_interval_ms;
    let limit = schedule.commit_batch_limit;
    executor.spawn_critical_async_with_shutdown("batch_commit_submitter", move |shutdown| {
        run_commit_loop(rel, period, limit, shutdown)
    });

    let rel = relayer.clone();
    let period = schedule.finalize_interval_ms;
    executor.spawn_critical_async_with_shutdown("batch_finalize_submitter", move |shutdown| {
        run_finalize_loop(rel, period, shutdown)
    });

    executor.spawn_critical_async_with_shutdown("confirmation_reconciler", move |shutdown| {
        run_confirmation_loop(relayer, channels, shutdown)
    });
}

#[cfg(test)]
mod tests {
    use tessera_db::traits::BatchDatabase;
    use tessera_primitives::batch::{GasOracleStatus, RollupStatus};
    use tessera_tasks::TaskManager;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        gas_oracle::MockGasPriceSource,
        test_utils::{make_batch, make_relayer},
    };

    #[test]
    fn test_loops_drive_batches_and_stop_on_shutdown() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let manager = TaskManager::new(runtime.handle().clone());
        let executor = manager.executor();

        let mut gas = MockGasPriceSource::new();
        gas.expect_suggest_gas_price().returning(|| Ok(1_000));
        let (relayer, db, senders) = make_relayer(gas, 0);
        let batch = make_batch(0, 10);
        db.insert_batch(batch.clone()).unwrap();

        let (_message_tx, message) = mpsc::channel(4);
        let (_rollup_tx, rollup) = mpsc::channel(4);
        let (_gas_tx, gas_oracle) = mpsc::channel(4);
        let schedule = ScheduleConfig {
            gas_oracle_interval_ms: 10,
            commit_interval_ms: 10,
            finalize_interval_ms: 10,
            commit_batch_limit: 5,
        };
        spawn_relayer_tasks(
            &executor,
            Arc::new(relayer),
            &schedule,
            ConfirmationChannels {
                message,
                rollup,
                gas_oracle,
            },
        );

        let shutdown_sig = manager.shutdown_signal();
        let db_check = db.clone();
        let hash = batch.hash;
        runtime.spawn(async move {
            for _ in 0..200 {
                let stored = db_check.get_batch_by_hash(hash).unwrap().unwrap();
                if stored.rollup_status == RollupStatus::Committing
                    && stored.gas_oracle_status == GasOracleStatus::Importing
                {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            shutdown_sig.send();
        });

        manager.monitor(Some(Duration::from_secs(5))).unwrap();

        let stored = db.get_batch_by_hash(batch.hash).unwrap().unwrap();
        assert_eq!(stored.rollup_status, RollupStatus::Committing);
        assert_eq!(stored.gas_oracle_status, GasOracleStatus::Importing);
        assert_eq!(senders.rollup.sent().len(), 1);
        assert_eq!(senders.gas_oracle.sent().len(), 1);
    }
}
