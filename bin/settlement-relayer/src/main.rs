//! Tessera settlement relayer
//!
//! Commits batches to L1, finalizes them once their proofs are verified and
//! keeps the L1 gas price oracle in sync with L2.

mod args;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use args::Args;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use tessera_common::logging;
use tessera_config::RelayerConfig;
use tessera_primitives::Address;
use tessera_relayer::{
    gas_oracle::RpcGasPriceSource,
    sender::{Confirmation, RpcTxSender},
    spawn_relayer_tasks, ConfirmationChannels, RelayerSenders, SettlementRelayer,
};
use tessera_rocksdb::{open_rocksdb_database, DbOpsConfig, RBBatchDb, RELAYER_COLUMN_FAMILIES};
use tessera_tasks::{TaskExecutor, TaskManager};
use tokio::{runtime::Handle, sync::mpsc};
use tracing::*;

const SHUTDOWN_TIMEOUT_MS: u64 = 5000;

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();
    if let Err(e) = main_inner(args) {
        eprintln!("FATAL ERROR: {e:#}");

        return Err(e);
    }

    Ok(())
}

fn main_inner(args: Args) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("tessera-relayer-rt")
        .build()
        .context("init: build rt")?;
    let handle = runtime.handle();

    // Init the logging before we do anything else.
    init_logging(handle);

    let config = load_config(&args)?;

    let rbdb = open_rocksdb_database(&config.datadir, RELAYER_COLUMN_FAMILIES)
        .context("init: open batch database")?;
    let db = Arc::new(RBBatchDb::new(
        rbdb,
        DbOpsConfig::new(config.db_retry_count),
    ));

    let (l1_client, l2_client) = {
        let _g = handle.enter();
        let l1 = build_client(&config.l1_endpoint).context("init: connect l1 endpoint")?;
        let l2 = build_client(&config.l2_endpoint).context("init: connect l2 endpoint")?;
        (l1, l2)
    };

    let task_manager = TaskManager::new(handle.clone());
    let executor = task_manager.executor();

    let poll_interval = Duration::from_millis(config.senders.poll_interval_ms);
    let (message, message_rx) = start_sender(
        &executor,
        "message_sender",
        &l1_client,
        config.senders.message_accounts.clone(),
        &config,
        poll_interval,
    );
    let (rollup, rollup_rx) = start_sender(
        &executor,
        "rollup_sender",
        &l1_client,
        config.senders.rollup_accounts.clone(),
        &config,
        poll_interval,
    );
    let (gas_oracle, gas_oracle_rx) = start_sender(
        &executor,
        "gas_oracle_sender",
        &l1_client,
        config.senders.gas_oracle_accounts.clone(),
        &config,
        poll_interval,
    );

    let relayer = Arc::new(SettlementRelayer::new(
        db,
        RpcGasPriceSource::new(l2_client),
        RelayerSenders {
            message,
            rollup,
            gas_oracle,
        },
        config.contracts.clone(),
        config.gas_oracle.clone(),
        config.finalize_batch_interval_sec,
    ));

    spawn_relayer_tasks(
        &executor,
        relayer.clone(),
        &config.schedule,
        ConfirmationChannels {
            message: message_rx,
            rollup: rollup_rx,
            gas_oracle: gas_oracle_rx,
        },
    );
    info!(rollup = %config.contracts.rollup, "relayer started");

    task_manager.start_signal_listeners();
    let res = task_manager.monitor(Some(Duration::from_millis(SHUTDOWN_TIMEOUT_MS)));

    let counters = relayer.counters().snapshot();
    info!(?counters, "relayer stopped");
    res?;

    logging::finalize();
    Ok(())
}

/// Builds a sender and spawns its receipt poller.
fn start_sender(
    executor: &TaskExecutor,
    name: &'static str,
    client: &HttpClient,
    accounts: Vec<Address>,
    config: &RelayerConfig,
    poll_interval: Duration,
) -> (Arc<RpcTxSender>, mpsc::Receiver<Confirmation>) {
    if accounts.is_empty() {
        warn!(%name, "no accounts configured, every send will be rejected");
    }

    let (sender, confirmations) = RpcTxSender::new(
        name,
        client.clone(),
        accounts,
        config.senders.max_pending,
        config.senders.confirmations,
    );
    let sender = Arc::new(sender);

    let poller = sender.clone();
    executor.spawn_critical_async_with_shutdown(name, move |shutdown| {
        poller.run_receipt_poller(poll_interval, shutdown)
    });

    (sender, confirmations)
}

fn build_client(url: &str) -> anyhow::Result<HttpClient> {
    Ok(HttpClientBuilder::default().build(url)?)
}

fn load_config(args: &Args) -> anyhow::Result<RelayerConfig> {
    let mut config: RelayerConfig = tessera_config::load_from_path(&args.config)
        .with_context(|| format!("init: load config {}", args.config.display()))?;
    if let Some(datadir) = &args.datadir {
        config.datadir = datadir.clone();
    }
    Ok(config)
}

/// Sets up the logging system given a handle to a runtime context to possibly
/// start the OTLP output on.
fn init_logging(rt: &Handle) {
    let mut lconfig = logging::LoggerConfig::with_base_name("tessera-settlement-relayer");

    let otlp_url = logging::get_otlp_url_from_env();
    if let Some(url) = &otlp_url {
        lconfig.set_otlp_url(url.clone());
    }

    {
        // The OTLP batch exporter spawns onto the current runtime.
        let _g = rt.enter();
        logging::init(lconfig);
    }

    if let Some(url) = &otlp_url {
        info!(%url, "using OpenTelemetry tracing output");
    }
}
