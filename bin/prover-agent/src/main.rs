//! Tessera prover agent
//!
//! Pulls proving tasks from the coordinator, proves them through the proof
//! engine and submits the signed results. The task being worked on is kept in
//! a local database so it survives restarts.

mod args;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use args::Args;
use tessera_common::{
    logging,
    retry::{
        policies::{ExponentialBackoff, FixedBackoff},
        retry_with_backoff,
    },
};
use tessera_config::ProverConfig;
use tessera_prover::{
    chain::RpcChainClient, coordinator::HttpCoordinatorClient, engine::RpcProofEngine,
    keys::load_or_create_key, ProverAgent,
};
use tessera_rocksdb::{open_rocksdb_database, DbOpsConfig, ProverTaskDb, PROVER_COLUMN_FAMILIES};
use tessera_tasks::TaskManager;
use tokio::runtime::Handle;
use tracing::*;

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
        .thread_name("tessera-prover-rt")
        .build()
        .context("init: build rt")?;
    let handle = runtime.handle();

    // Init the logging before we do anything else.
    init_logging(handle);

    let config = load_config(&args)?;
    let secret_key = load_or_create_key(&config.keystore_path).context("init: load prover key")?;

    let rbdb = open_rocksdb_database(&config.datadir, PROVER_COLUMN_FAMILIES)
        .context("init: open task queue")?;
    let queue = Arc::new(ProverTaskDb::new(
        rbdb,
        DbOpsConfig::new(config.db_retry_count),
    ));

    let (chain, coordinator, engine) = {
        let _g = handle.enter();
        let chain = RpcChainClient::connect(&config.trace_endpoint)
            .context("init: connect trace endpoint")?;
        let coordinator = HttpCoordinatorClient::new(
            &config.coordinator.base_url,
            Duration::from_secs(config.coordinator.connection_timeout_secs),
        )
        .context("init: build coordinator client")?;
        let engine = RpcProofEngine::connect(
            &config.engine_endpoint,
            Duration::from_secs(config.engine_timeout_secs),
        )
        .context("init: connect proof engine")?;
        (chain, coordinator, engine)
    };

    let agent = ProverAgent::new(
        queue,
        chain,
        coordinator,
        engine,
        secret_key,
        config.proof_type.into(),
        FixedBackoff::new(config.fetch_retry_wait_secs * 1000),
    );
    info!(public_key = %agent.public_key_hex(), proof_type = %agent.proof_type(), "loaded prover key");

    handle
        .block_on(retry_with_backoff(
            "coordinator_login",
            config.coordinator.login_retries,
            &ExponentialBackoff::default(),
            || agent.login(&config.prover_name),
        ))
        .context("init: coordinator login")?;
    info!(prover_name = %config.prover_name, "logged in to coordinator");

    let task_manager = TaskManager::new(handle.clone());
    let executor = task_manager.executor();
    executor.spawn_critical_async_with_shutdown("prover_agent", |shutdown| agent.run(shutdown));

    task_manager.start_signal_listeners();
    // let the task in flight finish so the queue is closed cleanly
    task_manager.monitor(Some(config.shutdown_timeout()))?;

    logging::finalize();
    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<ProverConfig> {
    let mut config: ProverConfig = tessera_config::load_from_path(&args.config)
        .with_context(|| format!("init: load config {}", args.config.display()))?;
    if let Some(datadir) = &args.datadir {
        config.datadir = datadir.clone();
    }
    Ok(config)
}

/// Sets up the logging system given a handle to a runtime context to possibly
/// start the OTLP output on.
fn init_logging(rt: &Handle) {
    let mut lconfig = logging::LoggerConfig::with_base_name("tessera-prover-agent");

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
