//! The proving loop.

use std::{sync::Arc, time::Duration};

use secp256k1::{PublicKey, SecretKey, SECP256K1};
use serde::Serialize;
use tessera_common::retry::{policies::FixedBackoff, Backoff};
use tessera_db::traits::ProverTaskQueue;
use tessera_primitives::{
    proof::{public_key_hex, BatchProof, ChunkProof, ProofDetail, ProofMsg, ProofType},
    task::{decode_task_payload, BatchTaskDetail, ChunkTaskDetail, ProvingTask, TaskDetail},
    trace::sort_by_height,
};
use tessera_tasks::ShutdownGuard;
use tracing::*;

use crate::{
    chain::ChainClient,
    coordinator::{CoordinatorClient, GetTaskRequest, LoginRequest, SubmitProofRequest, SUCCESS_CODE},
    engine::ProofEngine,
    errors::{CoordinatorError, FetchTaskError, ProverError, ProvingError, SubmitError},
};

/// Attempts a queued task may start before it is reported as failed without
/// proving. Counted from zero, so a task is proved at most three times.
pub const MAX_PROVING_RETRIES: u32 = 2;

/// Error reported for a task that exhausted its attempts.
pub const PROVING_PANIC_MESSAGE: &str = "zk proving panic";

/// Version reported to the coordinator.
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Proof payload as the coordinator expects it: both keys are always present.
#[derive(Serialize)]
struct ProofPayload<'a> {
    chunk_proof: Option<&'a ChunkProof>,
    batch_proof: Option<&'a BatchProof>,
}

/// Pulls tasks from the queue or the coordinator, proves them one at a time
/// and submits the signed results.
pub struct ProverAgent<Q, C, K, E> {
    queue: Arc<Q>,
    chain: C,
    coordinator: K,
    engine: E,
    secret_key: SecretKey,
    public_key: PublicKey,
    proof_type: ProofType,
    fetch_backoff: FixedBackoff,
}

impl<Q, C, K, E> ProverAgent<Q, C, K, E>
where
    Q: ProverTaskQueue,
    C: ChainClient,
    K: CoordinatorClient,
    E: ProofEngine,
{
    pub fn new(
        queue: Arc<Q>,
        chain: C,
        coordinator: K,
        engine: E,
        secret_key: SecretKey,
        proof_type: ProofType,
        fetch_backoff: FixedBackoff,
    ) -> Self {
        let public_key = PublicKey::from_secret_key(SECP256K1, &secret_key);
        Self {
            queue,
            chain,
            coordinator,
            engine,
            secret_key,
            public_key,
            proof_type,
            fetch_backoff,
        }
    }

    /// Compressed public key, hex encoded.
    pub fn public_key_hex(&self) -> String {
        public_key_hex(&self.public_key)
    }

    pub fn proof_type(&self) -> ProofType {
        self.proof_type
    }

    pub async fn login(&self, prover_name: &str) -> Result<(), CoordinatorError> {
        let req = LoginRequest {
            public_key: self.public_key_hex(),
            prover_name: prover_name.to_string(),
            prover_version: AGENT_VERSION.to_string(),
        };
        self.coordinator.login(&req).await
    }

    /// Runs until shutdown is signalled, finishing the current iteration
    /// first, then closes the queue.
    pub async fn run(self, shutdown: ShutdownGuard) {
        info!(proof_type = %self.proof_type, public_key = %self.public_key_hex(), "prover loop started");
        let fetch_wait = Duration::from_millis(self.fetch_backoff.base_delay_ms());

        while !shutdown.should_shutdown() {
            match self.prove_and_submit().await {
                Ok(()) => {}
                Err(ProverError::Fetch(e)) => {
                    warn!(err = %e, wait = ?fetch_wait, "failed to fetch task");
                    tokio::select! {
                        _ = tokio::time::sleep(fetch_wait) => {}
                        _ = shutdown.wait_for_shutdown() => {}
                    }
                }
                Err(e) => error!(err = %e, "prove failed"),
            }
        }

        if let Err(e) = self.queue.close() {
            error!(err = %e, "failed to close task queue");
        }
        info!("prover loop exited");
    }

    /// One iteration: acquire a task, prove it (or give up on it), submit the
    /// signed result and drop the task from the queue.
    pub async fn prove_and_submit(&self) -> Result<(), ProverError> {
        let task = match self.queue.peek_task()? {
            Some(task) => {
                info!(task_id = %task.id, retry_count = %task.retry_count, "resuming queued task");
                task
            }
            None => self.fetch_task().await?,
        };

        let detail = if task.retry_count <= MAX_PROVING_RETRIES {
            self.queue.update_retry_count(&task, task.retry_count + 1)?;
            info!(task_id = %task.id, task_type = %task.proof_type(), "start to prove task");
            self.prove(&task).await
        } else {
            warn!(task_id = %task.id, retry_count = %task.retry_count, "task crashed the prover too often, skipping");
            ProofDetail::failed(&task.id, task.proof_type(), PROVING_PANIC_MESSAGE)
        };

        let res = self.sign_and_submit(detail).await;

        if let Err(e) = self.queue.delete_task(&task.id) {
            error!(task_id = %task.id, err = %e, "failed to delete task from queue");
        }

        res
    }

    async fn fetch_task(&self) -> Result<ProvingTask, FetchTaskError> {
        let height = self
            .chain
            .latest_safe_block_number()
            .await
            .map_err(FetchTaskError::SafeHeight)?;

        let req = GetTaskRequest {
            prover_version: AGENT_VERSION.to_string(),
            prover_height: height,
            task_type: self.proof_type.into(),
        };
        let data = self
            .coordinator
            .get_task(&req)
            .await?
            .ok_or(FetchTaskError::NoTaskAvailable)?;

        let detail = decode_task_payload(data.task_type, &data.task_data)?;
        debug!(task_id = %data.task_id, %height, "fetched task from coordinator");

        Ok(ProvingTask::new(data.task_id, detail))
    }

    async fn prove(&self, task: &ProvingTask) -> ProofDetail {
        let task_type = task.proof_type();
        if task_type != self.proof_type {
            warn!(task_id = %task.id, %task_type, configured = %self.proof_type, "task type differs from configured proof type");
        }

        let res = match &task.detail {
            TaskDetail::Chunk(chunk) => self
                .prove_chunk(&task.id, chunk)
                .await
                .map(|proof| ProofDetail::chunk(&task.id, proof)),
            TaskDetail::Batch(batch) => self
                .prove_batch(&task.id, batch)
                .await
                .map(|proof| ProofDetail::batch(&task.id, proof)),
        };

        match res {
            Ok(detail) => {
                info!(task_id = %task.id, %task_type, "proved task");
                detail
            }
            Err(e) => {
                error!(task_id = %task.id, %task_type, err = %e, "proving failed");
                ProofDetail::failed(&task.id, task_type, e.to_string())
            }
        }
    }

    async fn prove_chunk(
        &self,
        task_id: &str,
        detail: &ChunkTaskDetail,
    ) -> Result<ChunkProof, ProvingError> {
        if detail.block_hashes.is_empty() {
            return Err(ProvingError::EmptyChunk);
        }

        let mut traces = Vec::with_capacity(detail.block_hashes.len());
        for hash in &detail.block_hashes {
            let trace = self
                .chain
                .block_trace_by_hash(*hash)
                .await
                .map_err(|source| ProvingError::Trace { hash: *hash, source })?;
            traces.push(trace);
        }
        // TODO: reject chunks whose block heights are not contiguous
        sort_by_height(&mut traces);

        self.engine
            .prove_chunk(task_id, traces)
            .await
            .map_err(ProvingError::Engine)
    }

    async fn prove_batch(
        &self,
        task_id: &str,
        detail: &BatchTaskDetail,
    ) -> Result<BatchProof, ProvingError> {
        self.engine
            .prove_batch(
                task_id,
                detail.chunk_infos.clone(),
                detail.chunk_proofs.clone(),
            )
            .await
            .map_err(ProvingError::Engine)
    }

    async fn sign_and_submit(&self, detail: ProofDetail) -> Result<(), ProverError> {
        let msg = ProofMsg::sign(detail, &self.secret_key)?;
        let (detail, signature) = msg.into_parts();

        let proof = serde_json::to_string(&ProofPayload {
            chunk_proof: detail.chunk_proof(),
            batch_proof: detail.batch_proof(),
        })
        .map_err(SubmitError::Payload)?;

        let req = SubmitProofRequest {
            task_id: detail.id().to_string(),
            status: detail.status().into(),
            error_message: detail.error().unwrap_or_default().to_string(),
            task_type: detail.proof_type().into(),
            signature,
            proof,
        };

        let resp = self
            .coordinator
            .submit_proof(&req)
            .await
            .map_err(SubmitError::Transport)?;
        if resp.errcode != SUCCESS_CODE {
            return Err(SubmitError::Rejected {
                errcode: resp.errcode,
                errmsg: resp.errmsg,
            }
            .into());
        }

        debug!(task_id = %req.task_id, "proof submitted");
        Ok(())
    }
}
