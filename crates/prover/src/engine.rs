use std::time::Duration;

use async_trait::async_trait;
use jsonrpsee::{
    core::client::ClientT,
    http_client::{HttpClient, HttpClientBuilder},
    rpc_params,
};
#[cfg(test)]
use mockall::automock;
use tessera_primitives::{
    proof::{BatchProof, ChunkInfo, ChunkProof},
    trace::BlockTrace,
};

/// Proof generation backend.
///
/// Calls may take minutes. The agent awaits them in its only loop, so there
/// is never more than one call in flight.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProofEngine: Send + Sync + 'static {
    /// Proves a chunk from traces ordered by ascending block height.
    async fn prove_chunk(&self, task_id: &str, traces: Vec<BlockTrace>)
        -> anyhow::Result<ChunkProof>;

    async fn prove_batch(
        &self,
        task_id: &str,
        chunk_infos: Vec<ChunkInfo>,
        chunk_proofs: Vec<ChunkProof>,
    ) -> anyhow::Result<BatchProof>;
}

/// [`ProofEngine`] running in a separate proving service reached over
/// JSON-RPC.
#[derive(Debug, Clone)]
pub struct RpcProofEngine {
    client: HttpClient,
}

impl RpcProofEngine {
    pub fn connect(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(url)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ProofEngine for RpcProofEngine {
    async fn prove_chunk(
        &self,
        task_id: &str,
        traces: Vec<BlockTrace>,
    ) -> anyhow::Result<ChunkProof> {
        let proof = self
            .client
            .request::<ChunkProof, _>("prover_proveChunk", rpc_params![task_id, traces])
            .await?;
        Ok(proof)
    }

    async fn prove_batch(
        &self,
        task_id: &str,
        chunk_infos: Vec<ChunkInfo>,
        chunk_proofs: Vec<ChunkProof>,
    ) -> anyhow::Result<BatchProof> {
        let proof = self
            .client
            .request::<BatchProof, _>(
                "prover_proveBatch",
                rpc_params![task_id, chunk_infos, chunk_proofs],
            )
            .await?;
        Ok(proof)
    }
}
