//! L2 node access needed by the agent.

use async_trait::async_trait;
use jsonrpsee::{
    core::client::ClientT,
    http_client::{HttpClient, HttpClientBuilder},
    rpc_params,
};
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use tessera_primitives::{trace::BlockTrace, B256, U64};

use crate::errors::ChainError;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
    /// Number of the latest block the node considers safe.
    async fn latest_safe_block_number(&self) -> Result<u64, ChainError>;

    async fn block_trace_by_hash(&self, hash: B256) -> Result<BlockTrace, ChainError>;
}

#[derive(Debug, Deserialize)]
struct BlockNumberOnly {
    number: U64,
}

/// [`ChainClient`] backed by the node's JSON-RPC interface.
#[derive(Debug, Clone)]
pub struct RpcChainClient {
    client: HttpClient,
}

impl RpcChainClient {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    pub fn connect(url: &str) -> Result<Self, ChainError> {
        let client = HttpClientBuilder::default().build(url)?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn latest_safe_block_number(&self) -> Result<u64, ChainError> {
        let block = self
            .client
            .request::<Option<BlockNumberOnly>, _>("eth_getBlockByNumber", rpc_params!["safe", false])
            .await?
            .ok_or(ChainError::MissingBlock("safe"))?;

        Ok(block.number.to::<u64>())
    }

    async fn block_trace_by_hash(&self, hash: B256) -> Result<BlockTrace, ChainError> {
        let trace = self
            .client
            .request::<BlockTrace, _>("scroll_getBlockTraceByNumberOrHash", rpc_params![hash])
            .await?;
        Ok(trace)
    }
}
