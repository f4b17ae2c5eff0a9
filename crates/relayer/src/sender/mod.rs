//! Transaction submission and confirmation tracking.

mod rpc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tessera_primitives::{Address, Bytes, B256, U256};
use thiserror::Error;

pub use rpc::{RpcTxSender, CONFIRMATION_CHANNEL_SIZE};

/// Emitted once a sent transaction is buried deep enough.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Confirmation {
    /// Correlation ID the transaction was sent with.
    pub id: String,
    pub tx_hash: B256,
    pub is_successful: bool,
}

#[derive(Debug, Error)]
pub enum SenderError {
    #[error("no available account to send from")]
    NoAvailableAccount,

    #[error("pending transaction limit reached")]
    FullPending,

    #[error("transaction {0} already pending")]
    DuplicateId(String),

    #[error("rpc: {0}")]
    Rpc(String),
}

impl SenderError {
    /// Expected when the sender is saturated; callers retry on their next run.
    pub fn is_backpressure(&self) -> bool {
        matches!(self, SenderError::NoAvailableAccount | SenderError::FullPending)
    }
}

impl From<jsonrpsee::core::ClientError> for SenderError {
    fn from(e: jsonrpsee::core::ClientError) -> Self {
        SenderError::Rpc(e.to_string())
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait TxSender: Send + Sync + 'static {
    /// Sends a transaction tagged with `id`. The matching [`Confirmation`]
    /// carries the same `id`.
    ///
    /// A `gas_limit` of zero leaves estimation to the node.
    async fn send_transaction(
        &self,
        id: &str,
        to: Address,
        value: U256,
        data: Bytes,
        gas_limit: u64,
    ) -> Result<B256, SenderError>;
}
