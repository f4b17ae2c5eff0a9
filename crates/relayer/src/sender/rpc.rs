use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use jsonrpsee::{core::client::ClientT, http_client::HttpClient, rpc_params};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tessera_primitives::{Address, Bytes, B256, U256, U64};
use tessera_tasks::ShutdownGuard;
use tokio::{sync::mpsc, time::MissedTickBehavior};
use tracing::*;

use super::{Confirmation, SenderError, TxSender};

pub const CONFIRMATION_CHANNEL_SIZE: usize = 64;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TxRequest {
    from: Address,
    to: Address,
    value: U256,
    data: Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    gas: Option<U64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptInfo {
    block_number: Option<U64>,
    status: Option<U64>,
}

/// Transactions accepted by a sender and not yet confirmed. A slot is
/// reserved before the RPC call so concurrent sends with the same ID cannot
/// both go out.
#[derive(Debug, Default)]
struct PendingSet {
    max_pending: usize,
    entries: HashMap<String, Option<B256>>,
}

impl PendingSet {
    fn new(max_pending: usize) -> Self {
        Self {
            max_pending,
            entries: HashMap::new(),
        }
    }

    fn reserve(&mut self, id: &str) -> Result<(), SenderError> {
        if self.entries.contains_key(id) {
            return Err(SenderError::DuplicateId(id.to_string()));
        }
        if self.entries.len() >= self.max_pending {
            return Err(SenderError::FullPending);
        }
        self.entries.insert(id.to_string(), None);
        Ok(())
    }

    fn record_hash(&mut self, id: &str, tx_hash: B256) {
        if let Some(slot) = self.entries.get_mut(id) {
            *slot = Some(tx_hash);
        }
    }

    fn release(&mut self, id: &str) {
        self.entries.remove(id);
    }

    /// Sent transactions, as `(id, tx_hash)`.
    fn inflight(&self) -> Vec<(String, B256)> {
        self.entries
            .iter()
            .filter_map(|(id, hash)| hash.map(|h| (id.clone(), h)))
            .collect()
    }
}

/// [`TxSender`] over a node that manages the signing accounts
/// (`eth_sendTransaction`).
///
/// Accounts are used round-robin. Receipts are polled by
/// [`RpcTxSender::run_receipt_poller`], which emits a [`Confirmation`] once a
/// transaction has `confirmations` blocks on top of it.
pub struct RpcTxSender {
    name: &'static str,
    client: HttpClient,
    accounts: Vec<Address>,
    next_account: AtomicUsize,
    confirmations: u64,
    pending: Mutex<PendingSet>,
    confirm_tx: mpsc::Sender<Confirmation>,
}

impl RpcTxSender {
    pub fn new(
        name: &'static str,
        client: HttpClient,
        accounts: Vec<Address>,
        max_pending: usize,
        confirmations: u64,
    ) -> (Self, mpsc::Receiver<Confirmation>) {
        let (confirm_tx, confirm_rx) = mpsc::channel(CONFIRMATION_CHANNEL_SIZE);
        let sender = Self {
            name,
            client,
            accounts,
            next_account: AtomicUsize::new(0),
            confirmations,
            pending: Mutex::new(PendingSet::new(max_pending)),
            confirm_tx,
        };
        (sender, confirm_rx)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().entries.len()
    }

    fn pick_account(&self) -> Result<Address, SenderError> {
        if self.accounts.is_empty() {
            return Err(SenderError::NoAvailableAccount);
        }
        let idx = self.next_account.fetch_add(1, Ordering::Relaxed) % self.accounts.len();
        Ok(self.accounts[idx])
    }

    /// Polls receipts of in-flight transactions until shutdown.
    pub async fn run_receipt_poller(self: Arc<Self>, interval: Duration, shutdown: ShutdownGuard) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.wait_for_shutdown() => break,
            }

            if let Err(e) = self.poll_receipts().await {
                warn!(sender = %self.name, err = %e, "receipt poll failed");
            }
        }
        debug!(sender = %self.name, "receipt poller exited");
    }

    async fn poll_receipts(&self) -> Result<(), SenderError> {
        let inflight = self.pending.lock().inflight();
        if inflight.is_empty() {
            return Ok(());
        }

        let head = self
            .client
            .request::<U64, _>("eth_blockNumber", rpc_params![])
            .await?
            .to::<u64>();

        for (id, tx_hash) in inflight {
            let receipt = self
                .client
                .request::<Option<ReceiptInfo>, _>("eth_getTransactionReceipt", rpc_params![tx_hash])
                .await?;

            let Some(included_at) = receipt.as_ref().and_then(|r| r.block_number) else {
                continue;
            };
            if head.saturating_sub(included_at.to::<u64>()) < self.confirmations {
                continue;
            }

            let is_successful = receipt.and_then(|r| r.status) == Some(U64::from(1));
            self.pending.lock().release(&id);
            trace!(sender = %self.name, %id, %tx_hash, %is_successful, "transaction confirmed");

            let confirmation = Confirmation {
                id,
                tx_hash,
                is_successful,
            };
            if self.confirm_tx.send(confirmation).await.is_err() {
                warn!(sender = %self.name, "confirmation receiver dropped");
                return Ok(());
            }
        }

        Ok(())
    }
}

#[async_trait]
impl TxSender for RpcTxSender {
    async fn send_transaction(
        &self,
        id: &str,
        to: Address,
        value: U256,
        data: Bytes,
        gas_limit: u64,
    ) -> Result<B256, SenderError> {
        let from = self.pick_account()?;
        self.pending.lock().reserve(id)?;

        let req = TxRequest {
            from,
            to,
            value,
            data,
            gas: (gas_limit > 0).then(|| U64::from(gas_limit)),
        };

        match self
            .client
            .request::<B256, _>("eth_sendTransaction", rpc_params![req])
            .await
        {
            Ok(tx_hash) => {
                self.pending.lock().record_hash(id, tx_hash);
                debug!(sender = %self.name, %id, %tx_hash, %from, "sent transaction");
                Ok(tx_hash)
            }
            Err(e) => {
                self.pending.lock().release(id);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use jsonrpsee::http_client::HttpClientBuilder;

    use super::*;

    fn sender(accounts: Vec<Address>, max_pending: usize) -> RpcTxSender {
        // never contacted by these tests
        let client = HttpClientBuilder::default()
            .build("http://127.0.0.1:1")
            .unwrap();
        RpcTxSender::new("test", client, accounts, max_pending, 1).0
    }

    #[test]
    fn test_pending_set_limits() {
        let mut set = PendingSet::new(2);
        set.reserve("a").unwrap();
        assert!(matches!(set.reserve("a"), Err(SenderError::DuplicateId(_))));
        set.reserve("b").unwrap();
        assert!(matches!(set.reserve("c"), Err(SenderError::FullPending)));

        set.release("a");
        set.reserve("c").unwrap();
    }

    #[test]
    fn test_only_sent_transactions_are_inflight() {
        let mut set = PendingSet::new(4);
        set.reserve("a").unwrap();
        set.reserve("b").unwrap();
        set.record_hash("b", B256::repeat_byte(0xb));

        assert_eq!(set.inflight(), vec![("b".to_string(), B256::repeat_byte(0xb))]);
    }

    #[tokio::test]
    async fn test_no_accounts() {
        let sender = sender(vec![], 4);
        let res = sender
            .send_transaction("x", Address::ZERO, U256::ZERO, Bytes::new(), 0)
            .await;

        assert!(matches!(res, Err(SenderError::NoAvailableAccount)));
        assert_eq!(sender.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_full_pending_before_rpc() {
        let sender = sender(vec![Address::with_last_byte(1)], 0);
        let res = sender
            .send_transaction("x", Address::ZERO, U256::ZERO, Bytes::new(), 0)
            .await;

        assert!(matches!(res, Err(SenderError::FullPending)));
    }

    #[tokio::test]
    async fn test_failed_rpc_releases_slot() {
        let sender = sender(vec![Address::with_last_byte(1)], 1);
        let res = sender
            .send_transaction("x", Address::ZERO, U256::ZERO, Bytes::new(), 21_000)
            .await;

        assert!(matches!(res, Err(SenderError::Rpc(_))));
        assert_eq!(sender.pending_count(), 0);
    }

    #[test]
    fn test_accounts_round_robin() {
        let a = Address::with_last_byte(1);
        let b = Address::with_last_byte(2);
        let sender = sender(vec![a, b], 4);

        let picked = (0..4)
            .map(|_| sender.pick_account().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(picked, vec![a, b, a, b]);
    }
}
