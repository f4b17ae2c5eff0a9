use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tessera_config::{ContractsConfig, GasOracleConfig};
use tessera_db::stubs::StubBatchDb;
use tessera_primitives::{
    batch::{BatchHeader, BatchRecord},
    Address, Bytes, B256, U256,
};

use crate::{
    gas_oracle::MockGasPriceSource,
    relayer::{RelayerSenders, SettlementRelayer},
    sender::{SenderError, TxSender},
};

#[derive(Clone, Debug)]
pub(crate) struct SentTx {
    pub id: String,
    pub to: Address,
    pub data: Bytes,
    pub gas_limit: u64,
    pub tx_hash: B256,
}

pub(crate) enum Outcome {
    Accept,
    Reject(fn() -> SenderError),
}

/// Sender that records every accepted transaction.
pub(crate) struct RecordingSender {
    tag: u8,
    outcome: Mutex<Outcome>,
    sent: Mutex<Vec<SentTx>>,
}

impl RecordingSender {
    fn new(tag: u8) -> Self {
        Self {
            tag,
            outcome: Mutex::new(Outcome::Accept),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_outcome(&self, outcome: Outcome) {
        *self.outcome.lock() = outcome;
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl TxSender for RecordingSender {
    async fn send_transaction(
        &self,
        id: &str,
        to: Address,
        _value: U256,
        data: Bytes,
        gas_limit: u64,
    ) -> Result<B256, SenderError> {
        if let Outcome::Reject(make_err) = &*self.outcome.lock() {
            return Err(make_err());
        }

        let mut sent = self.sent.lock();
        let mut hash = [0u8; 32];
        hash[0] = self.tag;
        hash[24..].copy_from_slice(&(sent.len() as u64 + 1).to_be_bytes());
        let tx_hash = B256::from(hash);
        sent.push(SentTx {
            id: id.to_string(),
            to,
            data,
            gas_limit,
            tx_hash,
        });
        Ok(tx_hash)
    }
}

pub(crate) type TestRelayer = SettlementRelayer<StubBatchDb, RecordingSender, MockGasPriceSource>;

pub(crate) fn make_batch(index: u64, created_at: u64) -> BatchRecord {
    let header = BatchHeader {
        index,
        parent_batch_hash: B256::with_last_byte(index as u8),
        prev_state_root: B256::repeat_byte(0x11),
        post_state_root: B256::repeat_byte(0x22),
        withdraw_root: B256::repeat_byte(0x33),
        data_hash: B256::repeat_byte(0x44),
    };
    let mut hash = [0xbau8; 32];
    hash[24..].copy_from_slice(&index.to_be_bytes());
    BatchRecord::new(B256::from(hash), header, created_at)
}

/// One recording sender per purpose, with distinct tx hash tags.
pub(crate) fn recording_senders() -> RelayerSenders<RecordingSender> {
    RelayerSenders {
        message: Arc::new(RecordingSender::new(1)),
        rollup: Arc::new(RecordingSender::new(2)),
        gas_oracle: Arc::new(RecordingSender::new(3)),
    }
}

/// Second handle on the same senders, for the relayer under test.
pub(crate) fn share_senders(
    senders: &RelayerSenders<RecordingSender>,
) -> RelayerSenders<RecordingSender> {
    RelayerSenders {
        message: senders.message.clone(),
        rollup: senders.rollup.clone(),
        gas_oracle: senders.gas_oracle.clone(),
    }
}

pub(crate) fn test_contracts() -> ContractsConfig {
    ContractsConfig {
        rollup: Address::repeat_byte(0xaa),
        messenger: Address::repeat_byte(0xbb),
        gas_price_oracle: Address::repeat_byte(0xcc),
    }
}

/// Relayer over an empty stub store, with distinct contract addresses and one
/// recording sender per purpose.
pub(crate) fn make_relayer(
    gas_source: MockGasPriceSource,
    finalize_batch_interval_sec: u64,
) -> (TestRelayer, Arc<StubBatchDb>, RelayerSenders<RecordingSender>) {
    let db = Arc::new(StubBatchDb::new());
    let senders = recording_senders();
    let relayer = SettlementRelayer::new(
        db.clone(),
        gas_source,
        share_senders(&senders),
        test_contracts(),
        GasOracleConfig::default(),
        finalize_batch_interval_sec,
    );
    (relayer, db, senders)
}
