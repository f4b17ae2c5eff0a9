use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tessera_primitives::Address;

/// Denominator of [`GasOracleConfig::gas_price_diff`].
pub const GAS_PRICE_DIFF_PRECISION: u64 = 1_000_000;

/// Default relative change (5%) that triggers an oracle update.
pub const DEFAULT_GAS_PRICE_DIFF: u64 = 50_000;

const DEFAULT_DATADIR: &str = "tessera-relayer-data";
const DEFAULT_DB_RETRY_COUNT: u16 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayerConfig {
    /// L1 node the transactions are sent to.
    pub l1_endpoint: String,

    /// L2 node queried for the gas price.
    pub l2_endpoint: String,

    #[serde(default = "default_datadir")]
    pub datadir: PathBuf,

    /// For optimistic transactions, how many times to retry if a write fails.
    #[serde(default = "default_db_retry_count")]
    pub db_retry_count: u16,

    pub contracts: ContractsConfig,

    pub senders: SendersConfig,

    #[serde(default)]
    pub gas_oracle: GasOracleConfig,

    /// Minimum spacing, by batch creation time, between two finalized
    /// batches. Zero disables the limit.
    #[serde(default)]
    pub finalize_batch_interval_sec: u64,

    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    pub rollup: Address,
    pub messenger: Address,
    pub gas_price_oracle: Address,
}

/// Accounts and limits of the three transaction senders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendersConfig {
    pub message_accounts: Vec<Address>,
    pub rollup_accounts: Vec<Address>,
    pub gas_oracle_accounts: Vec<Address>,

    /// Transactions in flight per sender before `FullPending` is returned.
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,

    /// Blocks on top of the receipt before a transaction counts as confirmed.
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GasOracleConfig {
    /// Prices below this never trigger an update (other than the first one).
    #[serde(default)]
    pub min_gas_price: u64,

    /// Relative change needed to trigger an update, in millionths.
    #[serde(default = "default_gas_price_diff")]
    pub gas_price_diff: u64,
}

impl Default for GasOracleConfig {
    fn default() -> Self {
        Self {
            min_gas_price: 0,
            gas_price_diff: DEFAULT_GAS_PRICE_DIFF,
        }
    }
}

/// How often the relayer runs each submitter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub gas_oracle_interval_ms: u64,
    pub commit_interval_ms: u64,
    pub finalize_interval_ms: u64,
    /// Pending batches bundled into one commit transaction.
    pub commit_batch_limit: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            gas_oracle_interval_ms: 2_000,
            commit_interval_ms: 2_000,
            finalize_interval_ms: 2_000,
            commit_batch_limit: 10,
        }
    }
}

fn default_datadir() -> PathBuf {
    DEFAULT_DATADIR.into()
}

fn default_db_retry_count() -> u16 {
    DEFAULT_DB_RETRY_COUNT
}

fn default_max_pending() -> usize {
    64
}

fn default_confirmations() -> u64 {
    6
}

fn default_poll_interval_ms() -> u64 {
    3_000
}

fn default_gas_price_diff() -> u64 {
    DEFAULT_GAS_PRICE_DIFF
}
