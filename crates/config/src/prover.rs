use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use tessera_primitives::proof::ProofType;

const DEFAULT_DATADIR: &str = "tessera-prover-data";
const DEFAULT_DB_RETRY_COUNT: u16 = 5;
const DEFAULT_FETCH_RETRY_WAIT_SECS: u64 = 10;
const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOGIN_RETRIES: u16 = 3;
const DEFAULT_ENGINE_TIMEOUT_SECS: u64 = 3600;
const SHUTDOWN_GRACE_SECS: u64 = 10;

/// Which proofs this agent produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProverKind {
    Chunk,
    Batch,
}

impl From<ProverKind> for ProofType {
    fn from(kind: ProverKind) -> Self {
        match kind {
            ProverKind::Chunk => ProofType::Chunk,
            ProverKind::Batch => ProofType::Batch,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProverConfig {
    /// Name reported to the coordinator on login.
    pub prover_name: String,

    /// File holding the hex encoded signing key. Created on first start.
    pub keystore_path: PathBuf,

    /// Directory holding the task queue database.
    #[serde(default = "default_datadir")]
    pub datadir: PathBuf,

    /// For optimistic transactions, how many times to retry if a write fails.
    #[serde(default = "default_db_retry_count")]
    pub db_retry_count: u16,

    /// L2 node serving block traces.
    pub trace_endpoint: String,

    pub proof_type: ProverKind,

    /// Proving service the traces and chunk proofs are handed to.
    pub engine_endpoint: String,

    /// Upper bound on a single proving call.
    #[serde(default = "default_engine_timeout_secs")]
    pub engine_timeout_secs: u64,

    pub coordinator: CoordinatorConfig,

    /// Wait after a failed task fetch.
    #[serde(default = "default_fetch_retry_wait_secs")]
    pub fetch_retry_wait_secs: u64,
}

impl ProverConfig {
    /// How long shutdown may wait for the task in flight: one proving call
    /// plus the coordinator round trips around it.
    pub fn shutdown_timeout(&self) -> Duration {
        let secs = self
            .engine_timeout_secs
            .saturating_add(self.coordinator.connection_timeout_secs.saturating_mul(2))
            .saturating_add(SHUTDOWN_GRACE_SECS);
        Duration::from_secs(secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    pub base_url: String,

    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,

    /// Login attempts before giving up on startup.
    #[serde(default = "default_login_retries")]
    pub login_retries: u16,
}

fn default_datadir() -> PathBuf {
    DEFAULT_DATADIR.into()
}

fn default_db_retry_count() -> u16 {
    DEFAULT_DB_RETRY_COUNT
}

fn default_fetch_retry_wait_secs() -> u64 {
    DEFAULT_FETCH_RETRY_WAIT_SECS
}

fn default_connection_timeout_secs() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_SECS
}

fn default_login_retries() -> u16 {
    DEFAULT_LOGIN_RETRIES
}

fn default_engine_timeout_secs() -> u64 {
    DEFAULT_ENGINE_TIMEOUT_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config_string = r#"
            prover_name = "prover-0"
            keystore_path = "/keys/prover.hex"
            trace_endpoint = "http://localhost:8545"
            proof_type = "chunk"
            engine_endpoint = "http://localhost:9000"

            [coordinator]
            base_url = "http://localhost:8390"
        "#;

        let config = toml::from_str::<ProverConfig>(config_string).unwrap();

        assert_eq!(config.proof_type, ProverKind::Chunk);
        assert_eq!(ProofType::from(config.proof_type), ProofType::Chunk);
        assert_eq!(config.fetch_retry_wait_secs, 10);
        assert_eq!(config.db_retry_count, 5);
        assert_eq!(config.datadir, PathBuf::from("tessera-prover-data"));
        assert_eq!(config.coordinator.connection_timeout_secs, 30);
        assert_eq!(config.engine_timeout_secs, 3600);
    }

    #[test]
    fn test_shutdown_timeout_covers_proving_call() {
        let config_string = r#"
            prover_name = "prover-0"
            keystore_path = "/keys/prover.hex"
            trace_endpoint = "http://localhost:8545"
            proof_type = "batch"
            engine_endpoint = "http://localhost:9000"
            engine_timeout_secs = 120

            [coordinator]
            base_url = "http://localhost:8390"
            connection_timeout_secs = 5
        "#;

        let config = toml::from_str::<ProverConfig>(config_string).unwrap();

        let timeout = config.shutdown_timeout();
        assert!(timeout > Duration::from_secs(config.engine_timeout_secs));
        assert_eq!(timeout, Duration::from_secs(120 + 2 * 5 + 10));
    }

    #[test]
    fn test_unknown_proof_type_rejected() {
        let config_string = r#"
            prover_name = "prover-0"
            keystore_path = "/keys/prover.hex"
            trace_endpoint = "http://localhost:8545"
            proof_type = "aggregate"
            engine_endpoint = "http://localhost:9000"

            [coordinator]
            base_url = "http://localhost:8390"
        "#;

        assert!(toml::from_str::<ProverConfig>(config_string).is_err());
    }
}
