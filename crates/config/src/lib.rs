//! TOML configuration of the prover agent and the settlement relayer.

use std::{fs, path::Path};

use serde::de::DeserializeOwned;
use thiserror::Error;

mod prover;
mod relayer;

pub use prover::{CoordinatorConfig, ProverConfig, ProverKind};
pub use relayer::{
    ContractsConfig, GasOracleConfig, RelayerConfig, ScheduleConfig, SendersConfig,
    DEFAULT_GAS_PRICE_DIFF, GAS_PRICE_DIFF_PRECISION,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Reads and parses a TOML config file.
pub fn load_from_path<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path)?;
    Ok(toml::from_str::<T>(&contents)?)
}
