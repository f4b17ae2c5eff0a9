//! Decides when the L1 gas price oracle needs a new L2 base fee.

use async_trait::async_trait;
use jsonrpsee::{core::client::ClientT, http_client::HttpClient, rpc_params};
#[cfg(test)]
use mockall::automock;
use tessera_config::{GasOracleConfig, GAS_PRICE_DIFF_PRECISION};
use tessera_primitives::U256;

/// Price last written to the oracle by this process. Starts empty on every
/// restart.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GasOracleState {
    last_price: u64,
}

impl GasOracleState {
    pub fn last_price(&self) -> u64 {
        self.last_price
    }

    pub(crate) fn record(&mut self, price: u64) {
        self.last_price = price;
    }
}

/// Whether `new_price` warrants an oracle update.
///
/// The first price always does. Afterwards the price must be at least the
/// configured floor and move by at least `gas_price_diff / precision` of the
/// last applied price, in either direction.
pub fn should_update_gas_price(last_price: u64, new_price: u64, config: &GasOracleConfig) -> bool {
    if last_price == 0 {
        return true;
    }
    if new_price < config.min_gas_price {
        return false;
    }

    let expected_delta = u128::from(last_price) * u128::from(config.gas_price_diff)
        / u128::from(GAS_PRICE_DIFF_PRECISION);
    u128::from(new_price.abs_diff(last_price)) >= expected_delta
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait GasPriceSource: Send + Sync + 'static {
    /// Gas price the L2 node currently suggests, in wei.
    async fn suggest_gas_price(&self) -> anyhow::Result<u64>;
}

/// Reads `eth_gasPrice` from the L2 node.
#[derive(Debug, Clone)]
pub struct RpcGasPriceSource {
    client: HttpClient,
}

impl RpcGasPriceSource {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl GasPriceSource for RpcGasPriceSource {
    async fn suggest_gas_price(&self) -> anyhow::Result<u64> {
        let price = self
            .client
            .request::<U256, _>("eth_gasPrice", rpc_params![])
            .await?;
        if price > U256::from(u64::MAX) {
            anyhow::bail!("gas price {price} does not fit in u64");
        }
        Ok(price.as_limbs()[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min_gas_price: u64, gas_price_diff: u64) -> GasOracleConfig {
        GasOracleConfig {
            min_gas_price,
            gas_price_diff,
        }
    }

    #[test]
    fn test_first_price_always_applied() {
        let cfg = config(1_000, 50_000);
        assert!(should_update_gas_price(0, 1, &cfg));
        assert!(should_update_gas_price(0, 0, &cfg));
    }

    #[test]
    fn test_threshold_boundaries() {
        // 5% of 1000 is 50
        let cfg = config(0, 50_000);
        let cases = [
            (1_000, 1_050, true),
            (1_000, 1_049, false),
            (1_000, 950, true),
            (1_000, 951, false),
            (1_000, 1_000, false),
            (1_000, 10_000, true),
            (1_000, 1, true),
        ];
        for (last, new, expected) in cases {
            assert_eq!(
                should_update_gas_price(last, new, &cfg),
                expected,
                "last {last} new {new}"
            );
        }
    }

    #[test]
    fn test_floor_blocks_updates() {
        let cfg = config(900, 50_000);
        assert!(!should_update_gas_price(1_000, 899, &cfg));
        assert!(should_update_gas_price(1_000, 900, &cfg));
    }

    #[test]
    fn test_zero_diff_updates_on_any_price() {
        let cfg = config(0, 0);
        assert!(should_update_gas_price(1_000, 1_000, &cfg));
    }

    #[test]
    fn test_no_overflow_on_large_prices() {
        let cfg = config(0, GAS_PRICE_DIFF_PRECISION);
        assert!(!should_update_gas_price(u64::MAX, u64::MAX - 1, &cfg));
        assert!(should_update_gas_price(u64::MAX / 2, u64::MAX, &cfg));
    }
}
