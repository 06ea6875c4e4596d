//! In-memory pricing fixtures for tests and local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{KeyPrice, PriceSource, Pricer};
use crate::domain::PricingBreakdown;
use crate::error::GatewayError;

/// [`Pricer`] returning preset breakdowns per lock.
///
/// The preset is per purchase, not per key: the recipient count is
/// ignored. Unknown locks fail with [`GatewayError::UpstreamPricing`].
#[derive(Debug, Default)]
pub struct FixedPricer {
    prices: RwLock<HashMap<String, PricingBreakdown>>,
}

impl FixedPricer {
    /// Creates a pricer with no locks configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets (or replaces) the breakdown returned for `lock`.
    pub async fn set(&self, lock: &str, pricing: PricingBreakdown) {
        self.prices.write().await.insert(lock.to_string(), pricing);
    }
}

#[async_trait]
impl Pricer for FixedPricer {
    async fn generate(
        &self,
        lock: &str,
        _network: i64,
        _recipients: usize,
    ) -> Result<PricingBreakdown, GatewayError> {
        self.prices
            .read()
            .await
            .get(lock)
            .cloned()
            .ok_or_else(|| GatewayError::UpstreamPricing(format!("no price for lock {lock}")))
    }
}

/// [`PriceSource`] backed by preset key prices and rates.
#[derive(Debug, Default)]
pub struct FixedPriceSource {
    keys: RwLock<HashMap<(String, i64), KeyPrice>>,
    rates: RwLock<HashMap<String, f64>>,
}

impl FixedPriceSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key price of `lock` on `network`.
    pub async fn set_key_price(&self, lock: &str, network: i64, price: KeyPrice) {
        self.keys
            .write()
            .await
            .insert((lock.to_string(), network), price);
    }

    /// Sets the USD rate of `symbol`.
    pub async fn set_rate(&self, symbol: &str, rate: f64) {
        self.rates.write().await.insert(symbol.to_string(), rate);
    }
}

#[async_trait]
impl PriceSource for FixedPriceSource {
    async fn key_price(&self, lock: &str, network: i64) -> Result<KeyPrice, GatewayError> {
        self.keys
            .read()
            .await
            .get(&(lock.to_string(), network))
            .cloned()
            .ok_or_else(|| {
                GatewayError::UpstreamPricing(format!("lock {lock} not found on network {network}"))
            })
    }

    async fn usd_rate(&self, symbol: &str) -> Result<f64, GatewayError> {
        self.rates
            .read()
            .await
            .get(symbol)
            .copied()
            .ok_or_else(|| GatewayError::UpstreamPricing(format!("no USD rate for {symbol}")))
    }
}
