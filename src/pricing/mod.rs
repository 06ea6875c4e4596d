//! Pricing: turns a lock's on-chain key price into a card-payable fee
//! breakdown.
//!
//! [`Pricer`] is the seam the checkout flow depends on. [`KeyPricer`] is
//! the production implementation; it reads key price and currency from a
//! [`PriceSource`] and applies the [`FeeSchedule`].

pub mod fixed;
pub mod key_pricer;
pub mod onchain;

use std::fmt;

use async_trait::async_trait;

use crate::domain::PricingBreakdown;
use crate::error::GatewayError;

pub use fixed::{FixedPriceSource, FixedPricer};
pub use key_pricer::{FeeSchedule, KeyPricer};
pub use onchain::RpcPriceSource;

/// Computes the fee breakdown for buying `recipients` keys of `lock`.
#[async_trait]
pub trait Pricer: Send + Sync + fmt::Debug {
    /// Returns the breakdown in cents. Always contains a `serviceFee`
    /// component.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UpstreamPricing`] if lock or exchange-rate
    /// data cannot be read.
    async fn generate(
        &self,
        lock: &str,
        network: i64,
        recipients: usize,
    ) -> Result<PricingBreakdown, GatewayError>;
}

/// Key price of a lock, in whole units of its payment currency.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPrice {
    /// Price per key (e.g. `0.01` ETH).
    pub amount: f64,
    /// Currency ticker used to look up the USD rate (e.g. `"ETH"`).
    pub symbol: String,
}

/// Live lock and market data.
#[async_trait]
pub trait PriceSource: Send + Sync + fmt::Debug {
    /// Reads the key price and payment currency of `lock` on `network`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UpstreamPricing`] on RPC failure.
    async fn key_price(&self, lock: &str, network: i64) -> Result<KeyPrice, GatewayError>;

    /// Returns the USD value of one unit of `symbol`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UpstreamPricing`] on API failure.
    async fn usd_rate(&self, symbol: &str) -> Result<f64, GatewayError>;
}
