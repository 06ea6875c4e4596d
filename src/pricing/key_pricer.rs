//! Production [`Pricer`]: key price converted to USD plus platform and
//! card fees.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{PriceSource, Pricer};
use crate::domain::PricingBreakdown;
use crate::domain::pricing::{CARD_PROCESSING_FEE, GAS_FEE, KEY_PRICE, SERVICE_FEE};
use crate::error::GatewayError;

const BPS_DENOMINATOR: u128 = 10_000;

/// Fees added on top of the key price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeSchedule {
    /// Platform fee in basis points of the key price.
    pub service_fee_bps: u32,
    /// Card processor percentage fee in basis points (must be < 10 000).
    pub card_fee_bps: u32,
    /// Card processor fixed fee per charge, in cents.
    pub card_fee_fixed_cents: u64,
    /// Flat gas surcharge per network, in cents.
    pub gas_fee_cents: HashMap<i64, u64>,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            service_fee_bps: 1_000,
            card_fee_bps: 290,
            card_fee_fixed_cents: 30,
            gas_fee_cents: HashMap::new(),
        }
    }
}

impl FeeSchedule {
    /// Platform fee for a given key price.
    #[must_use]
    pub fn service_fee(&self, key_price_cents: u64) -> u64 {
        ceil_div(
            u128::from(key_price_cents) * u128::from(self.service_fee_bps),
            BPS_DENOMINATOR,
        )
    }

    /// Surcharge such that the processor's cut of `subtotal + surcharge`
    /// leaves exactly `subtotal`.
    #[must_use]
    pub fn card_processing_fee(&self, subtotal_cents: u64) -> u64 {
        if subtotal_cents == 0 {
            return 0;
        }
        let keep = BPS_DENOMINATOR.saturating_sub(u128::from(self.card_fee_bps)).max(1);
        let gross = ceil_div(
            (u128::from(subtotal_cents) + u128::from(self.card_fee_fixed_cents)) * BPS_DENOMINATOR,
            keep,
        );
        gross.saturating_sub(subtotal_cents)
    }

    /// Gas surcharge for `network`.
    #[must_use]
    pub fn gas_fee(&self, network: i64) -> u64 {
        self.gas_fee_cents.get(&network).copied().unwrap_or(0)
    }
}

fn ceil_div(numerator: u128, denominator: u128) -> u64 {
    let q = numerator.div_ceil(denominator);
    u64::try_from(q).unwrap_or(u64::MAX)
}

/// Prices keys from live lock state and exchange rates.
#[derive(Debug, Clone)]
pub struct KeyPricer {
    source: Arc<dyn PriceSource>,
    schedule: FeeSchedule,
}

impl KeyPricer {
    /// Creates a pricer reading from `source`.
    #[must_use]
    pub fn new(source: Arc<dyn PriceSource>, schedule: FeeSchedule) -> Self {
        Self { source, schedule }
    }

    /// USD cents for a single key.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    async fn unit_price_cents(&self, lock: &str, network: i64) -> Result<u64, GatewayError> {
        let key = self.source.key_price(lock, network).await?;
        if !key.amount.is_finite() || key.amount < 0.0 {
            return Err(GatewayError::UpstreamPricing(format!(
                "invalid key price {} for lock {lock}",
                key.amount
            )));
        }
        if key.amount == 0.0 {
            return Ok(0);
        }

        let rate = self.source.usd_rate(&key.symbol).await?;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(GatewayError::UpstreamPricing(format!(
                "invalid USD rate {rate} for {}",
                key.symbol
            )));
        }
        Ok((key.amount * rate * 100.0).round() as u64)
    }
}

#[async_trait]
impl Pricer for KeyPricer {
    async fn generate(
        &self,
        lock: &str,
        network: i64,
        recipients: usize,
    ) -> Result<PricingBreakdown, GatewayError> {
        let quantity = u64::try_from(recipients.max(1)).unwrap_or(1);
        let key_price = self
            .unit_price_cents(lock, network)
            .await?
            .saturating_mul(quantity);

        let gas_fee = self.schedule.gas_fee(network);
        let service_fee = self.schedule.service_fee(key_price);
        let subtotal = key_price.saturating_add(gas_fee).saturating_add(service_fee);
        let card_fee = self.schedule.card_processing_fee(subtotal);

        tracing::debug!(
            lock,
            network,
            quantity,
            key_price,
            service_fee,
            card_fee,
            gas_fee,
            "pricing generated"
        );

        Ok(PricingBreakdown::new()
            .with(KEY_PRICE, key_price)
            .with(GAS_FEE, gas_fee)
            .with(SERVICE_FEE, service_fee)
            .with(CARD_PROCESSING_FEE, card_fee))
    }
}
