//! Price breakdown value object.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Component name for the key price itself.
pub const KEY_PRICE: &str = "keyPrice";
/// Component name for the platform's cut, charged as the application fee.
pub const SERVICE_FEE: &str = "serviceFee";
/// Component name for the card processing surcharge.
pub const CARD_PROCESSING_FEE: &str = "creditCardProcessingFee";
/// Component name for the flat on-chain gas surcharge.
pub const GAS_FEE: &str = "gasFee";

/// Allowed divergence between a quoted and a computed price, in percent.
pub const PRICE_TOLERANCE_PERCENT: f64 = 3.0;

/// Fee components in minor currency units (cents).
///
/// Ephemeral: computed per request and never persisted as such. The
/// charge total is [`PricingBreakdown::total`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PricingBreakdown(BTreeMap<String, u64>);

impl PricingBreakdown {
    /// Creates a breakdown holding only a zero service fee.
    #[must_use]
    pub fn new() -> Self {
        let mut components = BTreeMap::new();
        components.insert(SERVICE_FEE.to_string(), 0);
        Self(components)
    }

    /// Sets a component, replacing any previous amount.
    #[must_use]
    pub fn with(mut self, name: &str, cents: u64) -> Self {
        self.0.insert(name.to_string(), cents);
        self
    }

    /// Returns the amount of a single component.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<u64> {
        self.0.get(name).copied()
    }

    /// Returns the service fee (0 if absent).
    #[must_use]
    pub fn service_fee(&self) -> u64 {
        self.get(SERVICE_FEE).unwrap_or(0)
    }

    /// Sum of all components.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.values().fold(0u64, |acc, v| acc.saturating_add(*v))
    }

    /// Iterates over `(component, cents)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Checks that `computed_cents` lies within [`PRICE_TOLERANCE_PERCENT`]
/// of `expected_cents`.
///
/// # Errors
///
/// Returns [`GatewayError::PriceDiverged`] when the difference exceeds the
/// tolerance.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn ensure_within_tolerance(
    computed_cents: u64,
    expected_cents: f64,
) -> Result<(), GatewayError> {
    let diff = (computed_cents as f64 - expected_cents).abs();
    if diff * 100.0 > PRICE_TOLERANCE_PERCENT * expected_cents {
        return Err(GatewayError::PriceDiverged {
            computed_cents,
            expected_cents: expected_cents.max(0.0).round() as u64,
        });
    }
    Ok(())
}
