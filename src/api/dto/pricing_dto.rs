//! Pricing DTOs.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::PricingBreakdown;

/// Query of `GET /pricing/{network}/{lock}`.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PricingQuery {
    /// Number of keys to price. Defaults to 1.
    #[serde(default = "default_recipients")]
    pub recipients: usize,
}

fn default_recipients() -> usize {
    1
}

/// Response body for `GET /pricing/{network}/{lock}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PricingResponse {
    /// Checksummed lock address.
    pub lock: String,
    /// Network id.
    pub network: i64,
    /// Number of keys priced.
    pub recipients: usize,
    /// Sum of all components, in cents.
    pub total_price_in_cents: u64,
    /// Components in cents, keyed by name (`keyPrice`, `serviceFee`, ...).
    #[schema(value_type = Object)]
    pub pricing: PricingBreakdown,
}
