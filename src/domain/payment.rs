//! Payment intent and charge records.
//!
//! Both record kinds are write-once: an intent record is stored when a
//! checkout creates a new processor intent, a charge record when that
//! intent has been validated for capture.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::GatewayError;

/// Window during which a stored intent may be handed out again.
pub const INTENT_REUSE_WINDOW_MINUTES: i64 = 10;

/// Locally persisted view of a processor payment intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentIntentRecord {
    /// Row identifier.
    pub id: i64,
    /// Processor-issued intent id.
    pub intent_id: String,
    /// Purchaser.
    pub user_address: String,
    /// Lock being purchased.
    pub lock_address: String,
    /// Network id.
    pub chain: i64,
    /// Key recipients.
    pub recipients: Vec<String>,
    /// Purchaser's customer id on the platform account.
    pub stripe_customer_id: String,
    /// Connected account receiving the funds.
    pub connected_stripe_id: String,
    /// Purchaser's customer id on the connected account.
    pub connected_customer_id: String,
    /// Insert timestamp.
    pub created_at: DateTime<Utc>,
}

impl PaymentIntentRecord {
    /// Returns `true` if every requested recipient is covered by this
    /// record.
    #[must_use]
    pub fn covers_recipients(&self, requested: &[String]) -> bool {
        requested.iter().all(|r| self.recipients.contains(r))
    }
}

/// Fields of a [`PaymentIntentRecord`] known before insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentIntent {
    /// Processor-issued intent id.
    pub intent_id: String,
    /// Purchaser.
    pub user_address: String,
    /// Lock being purchased.
    pub lock_address: String,
    /// Network id.
    pub chain: i64,
    /// Key recipients.
    pub recipients: Vec<String>,
    /// Platform customer id.
    pub stripe_customer_id: String,
    /// Connected account id.
    pub connected_stripe_id: String,
    /// Connected customer id.
    pub connected_customer_id: String,
}

/// Receipt of a validated payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChargeRecord {
    /// Row identifier.
    pub id: i64,
    /// Purchaser.
    pub user_address: String,
    /// Key recipients.
    pub recipients: Vec<String>,
    /// Lock purchased.
    pub lock: String,
    /// Customer the intent was charged to.
    pub stripe_customer_id: Option<String>,
    /// Connected customer.
    pub connected_customer: Option<String>,
    /// Amount authorized, in cents.
    pub total_price_in_cents: i64,
    /// Platform application fee, in cents.
    pub unlock_service_fee: i64,
    /// Processor intent id.
    pub stripe_charge: String,
    /// Number of renewals the purchaser opted into.
    pub recurring: i32,
    /// Network id.
    pub chain: i64,
    /// Insert timestamp.
    pub created_at: DateTime<Utc>,
}

/// Fields of a [`ChargeRecord`] known before insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCharge {
    /// Purchaser.
    pub user_address: String,
    /// Key recipients.
    pub recipients: Vec<String>,
    /// Lock purchased.
    pub lock: String,
    /// Customer the intent was charged to.
    pub stripe_customer_id: Option<String>,
    /// Connected customer.
    pub connected_customer: Option<String>,
    /// Amount authorized, in cents.
    pub total_price_in_cents: i64,
    /// Platform application fee, in cents.
    pub unlock_service_fee: i64,
    /// Processor intent id.
    pub stripe_charge: String,
    /// Renewal count.
    pub recurring: i32,
    /// Network id.
    pub chain: i64,
}

/// Joins recipients into the single metadata string the processor can
/// store.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] if the list is empty or any
/// recipient contains the `,` separator.
pub fn encode_recipients(recipients: &[String]) -> Result<String, GatewayError> {
    if recipients.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "at least one recipient is required".to_string(),
        ));
    }
    if let Some(bad) = recipients.iter().find(|r| r.contains(',')) {
        return Err(GatewayError::InvalidRequest(format!(
            "recipient {bad} contains a comma"
        )));
    }
    Ok(recipients.join(","))
}

/// Splits a recipient metadata string produced by [`encode_recipients`].
#[must_use]
pub fn decode_recipients(encoded: &str) -> Vec<String> {
    encoded
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}
