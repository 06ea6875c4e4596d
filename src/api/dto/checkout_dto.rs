//! Purchase DTOs: intent creation, capture, settlement, saved cards.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{ChargeRecord, PricingBreakdown};
use crate::processor::{IntentStatus, PaymentMethod, ProcessorIntent};
use crate::service::{CaptureOutcome, CaptureRequest, IntentQuote, IntentRequest, SetupOutcome};

/// Request body for `POST /purchase/intent`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateIntentRequest {
    /// Purchaser address.
    pub user_address: String,
    /// Key recipients; at least one.
    pub recipients: Vec<String>,
    /// Purchaser's platform customer id.
    pub stripe_customer_id: String,
    /// Lock address.
    pub lock: String,
    /// Price the purchaser saw, in dollars.
    pub max_price: f64,
    /// Network id.
    pub network: i64,
    /// Connected account of the lock manager.
    pub stripe_account: String,
    /// Renewals the purchaser opted into.
    #[serde(default)]
    pub recurring: u32,
}

impl From<CreateIntentRequest> for IntentRequest {
    fn from(req: CreateIntentRequest) -> Self {
        Self {
            user_address: req.user_address,
            recipients: req.recipients,
            stripe_customer_id: req.stripe_customer_id,
            lock: req.lock,
            max_price: req.max_price,
            network: req.network,
            stripe_account: req.stripe_account,
            recurring: req.recurring,
        }
    }
}

/// Response body for `POST /purchase/intent`.
#[derive(Debug, Serialize, ToSchema)]
pub struct IntentResponse {
    /// Secret to confirm the intent with.
    pub client_secret: String,
    /// Processor intent id.
    pub payment_intent_id: String,
    /// Connected account the intent lives in.
    pub stripe_account: String,
    /// Amount that will be authorized, in cents.
    pub total_price_in_cents: u64,
    /// Price components in cents.
    #[schema(value_type = Object)]
    pub pricing: PricingBreakdown,
    /// Whether an earlier intent was handed out again.
    pub reused: bool,
}

impl From<IntentQuote> for IntentResponse {
    fn from(quote: IntentQuote) -> Self {
        Self {
            client_secret: quote.client_secret,
            payment_intent_id: quote.payment_intent_id,
            stripe_account: quote.stripe_account,
            total_price_in_cents: quote.total_price_in_cents,
            pricing: quote.pricing,
            reused: quote.reused,
        }
    }
}

/// Request body for `POST /purchase/capture`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CaptureChargeRequest {
    /// Purchaser address.
    pub user_address: String,
    /// Lock address.
    pub lock_address: String,
    /// Key recipients.
    pub recipients: Vec<String>,
    /// Network id.
    pub network: i64,
    /// Processor intent id.
    pub payment_intent_id: String,
}

impl From<CaptureChargeRequest> for CaptureRequest {
    fn from(req: CaptureChargeRequest) -> Self {
        Self {
            user_address: req.user_address,
            lock_address: req.lock_address,
            recipients: req.recipients,
            network: req.network,
            payment_intent_id: req.payment_intent_id,
        }
    }
}

/// Response body for `POST /purchase/capture`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CaptureResponse {
    /// Processor intent id.
    pub payment_intent_id: String,
    /// Live intent status.
    pub status: IntentStatus,
    /// Connected account holding the intent.
    pub stripe_account: String,
    /// Stored charge.
    pub charge: ChargeRecord,
}

impl From<CaptureOutcome> for CaptureResponse {
    fn from(outcome: CaptureOutcome) -> Self {
        Self {
            payment_intent_id: outcome.payment_intent.id,
            status: outcome.payment_intent.status,
            stripe_account: outcome.payment_intent_record.connected_stripe_id,
            charge: outcome.charge,
        }
    }
}

/// Response body for `POST /purchase/settle/{payment_intent_id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SettleResponse {
    /// Processor intent id.
    pub payment_intent_id: String,
    /// Status after capture.
    pub status: IntentStatus,
    /// Captured amount, in cents.
    pub amount: u64,
}

impl From<ProcessorIntent> for SettleResponse {
    fn from(intent: ProcessorIntent) -> Self {
        Self {
            payment_intent_id: intent.id,
            status: intent.status,
            amount: intent.amount,
        }
    }
}

/// Response body for `POST /purchase/setup/{user_address}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SetupIntentResponse {
    /// Secret to collect card details with.
    pub client_secret: String,
    /// Platform customer id.
    pub customer_id: String,
}

impl From<SetupOutcome> for SetupIntentResponse {
    fn from(outcome: SetupOutcome) -> Self {
        Self {
            client_secret: outcome.client_secret,
            customer_id: outcome.customer_id,
        }
    }
}

/// Response body for `GET /purchase/methods/{user_address}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentMethodsResponse {
    /// Saved cards, primary first.
    pub methods: Vec<PaymentMethod>,
}
