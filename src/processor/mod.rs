//! Payment processor boundary.
//!
//! [`PaymentProcessor`] models the subset of a Stripe-style API the
//! checkout flow needs. Calls that take an `account` run inside a
//! connected (merchant) account; the others run on the platform account.
//! [`StripeClient`] talks to the real API, [`InMemoryProcessor`] is a
//! deterministic fake.

pub mod memory;
pub mod stripe;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::GatewayError;

pub use memory::InMemoryProcessor;
pub use stripe::StripeClient;

/// Metadata key under which connected customers record their purchaser.
pub const USER_ADDRESS_METADATA: &str = "userAddress";

/// Lifecycle status of a processor payment intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    /// No payment method attached yet.
    RequiresPaymentMethod,
    /// Payment method attached, waiting for the purchaser to confirm.
    RequiresConfirmation,
    /// Extra authentication (3DS) pending.
    RequiresAction,
    /// Being processed.
    Processing,
    /// Authorized; funds are held until captured.
    RequiresCapture,
    /// Canceled.
    Canceled,
    /// Funds captured.
    Succeeded,
    /// Any status this gateway does not know about.
    #[serde(other)]
    Unknown,
}

impl IntentStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::RequiresAction => "requires_action",
            Self::Processing => "processing",
            Self::RequiresCapture => "requires_capture",
            Self::Canceled => "canceled",
            Self::Succeeded => "succeeded",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processor-side payment intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProcessorIntent {
    /// Processor id (`pi_...`).
    pub id: String,
    /// Current status.
    pub status: IntentStatus,
    /// Secret the front-end uses to confirm the intent.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Authorized amount in cents.
    pub amount: u64,
    /// Platform fee in cents.
    #[serde(default)]
    pub application_fee_amount: Option<u64>,
    /// Customer the intent charges.
    #[serde(default)]
    pub customer: Option<String>,
    /// String metadata attached at creation.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ProcessorIntent {
    /// Returns a metadata value, or `""` when absent.
    #[must_use]
    pub fn meta(&self, key: &str) -> &str {
        self.metadata.get(key).map_or("", String::as_str)
    }
}

/// Card details of a saved payment method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CardDetails {
    /// Card network (`visa`, `mastercard`, ...).
    pub brand: String,
    /// Last four digits.
    pub last4: String,
    /// Expiry month.
    pub exp_month: u32,
    /// Expiry year.
    pub exp_year: u32,
}

/// Saved payment method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentMethod {
    /// Processor id (`pm_...`).
    pub id: String,
    /// Card details when the method is a card.
    #[serde(default)]
    pub card: Option<CardDetails>,
}

/// Processor customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Processor id (`cus_...`).
    pub id: String,
    /// String metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Setup intent used to save a card for later purchases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupIntent {
    /// Processor id (`seti_...`).
    pub id: String,
    /// Secret the front-end uses to collect card details.
    #[serde(default)]
    pub client_secret: Option<String>,
}

/// Parameters of a manual-capture payment intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateIntentParams {
    /// Amount in cents.
    pub amount: u64,
    /// ISO currency code, lowercase.
    pub currency: String,
    /// Connected customer to charge.
    pub customer: String,
    /// Connected payment method to charge.
    pub payment_method: String,
    /// Platform fee in cents.
    pub application_fee_amount: u64,
    /// String metadata.
    pub metadata: BTreeMap<String, String>,
}

/// Hosted payment processor operations used by checkout.
#[async_trait]
pub trait PaymentProcessor: Send + Sync + fmt::Debug {
    /// Lists card payment methods of a platform customer, primary first.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Processor`] on API failure.
    async fn list_card_payment_methods(
        &self,
        customer: &str,
    ) -> Result<Vec<PaymentMethod>, GatewayError>;

    /// Copies a platform payment method into a connected account.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Processor`] on API failure.
    async fn clone_payment_method(
        &self,
        payment_method: &str,
        customer: &str,
        account: &str,
    ) -> Result<PaymentMethod, GatewayError>;

    /// Finds a customer tagged with `userAddress` metadata.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Processor`] on API failure.
    async fn find_customer_by_user_address(
        &self,
        user_address: &str,
        account: Option<&str>,
    ) -> Result<Option<Customer>, GatewayError>;

    /// Creates a customer tagged with `userAddress` metadata.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Processor`] on API failure.
    async fn create_customer(
        &self,
        user_address: &str,
        payment_method: Option<&str>,
        account: Option<&str>,
    ) -> Result<Customer, GatewayError>;

    /// Creates a manual-capture payment intent in a connected account.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Processor`] on API failure.
    async fn create_payment_intent(
        &self,
        params: &CreateIntentParams,
        account: &str,
    ) -> Result<ProcessorIntent, GatewayError>;

    /// Fetches the live state of a payment intent.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Processor`] on API failure or unknown id.
    async fn retrieve_payment_intent(
        &self,
        intent_id: &str,
        account: &str,
    ) -> Result<ProcessorIntent, GatewayError>;

    /// Captures the funds held by an authorized intent.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Processor`] on API failure.
    async fn capture_payment_intent(
        &self,
        intent_id: &str,
        account: &str,
    ) -> Result<ProcessorIntent, GatewayError>;

    /// Creates a setup intent for saving a card or Link wallet.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Processor`] on API failure.
    async fn create_setup_intent(&self, customer: &str) -> Result<SetupIntent, GatewayError>;
}
