//! Checkout service: creates or reuses card payment intents and turns
//! authorized intents into charge records.
//!
//! A checkout attempt moves through
//! `NoIntent -> IntentCreated | IntentReused -> Captured`, failing at any
//! step on validation or processor errors. Nothing is retried here.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::domain::address::{normalize_address, normalize_all};
use crate::domain::payment::{INTENT_REUSE_WINDOW_MINUTES, decode_recipients, encode_recipients};
use crate::domain::pricing::ensure_within_tolerance;
use crate::domain::{
    ChargeRecord, NewCharge, NewPaymentIntent, PaymentIntentRecord, PricingBreakdown,
};
use crate::error::GatewayError;
use crate::persistence::{ChargeStore, CustomerStore, IntentStore};
use crate::pricing::Pricer;
use crate::processor::{
    CreateIntentParams, IntentStatus, PaymentMethod, PaymentProcessor, ProcessorIntent,
};

const CURRENCY: &str = "usd";

/// Input of [`CheckoutService::create_or_reuse_intent`].
#[derive(Debug, Clone, PartialEq)]
pub struct IntentRequest {
    /// Purchaser.
    pub user_address: String,
    /// Key recipients.
    pub recipients: Vec<String>,
    /// Purchaser's platform customer id.
    pub stripe_customer_id: String,
    /// Lock to purchase.
    pub lock: String,
    /// Price the purchaser agreed to, in dollars.
    pub max_price: f64,
    /// Network id.
    pub network: i64,
    /// Connected account of the lock manager.
    pub stripe_account: String,
    /// Number of renewals the purchaser opted into.
    pub recurring: u32,
}

/// Result of [`CheckoutService::create_or_reuse_intent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentQuote {
    /// Secret the front-end confirms the intent with.
    pub client_secret: String,
    /// Processor intent id.
    pub payment_intent_id: String,
    /// Connected account holding the intent.
    pub stripe_account: String,
    /// Sum of the pricing components.
    pub total_price_in_cents: u64,
    /// Price breakdown.
    pub pricing: PricingBreakdown,
    /// `true` when an existing intent was handed out again.
    pub reused: bool,
}

/// Input of [`CheckoutService::capture_and_record_charge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Purchaser.
    pub user_address: String,
    /// Lock purchased.
    pub lock_address: String,
    /// Key recipients.
    pub recipients: Vec<String>,
    /// Network id.
    pub network: i64,
    /// Processor intent id.
    pub payment_intent_id: String,
}

/// Result of [`CheckoutService::capture_and_record_charge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutcome {
    /// Live processor intent.
    pub payment_intent: ProcessorIntent,
    /// Local intent record.
    pub payment_intent_record: PaymentIntentRecord,
    /// Stored charge.
    pub charge: ChargeRecord,
}

/// Result of [`CheckoutService::create_setup_intent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupOutcome {
    /// Secret the front-end collects card details with.
    pub client_secret: String,
    /// Platform customer the card will be saved under.
    pub customer_id: String,
}

/// Orchestrates card checkouts.
///
/// Holds handles to the pricer, the processor, and the record stores;
/// all state lives behind those handles.
#[derive(Debug, Clone)]
pub struct CheckoutService {
    pricer: Arc<dyn Pricer>,
    processor: Arc<dyn PaymentProcessor>,
    intents: Arc<dyn IntentStore>,
    charges: Arc<dyn ChargeStore>,
    customers: Arc<dyn CustomerStore>,
}

impl CheckoutService {
    /// Creates a new `CheckoutService`.
    #[must_use]
    pub fn new(
        pricer: Arc<dyn Pricer>,
        processor: Arc<dyn PaymentProcessor>,
        intents: Arc<dyn IntentStore>,
        charges: Arc<dyn ChargeStore>,
        customers: Arc<dyn CustomerStore>,
    ) -> Self {
        Self {
            pricer,
            processor,
            intents,
            charges,
            customers,
        }
    }

    /// Returns a payment intent the purchaser can confirm.
    ///
    /// An intent created for the same purchaser, lock, network and
    /// connected account within the last ten minutes is reused while it
    /// still awaits confirmation, covers every requested recipient and
    /// its amount is within 3% of the fresh total. A reused quote reports
    /// the intent's own amount. Two concurrent calls can both miss and
    /// create two intents.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidAddress`] / [`GatewayError::InvalidRequest`]
    ///   on malformed input.
    /// - [`GatewayError::PriceDiverged`] if the computed total is more than
    ///   3% away from `max_price`.
    /// - [`GatewayError::PaymentMethodMissing`] if the purchaser has no card.
    /// - Pricing, processor or persistence errors.
    pub async fn create_or_reuse_intent(
        &self,
        req: &IntentRequest,
    ) -> Result<IntentQuote, GatewayError> {
        let user_address = normalize_address(&req.user_address)?;
        let lock = normalize_address(&req.lock)?;
        let recipients = normalize_all(&req.recipients)?;
        let encoded_recipients = encode_recipients(&recipients)?;
        if !req.max_price.is_finite() || req.max_price < 0.0 {
            return Err(GatewayError::InvalidRequest(format!(
                "invalid max_price {}",
                req.max_price
            )));
        }
        if req.stripe_account.is_empty() || req.stripe_customer_id.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "stripe_account and stripe_customer_id are required".to_string(),
            ));
        }

        let pricing = self
            .pricer
            .generate(&lock, req.network, recipients.len())
            .await?;
        let total_price_in_cents = pricing.total();
        ensure_within_tolerance(total_price_in_cents, req.max_price * 100.0)?;

        if let Some(quote) = self
            .reusable_intent(&user_address, &lock, &recipients, req, &pricing)
            .await?
        {
            return Ok(quote);
        }

        let account = req.stripe_account.as_str();
        let method = self.connected_payment_method(req).await?;
        let connected_customer = match self
            .processor
            .find_customer_by_user_address(&user_address, Some(account))
            .await?
        {
            Some(customer) => customer,
            None => {
                self.processor
                    .create_customer(&user_address, Some(&method.id), Some(account))
                    .await?
            }
        };

        let metadata = BTreeMap::from([
            ("purchaser".to_string(), user_address.clone()),
            ("lock".to_string(), lock.clone()),
            ("recurring".to_string(), req.recurring.to_string()),
            ("recipient".to_string(), encoded_recipients),
            ("network".to_string(), req.network.to_string()),
            ("maxPrice".to_string(), req.max_price.to_string()),
        ]);
        let params = CreateIntentParams {
            amount: total_price_in_cents,
            currency: CURRENCY.to_string(),
            customer: connected_customer.id.clone(),
            payment_method: method.id,
            application_fee_amount: pricing.service_fee(),
            metadata,
        };
        let intent = self.processor.create_payment_intent(&params, account).await?;

        self.intents
            .insert_intent(&NewPaymentIntent {
                intent_id: intent.id.clone(),
                user_address: user_address.clone(),
                lock_address: lock.clone(),
                chain: req.network,
                recipients,
                stripe_customer_id: req.stripe_customer_id.clone(),
                connected_stripe_id: req.stripe_account.clone(),
                connected_customer_id: connected_customer.id,
            })
            .await?;

        tracing::info!(
            intent_id = %intent.id,
            %user_address,
            %lock,
            network = req.network,
            total_price_in_cents,
            "payment intent created"
        );

        Ok(IntentQuote {
            client_secret: client_secret(&intent)?,
            payment_intent_id: intent.id,
            stripe_account: req.stripe_account.clone(),
            total_price_in_cents,
            pricing,
            reused: false,
        })
    }

    /// Looks for an intent from the reuse window that the purchaser can
    /// still confirm.
    async fn reusable_intent(
        &self,
        user_address: &str,
        lock: &str,
        recipients: &[String],
        req: &IntentRequest,
        pricing: &PricingBreakdown,
    ) -> Result<Option<IntentQuote>, GatewayError> {
        let since = Utc::now() - Duration::minutes(INTENT_REUSE_WINDOW_MINUTES);
        let Some(existing) = self
            .intents
            .find_recent_intent(user_address, lock, req.network, &req.stripe_account, since)
            .await?
        else {
            return Ok(None);
        };
        if !existing.covers_recipients(recipients) {
            return Ok(None);
        }

        let live = self
            .processor
            .retrieve_payment_intent(&existing.intent_id, &existing.connected_stripe_id)
            .await?;
        if live.status != IntentStatus::RequiresConfirmation {
            tracing::debug!(
                intent_id = %live.id,
                status = %live.status,
                "recent intent not reusable"
            );
            return Ok(None);
        }

        #[allow(clippy::cast_precision_loss)]
        let authorized = live.amount as f64;
        if ensure_within_tolerance(pricing.total(), authorized).is_err() {
            tracing::debug!(
                intent_id = %live.id,
                amount = live.amount,
                total_price_in_cents = pricing.total(),
                "recent intent amount does not match the price"
            );
            return Ok(None);
        }

        tracing::info!(intent_id = %live.id, %user_address, %lock, "reusing payment intent");
        Ok(Some(IntentQuote {
            client_secret: client_secret(&live)?,
            payment_intent_id: live.id,
            stripe_account: req.stripe_account.clone(),
            total_price_in_cents: live.amount,
            pricing: pricing.clone(),
            reused: true,
        }))
    }

    /// Clones the purchaser's primary card into the connected account.
    async fn connected_payment_method(
        &self,
        req: &IntentRequest,
    ) -> Result<PaymentMethod, GatewayError> {
        let methods = self
            .processor
            .list_card_payment_methods(&req.stripe_customer_id)
            .await?;
        let primary = methods
            .first()
            .ok_or_else(|| GatewayError::PaymentMethodMissing(req.stripe_customer_id.clone()))?;
        self.processor
            .clone_payment_method(&primary.id, &req.stripe_customer_id, &req.stripe_account)
            .await
    }

    /// Validates an authorized intent against the purchase and stores the
    /// charge receipt. Repeating the call for an intent that already has a
    /// charge returns that charge.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::IntentNotFound`] if no local record exists.
    /// - [`GatewayError::NotCaptureReady`] unless the processor reports
    ///   `requires_capture`.
    /// - [`GatewayError::IntentMismatch`] if lock, purchaser, network or
    ///   recipients differ from the intent.
    /// - [`GatewayError::PriceDiverged`] if a fresh price is more than 3%
    ///   away from the authorized amount.
    /// - Pricing, processor or persistence errors.
    pub async fn capture_and_record_charge(
        &self,
        req: &CaptureRequest,
    ) -> Result<CaptureOutcome, GatewayError> {
        let user_address = normalize_address(&req.user_address)?;
        let lock = normalize_address(&req.lock_address)?;
        let recipients = normalize_all(&req.recipients)?;

        let pricing = self
            .pricer
            .generate(&lock, req.network, recipients.len())
            .await?;
        let total_price_in_cents = pricing.total();

        let record = self
            .intents
            .find_intent(&req.payment_intent_id)
            .await?
            .ok_or_else(|| GatewayError::IntentNotFound(req.payment_intent_id.clone()))?;

        let intent = self
            .processor
            .retrieve_payment_intent(&record.intent_id, &record.connected_stripe_id)
            .await?;
        if intent.status != IntentStatus::RequiresCapture {
            return Err(GatewayError::NotCaptureReady {
                status: intent.status.to_string(),
            });
        }

        if intent.meta("lock") != lock {
            return Err(GatewayError::IntentMismatch("Lock".to_string()));
        }
        if intent.meta("purchaser") != user_address {
            return Err(GatewayError::IntentMismatch("User Address".to_string()));
        }
        if record.chain != req.network {
            return Err(GatewayError::IntentMismatch("Network".to_string()));
        }
        let tagged = decode_recipients(intent.meta("recipient"));
        if tagged.is_empty() || !tagged.iter().all(|r| recipients.contains(r)) {
            return Err(GatewayError::IntentMismatch("Recipient".to_string()));
        }

        #[allow(clippy::cast_precision_loss)]
        let authorized = intent.amount as f64;
        if let Err(err) = ensure_within_tolerance(total_price_in_cents, authorized) {
            tracing::error!(
                intent_id = %intent.id,
                total_price_in_cents,
                authorized_cents = intent.amount,
                "price diverged by more than 3%"
            );
            return Err(err);
        }

        let recurring = match intent.meta("recurring").parse() {
            Ok(recurring) => recurring,
            Err(_) => {
                tracing::warn!(
                    intent_id = %intent.id,
                    tag = intent.meta("recurring"),
                    "unparseable recurring tag, recording 0"
                );
                0
            }
        };

        let charge = self
            .charges
            .insert_charge(&NewCharge {
                user_address: intent.meta("purchaser").to_string(),
                recipients: tagged,
                lock: intent.meta("lock").to_string(),
                stripe_customer_id: Some(record.stripe_customer_id.clone()),
                connected_customer: intent.customer.clone(),
                total_price_in_cents: to_db_cents(intent.amount)?,
                unlock_service_fee: to_db_cents(intent.application_fee_amount.unwrap_or(0))?,
                stripe_charge: intent.id.clone(),
                recurring,
                chain: req.network,
            })
            .await?;

        tracing::info!(
            intent_id = %intent.id,
            charge_id = charge.id,
            total_price_in_cents = charge.total_price_in_cents,
            "charge recorded"
        );

        Ok(CaptureOutcome {
            payment_intent: intent,
            payment_intent_record: record,
            charge,
        })
    }

    /// Captures the funds of an authorized intent once its keys have been
    /// granted.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::IntentNotFound`] if no local record exists.
    /// - [`GatewayError::NotCaptureReady`] unless the processor reports
    ///   `requires_capture`.
    /// - Processor or persistence errors.
    pub async fn settle_payment(
        &self,
        payment_intent_id: &str,
    ) -> Result<ProcessorIntent, GatewayError> {
        let record = self
            .intents
            .find_intent(payment_intent_id)
            .await?
            .ok_or_else(|| GatewayError::IntentNotFound(payment_intent_id.to_string()))?;

        let intent = self
            .processor
            .retrieve_payment_intent(&record.intent_id, &record.connected_stripe_id)
            .await?;
        if intent.status != IntentStatus::RequiresCapture {
            return Err(GatewayError::NotCaptureReady {
                status: intent.status.to_string(),
            });
        }

        let captured = self
            .processor
            .capture_payment_intent(&record.intent_id, &record.connected_stripe_id)
            .await?;
        tracing::info!(intent_id = %captured.id, status = %captured.status, "payment captured");
        Ok(captured)
    }

    /// Starts saving a card for `user_address`, creating and linking a
    /// platform customer on first use.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidAddress`], processor or persistence
    /// errors.
    pub async fn create_setup_intent(
        &self,
        user_address: &str,
    ) -> Result<SetupOutcome, GatewayError> {
        let user_address = normalize_address(user_address)?;

        let customer_id = match self.customers.find_customer_id(&user_address).await? {
            Some(id) => id,
            None => {
                let customer = match self
                    .processor
                    .find_customer_by_user_address(&user_address, None)
                    .await?
                {
                    Some(customer) => customer,
                    None => {
                        self.processor
                            .create_customer(&user_address, None, None)
                            .await?
                    }
                };
                self.customers
                    .save_customer_id(&user_address, &customer.id)
                    .await?;
                tracing::info!(%user_address, customer_id = %customer.id, "customer linked");
                customer.id
            }
        };

        let setup = self.processor.create_setup_intent(&customer_id).await?;
        let client_secret = setup.client_secret.ok_or_else(|| {
            GatewayError::Processor(format!("setup intent {} has no client secret", setup.id))
        })?;

        Ok(SetupOutcome {
            client_secret,
            customer_id,
        })
    }

    /// Lists the saved cards of `user_address`; empty when the purchaser
    /// has no platform customer yet.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidAddress`], processor or persistence
    /// errors.
    pub async fn list_card_methods(
        &self,
        user_address: &str,
    ) -> Result<Vec<PaymentMethod>, GatewayError> {
        let user_address = normalize_address(user_address)?;
        match self.customers.find_customer_id(&user_address).await? {
            Some(customer_id) => self.processor.list_card_payment_methods(&customer_id).await,
            None => Ok(Vec::new()),
        }
    }
}

fn client_secret(intent: &ProcessorIntent) -> Result<String, GatewayError> {
    intent.client_secret.clone().ok_or_else(|| {
        GatewayError::Processor(format!("payment intent {} has no client secret", intent.id))
    })
}

fn to_db_cents(cents: u64) -> Result<i64, GatewayError> {
    i64::try_from(cents).map_err(|_| GatewayError::Internal(format!("amount {cents} overflows")))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::domain::pricing::{KEY_PRICE, SERVICE_FEE};
    use crate::persistence::InMemoryPersistence;
    use crate::pricing::{
        FeeSchedule, FixedPriceSource, FixedPricer, KeyPrice, KeyPricer, PriceSource,
    };
    use crate::processor::InMemoryProcessor;

    const USER: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";
    const LOCK: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
    const FRIEND: &str = "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB";
    const OTHER_LOCK: &str = "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb";
    const ACCOUNT: &str = "acct_lock_manager";
    const NETWORK: i64 = 137;

    struct Fixture {
        service: CheckoutService,
        pricer: Arc<FixedPricer>,
        processor: Arc<InMemoryProcessor>,
        store: Arc<InMemoryPersistence>,
        customer: String,
    }

    async fn fixture() -> Fixture {
        let pricer = Arc::new(FixedPricer::new());
        pricer
            .set(
                LOCK,
                PricingBreakdown::new()
                    .with(KEY_PRICE, 1000)
                    .with(SERVICE_FEE, 50),
            )
            .await;
        let processor = Arc::new(InMemoryProcessor::new());
        let customer = processor.add_customer(USER).await;
        let _ = processor.add_card(&customer).await;
        let store = Arc::new(InMemoryPersistence::new());

        let service = CheckoutService::new(
            Arc::clone(&pricer) as Arc<dyn Pricer>,
            Arc::clone(&processor) as Arc<dyn PaymentProcessor>,
            Arc::clone(&store) as Arc<dyn IntentStore>,
            Arc::clone(&store) as Arc<dyn ChargeStore>,
            Arc::clone(&store) as Arc<dyn CustomerStore>,
        );
        Fixture {
            service,
            pricer,
            processor,
            store,
            customer,
        }
    }

    /// Service over the fixture's processor and store, pricing each key of
    /// LOCK at 5 USD with no fees.
    async fn per_key_service(fx: &Fixture) -> CheckoutService {
        let source = Arc::new(FixedPriceSource::new());
        source
            .set_key_price(
                LOCK,
                NETWORK,
                KeyPrice {
                    amount: 5.0,
                    symbol: "USDC".to_string(),
                },
            )
            .await;
        source.set_rate("USDC", 1.0).await;
        let schedule = FeeSchedule {
            service_fee_bps: 0,
            card_fee_bps: 0,
            card_fee_fixed_cents: 0,
            gas_fee_cents: HashMap::new(),
        };
        let pricer = KeyPricer::new(source as Arc<dyn PriceSource>, schedule);

        CheckoutService::new(
            Arc::new(pricer),
            Arc::clone(&fx.processor) as Arc<dyn PaymentProcessor>,
            Arc::clone(&fx.store) as Arc<dyn IntentStore>,
            Arc::clone(&fx.store) as Arc<dyn ChargeStore>,
            Arc::clone(&fx.store) as Arc<dyn CustomerStore>,
        )
    }

    fn intent_request(customer: &str, recipients: &[&str], max_price: f64) -> IntentRequest {
        IntentRequest {
            user_address: USER.to_string(),
            recipients: recipients.iter().map(|r| (*r).to_string()).collect(),
            stripe_customer_id: customer.to_string(),
            lock: LOCK.to_string(),
            max_price,
            network: NETWORK,
            stripe_account: ACCOUNT.to_string(),
            recurring: 0,
        }
    }

    fn capture_request(intent_id: &str, recipients: &[&str]) -> CaptureRequest {
        CaptureRequest {
            user_address: USER.to_string(),
            lock_address: LOCK.to_string(),
            recipients: recipients.iter().map(|r| (*r).to_string()).collect(),
            network: NETWORK,
            payment_intent_id: intent_id.to_string(),
        }
    }

    /// Stores a reusable intent created `minutes_ago`, in the processor and
    /// in the local records.
    async fn seed_intent(fx: &Fixture, id: &str, recipients: &[&str], minutes_ago: i64) {
        let record = NewPaymentIntent {
            intent_id: id.to_string(),
            user_address: USER.to_string(),
            lock_address: LOCK.to_string(),
            chain: NETWORK,
            recipients: recipients.iter().map(|r| (*r).to_string()).collect(),
            stripe_customer_id: fx.customer.clone(),
            connected_stripe_id: ACCOUNT.to_string(),
            connected_customer_id: "cus_connected".to_string(),
        };
        let _ = fx
            .store
            .insert_intent_at(&record, Utc::now() - Duration::minutes(minutes_ago))
            .await;
        fx.processor
            .insert_intent(
                ACCOUNT,
                ProcessorIntent {
                    id: id.to_string(),
                    status: IntentStatus::RequiresConfirmation,
                    client_secret: Some(format!("{id}_secret")),
                    amount: 1050,
                    application_fee_amount: Some(50),
                    customer: Some("cus_connected".to_string()),
                    metadata: HashMap::new(),
                },
            )
            .await;
    }

    /// Stores an authorized single-recipient intent whose `recurring` tag
    /// is `tag`.
    async fn tagged_authorized_intent(fx: &Fixture, id: &str, tag: &str) {
        let record = NewPaymentIntent {
            intent_id: id.to_string(),
            user_address: USER.to_string(),
            lock_address: LOCK.to_string(),
            chain: NETWORK,
            recipients: vec![USER.to_string()],
            stripe_customer_id: fx.customer.clone(),
            connected_stripe_id: ACCOUNT.to_string(),
            connected_customer_id: "cus_connected".to_string(),
        };
        let _ = fx.store.insert_intent(&record).await;
        let metadata = HashMap::from([
            ("purchaser".to_string(), USER.to_string()),
            ("lock".to_string(), LOCK.to_string()),
            ("recipient".to_string(), USER.to_string()),
            ("recurring".to_string(), tag.to_string()),
        ]);
        fx.processor
            .insert_intent(
                ACCOUNT,
                ProcessorIntent {
                    id: id.to_string(),
                    status: IntentStatus::RequiresCapture,
                    client_secret: Some(format!("{id}_secret")),
                    amount: 1050,
                    application_fee_amount: Some(50),
                    customer: Some("cus_connected".to_string()),
                    metadata,
                },
            )
            .await;
    }

    async fn authorized_intent(fx: &Fixture, recipients: &[&str]) -> String {
        let Ok(quote) = fx
            .service
            .create_or_reuse_intent(&intent_request(&fx.customer, recipients, 10.50))
            .await
        else {
            panic!("intent creation failed");
        };
        let Ok(()) = fx
            .processor
            .set_intent_status(ACCOUNT, &quote.payment_intent_id, IntentStatus::RequiresCapture)
            .await
        else {
            panic!("status change failed");
        };
        quote.payment_intent_id
    }

    #[tokio::test]
    async fn creates_intent_with_metadata_and_fee() {
        let fx = fixture().await;
        let req = intent_request(&fx.customer, &[USER, FRIEND], 10.50);

        let Ok(quote) = fx.service.create_or_reuse_intent(&req).await else {
            panic!("intent creation failed");
        };
        assert!(!quote.reused);
        assert_eq!(quote.total_price_in_cents, 1050);
        assert_eq!(quote.stripe_account, ACCOUNT);
        assert!(!quote.client_secret.is_empty());

        let Ok(intent) = fx
            .processor
            .retrieve_payment_intent(&quote.payment_intent_id, ACCOUNT)
            .await
        else {
            panic!("intent should exist in the connected account");
        };
        assert_eq!(intent.amount, 1050);
        assert_eq!(intent.application_fee_amount, Some(50));
        assert_eq!(intent.meta("purchaser"), USER);
        assert_eq!(intent.meta("lock"), LOCK);
        assert_eq!(intent.meta("recipient"), format!("{USER},{FRIEND}"));
        assert_eq!(intent.meta("network"), "137");
        assert_eq!(intent.meta("recurring"), "0");
        assert_eq!(intent.meta("maxPrice"), "10.5");

        let records = fx.store.intents().await;
        assert_eq!(records.len(), 1);
        let Some(record) = records.first() else {
            panic!("record missing");
        };
        assert_eq!(record.intent_id, quote.payment_intent_id);
        assert_eq!(record.recipients, vec![USER.to_string(), FRIEND.to_string()]);
        assert_eq!(record.stripe_customer_id, fx.customer);
        assert_eq!(fx.processor.cloned_methods().await, 1);
        assert_eq!(fx.processor.customer_count(Some(ACCOUNT)).await, 1);
    }

    #[tokio::test]
    async fn lowercase_input_is_normalized() {
        let fx = fixture().await;
        let mut req = intent_request(&fx.customer, &[&USER.to_lowercase()], 10.50);
        req.user_address = USER.to_lowercase();
        req.lock = LOCK.to_lowercase();

        let Ok(quote) = fx.service.create_or_reuse_intent(&req).await else {
            panic!("intent creation failed");
        };
        let Ok(intent) = fx
            .processor
            .retrieve_payment_intent(&quote.payment_intent_id, ACCOUNT)
            .await
        else {
            panic!("intent missing");
        };
        assert_eq!(intent.meta("purchaser"), USER);
        assert_eq!(intent.meta("lock"), LOCK);
    }

    #[tokio::test]
    async fn reuses_recent_intent() {
        let fx = fixture().await;
        seed_intent(&fx, "pi_recent", &[USER, FRIEND], 5).await;

        let Ok(quote) = fx
            .service
            .create_or_reuse_intent(&intent_request(&fx.customer, &[FRIEND], 10.50))
            .await
        else {
            panic!("reuse failed");
        };
        assert!(quote.reused);
        assert_eq!(quote.payment_intent_id, "pi_recent");
        assert_eq!(quote.client_secret, "pi_recent_secret");
        assert_eq!(quote.total_price_in_cents, 1050);
        assert_eq!(fx.processor.created_intents().await, 0);
        assert_eq!(fx.store.intents().await.len(), 1);
    }

    #[tokio::test]
    async fn recipient_subset_with_lower_total_gets_new_intent() {
        let fx = fixture().await;
        let service = per_key_service(&fx).await;

        let Ok(pair) = service
            .create_or_reuse_intent(&intent_request(&fx.customer, &[USER, FRIEND], 10.00))
            .await
        else {
            panic!("intent creation failed");
        };
        assert_eq!(pair.total_price_in_cents, 1000);

        let Ok(single) = service
            .create_or_reuse_intent(&intent_request(&fx.customer, &[FRIEND], 5.00))
            .await
        else {
            panic!("intent creation failed");
        };
        assert!(!single.reused);
        assert_ne!(single.payment_intent_id, pair.payment_intent_id);
        assert_eq!(single.total_price_in_cents, 500);
        assert_eq!(fx.processor.created_intents().await, 2);

        let Ok(()) = fx
            .processor
            .set_intent_status(ACCOUNT, &single.payment_intent_id, IntentStatus::RequiresCapture)
            .await
        else {
            panic!("status change failed");
        };
        let Ok(outcome) = service
            .capture_and_record_charge(&capture_request(&single.payment_intent_id, &[FRIEND]))
            .await
        else {
            panic!("capture of the fresh intent failed");
        };
        assert_eq!(outcome.charge.total_price_in_cents, 500);
        assert_eq!(outcome.charge.recipients, vec![FRIEND.to_string()]);
    }

    #[tokio::test]
    async fn reused_intent_can_be_captured() {
        let fx = fixture().await;
        let req = intent_request(&fx.customer, &[USER, FRIEND], 10.50);

        let Ok(first) = fx.service.create_or_reuse_intent(&req).await else {
            panic!("intent creation failed");
        };
        let Ok(second) = fx.service.create_or_reuse_intent(&req).await else {
            panic!("reuse failed");
        };
        assert!(second.reused);
        assert_eq!(second.payment_intent_id, first.payment_intent_id);
        assert_eq!(second.total_price_in_cents, 1050);
        assert_eq!(fx.processor.created_intents().await, 1);

        let Ok(()) = fx
            .processor
            .set_intent_status(ACCOUNT, &second.payment_intent_id, IntentStatus::RequiresCapture)
            .await
        else {
            panic!("status change failed");
        };
        let Ok(outcome) = fx
            .service
            .capture_and_record_charge(&capture_request(&second.payment_intent_id, &[USER, FRIEND]))
            .await
        else {
            panic!("capture of the reused intent failed");
        };
        assert_eq!(outcome.charge.stripe_charge, first.payment_intent_id);
        assert_eq!(outcome.charge.total_price_in_cents, 1050);
    }

    #[tokio::test]
    async fn stale_intent_is_not_reused() {
        let fx = fixture().await;
        seed_intent(&fx, "pi_stale", &[USER], 15).await;

        let Ok(quote) = fx
            .service
            .create_or_reuse_intent(&intent_request(&fx.customer, &[USER], 10.50))
            .await
        else {
            panic!("intent creation failed");
        };
        assert!(!quote.reused);
        assert_ne!(quote.payment_intent_id, "pi_stale");
        assert_eq!(fx.processor.created_intents().await, 1);
    }

    #[tokio::test]
    async fn intent_missing_recipient_is_not_reused() {
        let fx = fixture().await;
        seed_intent(&fx, "pi_partial", &[USER], 2).await;

        let Ok(quote) = fx
            .service
            .create_or_reuse_intent(&intent_request(&fx.customer, &[USER, FRIEND], 10.50))
            .await
        else {
            panic!("intent creation failed");
        };
        assert!(!quote.reused);
    }

    #[tokio::test]
    async fn confirmed_intent_is_not_reused() {
        let fx = fixture().await;
        seed_intent(&fx, "pi_confirmed", &[USER], 2).await;
        let _ = fx
            .processor
            .set_intent_status(ACCOUNT, "pi_confirmed", IntentStatus::RequiresCapture)
            .await;

        let Ok(quote) = fx
            .service
            .create_or_reuse_intent(&intent_request(&fx.customer, &[USER], 10.50))
            .await
        else {
            panic!("intent creation failed");
        };
        assert!(!quote.reused);
        assert_eq!(fx.processor.created_intents().await, 1);
    }

    #[tokio::test]
    async fn diverged_price_creates_nothing() {
        let fx = fixture().await;
        let result = fx
            .service
            .create_or_reuse_intent(&intent_request(&fx.customer, &[USER], 10.00))
            .await;
        assert!(matches!(
            result,
            Err(GatewayError::PriceDiverged {
                computed_cents: 1050,
                expected_cents: 1000
            })
        ));
        assert_eq!(fx.processor.created_intents().await, 0);
        assert!(fx.store.intents().await.is_empty());
    }

    #[tokio::test]
    async fn price_within_tolerance_is_accepted() {
        let fx = fixture().await;
        let result = fx
            .service
            .create_or_reuse_intent(&intent_request(&fx.customer, &[USER], 10.30))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn customer_without_card_is_rejected() {
        let fx = fixture().await;
        let bare = fx.processor.add_customer(FRIEND).await;
        let result = fx
            .service
            .create_or_reuse_intent(&intent_request(&bare, &[USER], 10.50))
            .await;
        assert!(matches!(result, Err(GatewayError::PaymentMethodMissing(_))));
    }

    #[tokio::test]
    async fn connected_customer_is_reused_across_intents() {
        let fx = fixture().await;
        let first = fx
            .service
            .create_or_reuse_intent(&intent_request(&fx.customer, &[USER], 10.50))
            .await;
        assert!(first.is_ok());
        let second = fx
            .service
            .create_or_reuse_intent(&intent_request(&fx.customer, &[FRIEND], 10.50))
            .await;
        assert!(second.is_ok());

        assert_eq!(fx.processor.created_intents().await, 2);
        assert_eq!(fx.processor.customer_count(Some(ACCOUNT)).await, 1);
    }

    #[tokio::test]
    async fn rejects_invalid_request() {
        let fx = fixture().await;

        let mut bad_address = intent_request(&fx.customer, &[USER], 10.50);
        bad_address.user_address = "0x1234".to_string();
        assert!(matches!(
            fx.service.create_or_reuse_intent(&bad_address).await,
            Err(GatewayError::InvalidAddress(_))
        ));

        let no_recipients = intent_request(&fx.customer, &[], 10.50);
        assert!(matches!(
            fx.service.create_or_reuse_intent(&no_recipients).await,
            Err(GatewayError::InvalidRequest(_))
        ));

        let negative = intent_request(&fx.customer, &[USER], -1.0);
        assert!(matches!(
            fx.service.create_or_reuse_intent(&negative).await,
            Err(GatewayError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn capture_records_charge() {
        let fx = fixture().await;
        let intent_id = authorized_intent(&fx, &[USER, FRIEND]).await;

        let Ok(outcome) = fx
            .service
            .capture_and_record_charge(&capture_request(&intent_id, &[USER, FRIEND]))
            .await
        else {
            panic!("capture validation failed");
        };
        assert_eq!(outcome.payment_intent.id, intent_id);
        assert_eq!(outcome.payment_intent_record.intent_id, intent_id);

        let charge = &outcome.charge;
        assert_eq!(charge.user_address, USER);
        assert_eq!(charge.lock, LOCK);
        assert_eq!(charge.recipients, vec![USER.to_string(), FRIEND.to_string()]);
        assert_eq!(charge.total_price_in_cents, 1050);
        assert_eq!(charge.unlock_service_fee, 50);
        assert_eq!(charge.stripe_charge, intent_id);
        assert_eq!(charge.stripe_customer_id.as_deref(), Some(fx.customer.as_str()));
        assert_eq!(charge.chain, NETWORK);
        assert_eq!(fx.store.charges().await.len(), 1);
    }

    #[tokio::test]
    async fn two_recipient_checkout_at_ten_dollars() {
        let fx = fixture().await;
        fx.pricer
            .set(
                LOCK,
                PricingBreakdown::new()
                    .with(KEY_PRICE, 950)
                    .with(SERVICE_FEE, 50),
            )
            .await;

        let Ok(quote) = fx
            .service
            .create_or_reuse_intent(&intent_request(&fx.customer, &[USER, FRIEND], 10.00))
            .await
        else {
            panic!("intent creation failed");
        };
        assert_eq!(quote.total_price_in_cents, 1000);

        let Ok(intent) = fx
            .processor
            .retrieve_payment_intent(&quote.payment_intent_id, ACCOUNT)
            .await
        else {
            panic!("intent missing");
        };
        assert_eq!(intent.amount, 1000);
        assert_eq!(intent.application_fee_amount, Some(50));

        let Ok(()) = fx
            .processor
            .set_intent_status(ACCOUNT, &quote.payment_intent_id, IntentStatus::RequiresCapture)
            .await
        else {
            panic!("status change failed");
        };
        let Ok(outcome) = fx
            .service
            .capture_and_record_charge(&capture_request(&quote.payment_intent_id, &[USER, FRIEND]))
            .await
        else {
            panic!("capture failed");
        };
        assert_eq!(outcome.charge.total_price_in_cents, 1000);
        assert_eq!(outcome.charge.unlock_service_fee, 50);
    }

    #[tokio::test]
    async fn repeated_capture_keeps_one_charge() {
        let fx = fixture().await;
        let intent_id = authorized_intent(&fx, &[USER]).await;
        let req = capture_request(&intent_id, &[USER]);

        let Ok(first) = fx.service.capture_and_record_charge(&req).await else {
            panic!("capture failed");
        };
        let Ok(second) = fx.service.capture_and_record_charge(&req).await else {
            panic!("repeated capture failed");
        };
        assert_eq!(second.charge, first.charge);
        assert_eq!(fx.store.charges().await.len(), 1);
    }

    #[tokio::test]
    async fn recurring_tag_is_parsed_or_recorded_as_zero() {
        let fx = fixture().await;
        tagged_authorized_intent(&fx, "pi_renewing", "3").await;
        tagged_authorized_intent(&fx, "pi_garbled", "monthly").await;

        let Ok(renewing) = fx
            .service
            .capture_and_record_charge(&capture_request("pi_renewing", &[USER]))
            .await
        else {
            panic!("capture failed");
        };
        assert_eq!(renewing.charge.recurring, 3);

        let Ok(garbled) = fx
            .service
            .capture_and_record_charge(&capture_request("pi_garbled", &[USER]))
            .await
        else {
            panic!("capture with an unparseable tag failed");
        };
        assert_eq!(garbled.charge.recurring, 0);
    }

    #[tokio::test]
    async fn capture_unknown_intent_is_not_found() {
        let fx = fixture().await;
        let result = fx
            .service
            .capture_and_record_charge(&capture_request("pi_unknown", &[USER]))
            .await;
        assert!(matches!(result, Err(GatewayError::IntentNotFound(_))));
    }

    #[tokio::test]
    async fn capture_requires_authorization() {
        let fx = fixture().await;
        let Ok(quote) = fx
            .service
            .create_or_reuse_intent(&intent_request(&fx.customer, &[USER], 10.50))
            .await
        else {
            panic!("intent creation failed");
        };

        let result = fx
            .service
            .capture_and_record_charge(&capture_request(&quote.payment_intent_id, &[USER]))
            .await;
        let Err(GatewayError::NotCaptureReady { status }) = result else {
            panic!("expected NotCaptureReady");
        };
        assert_eq!(status, "requires_confirmation");
        assert!(fx.store.charges().await.is_empty());
    }

    #[tokio::test]
    async fn capture_rejects_missing_recipient() {
        let fx = fixture().await;
        let intent_id = authorized_intent(&fx, &[USER, FRIEND]).await;

        let result = fx
            .service
            .capture_and_record_charge(&capture_request(&intent_id, &[USER]))
            .await;
        let Err(GatewayError::IntentMismatch(field)) = result else {
            panic!("expected IntentMismatch");
        };
        assert_eq!(field, "Recipient");
        assert!(fx.store.charges().await.is_empty());
    }

    #[tokio::test]
    async fn capture_rejects_other_lock_and_purchaser() {
        let fx = fixture().await;
        fx.pricer
            .set(OTHER_LOCK, PricingBreakdown::new().with(KEY_PRICE, 1050))
            .await;
        let intent_id = authorized_intent(&fx, &[USER]).await;

        let mut other_lock = capture_request(&intent_id, &[USER]);
        other_lock.lock_address = OTHER_LOCK.to_string();
        let Err(GatewayError::IntentMismatch(field)) =
            fx.service.capture_and_record_charge(&other_lock).await
        else {
            panic!("expected lock mismatch");
        };
        assert_eq!(field, "Lock");

        let mut other_user = capture_request(&intent_id, &[USER]);
        other_user.user_address = FRIEND.to_string();
        let Err(GatewayError::IntentMismatch(field)) =
            fx.service.capture_and_record_charge(&other_user).await
        else {
            panic!("expected purchaser mismatch");
        };
        assert_eq!(field, "User Address");

        let mut other_network = capture_request(&intent_id, &[USER]);
        other_network.network = 1;
        let Err(GatewayError::IntentMismatch(field)) =
            fx.service.capture_and_record_charge(&other_network).await
        else {
            panic!("expected network mismatch");
        };
        assert_eq!(field, "Network");
    }

    #[tokio::test]
    async fn capture_rejects_price_moved_since_authorization() {
        let fx = fixture().await;
        let intent_id = authorized_intent(&fx, &[USER]).await;
        fx.pricer
            .set(
                LOCK,
                PricingBreakdown::new()
                    .with(KEY_PRICE, 1200)
                    .with(SERVICE_FEE, 50),
            )
            .await;

        let result = fx
            .service
            .capture_and_record_charge(&capture_request(&intent_id, &[USER]))
            .await;
        assert!(matches!(result, Err(GatewayError::PriceDiverged { .. })));
        assert!(fx.store.charges().await.is_empty());
    }

    #[tokio::test]
    async fn settle_captures_authorized_intent() {
        let fx = fixture().await;
        let intent_id = authorized_intent(&fx, &[USER]).await;

        let Ok(captured) = fx.service.settle_payment(&intent_id).await else {
            panic!("settle failed");
        };
        assert_eq!(captured.status, IntentStatus::Succeeded);

        let again = fx.service.settle_payment(&intent_id).await;
        assert!(matches!(again, Err(GatewayError::NotCaptureReady { .. })));
        assert!(matches!(
            fx.service.settle_payment("pi_unknown").await,
            Err(GatewayError::IntentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn setup_intent_links_customer_once() {
        let fx = fixture().await;

        let Ok(first) = fx.service.create_setup_intent(FRIEND).await else {
            panic!("setup failed");
        };
        let Ok(second) = fx.service.create_setup_intent(&FRIEND.to_lowercase()).await else {
            panic!("setup failed");
        };
        assert_eq!(first.customer_id, second.customer_id);
        assert_ne!(first.client_secret, second.client_secret);
        // USER was seeded, FRIEND created on first use.
        assert_eq!(fx.processor.customer_count(None).await, 2);
        assert_eq!(fx.processor.setup_intents().await, 2);
    }

    #[tokio::test]
    async fn setup_intent_adopts_existing_processor_customer() {
        let fx = fixture().await;
        let Ok(outcome) = fx.service.create_setup_intent(USER).await else {
            panic!("setup failed");
        };
        assert_eq!(outcome.customer_id, fx.customer);
        assert_eq!(fx.processor.customer_count(None).await, 1);
    }

    #[tokio::test]
    async fn list_card_methods_follows_customer_link() {
        let fx = fixture().await;
        let Ok(before) = fx.service.list_card_methods(USER).await else {
            panic!("listing failed");
        };
        assert!(before.is_empty());

        let _ = fx.service.create_setup_intent(USER).await;
        let Ok(after) = fx.service.list_card_methods(USER).await else {
            panic!("listing failed");
        };
        assert_eq!(after.len(), 1);
    }
}
