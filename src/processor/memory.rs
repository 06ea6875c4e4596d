//! In-memory [`PaymentProcessor`] for tests and local development.
//!
//! Models just enough processor behavior for checkout: platform vs
//! connected-account scoping, customer search by `userAddress`, intents
//! created in `requires_confirmation`, and capture from
//! `requires_capture`.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{
    CardDetails, CreateIntentParams, Customer, IntentStatus, PaymentMethod, PaymentProcessor,
    ProcessorIntent, SetupIntent, USER_ADDRESS_METADATA,
};
use crate::error::GatewayError;

/// Account scope key: `None` is the platform account.
type Scope = Option<String>;

#[derive(Debug, Default)]
struct State {
    customers: Vec<(Scope, Customer)>,
    cards: HashMap<String, Vec<PaymentMethod>>,
    intents: HashMap<(String, String), ProcessorIntent>,
    cloned_methods: usize,
    created_intents: usize,
    setup_intents: usize,
}

/// Fake processor keeping all objects in memory.
#[derive(Debug, Default)]
pub struct InMemoryProcessor {
    state: Mutex<State>,
}

fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::new_v4().simple())
}

impl InMemoryProcessor {
    /// Creates an empty processor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a platform customer and returns its id.
    pub async fn add_customer(&self, user_address: &str) -> String {
        let customer = Customer {
            id: new_id("cus"),
            metadata: HashMap::from([(
                USER_ADDRESS_METADATA.to_string(),
                user_address.to_string(),
            )]),
        };
        let id = customer.id.clone();
        self.state.lock().await.customers.push((None, customer));
        id
    }

    /// Saves a test card on a platform customer and returns the method.
    pub async fn add_card(&self, customer: &str) -> PaymentMethod {
        let method = PaymentMethod {
            id: new_id("pm"),
            card: Some(CardDetails {
                brand: "visa".to_string(),
                last4: "4242".to_string(),
                exp_month: 12,
                exp_year: 2030,
            }),
        };
        self.state
            .lock()
            .await
            .cards
            .entry(customer.to_string())
            .or_default()
            .push(method.clone());
        method
    }

    /// Stores an intent directly, bypassing creation.
    pub async fn insert_intent(&self, account: &str, intent: ProcessorIntent) {
        self.state
            .lock()
            .await
            .intents
            .insert((account.to_string(), intent.id.clone()), intent);
    }

    /// Forces the status of an intent, as the front-end confirmation or an
    /// expiry would.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Processor`] if the intent does not exist.
    pub async fn set_intent_status(
        &self,
        account: &str,
        intent_id: &str,
        status: IntentStatus,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().await;
        let intent = state
            .intents
            .get_mut(&(account.to_string(), intent_id.to_string()))
            .ok_or_else(|| no_such_intent(intent_id))?;
        intent.status = status;
        Ok(())
    }

    /// Number of intents created through [`PaymentProcessor::create_payment_intent`].
    pub async fn created_intents(&self) -> usize {
        self.state.lock().await.created_intents
    }

    /// Number of payment methods cloned into connected accounts.
    pub async fn cloned_methods(&self) -> usize {
        self.state.lock().await.cloned_methods
    }

    /// Number of setup intents created.
    pub async fn setup_intents(&self) -> usize {
        self.state.lock().await.setup_intents
    }

    /// Number of customers in `account` (`None` for the platform).
    pub async fn customer_count(&self, account: Option<&str>) -> usize {
        self.state
            .lock()
            .await
            .customers
            .iter()
            .filter(|(scope, _)| scope.as_deref() == account)
            .count()
    }
}

fn no_such_intent(intent_id: &str) -> GatewayError {
    GatewayError::Processor(format!("No such payment_intent: '{intent_id}'"))
}

#[async_trait]
impl PaymentProcessor for InMemoryProcessor {
    async fn list_card_payment_methods(
        &self,
        customer: &str,
    ) -> Result<Vec<PaymentMethod>, GatewayError> {
        Ok(self
            .state
            .lock()
            .await
            .cards
            .get(customer)
            .cloned()
            .unwrap_or_default())
    }

    async fn clone_payment_method(
        &self,
        payment_method: &str,
        customer: &str,
        _account: &str,
    ) -> Result<PaymentMethod, GatewayError> {
        let mut state = self.state.lock().await;
        let source = state
            .cards
            .get(customer)
            .and_then(|methods| methods.iter().find(|m| m.id == payment_method))
            .cloned()
            .ok_or_else(|| {
                GatewayError::Processor(format!("No such PaymentMethod: '{payment_method}'"))
            })?;
        state.cloned_methods += 1;
        Ok(PaymentMethod {
            id: new_id("pm"),
            card: source.card,
        })
    }

    async fn find_customer_by_user_address(
        &self,
        user_address: &str,
        account: Option<&str>,
    ) -> Result<Option<Customer>, GatewayError> {
        let state = self.state.lock().await;
        Ok(state
            .customers
            .iter()
            .filter(|(scope, _)| scope.as_deref() == account)
            .map(|(_, c)| c)
            .find(|c| {
                c.metadata.get(USER_ADDRESS_METADATA).map(String::as_str) == Some(user_address)
            })
            .cloned())
    }

    async fn create_customer(
        &self,
        user_address: &str,
        _payment_method: Option<&str>,
        account: Option<&str>,
    ) -> Result<Customer, GatewayError> {
        let customer = Customer {
            id: new_id("cus"),
            metadata: HashMap::from([(
                USER_ADDRESS_METADATA.to_string(),
                user_address.to_string(),
            )]),
        };
        self.state
            .lock()
            .await
            .customers
            .push((account.map(str::to_string), customer.clone()));
        Ok(customer)
    }

    async fn create_payment_intent(
        &self,
        params: &CreateIntentParams,
        account: &str,
    ) -> Result<ProcessorIntent, GatewayError> {
        let id = new_id("pi");
        let intent = ProcessorIntent {
            client_secret: Some(format!("{id}_secret_{}", uuid::Uuid::new_v4().simple())),
            id,
            status: IntentStatus::RequiresConfirmation,
            amount: params.amount,
            application_fee_amount: Some(params.application_fee_amount),
            customer: Some(params.customer.clone()),
            metadata: params.metadata.clone().into_iter().collect(),
        };
        let mut state = self.state.lock().await;
        state.created_intents += 1;
        state
            .intents
            .insert((account.to_string(), intent.id.clone()), intent.clone());
        Ok(intent)
    }

    async fn retrieve_payment_intent(
        &self,
        intent_id: &str,
        account: &str,
    ) -> Result<ProcessorIntent, GatewayError> {
        self.state
            .lock()
            .await
            .intents
            .get(&(account.to_string(), intent_id.to_string()))
            .cloned()
            .ok_or_else(|| no_such_intent(intent_id))
    }

    async fn capture_payment_intent(
        &self,
        intent_id: &str,
        account: &str,
    ) -> Result<ProcessorIntent, GatewayError> {
        let mut state = self.state.lock().await;
        let intent = state
            .intents
            .get_mut(&(account.to_string(), intent_id.to_string()))
            .ok_or_else(|| no_such_intent(intent_id))?;
        if intent.status != IntentStatus::RequiresCapture {
            return Err(GatewayError::Processor(format!(
                "This PaymentIntent could not be captured because it has a status of {}.",
                intent.status
            )));
        }
        intent.status = IntentStatus::Succeeded;
        Ok(intent.clone())
    }

    async fn create_setup_intent(&self, _customer: &str) -> Result<SetupIntent, GatewayError> {
        let id = new_id("seti");
        self.state.lock().await.setup_intents += 1;
        Ok(SetupIntent {
            client_secret: Some(format!("{id}_secret_{}", uuid::Uuid::new_v4().simple())),
            id,
        })
    }
}
