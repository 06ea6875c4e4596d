//! In-memory implementation of the persistence layer.
//!
//! Used when `PERSISTENCE_ENABLED=false` and by the test suites. Row ids
//! are assigned from a shared counter, like a `BIGSERIAL`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{ChargeStore, CustomerStore, IntentStore, MetadataStore};
use crate::domain::{
    ChargeRecord, MetadataDocument, NewCharge, NewPaymentIntent, PaymentIntentRecord,
    UserTokenMetadata,
};
use crate::error::GatewayError;

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    metadata: HashMap<(String, String), UserTokenMetadata>,
    intents: Vec<PaymentIntentRecord>,
    charges: Vec<ChargeRecord>,
    customers: HashMap<String, String>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store implementing every persistence trait.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    tables: RwLock<Tables>,
}

impl InMemoryPersistence {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an intent record with an explicit creation time.
    pub async fn insert_intent_at(
        &self,
        intent: &NewPaymentIntent,
        created_at: DateTime<Utc>,
    ) -> PaymentIntentRecord {
        let mut tables = self.tables.write().await;
        let record = PaymentIntentRecord {
            id: tables.next_id(),
            intent_id: intent.intent_id.clone(),
            user_address: intent.user_address.clone(),
            lock_address: intent.lock_address.clone(),
            chain: intent.chain,
            recipients: intent.recipients.clone(),
            stripe_customer_id: intent.stripe_customer_id.clone(),
            connected_stripe_id: intent.connected_stripe_id.clone(),
            connected_customer_id: intent.connected_customer_id.clone(),
            created_at,
        };
        tables.intents.push(record.clone());
        record
    }

    /// All stored intent records, oldest first.
    pub async fn intents(&self) -> Vec<PaymentIntentRecord> {
        self.tables.read().await.intents.clone()
    }

    /// All stored charges, oldest first.
    pub async fn charges(&self) -> Vec<ChargeRecord> {
        self.tables.read().await.charges.clone()
    }
}

#[async_trait]
impl MetadataStore for InMemoryPersistence {
    async fn upsert_metadata(
        &self,
        chain: i64,
        token_address: &str,
        user_address: &str,
        data: &MetadataDocument,
    ) -> Result<UserTokenMetadata, GatewayError> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        let record = tables
            .metadata
            .entry((token_address.to_string(), user_address.to_string()))
            .and_modify(|existing| {
                existing.data = data.clone();
                existing.updated_at = now;
            })
            .or_insert_with(|| UserTokenMetadata {
                chain,
                token_address: token_address.to_string(),
                user_address: user_address.to_string(),
                data: data.clone(),
                created_at: now,
                updated_at: now,
            });
        Ok(record.clone())
    }

    async fn find_metadata(
        &self,
        token_address: &str,
        user_address: &str,
    ) -> Result<Option<UserTokenMetadata>, GatewayError> {
        Ok(self
            .tables
            .read()
            .await
            .metadata
            .get(&(token_address.to_string(), user_address.to_string()))
            .cloned())
    }
}

#[async_trait]
impl IntentStore for InMemoryPersistence {
    async fn insert_intent(
        &self,
        intent: &NewPaymentIntent,
    ) -> Result<PaymentIntentRecord, GatewayError> {
        if self.find_intent(&intent.intent_id).await?.is_some() {
            return Err(GatewayError::PersistenceError(format!(
                "duplicate intent id {}",
                intent.intent_id
            )));
        }
        Ok(self.insert_intent_at(intent, Utc::now()).await)
    }

    async fn find_recent_intent(
        &self,
        user_address: &str,
        lock_address: &str,
        chain: i64,
        connected_stripe_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<PaymentIntentRecord>, GatewayError> {
        Ok(self
            .tables
            .read()
            .await
            .intents
            .iter()
            .filter(|r| {
                r.user_address == user_address
                    && r.lock_address == lock_address
                    && r.chain == chain
                    && r.connected_stripe_id == connected_stripe_id
                    && r.created_at >= since
            })
            .max_by_key(|r| (r.created_at, r.id))
            .cloned())
    }

    async fn find_intent(
        &self,
        intent_id: &str,
    ) -> Result<Option<PaymentIntentRecord>, GatewayError> {
        Ok(self
            .tables
            .read()
            .await
            .intents
            .iter()
            .find(|r| r.intent_id == intent_id)
            .cloned())
    }
}

#[async_trait]
impl ChargeStore for InMemoryPersistence {
    async fn insert_charge(&self, charge: &NewCharge) -> Result<ChargeRecord, GatewayError> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .charges
            .iter()
            .find(|c| c.stripe_charge == charge.stripe_charge)
        {
            tracing::warn!(stripe_charge = %charge.stripe_charge, "charge already recorded");
            return Ok(existing.clone());
        }
        let record = ChargeRecord {
            id: tables.next_id(),
            user_address: charge.user_address.clone(),
            recipients: charge.recipients.clone(),
            lock: charge.lock.clone(),
            stripe_customer_id: charge.stripe_customer_id.clone(),
            connected_customer: charge.connected_customer.clone(),
            total_price_in_cents: charge.total_price_in_cents,
            unlock_service_fee: charge.unlock_service_fee,
            stripe_charge: charge.stripe_charge.clone(),
            recurring: charge.recurring,
            chain: charge.chain,
            created_at: Utc::now(),
        };
        tables.charges.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl CustomerStore for InMemoryPersistence {
    async fn find_customer_id(&self, user_address: &str) -> Result<Option<String>, GatewayError> {
        Ok(self.tables.read().await.customers.get(user_address).cloned())
    }

    async fn save_customer_id(
        &self,
        user_address: &str,
        customer_id: &str,
    ) -> Result<(), GatewayError> {
        self.tables
            .write()
            .await
            .customers
            .insert(user_address.to_string(), customer_id.to_string());
        Ok(())
    }
}
