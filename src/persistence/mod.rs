//! Persistence layer: metadata, payment intent, charge, and customer
//! records.
//!
//! Each record family has its own trait so services depend only on what
//! they use. [`PostgresPersistence`] implements all of them on top of
//! `sqlx::PgPool`; [`InMemoryPersistence`] does the same with in-process
//! maps.

pub mod memory;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    ChargeRecord, MetadataDocument, NewCharge, NewPaymentIntent, PaymentIntentRecord,
    UserTokenMetadata,
};
use crate::error::GatewayError;

pub use memory::InMemoryPersistence;
pub use postgres::PostgresPersistence;

/// Storage for [`UserTokenMetadata`].
#[async_trait]
pub trait MetadataStore: Send + Sync + fmt::Debug {
    /// Inserts or replaces the document for `(token_address,
    /// user_address)`. The `chain` of an existing row is kept.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn upsert_metadata(
        &self,
        chain: i64,
        token_address: &str,
        user_address: &str,
        data: &MetadataDocument,
    ) -> Result<UserTokenMetadata, GatewayError>;

    /// Loads the record for `(token_address, user_address)`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn find_metadata(
        &self,
        token_address: &str,
        user_address: &str,
    ) -> Result<Option<UserTokenMetadata>, GatewayError>;
}

/// Storage for [`PaymentIntentRecord`]s.
#[async_trait]
pub trait IntentStore: Send + Sync + fmt::Debug {
    /// Persists a new intent record.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn insert_intent(
        &self,
        intent: &NewPaymentIntent,
    ) -> Result<PaymentIntentRecord, GatewayError>;

    /// Returns the newest intent for the purchase key created at or after
    /// `since`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn find_recent_intent(
        &self,
        user_address: &str,
        lock_address: &str,
        chain: i64,
        connected_stripe_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<PaymentIntentRecord>, GatewayError>;

    /// Loads an intent record by processor intent id.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn find_intent(
        &self,
        intent_id: &str,
    ) -> Result<Option<PaymentIntentRecord>, GatewayError>;
}

/// Append-only storage for [`ChargeRecord`]s, at most one per processor
/// intent.
#[async_trait]
pub trait ChargeStore: Send + Sync + fmt::Debug {
    /// Persists a charge receipt. If a charge with the same
    /// `stripe_charge` exists, it is returned unchanged and nothing is
    /// written.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn insert_charge(&self, charge: &NewCharge) -> Result<ChargeRecord, GatewayError>;
}

/// Mapping from purchaser address to platform-level processor customer.
#[async_trait]
pub trait CustomerStore: Send + Sync + fmt::Debug {
    /// Returns the linked customer id, if any.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn find_customer_id(&self, user_address: &str) -> Result<Option<String>, GatewayError>;

    /// Links (or relinks) a customer id to a purchaser.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn save_customer_id(
        &self,
        user_address: &str,
        customer_id: &str,
    ) -> Result<(), GatewayError>;
}
