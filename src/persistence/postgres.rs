//! PostgreSQL implementation of the persistence layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{ChargeStore, CustomerStore, IntentStore, MetadataStore};
use crate::domain::{
    ChargeRecord, MetadataDocument, NewCharge, NewPaymentIntent, PaymentIntentRecord,
    UserTokenMetadata,
};
use crate::error::GatewayError;

type MetadataRow = (
    i64,
    String,
    String,
    serde_json::Value,
    DateTime<Utc>,
    DateTime<Utc>,
);

type IntentRow = (
    i64,
    String,
    String,
    String,
    i64,
    Vec<String>,
    String,
    String,
    String,
    DateTime<Utc>,
);

type ChargeRow = (
    i64,
    String,
    Vec<String>,
    String,
    Option<String>,
    Option<String>,
    i64,
    i64,
    String,
    i32,
    i64,
    DateTime<Utc>,
);

const INTENT_COLUMNS: &str = "id, intent_id, user_address, lock_address, chain, recipients, \
     stripe_customer_id, connected_stripe_id, connected_customer_id, created_at";

const CHARGE_COLUMNS: &str = "id, user_address, recipients, lock_address, stripe_customer_id, \
     connected_customer, total_price_in_cents, unlock_service_fee, stripe_charge, recurring, \
     chain, created_at";

/// PostgreSQL-backed persistence layer using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Creates a new persistence layer with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), GatewayError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))
    }
}

fn db_err(e: sqlx::Error) -> GatewayError {
    GatewayError::PersistenceError(e.to_string())
}

fn metadata_from_row(
    (chain, token_address, user_address, data, created_at, updated_at): MetadataRow,
) -> Result<UserTokenMetadata, GatewayError> {
    let data: MetadataDocument = serde_json::from_value(data)
        .map_err(|e| GatewayError::PersistenceError(format!("corrupt metadata document: {e}")))?;
    Ok(UserTokenMetadata {
        chain,
        token_address,
        user_address,
        data,
        created_at,
        updated_at,
    })
}

fn charge_from_row(
    (
        id,
        user_address,
        recipients,
        lock,
        stripe_customer_id,
        connected_customer,
        total_price_in_cents,
        unlock_service_fee,
        stripe_charge,
        recurring,
        chain,
        created_at,
    ): ChargeRow,
) -> ChargeRecord {
    ChargeRecord {
        id,
        user_address,
        recipients,
        lock,
        stripe_customer_id,
        connected_customer,
        total_price_in_cents,
        unlock_service_fee,
        stripe_charge,
        recurring,
        chain,
        created_at,
    }
}

fn intent_from_row(
    (
        id,
        intent_id,
        user_address,
        lock_address,
        chain,
        recipients,
        stripe_customer_id,
        connected_stripe_id,
        connected_customer_id,
        created_at,
    ): IntentRow,
) -> PaymentIntentRecord {
    PaymentIntentRecord {
        id,
        intent_id,
        user_address,
        lock_address,
        chain,
        recipients,
        stripe_customer_id,
        connected_stripe_id,
        connected_customer_id,
        created_at,
    }
}

#[async_trait]
impl MetadataStore for PostgresPersistence {
    async fn upsert_metadata(
        &self,
        chain: i64,
        token_address: &str,
        user_address: &str,
        data: &MetadataDocument,
    ) -> Result<UserTokenMetadata, GatewayError> {
        let payload = serde_json::to_value(data)
            .map_err(|e| GatewayError::Internal(format!("metadata serialization: {e}")))?;

        let row = sqlx::query_as::<_, MetadataRow>(
            "INSERT INTO user_token_metadata (chain, token_address, user_address, data) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (token_address, user_address) \
             DO UPDATE SET data = EXCLUDED.data, updated_at = NOW() \
             RETURNING chain, token_address, user_address, data, created_at, updated_at",
        )
        .bind(chain)
        .bind(token_address)
        .bind(user_address)
        .bind(&payload)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        metadata_from_row(row)
    }

    async fn find_metadata(
        &self,
        token_address: &str,
        user_address: &str,
    ) -> Result<Option<UserTokenMetadata>, GatewayError> {
        let row = sqlx::query_as::<_, MetadataRow>(
            "SELECT chain, token_address, user_address, data, created_at, updated_at \
             FROM user_token_metadata WHERE token_address = $1 AND user_address = $2",
        )
        .bind(token_address)
        .bind(user_address)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(metadata_from_row).transpose()
    }
}

#[async_trait]
impl IntentStore for PostgresPersistence {
    async fn insert_intent(
        &self,
        intent: &NewPaymentIntent,
    ) -> Result<PaymentIntentRecord, GatewayError> {
        let row = sqlx::query_as::<_, IntentRow>(&format!(
            "INSERT INTO payment_intents \
             (intent_id, user_address, lock_address, chain, recipients, \
             stripe_customer_id, connected_stripe_id, connected_customer_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {INTENT_COLUMNS}"
        ))
        .bind(&intent.intent_id)
        .bind(&intent.user_address)
        .bind(&intent.lock_address)
        .bind(intent.chain)
        .bind(&intent.recipients)
        .bind(&intent.stripe_customer_id)
        .bind(&intent.connected_stripe_id)
        .bind(&intent.connected_customer_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(intent_from_row(row))
    }

    async fn find_recent_intent(
        &self,
        user_address: &str,
        lock_address: &str,
        chain: i64,
        connected_stripe_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<PaymentIntentRecord>, GatewayError> {
        let row = sqlx::query_as::<_, IntentRow>(&format!(
            "SELECT {INTENT_COLUMNS} FROM payment_intents \
             WHERE user_address = $1 AND lock_address = $2 AND chain = $3 \
             AND connected_stripe_id = $4 AND created_at >= $5 \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(user_address)
        .bind(lock_address)
        .bind(chain)
        .bind(connected_stripe_id)
        .bind(since)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(intent_from_row))
    }

    async fn find_intent(
        &self,
        intent_id: &str,
    ) -> Result<Option<PaymentIntentRecord>, GatewayError> {
        let row = sqlx::query_as::<_, IntentRow>(&format!(
            "SELECT {INTENT_COLUMNS} FROM payment_intents WHERE intent_id = $1"
        ))
        .bind(intent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(intent_from_row))
    }
}

#[async_trait]
impl ChargeStore for PostgresPersistence {
    async fn insert_charge(&self, charge: &NewCharge) -> Result<ChargeRecord, GatewayError> {
        let inserted = sqlx::query_as::<_, ChargeRow>(&format!(
            "INSERT INTO charges (user_address, recipients, lock_address, stripe_customer_id, \
             connected_customer, total_price_in_cents, unlock_service_fee, stripe_charge, \
             recurring, chain) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (stripe_charge) DO NOTHING \
             RETURNING {CHARGE_COLUMNS}"
        ))
        .bind(&charge.user_address)
        .bind(&charge.recipients)
        .bind(&charge.lock)
        .bind(&charge.stripe_customer_id)
        .bind(&charge.connected_customer)
        .bind(charge.total_price_in_cents)
        .bind(charge.unlock_service_fee)
        .bind(&charge.stripe_charge)
        .bind(charge.recurring)
        .bind(charge.chain)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        if let Some(row) = inserted {
            return Ok(charge_from_row(row));
        }

        tracing::warn!(stripe_charge = %charge.stripe_charge, "charge already recorded");
        let row = sqlx::query_as::<_, ChargeRow>(&format!(
            "SELECT {CHARGE_COLUMNS} FROM charges WHERE stripe_charge = $1"
        ))
        .bind(&charge.stripe_charge)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(charge_from_row(row))
    }
}

#[async_trait]
impl CustomerStore for PostgresPersistence {
    async fn find_customer_id(&self, user_address: &str) -> Result<Option<String>, GatewayError> {
        sqlx::query_scalar::<_, String>(
            "SELECT stripe_customer_id FROM stripe_customers WHERE user_address = $1",
        )
        .bind(user_address)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn save_customer_id(
        &self,
        user_address: &str,
        customer_id: &str,
    ) -> Result<(), GatewayError> {
        sqlx::query(
            "INSERT INTO stripe_customers (user_address, stripe_customer_id) VALUES ($1, $2) \
             ON CONFLICT (user_address) \
             DO UPDATE SET stripe_customer_id = EXCLUDED.stripe_customer_id",
        )
        .bind(user_address)
        .bind(customer_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}
