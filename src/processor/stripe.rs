//! Stripe REST client.
//!
//! Uses form-encoded requests with bearer authentication. Calls scoped to
//! a connected account carry the `Stripe-Account` header.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{
    CreateIntentParams, Customer, PaymentMethod, PaymentProcessor, ProcessorIntent, SetupIntent,
    USER_ADDRESS_METADATA,
};
use crate::error::GatewayError;

/// Default API endpoint.
pub const STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Pinned API version the response shapes are written against.
const STRIPE_VERSION: &str = "2020-08-27";

/// Handle to the Stripe API. Cheap to clone.
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct List<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

impl StripeClient {
    /// Creates a client for `base_url` (normally [`STRIPE_API_BASE`]).
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: &str, secret_key: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        account: Option<&str>,
    ) -> Result<T, GatewayError> {
        let mut request = request
            .bearer_auth(&self.secret_key)
            .header("Stripe-Version", STRIPE_VERSION);
        if let Some(account) = account {
            request = request.header("Stripe-Account", account);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Processor(e.to_string()))?;
        let status = response.status();

        if !status.is_success() {
            let message = match response.json::<ErrorEnvelope>().await {
                Ok(envelope) => {
                    let err = envelope.error;
                    let text = err.message.unwrap_or_else(|| status.to_string());
                    match (err.kind, err.code) {
                        (Some(kind), Some(code)) => format!("{kind}/{code}: {text}"),
                        (Some(kind), None) => format!("{kind}: {text}"),
                        _ => text,
                    }
                }
                Err(_) => status.to_string(),
            };
            tracing::warn!(%status, %message, "stripe request failed");
            return Err(GatewayError::Processor(message));
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::Processor(format!("unexpected response: {e}")))
    }
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    async fn list_card_payment_methods(
        &self,
        customer: &str,
    ) -> Result<Vec<PaymentMethod>, GatewayError> {
        let request = self
            .http
            .get(self.url("payment_methods"))
            .query(&[("customer", customer), ("type", "card")]);
        let list: List<PaymentMethod> = self.send(request, None).await?;
        Ok(list.data)
    }

    async fn clone_payment_method(
        &self,
        payment_method: &str,
        customer: &str,
        account: &str,
    ) -> Result<PaymentMethod, GatewayError> {
        let request = self
            .http
            .post(self.url("payment_methods"))
            .form(&[("payment_method", payment_method), ("customer", customer)]);
        self.send(request, Some(account)).await
    }

    async fn find_customer_by_user_address(
        &self,
        user_address: &str,
        account: Option<&str>,
    ) -> Result<Option<Customer>, GatewayError> {
        let query = format!("metadata[\"{USER_ADDRESS_METADATA}\"]:\"{user_address}\"");
        let request = self
            .http
            .get(self.url("customers/search"))
            .query(&[("query", query.as_str())]);
        let list: List<Customer> = self.send(request, account).await?;
        Ok(list.data.into_iter().next())
    }

    async fn create_customer(
        &self,
        user_address: &str,
        payment_method: Option<&str>,
        account: Option<&str>,
    ) -> Result<Customer, GatewayError> {
        let mut form = vec![(
            format!("metadata[{USER_ADDRESS_METADATA}]"),
            user_address.to_string(),
        )];
        if let Some(pm) = payment_method {
            form.push(("payment_method".to_string(), pm.to_string()));
        }
        let request = self.http.post(self.url("customers")).form(&form);
        self.send(request, account).await
    }

    async fn create_payment_intent(
        &self,
        params: &CreateIntentParams,
        account: &str,
    ) -> Result<ProcessorIntent, GatewayError> {
        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), params.amount.to_string()),
            ("currency".to_string(), params.currency.clone()),
            ("customer".to_string(), params.customer.clone()),
            ("payment_method".to_string(), params.payment_method.clone()),
            ("capture_method".to_string(), "manual".to_string()),
            (
                "application_fee_amount".to_string(),
                params.application_fee_amount.to_string(),
            ),
        ];
        form.extend(
            params
                .metadata
                .iter()
                .map(|(k, v)| (format!("metadata[{k}]"), v.clone())),
        );
        let request = self.http.post(self.url("payment_intents")).form(&form);
        self.send(request, Some(account)).await
    }

    async fn retrieve_payment_intent(
        &self,
        intent_id: &str,
        account: &str,
    ) -> Result<ProcessorIntent, GatewayError> {
        let request = self
            .http
            .get(self.url(&format!("payment_intents/{intent_id}")));
        self.send(request, Some(account)).await
    }

    async fn capture_payment_intent(
        &self,
        intent_id: &str,
        account: &str,
    ) -> Result<ProcessorIntent, GatewayError> {
        let request = self
            .http
            .post(self.url(&format!("payment_intents/{intent_id}/capture")))
            .form(&HashMap::<String, String>::new());
        self.send(request, Some(account)).await
    }

    async fn create_setup_intent(&self, customer: &str) -> Result<SetupIntent, GatewayError> {
        let request = self.http.post(self.url("setup_intents")).form(&[
            ("customer", customer),
            ("payment_method_types[]", "card"),
            ("payment_method_types[]", "link"),
        ]);
        self.send(request, None).await
    }
}
