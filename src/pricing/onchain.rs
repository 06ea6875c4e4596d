//! [`PriceSource`] reading lock state through per-network JSON-RPC
//! providers and USD rates from a spot-price API.

use std::collections::HashMap;

use alloy::primitives::Address;
use alloy::providers::RootProvider;
use alloy::rpc::client::RpcClient;
use async_trait::async_trait;
use serde::Deserialize;

use super::{KeyPrice, PriceSource};
use crate::error::GatewayError;

use self::bindings::{IERC20Meta, IPublicLock};

const NATIVE_DECIMALS: u8 = 18;

mod bindings {
    alloy::sol! {
        #[derive(Debug)]
        #[sol(rpc)]
        interface IPublicLock {
            function keyPrice() external view returns (uint256);
            function tokenAddress() external view returns (address);
        }

        #[derive(Debug)]
        #[sol(rpc)]
        interface IERC20Meta {
            function decimals() external view returns (uint8);
            function symbol() external view returns (string);
        }
    }
}

/// Live price source.
#[derive(Debug, Clone)]
pub struct RpcPriceSource {
    http: reqwest::Client,
    providers: HashMap<i64, RootProvider>,
    native_currencies: HashMap<i64, String>,
    price_api_base: String,
}

#[derive(Debug, Deserialize)]
struct SpotPriceResponse {
    data: SpotPrice,
}

#[derive(Debug, Deserialize)]
struct SpotPrice {
    amount: String,
}

impl RpcPriceSource {
    /// Creates a source with one provider per configured network. The
    /// providers share `http` with the spot-price client.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if a provider URL does not
    /// parse.
    pub fn new(
        http: reqwest::Client,
        provider_urls: &HashMap<i64, String>,
        native_currencies: HashMap<i64, String>,
        price_api_base: &str,
    ) -> Result<Self, GatewayError> {
        let mut providers = HashMap::with_capacity(provider_urls.len());
        for (network, raw) in provider_urls {
            let url: reqwest::Url = raw.parse().map_err(|e| {
                GatewayError::InvalidRequest(format!("invalid RPC url for network {network}: {e}"))
            })?;
            let client = RpcClient::builder().http_with_client(http.clone(), url);
            providers.insert(*network, RootProvider::new(client));
        }

        Ok(Self {
            http,
            providers,
            native_currencies,
            price_api_base: price_api_base.trim_end_matches('/').to_string(),
        })
    }

    fn provider(&self, network: i64) -> Result<&RootProvider, GatewayError> {
        self.providers.get(&network).ok_or_else(|| {
            GatewayError::UpstreamPricing(format!(
                "no RPC provider configured for network {network}"
            ))
        })
    }

    /// Decimals and symbol of the currency keys are priced in.
    async fn currency(
        &self,
        provider: &RootProvider,
        network: i64,
        token: Address,
    ) -> Result<(u8, String), GatewayError> {
        if token == Address::ZERO {
            let symbol = self
                .native_currencies
                .get(&network)
                .cloned()
                .unwrap_or_else(|| "ETH".to_string());
            return Ok((NATIVE_DECIMALS, symbol));
        }

        let erc20 = IERC20Meta::new(token, provider.clone());
        let decimals = erc20
            .decimals()
            .call()
            .await
            .map_err(|e| upstream(&format!("decimals() on {token}"), &e))?;
        let symbol = erc20
            .symbol()
            .call()
            .await
            .map_err(|e| upstream(&format!("symbol() on {token}"), &e))?;
        if symbol.is_empty() {
            return Err(GatewayError::UpstreamPricing(format!(
                "token {token} reports an empty symbol"
            )));
        }
        Ok((decimals, symbol))
    }
}

fn upstream(call: &str, err: &alloy::contract::Error) -> GatewayError {
    GatewayError::UpstreamPricing(format!("{call}: {err}"))
}

#[async_trait]
impl PriceSource for RpcPriceSource {
    async fn key_price(&self, lock: &str, network: i64) -> Result<KeyPrice, GatewayError> {
        let lock_address: Address = lock
            .parse()
            .map_err(|_| GatewayError::InvalidAddress(lock.to_string()))?;
        let provider = self.provider(network)?;

        let contract = IPublicLock::new(lock_address, provider.clone());
        let price = contract
            .keyPrice()
            .call()
            .await
            .map_err(|e| upstream(&format!("keyPrice() on {lock}"), &e))?;
        let token = contract
            .tokenAddress()
            .call()
            .await
            .map_err(|e| upstream(&format!("tokenAddress() on {lock}"), &e))?;

        let (decimals, symbol) = self.currency(provider, network, token).await?;

        let units = u128::try_from(price)
            .map_err(|_| GatewayError::UpstreamPricing(format!("key price of {lock} overflows")))?;

        #[allow(clippy::cast_precision_loss)]
        let amount = units as f64 / 10f64.powi(i32::from(decimals));

        Ok(KeyPrice { amount, symbol })
    }

    async fn usd_rate(&self, symbol: &str) -> Result<f64, GatewayError> {
        let url = format!(
            "{}/v2/prices/{}-USD/spot",
            self.price_api_base,
            symbol.to_uppercase()
        );
        let response: SpotPriceResponse = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::UpstreamPricing(e.to_string()))?
            .error_for_status()
            .map_err(|e| GatewayError::UpstreamPricing(e.to_string()))?
            .json()
            .await
            .map_err(|e| GatewayError::UpstreamPricing(e.to_string()))?;

        response.data.amount.parse().map_err(|_| {
            GatewayError::UpstreamPricing(format!(
                "unparseable {symbol} rate: {}",
                response.data.amount
            ))
        })
    }
}
