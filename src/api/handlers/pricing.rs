//! Pricing endpoint handler.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{PricingQuery, PricingResponse};
use crate::app_state::AppState;
use crate::domain::normalize_address;
use crate::error::{ErrorResponse, GatewayError};

/// Upper bound on keys priced in one request.
const MAX_RECIPIENTS: usize = 100;

/// `GET /pricing/{network}/{lock}` — Price a purchase.
///
/// # Errors
///
/// Returns [`GatewayError`] on a malformed lock, an out-of-range recipient
/// count, or when the price sources fail.
#[utoipa::path(
    get,
    path = "/api/v1/pricing/{network}/{lock}",
    tag = "Pricing",
    summary = "Price a card purchase",
    description = "Returns the fee breakdown, in cents, for buying keys for the given number of recipients.",
    params(
        ("network" = i64, Path, description = "Network id"),
        ("lock" = String, Path, description = "Lock address"),
        PricingQuery,
    ),
    responses(
        (status = 200, description = "Price breakdown", body = PricingResponse),
        (status = 400, description = "Invalid lock or recipient count", body = ErrorResponse),
        (status = 502, description = "Price source unavailable", body = ErrorResponse),
    )
)]
pub async fn get_pricing(
    State(state): State<AppState>,
    Path((network, lock)): Path<(i64, String)>,
    Query(query): Query<PricingQuery>,
) -> Result<Json<PricingResponse>, GatewayError> {
    let lock = normalize_address(&lock)?;
    if query.recipients == 0 || query.recipients > MAX_RECIPIENTS {
        return Err(GatewayError::InvalidRequest(format!(
            "recipients must be between 1 and {MAX_RECIPIENTS}"
        )));
    }

    let pricing = state
        .pricer
        .generate(&lock, network, query.recipients)
        .await?;

    Ok(Json(PricingResponse {
        lock,
        network,
        recipients: query.recipients,
        total_price_in_cents: pricing.total(),
        pricing,
    }))
}

/// Pricing routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/pricing/{network}/{lock}", get(get_pricing))
}
