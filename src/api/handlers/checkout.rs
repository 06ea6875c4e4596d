//! Card purchase endpoint handlers.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    CaptureChargeRequest, CaptureResponse, CreateIntentRequest, IntentResponse,
    PaymentMethodsResponse, SettleResponse, SetupIntentResponse,
};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};

/// `POST /purchase/intent` — Create or reuse a payment intent.
///
/// # Errors
///
/// Returns [`GatewayError`] on invalid input, price divergence, a missing
/// card, or processor failure.
#[utoipa::path(
    post,
    path = "/api/v1/purchase/intent",
    tag = "Purchase",
    summary = "Create a payment intent",
    description = "Prices the purchase, checks it against `max_price` (3% tolerance) and returns an intent in the lock manager's connected account. A matching intent from the last 10 minutes is reused.",
    request_body = CreateIntentRequest,
    responses(
        (status = 200, description = "Intent ready for confirmation", body = IntentResponse),
        (status = 400, description = "Invalid request or price diverged", body = ErrorResponse),
        (status = 422, description = "No saved card", body = ErrorResponse),
        (status = 502, description = "Processor or price source failure", body = ErrorResponse),
    )
)]
pub async fn create_intent(
    State(state): State<AppState>,
    Json(req): Json<CreateIntentRequest>,
) -> Result<Json<IntentResponse>, GatewayError> {
    let quote = state
        .checkout_service
        .create_or_reuse_intent(&req.into())
        .await?;
    Ok(Json(quote.into()))
}

/// `POST /purchase/capture` — Validate an authorized intent and record the
/// charge.
///
/// # Errors
///
/// Returns [`GatewayError`] if the intent is unknown, not authorized, or
/// does not match the purchase.
#[utoipa::path(
    post,
    path = "/api/v1/purchase/capture",
    tag = "Purchase",
    summary = "Record an authorized charge",
    description = "Checks that the authorized intent matches lock, purchaser, network, recipients and a fresh price, then stores the charge.",
    request_body = CaptureChargeRequest,
    responses(
        (status = 200, description = "Charge recorded", body = CaptureResponse),
        (status = 400, description = "Intent does not match the purchase", body = ErrorResponse),
        (status = 404, description = "Unknown intent", body = ErrorResponse),
        (status = 409, description = "Intent not authorized", body = ErrorResponse),
    )
)]
pub async fn capture_charge(
    State(state): State<AppState>,
    Json(req): Json<CaptureChargeRequest>,
) -> Result<Json<CaptureResponse>, GatewayError> {
    let outcome = state
        .checkout_service
        .capture_and_record_charge(&req.into())
        .await?;
    Ok(Json(outcome.into()))
}

/// `POST /purchase/settle/{payment_intent_id}` — Capture the held funds.
///
/// # Errors
///
/// Returns [`GatewayError`] if the intent is unknown or not authorized.
#[utoipa::path(
    post,
    path = "/api/v1/purchase/settle/{payment_intent_id}",
    tag = "Purchase",
    summary = "Capture an authorized intent",
    description = "Captures the funds once the keys have been granted on-chain.",
    params(
        ("payment_intent_id" = String, Path, description = "Processor intent id"),
    ),
    responses(
        (status = 200, description = "Funds captured", body = SettleResponse),
        (status = 404, description = "Unknown intent", body = ErrorResponse),
        (status = 409, description = "Intent not authorized", body = ErrorResponse),
    )
)]
pub async fn settle_payment(
    State(state): State<AppState>,
    Path(payment_intent_id): Path<String>,
) -> Result<Json<SettleResponse>, GatewayError> {
    let intent = state
        .checkout_service
        .settle_payment(&payment_intent_id)
        .await?;
    Ok(Json(intent.into()))
}

/// `POST /purchase/setup/{user_address}` — Start saving a card.
///
/// # Errors
///
/// Returns [`GatewayError`] on a malformed address or processor failure.
#[utoipa::path(
    post,
    path = "/api/v1/purchase/setup/{user_address}",
    tag = "Purchase",
    summary = "Create a setup intent",
    description = "Links a platform customer to the address on first use and returns a setup intent secret for saving a card.",
    params(
        ("user_address" = String, Path, description = "Purchaser address"),
    ),
    responses(
        (status = 200, description = "Setup intent created", body = SetupIntentResponse),
        (status = 400, description = "Invalid address", body = ErrorResponse),
    )
)]
pub async fn create_setup_intent(
    State(state): State<AppState>,
    Path(user_address): Path<String>,
) -> Result<Json<SetupIntentResponse>, GatewayError> {
    let outcome = state
        .checkout_service
        .create_setup_intent(&user_address)
        .await?;
    Ok(Json(outcome.into()))
}

/// `GET /purchase/methods/{user_address}` — List saved cards.
///
/// # Errors
///
/// Returns [`GatewayError`] on a malformed address or processor failure.
#[utoipa::path(
    get,
    path = "/api/v1/purchase/methods/{user_address}",
    tag = "Purchase",
    summary = "List saved cards",
    params(
        ("user_address" = String, Path, description = "Purchaser address"),
    ),
    responses(
        (status = 200, description = "Saved cards", body = PaymentMethodsResponse),
        (status = 400, description = "Invalid address", body = ErrorResponse),
    )
)]
pub async fn list_payment_methods(
    State(state): State<AppState>,
    Path(user_address): Path<String>,
) -> Result<Json<PaymentMethodsResponse>, GatewayError> {
    let methods = state
        .checkout_service
        .list_card_methods(&user_address)
        .await?;
    Ok(Json(PaymentMethodsResponse { methods }))
}

/// Purchase routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/purchase/intent", post(create_intent))
        .route("/purchase/capture", post(capture_charge))
        .route("/purchase/settle/{payment_intent_id}", post(settle_payment))
        .route("/purchase/setup/{user_address}", post(create_setup_intent))
        .route("/purchase/methods/{user_address}", get(list_payment_methods))
}
