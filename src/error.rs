//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1003,
///     "message": "price diverged by more than 3%: computed 1100 cents, expected 1000 cents",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                          |
/// |-----------|-----------------|--------------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request                      |
/// | 2000–2999 | State/Not Found | 404 Not Found / 409 Conflict / 422   |
/// | 3000–3999 | Server          | 500 Internal Server Error            |
/// | 5000–5999 | Upstream        | 502 Bad Gateway                      |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Input is not a syntactically valid EVM address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Computed price moved more than the allowed tolerance away from the
    /// price the purchaser agreed to.
    #[error(
        "price diverged by more than 3%: computed {computed_cents} cents, expected {expected_cents} cents"
    )]
    PriceDiverged {
        /// Freshly computed total.
        computed_cents: u64,
        /// Amount the purchaser agreed to (or the processor authorized).
        expected_cents: u64,
    },

    /// Processor-side intent was authorized for different parties.
    #[error("{0} does not match with initial intent")]
    IntentMismatch(String),

    /// No metadata stored for the requested token/user pair.
    #[error("metadata not found")]
    MetadataNotFound,

    /// No local record exists for the processor intent id.
    #[error("could not find payment intent {0}")]
    IntentNotFound(String),

    /// Processor intent is not in the `requires_capture` state.
    #[error("payment could not be captured (status: {status}), please refresh and try again")]
    NotCaptureReady {
        /// Live status reported by the processor.
        status: String,
    },

    /// Purchaser has no saved card under their platform customer.
    #[error("no saved card payment method for customer {0}")]
    PaymentMethodMissing(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Reading lock price or exchange rate failed.
    #[error("upstream pricing error: {0}")]
    UpstreamPricing(String),

    /// Failure reported by, or while talking to, the payment processor.
    #[error("payment processor error: {0}")]
    Processor(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidAddress(_) => 1002,
            Self::PriceDiverged { .. } => 1003,
            Self::IntentMismatch(_) => 1004,
            Self::MetadataNotFound => 2001,
            Self::IntentNotFound(_) => 2002,
            Self::NotCaptureReady { .. } => 2003,
            Self::PaymentMethodMissing(_) => 2004,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::UpstreamPricing(_) => 5001,
            Self::Processor(_) => 5002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidAddress(_)
            | Self::PriceDiverged { .. }
            | Self::IntentMismatch(_) => StatusCode::BAD_REQUEST,
            Self::MetadataNotFound | Self::IntentNotFound(_) => StatusCode::NOT_FOUND,
            Self::NotCaptureReady { .. } => StatusCode::CONFLICT,
            Self::PaymentMethodMissing(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UpstreamPricing(_) | Self::Processor(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
