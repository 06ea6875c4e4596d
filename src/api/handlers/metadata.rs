//! Key metadata endpoint handlers.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{MetadataQuery, MetadataResponse, PutMetadataRequest};
use crate::app_state::AppState;
use crate::domain::MetadataDocument;
use crate::error::{ErrorResponse, GatewayError};

/// `PUT /metadata/{token_address}/{user_address}` — Store metadata.
///
/// # Errors
///
/// Returns [`GatewayError`] on malformed addresses or storage failure.
#[utoipa::path(
    put,
    path = "/api/v1/metadata/{token_address}/{user_address}",
    tag = "Metadata",
    summary = "Store key metadata",
    description = "Replaces the protected and public metadata a user attached to their key. The first write fixes the chain.",
    params(
        ("token_address" = String, Path, description = "Lock address"),
        ("user_address" = String, Path, description = "Key owner address"),
    ),
    request_body = PutMetadataRequest,
    responses(
        (status = 200, description = "Metadata stored", body = MetadataResponse),
        (status = 400, description = "Invalid address", body = ErrorResponse),
    )
)]
pub async fn put_metadata(
    State(state): State<AppState>,
    Path((token_address, user_address)): Path<(String, String)>,
    Json(req): Json<PutMetadataRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let record = state
        .metadata_service
        .add_metadata(req.chain, &token_address, &user_address, req.metadata)
        .await?;
    Ok(Json(MetadataResponse::from(record)))
}

/// `GET /metadata/{token_address}/{user_address}` — Read metadata.
///
/// This handler does not authenticate. `include_protected` is honored as
/// sent, so a layer in front of the gateway must strip or reject it unless
/// the caller is the key owner or a lock manager.
///
/// # Errors
///
/// Returns [`GatewayError::MetadataNotFound`] if nothing is stored.
#[utoipa::path(
    get,
    path = "/api/v1/metadata/{token_address}/{user_address}",
    tag = "Metadata",
    summary = "Read key metadata",
    description = "Returns the metadata document. The protected part is omitted unless `include_protected` is set.",
    params(
        ("token_address" = String, Path, description = "Lock address"),
        ("user_address" = String, Path, description = "Key owner address"),
        MetadataQuery,
    ),
    responses(
        (status = 200, description = "Metadata document", body = MetadataDocument),
        (status = 400, description = "Invalid address", body = ErrorResponse),
        (status = 404, description = "No metadata stored", body = ErrorResponse),
    )
)]
pub async fn get_metadata(
    State(state): State<AppState>,
    Path((token_address, user_address)): Path<(String, String)>,
    Query(query): Query<MetadataQuery>,
) -> Result<Json<MetadataDocument>, GatewayError> {
    state
        .metadata_service
        .get_metadata(&token_address, &user_address, query.include_protected)
        .await?
        .map(Json)
        .ok_or(GatewayError::MetadataNotFound)
}

/// Metadata routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/metadata/{token_address}/{user_address}",
            get(get_metadata).put(put_metadata),
        )
}
