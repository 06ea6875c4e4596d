//! REST endpoint handlers organized by resource.

pub mod checkout;
pub mod metadata;
pub mod pricing;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(metadata::routes())
        .merge(pricing::routes())
        .merge(checkout::routes())
}
