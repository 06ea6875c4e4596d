//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::pricing::Pricer;
use crate::service::{CheckoutService, MetadataService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Card checkout flows.
    pub checkout_service: Arc<CheckoutService>,
    /// Key metadata reads and writes.
    pub metadata_service: Arc<MetadataService>,
    /// Price quotes for the pricing endpoint.
    pub pricer: Arc<dyn Pricer>,
}
