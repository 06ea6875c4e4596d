//! Service layer: business logic orchestration.
//!
//! [`MetadataService`] handles account profile data. [`CheckoutService`]
//! reconciles card checkouts between the payment processor and the local
//! intent and charge records.

pub mod checkout_service;
pub mod metadata_service;

pub use checkout_service::{
    CaptureOutcome, CaptureRequest, CheckoutService, IntentQuote, IntentRequest, SetupOutcome,
};
pub use metadata_service::MetadataService;
