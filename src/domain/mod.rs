//! Domain layer: address normalization, pricing values, and the records
//! the gateway persists.

pub mod address;
pub mod metadata;
pub mod payment;
pub mod pricing;

pub use address::normalize_address;
pub use metadata::{MetadataDocument, UserMetadata, UserTokenMetadata};
pub use payment::{ChargeRecord, NewCharge, NewPaymentIntent, PaymentIntentRecord};
pub use pricing::PricingBreakdown;
