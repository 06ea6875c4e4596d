//! Data Transfer Objects for REST request/response serialization.
//!
//! Amounts are integer cents except `max_price`, which is the dollar
//! figure shown to the purchaser.

pub mod checkout_dto;
pub mod metadata_dto;
pub mod pricing_dto;

pub use checkout_dto::*;
pub use metadata_dto::*;
pub use pricing_dto::*;
