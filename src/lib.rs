//! # locksmith-gateway
//!
//! REST backend for on-chain membership locks: per-key user metadata and
//! card checkout through Stripe Connect.
//!
//! A card purchase prices the keys (lock price converted to USD plus
//! fees), hands the purchaser a manual-capture payment intent in the lock
//! manager's connected account, and records the charge once the intent
//! has been authorized and re-validated.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── CheckoutService, MetadataService (service/)
//!     │
//!     ├── Pricer ─── PriceSource (pricing/)  ── JSON-RPC + spot price API
//!     ├── PaymentProcessor (processor/)      ── Stripe REST API
//!     │
//!     └── Stores (persistence/)              ── PostgreSQL or in-memory
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod pricing;
pub mod processor;
pub mod service;
