//! Scout Core - shared domain types and configuration.
//!
//! This crate defines the types that flow through the arbitrage discovery
//! pipeline (stores, inventory items, price quotes, product identities) and
//! the TOML-backed application configuration that the orchestrator threads
//! into every job.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{ConfigError, ConfigResult, Result, ScoutError};
pub use types::{
    normalize_name, Condition, DealType, InventoryItem, JobId, Marketplace, PriceQuote,
    ProductIdent, Retailer, Store, StoreId,
};
