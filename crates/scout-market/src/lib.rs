//! Scout Market - marketplace price discovery.
//!
//! Each marketplace implements [`MarketChecker`]; [`PriceChecker`] fans a
//! product identity out to all of them behind a job-scoped TTL cache. eBay
//! answers over its Browse API, Amazon by scraping search results.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod amazon;
pub mod cache;
pub mod checker;
pub mod ebay;
pub mod error;
pub mod price_checker;

pub use amazon::AmazonChecker;
pub use cache::QuoteCache;
pub use checker::MarketChecker;
pub use ebay::{EbayChecker, EbayCredentials};
pub use error::{MarketError, Result};
pub use price_checker::{LookupOutcome, PriceChecker};
