//! Scout Retail - deal scrapers for Walmart and Home Depot.
//!
//! Each retailer implements [`RetailerSite`] (which pages to fetch, how to
//! parse them); [`StoreScraper`] drives a site through a rate-limited,
//! retrying scrape of one store and hands back point-in-time inventory.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod error;
pub mod homedepot;
pub mod parse;
pub mod scraper;
pub mod site;
pub mod walmart;

pub use error::{Result, ScrapeError};
pub use homedepot::HomeDepotSite;
pub use scraper::StoreScraper;
pub use site::{ListingPage, RetailerSite};
pub use walmart::WalmartSite;
