//! Scout Fetch - rate-limited page acquisition.
//!
//! Everything in the pipeline that touches the network goes through this
//! crate: a [`Fetcher`] trait with browser and HTTP implementations, a
//! per-domain [`RateLimiter`] with jittered spacing and block-driven
//! cooldowns, and fingerprint rotation for the browser transport.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod browser;
pub mod error;
pub mod fetcher;
pub mod fingerprint;
pub mod guard;
pub mod http;
pub mod rate_limit;

pub use browser::BrowserFetcher;
pub use error::{FetchError, Result};
pub use fetcher::{detect_block_markup, Content, FetchTarget, Fetcher};
pub use fingerprint::FingerprintConfig;
pub use guard::fetch_guarded;
pub use http::HttpFetcher;
pub use rate_limit::{Permit, RateLimiter};
