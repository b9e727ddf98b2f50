//! Search-job orchestration.
//!
//! Ties the scraping, pricing, and profit crates into one pipeline: resolve
//! stores, scrape their clearance inventory, price the finds against online
//! marketplaces, rank the profitable ones, and persist everything under a
//! job record. [`JobManager`] is the public entry point; [`PipelineOrchestrator`]
//! runs a single job when callers want to drive it directly.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod error;
mod job;
mod locator;
mod manager;
mod orchestrator;

pub use error::{PipelineError, Result};
pub use job::{JobErrorRecord, JobOutcome, JobParams};
pub use locator::{FixedStoreLocator, StoreLocator};
pub use manager::JobManager;
pub use orchestrator::PipelineOrchestrator;
