//! Job parameters and outcome types.

use scout_core::{Marketplace, Retailer, Store};
use scout_db::{JobCounters, JobStatus};
use scout_profit::Opportunity;
use serde::Serialize;

/// What one search job should cover.
#[derive(Debug, Clone, Default)]
pub struct JobParams {
    /// ZIP code to resolve stores around, when no explicit store set is given
    pub zip_code: Option<String>,
    /// Search radius in miles (defaults to 20 when resolving by ZIP)
    pub radius_miles: Option<f64>,
    /// Retailers to scrape
    pub retailers: Vec<Retailer>,
    /// Explicit store set; skips the locator when non-empty
    pub stores: Vec<Store>,
    /// Override for the configured minimum net profit threshold
    pub min_profit: Option<f64>,
    /// Override for the configured minimum margin threshold
    pub min_margin_pct: Option<f64>,
}

impl JobParams {
    /// Search an explicit, already-resolved store set.
    #[must_use]
    pub fn for_stores(stores: Vec<Store>) -> Self {
        let mut retailers: Vec<Retailer> = stores.iter().map(|s| s.retailer).collect();
        retailers.sort_by_key(Retailer::as_str);
        retailers.dedup();
        Self {
            retailers,
            stores,
            ..Self::default()
        }
    }

    /// Search stores resolved around a ZIP code.
    #[must_use]
    pub fn for_zip(zip_code: impl Into<String>, radius_miles: f64, retailers: Vec<Retailer>) -> Self {
        Self {
            zip_code: Some(zip_code.into()),
            radius_miles: Some(radius_miles),
            retailers,
            ..Self::default()
        }
    }
}

/// One itemized sub-task failure, persisted with the job row.
#[derive(Debug, Clone, Serialize)]
pub struct JobErrorRecord {
    /// Where the failure happened: `store` or `marketplace`
    pub scope: String,
    /// Store id, or `marketplace:product-key`
    pub subject: String,
    /// Human-readable cause
    pub error: String,
}

impl JobErrorRecord {
    pub(crate) fn store(store_id: &str, error: impl std::fmt::Display) -> Self {
        Self {
            scope: "store".to_string(),
            subject: store_id.to_string(),
            error: error.to_string(),
        }
    }

    pub(crate) fn marketplace(
        marketplace: Marketplace,
        product_key: &str,
        error: impl std::fmt::Display,
    ) -> Self {
        Self {
            scope: "marketplace".to_string(),
            subject: format!("{marketplace}:{product_key}"),
            error: error.to_string(),
        }
    }
}

/// Everything a finished job produced.
#[derive(Debug)]
pub struct JobOutcome {
    /// Terminal status the job reached
    pub status: JobStatus,
    /// Final per-stage counters
    pub counters: JobCounters,
    /// Itemized sub-task failures
    pub errors: Vec<JobErrorRecord>,
    /// Ranked opportunities, empty when cancelled or failed
    pub opportunities: Vec<Opportunity>,
}
