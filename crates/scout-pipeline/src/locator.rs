//! Store resolution seam.
//!
//! Turning a ZIP code and radius into physical store locations requires an
//! external geocoding source, so the pipeline takes it as an injected
//! collaborator. The fixed-list implementation serves tests and CLI runs
//! where the store set is already known.

use crate::error::Result;
use async_trait::async_trait;
use scout_core::{Retailer, Store};

/// Resolves the physical stores a search should cover.
#[async_trait]
pub trait StoreLocator: Send + Sync {
    /// Stores of the requested retailers within `radius_miles` of `zip_code`.
    async fn resolve_stores(
        &self,
        zip_code: &str,
        radius_miles: f64,
        retailers: &[Retailer],
    ) -> Result<Vec<Store>>;
}

/// Locator backed by a pre-resolved store list.
pub struct FixedStoreLocator {
    stores: Vec<Store>,
}

impl FixedStoreLocator {
    #[must_use]
    pub fn new(stores: Vec<Store>) -> Self {
        Self { stores }
    }
}

#[async_trait]
impl StoreLocator for FixedStoreLocator {
    async fn resolve_stores(
        &self,
        _zip_code: &str,
        radius_miles: f64,
        retailers: &[Retailer],
    ) -> Result<Vec<Store>> {
        Ok(self
            .stores
            .iter()
            .filter(|store| retailers.contains(&store.retailer))
            .filter(|store| store.distance_miles.map_or(true, |d| d <= radius_miles))
            .cloned()
            .collect())
    }
}
