use crate::error::Result;
use async_trait::async_trait;
use scout_core::{Marketplace, PriceQuote, ProductIdent};

/// One marketplace's price lookup.
///
/// Implementations decide UPC-exact vs keyword search from the identity
/// they're given: a UPC searches exactly, a SKU identity falls back to its
/// normalized name and every resulting quote carries the low-confidence
/// flag. Lookups go through the shared rate limiter keyed on the
/// marketplace's domain.
#[async_trait]
pub trait MarketChecker: Send + Sync {
    /// Which marketplace this checker queries.
    fn marketplace(&self) -> Marketplace;

    /// Current listings for the product, best matches first.
    ///
    /// An empty vec means the marketplace answered and carries no listing;
    /// errors mean the marketplace could not be asked.
    async fn lookup(&self, ident: &ProductIdent) -> Result<Vec<PriceQuote>>;
}
