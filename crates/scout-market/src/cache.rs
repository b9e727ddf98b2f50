//! Job-scoped quote cache.

use scout_core::{Marketplace, PriceQuote, ProductIdent};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// TTL cache for marketplace lookups, keyed (marketplace, product key).
///
/// Lives for one job: the same product found at several stores hits each
/// marketplace once. Only successful lookups populate it; a failed lookup
/// must stay retryable. Concurrent writers for the same key are fine, last
/// writer wins.
#[derive(Debug)]
pub struct QuoteCache {
    ttl: Duration,
    entries: RwLock<HashMap<(Marketplace, String), (Vec<PriceQuote>, Instant)>>,
}

impl QuoteCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cached quotes for the product on this marketplace, if still fresh.
    pub async fn get(
        &self,
        marketplace: Marketplace,
        ident: &ProductIdent,
    ) -> Option<Vec<PriceQuote>> {
        let entries = self.entries.read().await;
        let (quotes, stored_at) = entries.get(&(marketplace, ident.key()))?;
        if stored_at.elapsed() < self.ttl {
            Some(quotes.clone())
        } else {
            None
        }
    }

    /// Store a successful lookup result. An empty vec is a valid entry: it
    /// records that the marketplace has no listing.
    pub async fn put(
        &self,
        marketplace: Marketplace,
        ident: &ProductIdent,
        quotes: Vec<PriceQuote>,
    ) {
        let mut entries = self.entries.write().await;
        entries.insert((marketplace, ident.key()), (quotes, Instant::now()));
    }
}
