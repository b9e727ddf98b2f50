//! Aggregates per-marketplace checkers behind a job-scoped cache.

use crate::cache::QuoteCache;
use crate::checker::MarketChecker;
use crate::error::Result;
use scout_core::{Marketplace, PriceQuote, ProductIdent};
use std::sync::Arc;
use std::time::Duration;

/// Result of asking one marketplace about one product.
pub struct LookupOutcome {
    pub marketplace: Marketplace,
    pub result: Result<Vec<PriceQuote>>,
}

/// Fans one product identity out to every enabled marketplace.
///
/// The checker set is long-lived, but every quote is cached per job only:
/// callers create a fresh [`QuoteCache`] via [`PriceChecker::new_job_cache`]
/// when a job starts and pass it to each lookup, so a later job never sees
/// quotes observed before it began. Successful answers (including empty
/// ones) populate the cache; failures stay uncached so a later item with
/// the same identity retries the marketplace.
pub struct PriceChecker {
    checkers: Vec<Arc<dyn MarketChecker>>,
    cache_ttl: Duration,
}

impl PriceChecker {
    pub fn new(checkers: Vec<Arc<dyn MarketChecker>>, cache_ttl: Duration) -> Self {
        Self {
            checkers,
            cache_ttl,
        }
    }

    /// Marketplaces this checker will consult.
    pub fn marketplaces(&self) -> Vec<Marketplace> {
        self.checkers.iter().map(|c| c.marketplace()).collect()
    }

    /// Fresh, empty cache for one job's lookups.
    #[must_use]
    pub fn new_job_cache(&self) -> QuoteCache {
        QuoteCache::new(self.cache_ttl)
    }

    /// Quotes for the product from every marketplace, one outcome each.
    pub async fn lookup(&self, cache: &QuoteCache, ident: &ProductIdent) -> Vec<LookupOutcome> {
        let mut outcomes = Vec::with_capacity(self.checkers.len());

        for checker in &self.checkers {
            let marketplace = checker.marketplace();

            if let Some(quotes) = cache.get(marketplace, ident).await {
                tracing::debug!(%marketplace, key = %ident.key(), "quote cache hit");
                outcomes.push(LookupOutcome {
                    marketplace,
                    result: Ok(quotes),
                });
                continue;
            }

            let result = checker.lookup(ident).await;
            match &result {
                Ok(quotes) => {
                    tracing::debug!(
                        %marketplace,
                        key = %ident.key(),
                        count = quotes.len(),
                        "marketplace lookup"
                    );
                    cache.put(marketplace, ident, quotes.clone()).await;
                }
                Err(e) => {
                    tracing::warn!(%marketplace, key = %ident.key(), error = %e, "lookup failed");
                }
            }
            outcomes.push(LookupOutcome {
                marketplace,
                result,
            });
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MarketError;
    use async_trait::async_trait;
    use chrono::Utc;
    use scout_core::Condition;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingChecker {
        marketplace: Marketplace,
        calls: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl MarketChecker for CountingChecker {
        fn marketplace(&self) -> Marketplace {
            self.marketplace
        }

        async fn lookup(&self, ident: &ProductIdent) -> Result<Vec<PriceQuote>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && call == 0 {
                return Err(MarketError::Parse("bad page".to_string()));
            }
            Ok(vec![PriceQuote {
                marketplace: self.marketplace,
                ident: ident.clone(),
                price: 25.0,
                shipping_cost: 0.0,
                condition: Condition::New,
                listing_id: None,
                listing_url: None,
                listing_title: None,
                low_confidence: !ident.is_upc(),
                observed_at: Utc::now(),
            }])
        }
    }

    fn ident() -> ProductIdent {
        ProductIdent::upc("012345678905").expect("valid UPC")
    }

    #[tokio::test]
    async fn test_second_lookup_served_from_cache() {
        let checker = Arc::new(CountingChecker {
            marketplace: Marketplace::Ebay,
            calls: AtomicUsize::new(0),
            fail_first: false,
        });
        let price_checker =
            PriceChecker::new(vec![checker.clone()], Duration::from_secs(300));
        let cache = price_checker.new_job_cache();

        price_checker.lookup(&cache, &ident()).await;
        price_checker.lookup(&cache, &ident()).await;

        assert_eq!(checker.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fresh_job_cache_reconsults_marketplace() {
        let checker = Arc::new(CountingChecker {
            marketplace: Marketplace::Ebay,
            calls: AtomicUsize::new(0),
            fail_first: false,
        });
        let price_checker =
            PriceChecker::new(vec![checker.clone()], Duration::from_secs(300));

        let first_job = price_checker.new_job_cache();
        price_checker.lookup(&first_job, &ident()).await;

        // A new job gets a new cache; the previous job's quotes are invisible
        // to it even well inside the TTL.
        let second_job = price_checker.new_job_cache();
        price_checker.lookup(&second_job, &ident()).await;

        assert_eq!(checker.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_not_cached() {
        let checker = Arc::new(CountingChecker {
            marketplace: Marketplace::Amazon,
            calls: AtomicUsize::new(0),
            fail_first: true,
        });
        let price_checker =
            PriceChecker::new(vec![checker.clone()], Duration::from_secs(300));
        let cache = price_checker.new_job_cache();

        let first = price_checker.lookup(&cache, &ident()).await;
        assert!(first[0].result.is_err());

        let second = price_checker.lookup(&cache, &ident()).await;
        assert!(second[0].result.is_ok());
        assert_eq!(checker.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_all_marketplaces_answer() {
        let ebay = Arc::new(CountingChecker {
            marketplace: Marketplace::Ebay,
            calls: AtomicUsize::new(0),
            fail_first: false,
        });
        let amazon = Arc::new(CountingChecker {
            marketplace: Marketplace::Amazon,
            calls: AtomicUsize::new(0),
            fail_first: false,
        });
        let price_checker = PriceChecker::new(
            vec![ebay as Arc<dyn MarketChecker>, amazon],
            Duration::from_secs(300),
        );
        let cache = price_checker.new_job_cache();

        let outcomes = price_checker.lookup(&cache, &ident()).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.result.is_ok()));
    }
}
