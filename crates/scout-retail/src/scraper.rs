//! Store-scrape driver: fetch scheduling, retry, and failure accounting.
//!
//! A scrape of one store walks `Listing` pages, then an optional
//! `ItemDetail` pass that upgrades SKU identities to UPCs, then `Done`.
//! Every network step first acquires a rate-limiter permit for the
//! retailer's domain. A `Blocked` result reports into the limiter (which
//! starts the domain cooldown) and is retried once after the cooldown
//! clears; transient errors retry locally with jittered backoff. The store
//! is abandoned once consecutive failures reach the configured cap.

use crate::error::{Result, ScrapeError};
use crate::parse;
use crate::site::RetailerSite;
use scout_core::config::ScrapingConfig;
use scout_core::{InventoryItem, ProductIdent, Store};
use scout_fetch::{fetch_guarded, Content, FetchTarget, Fetcher, RateLimiter};
use std::sync::Arc;

/// Drives a [`RetailerSite`] through a full scrape of one store.
pub struct StoreScraper {
    fetcher: Arc<dyn Fetcher>,
    limiter: Arc<RateLimiter>,
    config: ScrapingConfig,
}

impl StoreScraper {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        limiter: Arc<RateLimiter>,
        config: ScrapingConfig,
    ) -> Self {
        Self {
            fetcher,
            limiter,
            config,
        }
    }

    /// Scrape every deal listing for `store`, returning items in
    /// page-encountered order.
    pub async fn scrape_store(
        &self,
        site: &dyn RetailerSite,
        store: &Store,
    ) -> Result<Vec<InventoryItem>> {
        let mut items = Vec::new();
        let mut consecutive_failures = 0u32;

        for page in site.listing_pages(store) {
            match self.fetch_guarded(&page.target).await {
                Ok(content) => {
                    consecutive_failures = 0;
                    let mut page_items = site.parse_listing(&content, page.deal_type, store);
                    tracing::info!(
                        retailer = %site.retailer(),
                        store_id = %store.store_id,
                        deal_type = %page.deal_type,
                        count = page_items.len(),
                        "listing scraped"
                    );
                    items.append(&mut page_items);
                }
                Err(e) => {
                    consecutive_failures += 1;
                    tracing::warn!(
                        retailer = %site.retailer(),
                        store_id = %store.store_id,
                        error = %e,
                        consecutive_failures,
                        "listing fetch failed"
                    );
                    if consecutive_failures >= self.config.max_consecutive_failures {
                        return Err(ScrapeError::StoreFailed {
                            store_id: store.store_id.to_string(),
                            failures: consecutive_failures,
                            last_error: e,
                        });
                    }
                }
            }
        }

        self.upgrade_idents(store, &mut items, &mut consecutive_failures)
            .await?;

        Ok(items)
    }

    /// Detail pass: fetch product pages for SKU-identified items and upgrade
    /// them to UPC identities where the page carries a code.
    ///
    /// Bounded by `detail_fetch_limit` so a store full of no-UPC listings
    /// cannot balloon the request count.
    async fn upgrade_idents(
        &self,
        store: &Store,
        items: &mut [InventoryItem],
        consecutive_failures: &mut u32,
    ) -> Result<()> {
        let mut fetched = 0usize;
        for item in items.iter_mut() {
            if item.ident.is_upc() || fetched >= self.config.detail_fetch_limit {
                continue;
            }
            let Some(url) = item.product_url.clone() else {
                continue;
            };
            fetched += 1;

            match self.fetch_guarded(&FetchTarget::new(url)).await {
                Ok(content) => {
                    *consecutive_failures = 0;
                    if let Some(ident) = parse::extract_upc(&content.body)
                        .and_then(|code| ProductIdent::upc(code).ok())
                    {
                        tracing::debug!(
                            store_id = %store.store_id,
                            key = %ident.key(),
                            "sku upgraded to upc"
                        );
                        item.ident = ident;
                    }
                }
                Err(e) => {
                    *consecutive_failures += 1;
                    tracing::debug!(
                        store_id = %store.store_id,
                        error = %e,
                        "detail fetch failed, keeping sku identity"
                    );
                    if *consecutive_failures >= self.config.max_consecutive_failures {
                        return Err(ScrapeError::StoreFailed {
                            store_id: store.store_id.to_string(),
                            failures: *consecutive_failures,
                            last_error: e,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    async fn fetch_guarded(&self, target: &FetchTarget) -> scout_fetch::Result<Content> {
        fetch_guarded(self.fetcher.as_ref(), &self.limiter, target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scout_core::config::{BackoffConfig, RateLimitConfig};
    use scout_fetch::FetchError;
    use scout_core::{DealType, Retailer, StoreId};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted fetcher: pops one canned response per call.
    struct ScriptedFetcher {
        responses: Mutex<VecDeque<scout_fetch::Result<String>>>,
    }

    impl ScriptedFetcher {
        fn new(responses: Vec<scout_fetch::Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().collect()),
            })
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, target: &FetchTarget) -> scout_fetch::Result<Content> {
            let next = self
                .responses
                .lock()
                .expect("lock")
                .pop_front()
                .expect("script exhausted");
            next.map(|body| Content {
                url: target.url.clone(),
                body,
            })
        }
    }

    /// Minimal site: one listing page, one item parsed per successful page.
    struct OnePageSite;

    impl RetailerSite for OnePageSite {
        fn retailer(&self) -> Retailer {
            Retailer::Walmart
        }

        fn listing_pages(&self, _store: &Store) -> Vec<crate::site::ListingPage> {
            vec![crate::site::ListingPage {
                deal_type: DealType::Clearance,
                target: FetchTarget::new("https://www.walmart.com/search?q=clearance"),
            }]
        }

        fn parse_listing(
            &self,
            content: &Content,
            deal_type: DealType,
            store: &Store,
        ) -> Vec<InventoryItem> {
            if content.body.is_empty() {
                return Vec::new();
            }
            vec![InventoryItem {
                retailer: Retailer::Walmart,
                store_id: store.store_id.clone(),
                ident: ProductIdent::upc("012345678905").expect("valid UPC"),
                product_name: content.body.clone(),
                brand: None,
                category: None,
                current_price: 10.0,
                was_price: None,
                discount_percent: None,
                deal_type,
                product_url: None,
                observed_at: chrono::Utc::now(),
            }]
        }
    }

    fn store() -> Store {
        Store {
            retailer: Retailer::Walmart,
            store_id: StoreId::new("2648").expect("valid store"),
            name: "Test".to_string(),
            address: String::new(),
            city: String::new(),
            state: String::new(),
            zip_code: String::new(),
            latitude: None,
            longitude: None,
            distance_miles: None,
        }
    }

    fn scraper(fetcher: Arc<dyn Fetcher>, max_failures: u32) -> StoreScraper {
        let limiter = Arc::new(RateLimiter::new(
            RateLimitConfig {
                min_delay_secs: 0.01,
                max_delay_secs: 0.02,
                burst: 1,
            },
            BackoffConfig {
                initial_cooldown_secs: 1,
                multiplier: 2.0,
                max_cooldown_secs: 10,
            },
        ));
        StoreScraper::new(
            fetcher,
            limiter,
            ScrapingConfig {
                max_consecutive_failures: max_failures,
                ..ScrapingConfig::default()
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_scrape() {
        let fetcher = ScriptedFetcher::new(vec![Ok("Deal Item".to_string())]);
        let items = scraper(fetcher, 3)
            .scrape_store(&OnePageSite, &store())
            .await
            .expect("scrape succeeds");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_name, "Deal Item");
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_retried_after_cooldown() {
        let fetcher = ScriptedFetcher::new(vec![
            Err(FetchError::Blocked {
                domain: "www.walmart.com".to_string(),
                retry_after: None,
            }),
            Ok("Recovered".to_string()),
        ]);
        let items = scraper(fetcher, 3)
            .scrape_store(&OnePageSite, &store())
            .await
            .expect("scrape recovers after cooldown");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_name, "Recovered");
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_retries_then_succeeds() {
        let fetcher = ScriptedFetcher::new(vec![
            Err(FetchError::Transient("timeout".to_string())),
            Err(FetchError::Transient("reset".to_string())),
            Ok("Third Time".to_string()),
        ]);
        let items = scraper(fetcher, 3)
            .scrape_store(&OnePageSite, &store())
            .await
            .expect("scrape succeeds on final attempt");
        assert_eq!(items[0].product_name, "Third Time");
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_abandoned_after_consecutive_failures() {
        // One listing page per attempt; max_consecutive_failures = 1 means
        // the first exhausted fetch abandons the store.
        let fetcher = ScriptedFetcher::new(vec![Err(FetchError::NotFound)]);
        let err = scraper(fetcher, 1)
            .scrape_store(&OnePageSite, &store())
            .await
            .expect_err("store should fail");
        assert!(matches!(err, ScrapeError::StoreFailed { failures: 1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_block_surfaces() {
        let fetcher = ScriptedFetcher::new(vec![
            Err(FetchError::Blocked {
                domain: "www.walmart.com".to_string(),
                retry_after: None,
            }),
            Err(FetchError::Blocked {
                domain: "www.walmart.com".to_string(),
                retry_after: None,
            }),
        ]);
        let err = scraper(fetcher, 1)
            .scrape_store(&OnePageSite, &store())
            .await
            .expect_err("second block abandons the store");
        assert!(matches!(
            err,
            ScrapeError::StoreFailed {
                last_error: FetchError::Blocked { .. },
                ..
            }
        ));
    }
}
