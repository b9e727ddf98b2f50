//! One-job execution: scrape fan-out, quote fan-out, rank, persist.
//!
//! Stage one scrapes every resolved store with bounded concurrency per
//! retailer. Stage two looks up marketplace quotes for each distinct product
//! identity, again bounded. Analyses are ranked at fan-in and persisted by
//! natural-key upsert. Nothing below store/marketplace granularity escapes
//! its task; each failure becomes an error record and the job still reports
//! a definitive status.

use crate::error::{PipelineError, Result};
use crate::job::{JobErrorRecord, JobOutcome, JobParams};
use crate::locator::StoreLocator;
use futures::stream::{FuturesUnordered, StreamExt};
use scout_core::config::{JobConfig, ScoringConfig, ScrapingConfig};
use scout_core::{InventoryItem, JobId, PriceQuote, Store};
use scout_db::{inventory, opportunities, quotes, search_jobs, stores as store_table};
use scout_db::{Database, JobCounters, JobStatus};
use scout_market::{LookupOutcome, PriceChecker, QuoteCache};
use scout_profit::{Opportunity, OpportunityRanker, ProfitAnalysis, ProfitCalculator};
use scout_retail::{RetailerSite, StoreScraper};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default search radius when resolving stores by ZIP code.
const DEFAULT_RADIUS_MILES: f64 = 20.0;

enum Stage<T> {
    Done(T),
    Cancelled,
}

/// Executes search jobs end to end.
pub struct PipelineOrchestrator {
    scraper: StoreScraper,
    sites: Vec<Arc<dyn RetailerSite>>,
    price_checker: PriceChecker,
    calculator: ProfitCalculator,
    locator: Arc<dyn StoreLocator>,
    db: Database,
    scraping: ScrapingConfig,
    job: JobConfig,
    scoring: ScoringConfig,
}

impl PipelineOrchestrator {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        scraper: StoreScraper,
        sites: Vec<Arc<dyn RetailerSite>>,
        price_checker: PriceChecker,
        calculator: ProfitCalculator,
        locator: Arc<dyn StoreLocator>,
        db: Database,
        scraping: ScrapingConfig,
        job: JobConfig,
        scoring: ScoringConfig,
    ) -> Self {
        Self {
            scraper,
            sites,
            price_checker,
            calculator,
            locator,
            db,
            scraping,
            job,
            scoring,
        }
    }

    /// The database this pipeline persists into.
    #[must_use]
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Run one job to a terminal status.
    ///
    /// The job row must already exist; this moves it through Running to its
    /// terminal state and returns everything the job produced. Cancellation
    /// is observed at every fan-in point; a cancelled job persists no
    /// opportunities.
    #[allow(clippy::cast_possible_truncation)]
    pub async fn run_job(
        &self,
        job_id: &JobId,
        params: &JobParams,
        cancel: CancellationToken,
    ) -> Result<JobOutcome> {
        search_jobs::mark_running(self.db.pool(), job_id).await?;
        let deadline = Instant::now() + Duration::from_secs(self.job.timeout_secs);

        let stores = self.resolve_stores(params).await?;
        tracing::info!(%job_id, stores = stores.len(), "job started");

        let mut counters = JobCounters::default();
        let mut errors = Vec::new();

        let items = match self
            .scrape_stage(&stores, deadline, &cancel, &mut counters, &mut errors)
            .await
        {
            Stage::Done(items) => items,
            Stage::Cancelled => return self.finish_cancelled(job_id, counters, errors).await,
        };
        counters.items_found = items.len() as u32;
        inventory::record_items(self.db.pool(), job_id, &items).await?;
        search_jobs::update_counters(self.db.pool(), job_id, &counters).await?;

        // Fresh cache per job: a quote observed before this job started must
        // never be reused.
        let quote_cache = self.price_checker.new_job_cache();
        let (analyses, fetched_quotes) = match self
            .quote_stage(&items, &quote_cache, deadline, &cancel, &mut counters, &mut errors)
            .await
        {
            Stage::Done(result) => result,
            Stage::Cancelled => return self.finish_cancelled(job_id, counters, errors).await,
        };

        if cancel.is_cancelled() {
            return self.finish_cancelled(job_id, counters, errors).await;
        }

        quotes::record_quotes(self.db.pool(), job_id, &fetched_quotes).await?;

        let ranker = OpportunityRanker::new(ScoringConfig {
            w_profit: self.scoring.w_profit,
            w_margin: self.scoring.w_margin,
            min_profit: params.min_profit.unwrap_or(self.scoring.min_profit),
            min_margin_pct: params.min_margin_pct.unwrap_or(self.scoring.min_margin_pct),
        });
        let ranked = ranker.rank(&analyses);

        for opportunity in &ranked {
            opportunities::upsert_opportunity(self.db.pool(), opportunity).await?;
        }
        counters.opportunities_found = ranked.len() as u32;

        let status = derive_status(&errors, &counters);
        let detail = encode_errors(&errors);
        search_jobs::complete_search_job(self.db.pool(), job_id, status, &counters, detail.as_ref())
            .await?;

        tracing::info!(
            %job_id,
            %status,
            items = counters.items_found,
            opportunities = counters.opportunities_found,
            "job finished"
        );

        Ok(JobOutcome {
            status,
            counters,
            errors,
            opportunities: ranked,
        })
    }

    async fn resolve_stores(&self, params: &JobParams) -> Result<Vec<Store>> {
        let stores = if params.stores.is_empty() {
            let zip = params.zip_code.as_deref().ok_or_else(|| {
                PipelineError::InvalidParams(
                    "either an explicit store list or a ZIP code is required".to_string(),
                )
            })?;
            let radius = params.radius_miles.unwrap_or(DEFAULT_RADIUS_MILES);
            self.locator
                .resolve_stores(zip, radius, &params.retailers)
                .await?
        } else {
            params.stores.clone()
        };

        for store in &stores {
            store_table::upsert_store(self.db.pool(), store).await?;
        }
        Ok(stores)
    }

    /// Stage one: scrape every store, bounded per retailer.
    async fn scrape_stage(
        &self,
        stores: &[Store],
        deadline: Instant,
        cancel: &CancellationToken,
        counters: &mut JobCounters,
        errors: &mut Vec<JobErrorRecord>,
    ) -> Stage<Vec<InventoryItem>> {
        let mut all_items = Vec::new();

        for site in &self.sites {
            let mut pending = stores
                .iter()
                .filter(|store| store.retailer == site.retailer());
            let mut in_flight = FuturesUnordered::new();

            loop {
                while in_flight.len() < self.scraping.retailer_concurrency {
                    match pending.next() {
                        Some(store) => in_flight.push(self.scrape_one(site.as_ref(), store, deadline)),
                        None => break,
                    }
                }
                if in_flight.is_empty() {
                    break;
                }

                tokio::select! {
                    () = cancel.cancelled() => return Stage::Cancelled,
                    completed = in_flight.next() => {
                        let Some((store_id, result)) = completed else { break };
                        match result {
                            Ok(mut items) => {
                                counters.stores_scanned += 1;
                                all_items.append(&mut items);
                            }
                            Err(message) => {
                                counters.stores_failed += 1;
                                errors.push(JobErrorRecord::store(&store_id, &message));
                            }
                        }
                    }
                }
            }
        }

        Stage::Done(all_items)
    }

    async fn scrape_one(
        &self,
        site: &dyn RetailerSite,
        store: &Store,
        deadline: Instant,
    ) -> (String, std::result::Result<Vec<InventoryItem>, String>) {
        let store_id = store.store_id.to_string();
        let result = match tokio::time::timeout_at(deadline, self.scraper.scrape_store(site, store))
            .await
        {
            Ok(Ok(items)) => Ok(items),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("job deadline exceeded".to_string()),
        };
        (store_id, result)
    }

    /// Stage two: one marketplace lookup per distinct product identity,
    /// bounded, with every item carrying that identity analyzed against
    /// every quote.
    #[allow(clippy::cast_possible_truncation)]
    async fn quote_stage<'a>(
        &self,
        items: &'a [InventoryItem],
        cache: &QuoteCache,
        deadline: Instant,
        cancel: &CancellationToken,
        counters: &mut JobCounters,
        errors: &mut Vec<JobErrorRecord>,
    ) -> Stage<(Vec<ProfitAnalysis>, Vec<PriceQuote>)> {
        let mut by_ident: BTreeMap<String, Vec<&'a InventoryItem>> = BTreeMap::new();
        for item in items {
            by_ident.entry(item.ident.key()).or_default().push(item);
        }

        let mut analyses = Vec::new();
        let mut fetched = Vec::new();
        let mut pending = by_ident.into_iter();
        let mut in_flight = FuturesUnordered::new();

        loop {
            while in_flight.len() < self.scraping.marketplace_concurrency {
                match pending.next() {
                    Some((key, group)) => {
                        in_flight.push(self.lookup_one(cache, key, group, deadline));
                    }
                    None => break,
                }
            }
            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                () = cancel.cancelled() => return Stage::Cancelled,
                completed = in_flight.next() => {
                    let Some((key, group, outcomes)) = completed else { break };
                    let Some(outcomes) = outcomes else {
                        for marketplace in self.price_checker.marketplaces() {
                            errors.push(JobErrorRecord::marketplace(
                                marketplace,
                                &key,
                                "job deadline exceeded",
                            ));
                        }
                        continue;
                    };

                    for outcome in outcomes {
                        match outcome.result {
                            Ok(quotes) => {
                                counters.quotes_fetched += quotes.len() as u32;
                                for quote in &quotes {
                                    for item in &group {
                                        match self.calculator.analyze(item, quote) {
                                            Ok(analysis) => analyses.push(analysis),
                                            Err(e) => tracing::debug!(
                                                item_key = %item.item_key(),
                                                error = %e,
                                                "analysis skipped"
                                            ),
                                        }
                                    }
                                }
                                fetched.extend(quotes);
                            }
                            Err(e) => {
                                errors.push(JobErrorRecord::marketplace(outcome.marketplace, &key, &e));
                            }
                        }
                    }
                }
            }
        }

        Stage::Done((analyses, fetched))
    }

    async fn lookup_one<'a>(
        &self,
        cache: &QuoteCache,
        key: String,
        group: Vec<&'a InventoryItem>,
        deadline: Instant,
    ) -> (String, Vec<&'a InventoryItem>, Option<Vec<LookupOutcome>>) {
        let ident = group[0].ident.clone();
        let outcomes = tokio::time::timeout_at(deadline, self.price_checker.lookup(cache, &ident))
            .await
            .ok();
        (key, group, outcomes)
    }

    async fn finish_cancelled(
        &self,
        job_id: &JobId,
        counters: JobCounters,
        errors: Vec<JobErrorRecord>,
    ) -> Result<JobOutcome> {
        tracing::info!(%job_id, "job cancelled, discarding results");
        let detail = encode_errors(&errors);
        search_jobs::complete_search_job(
            self.db.pool(),
            job_id,
            JobStatus::Cancelled,
            &counters,
            detail.as_ref(),
        )
        .await?;

        Ok(JobOutcome {
            status: JobStatus::Cancelled,
            counters,
            errors,
            opportunities: Vec::new(),
        })
    }
}

/// Terminal status for a finished (non-cancelled) job.
///
/// `Failed` only when sub-tasks failed and nothing at all was scraped; an
/// error-free run with an empty market is still `Completed`.
fn derive_status(errors: &[JobErrorRecord], counters: &JobCounters) -> JobStatus {
    if errors.is_empty() {
        JobStatus::Completed
    } else if counters.items_found > 0 {
        JobStatus::Partial
    } else {
        JobStatus::Failed
    }
}

fn encode_errors(errors: &[JobErrorRecord]) -> Option<serde_json::Value> {
    if errors.is_empty() {
        None
    } else {
        serde_json::to_value(errors).ok()
    }
}
