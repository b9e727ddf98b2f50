//! `scout`: run arbitrage searches from the command line.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use scout_core::config::AppConfig;
use scout_core::{JobId, Retailer, Store};
use scout_db::{fee_schedule, opportunities, search_jobs, stores, Database, JobStatus};
use scout_fetch::{BrowserFetcher, Fetcher, HttpFetcher, RateLimiter};
use scout_market::{AmazonChecker, EbayChecker, EbayCredentials, MarketChecker, PriceChecker};
use scout_pipeline::{FixedStoreLocator, JobManager, JobParams, PipelineOrchestrator};
use scout_profit::ProfitCalculator;
use scout_retail::{HomeDepotSite, RetailerSite, StoreScraper, WalmartSite};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "scout", version, about = "Retail arbitrage opportunity scout")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one search job and print the ranked opportunities
    Search(SearchArgs),
    /// List persisted opportunities, best score first
    Opportunities(OpportunitiesArgs),
    /// Import stores from a JSON file into the local database
    ImportStores {
        /// JSON array of store records
        file: PathBuf,
    },
    /// Show the status of a search job
    Status {
        /// Job identifier printed by `search`
        job_id: String,
    },
    /// Invalidate opportunities that have not been re-confirmed recently
    Prune {
        /// Age threshold in hours
        #[arg(long, default_value_t = 24)]
        older_than_hours: i64,
    },
}

#[derive(Args)]
struct SearchArgs {
    /// ZIP code to search around
    #[arg(long)]
    zip: String,

    /// Search radius in miles
    #[arg(long, default_value_t = 20.0)]
    radius: f64,

    /// Retailers to scrape
    #[arg(long, value_delimiter = ',', default_value = "walmart,homedepot")]
    retailers: Vec<String>,

    /// Minimum net profit in dollars
    #[arg(long)]
    min_profit: Option<f64>,

    /// Minimum margin percent
    #[arg(long)]
    min_margin: Option<f64>,

    /// Use the plain HTTP fetcher instead of the headless browser
    #[arg(long)]
    http: bool,

    /// Maximum opportunities to print
    #[arg(long, default_value_t = 25)]
    top: i64,
}

#[derive(Args)]
struct OpportunitiesArgs {
    /// Minimum net profit in dollars
    #[arg(long)]
    min_profit: Option<f64>,

    /// Minimum margin percent
    #[arg(long)]
    min_margin: Option<f64>,

    /// Maximum rows to print
    #[arg(long, default_value_t = 25)]
    top: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load_with_env().context("load configuration")?;
    config.validate().context("validate configuration")?;

    let db = Database::open(&config.database.path)
        .await
        .with_context(|| format!("open database at {}", config.database.path))?;
    db.run_migrations().await.context("run migrations")?;

    match cli.command {
        Command::Search(args) => search(args, config, db).await,
        Command::Opportunities(args) => list_opportunities(&args, &db).await,
        Command::ImportStores { file } => import_stores(&file, &db).await,
        Command::Status { job_id } => show_status(&job_id, &db).await,
        Command::Prune { older_than_hours } => prune(older_than_hours, &db).await,
    }
}

async fn search(args: SearchArgs, config: AppConfig, db: Database) -> Result<()> {
    let retailers = args
        .retailers
        .iter()
        .map(|name| Retailer::parse(name).with_context(|| format!("unknown retailer '{name}'")))
        .collect::<Result<Vec<_>>>()?;

    let mut resolved = Vec::new();
    for retailer in &retailers {
        let mut found =
            stores::get_by_zip(db.pool(), *retailer, &args.zip, Some(args.radius)).await?;
        resolved.append(&mut found);
    }
    if resolved.is_empty() {
        bail!(
            "no known stores near {} within {} miles; run `scout import-stores` first",
            args.zip,
            args.radius
        );
    }
    tracing::info!(stores = resolved.len(), zip = %args.zip, "stores resolved");

    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit.clone(),
        config.backoff.clone(),
    ));
    let fetcher: Arc<dyn Fetcher> = if args.http {
        Arc::new(HttpFetcher::new().context("build http client")?)
    } else {
        Arc::new(
            BrowserFetcher::launch(&config.browser)
                .await
                .context("launch browser")?,
        )
    };

    let sites: Vec<Arc<dyn RetailerSite>> = vec![Arc::new(WalmartSite), Arc::new(HomeDepotSite)];

    let mut checkers: Vec<Arc<dyn MarketChecker>> = vec![Arc::new(AmazonChecker::new(
        Arc::clone(&fetcher),
        Arc::clone(&limiter),
    ))];
    match EbayCredentials::from_env() {
        Some(credentials) => checkers.push(Arc::new(
            EbayChecker::new(credentials, Arc::clone(&limiter)).context("build eBay client")?,
        )),
        None => tracing::warn!("EBAY_APP_ID / EBAY_CERT_ID not set, skipping eBay"),
    }

    let schedule = fee_schedule::load_fee_schedule(db.pool()).await?;
    let orchestrator = PipelineOrchestrator::new(
        StoreScraper::new(fetcher, Arc::clone(&limiter), config.scraping.clone()),
        sites,
        PriceChecker::new(checkers, Duration::from_secs(config.cache.ttl_secs)),
        ProfitCalculator::new(schedule, config.profit.clone()),
        Arc::new(FixedStoreLocator::new(resolved.clone())),
        db.clone(),
        config.scraping.clone(),
        config.job.clone(),
        config.scoring.clone(),
    );
    let manager = JobManager::new(Arc::new(orchestrator));

    let mut params = JobParams::for_stores(resolved);
    params.zip_code = Some(args.zip.clone());
    params.radius_miles = Some(args.radius);
    params.min_profit = args.min_profit;
    params.min_margin_pct = args.min_margin;

    let job_id = manager.submit(params).await?;
    println!("job {job_id} submitted, press Ctrl-C to cancel");

    let record = wait_for_job(&manager, &job_id).await?;
    print_job(&record);

    if matches!(record.status, JobStatus::Completed | JobStatus::Partial) {
        let rows =
            opportunities::list_valid(db.pool(), args.min_profit, args.min_margin, args.top)
                .await?;
        print_opportunities(&rows);
    }
    Ok(())
}

async fn wait_for_job(
    manager: &JobManager,
    job_id: &JobId,
) -> Result<scout_db::SearchJobRecord> {
    let mut cancel_requested = false;
    loop {
        let record = manager.status(job_id).await?;
        if record.status.is_terminal() {
            return Ok(record);
        }
        tokio::select! {
            () = tokio::time::sleep(Duration::from_millis(500)) => {}
            result = tokio::signal::ctrl_c(), if !cancel_requested => {
                result.context("install Ctrl-C handler")?;
                eprintln!("cancelling...");
                manager.cancel(job_id).await?;
                cancel_requested = true;
            }
        }
    }
}

async fn list_opportunities(args: &OpportunitiesArgs, db: &Database) -> Result<()> {
    let rows =
        opportunities::list_valid(db.pool(), args.min_profit, args.min_margin, args.top).await?;
    print_opportunities(&rows);
    Ok(())
}

async fn import_stores(file: &PathBuf, db: &Database) -> Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("read {}", file.display()))?;
    let imported: Vec<Store> =
        serde_json::from_str(&contents).context("parse store records")?;

    for store in &imported {
        stores::upsert_store(db.pool(), store).await?;
    }
    println!("imported {} stores", imported.len());
    Ok(())
}

async fn show_status(job_id: &str, db: &Database) -> Result<()> {
    let record =
        search_jobs::get_search_job(db.pool(), &JobId::from_string(job_id.to_string())).await?;
    print_job(&record);
    if let Some(detail) = &record.error_detail {
        println!("errors: {}", serde_json::to_string_pretty(detail)?);
    }
    Ok(())
}

async fn prune(older_than_hours: i64, db: &Database) -> Result<()> {
    let invalidated = opportunities::invalidate_older_than(db.pool(), older_than_hours).await?;
    println!("invalidated {invalidated} stale opportunities");
    Ok(())
}

fn print_job(record: &scout_db::SearchJobRecord) {
    let c = record.counters;
    println!(
        "job {} [{}] stores {}/{} items {} quotes {} opportunities {}{}",
        record.id,
        record.status,
        c.stores_scanned,
        c.stores_scanned + c.stores_failed,
        c.items_found,
        c.quotes_fetched,
        c.opportunities_found,
        record
            .duration_seconds
            .map(|s| format!(" in {s}s"))
            .unwrap_or_default(),
    );
}

fn print_opportunities(rows: &[opportunities::OpportunityRow]) {
    if rows.is_empty() {
        println!("no opportunities above the configured thresholds");
        return;
    }
    for row in rows {
        let confidence = if row.low_confidence { "  (name match)" } else { "" };
        println!(
            "#{:<3} {}  [{} #{} -> {}]{}",
            row.rank, row.product_name, row.retailer, row.store_id, row.marketplace, confidence
        );
        println!(
            "     buy ${:.2}  sell ${:.2}  fees ${:.2}  net ${:.2}  margin {:.1}%  roi {:.1}%  score {:.1}",
            row.buy_price, row.sell_price, row.total_fees, row.net_profit, row.margin_pct,
            row.roi_pct, row.score
        );
        if let Some(url) = &row.listing_url {
            println!("     {url}");
        }
    }
}
