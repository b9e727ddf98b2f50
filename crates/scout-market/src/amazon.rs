//! Amazon search-results checker.
//!
//! Amazon offers no usable price API, so this checker scrapes search result
//! pages through the browser fetcher. Prices come off the `.a-offscreen`
//! node inside each result card, with the visible whole-price node as a
//! fallback.

use crate::checker::MarketChecker;
use crate::error::{MarketError, Result};
use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use scout_core::{Condition, Marketplace, PriceQuote, ProductIdent};
use scout_fetch::{fetch_guarded, FetchTarget, Fetcher, RateLimiter};
use scraper::{Html, Selector};
use std::sync::Arc;

const BASE_URL: &str = "https://www.amazon.com";
const RESULT_LIMIT: usize = 10;

static RESULT_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"[data-component-type="s-search-result"]"#).expect("valid selector")
});
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h2").expect("valid selector"));
static PRICE_OFFSCREEN: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".a-price .a-offscreen").expect("valid selector"));
static PRICE_WHOLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".a-price-whole").expect("valid selector"));

static PRICE_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\d,]+\.?\d*").expect("valid pattern"));

/// [`MarketChecker`] that scrapes amazon.com search results.
pub struct AmazonChecker {
    fetcher: Arc<dyn Fetcher>,
    limiter: Arc<RateLimiter>,
}

impl AmazonChecker {
    pub fn new(fetcher: Arc<dyn Fetcher>, limiter: Arc<RateLimiter>) -> Self {
        Self { fetcher, limiter }
    }
}

#[async_trait]
impl MarketChecker for AmazonChecker {
    fn marketplace(&self) -> Marketplace {
        Marketplace::Amazon
    }

    async fn lookup(&self, ident: &ProductIdent) -> Result<Vec<PriceQuote>> {
        let query = ident.search_term().replace(' ', "+");
        let target = FetchTarget::new(format!("{BASE_URL}/s?k={query}"));
        let content = fetch_guarded(self.fetcher.as_ref(), &self.limiter, &target).await?;
        parse_search_results(&content.body, ident)
    }
}

/// Parse an Amazon search results page into quotes.
pub(crate) fn parse_search_results(body: &str, ident: &ProductIdent) -> Result<Vec<PriceQuote>> {
    let document = Html::parse_document(body);
    let low_confidence = !ident.is_upc();
    let mut quotes = Vec::new();

    for element in document.select(&RESULT_SELECTOR).take(RESULT_LIMIT) {
        let Some(asin) = element.value().attr("data-asin").filter(|a| !a.is_empty()) else {
            continue;
        };

        let price = element
            .select(&PRICE_OFFSCREEN)
            .next()
            .or_else(|| element.select(&PRICE_WHOLE).next())
            .and_then(|e| parse_price(&e.text().collect::<String>()));
        let Some(price) = price.filter(|p| *p > 0.0) else {
            continue;
        };

        let title = element
            .select(&TITLE_SELECTOR)
            .next()
            .map(|e| e.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty());

        quotes.push(PriceQuote {
            marketplace: Marketplace::Amazon,
            ident: ident.clone(),
            price,
            shipping_cost: 0.0,
            condition: Condition::New,
            listing_id: Some(asin.to_string()),
            listing_url: Some(format!("{BASE_URL}/dp/{asin}")),
            listing_title: title,
            low_confidence,
            observed_at: Utc::now(),
        });
    }

    if quotes.is_empty() && !body.contains("s-search-result") {
        // The results grid itself is missing, not merely empty: the page
        // shape changed or we got an interstitial the markers missed.
        if !body.contains("s-no-outline") && !body.to_lowercase().contains("no results") {
            return Err(MarketError::Parse(
                "no search result structure on page".to_string(),
            ));
        }
    }

    Ok(quotes)
}

fn parse_price(text: &str) -> Option<f64> {
    let m = PRICE_DIGITS.find(text)?;
    m.as_str().replace(',', "").parse().ok()
}
