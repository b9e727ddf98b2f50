//! eBay Browse API checker.
//!
//! Auth is the client-credentials OAuth grant: app id + cert id exchanged
//! for a bearer token, cached until shortly before expiry. Searches hit
//! `item_summary/search` filtered to fixed-price listings.

use crate::checker::MarketChecker;
use crate::error::{MarketError, Result};
use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use scout_core::{Condition, Marketplace, PriceQuote, ProductIdent};
use scout_fetch::{fetch_guarded, FetchTarget, HttpFetcher, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

const TOKEN_URL: &str = "https://api.ebay.com/identity/v1/oauth2/token";
const SEARCH_URL: &str = "https://api.ebay.com/buy/browse/v1/item_summary/search";
const OAUTH_SCOPE: &str = "https://api.ebay.com/oauth/api_scope/buy.item.search";

/// Renew this long before the token actually expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const UPC_RESULT_LIMIT: u32 = 10;
const KEYWORD_RESULT_LIMIT: u32 = 5;

/// eBay application credentials.
#[derive(Debug, Clone)]
pub struct EbayCredentials {
    pub app_id: String,
    pub cert_id: String,
}

impl EbayCredentials {
    /// Read credentials from `EBAY_APP_ID` / `EBAY_CERT_ID`.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Some(Self {
            app_id: std::env::var("EBAY_APP_ID").ok()?,
            cert_id: std::env::var("EBAY_CERT_ID").ok()?,
        })
    }
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// [`MarketChecker`] backed by the eBay Browse API.
pub struct EbayChecker {
    http: HttpFetcher,
    limiter: Arc<RateLimiter>,
    credentials: EbayCredentials,
    token: RwLock<Option<CachedToken>>,
}

impl EbayChecker {
    pub fn new(credentials: EbayCredentials, limiter: Arc<RateLimiter>) -> Result<Self> {
        Ok(Self {
            http: HttpFetcher::new()?,
            limiter,
            credentials,
            token: RwLock::new(None),
        })
    }

    /// Current bearer token, fetching a fresh one when the cache is stale.
    async fn access_token(&self) -> Result<String> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref() {
                if Instant::now() < token.expires_at {
                    return Ok(token.value.clone());
                }
            }
        }

        let basic = base64::engine::general_purpose::STANDARD.encode(format!(
            "{}:{}",
            self.credentials.app_id, self.credentials.cert_id
        ));
        let target = FetchTarget::new(TOKEN_URL)
            .with_header("Authorization", format!("Basic {basic}"));

        self.limiter.acquire(Marketplace::Ebay.domain()).await;
        let grant = self
            .http
            .post_form(
                &target,
                &[("grant_type", "client_credentials"), ("scope", OAUTH_SCOPE)],
            )
            .await;
        let content = match grant {
            Ok(content) => content,
            Err(scout_fetch::FetchError::Blocked {
                domain,
                retry_after,
            }) => {
                self.limiter.report_blocked(&domain, retry_after).await;
                return Err(MarketError::Auth("token grant rate limited".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let body: serde_json::Value = serde_json::from_str(&content.body)
            .map_err(|e| MarketError::Auth(format!("token response unreadable: {e}")))?;
        let value = body
            .get("access_token")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| MarketError::Auth("no access_token in grant response".to_string()))?
            .to_string();
        let expires_in = body
            .get("expires_in")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(7200);

        let expires_at = Instant::now() + Duration::from_secs(expires_in)
            - TOKEN_EXPIRY_MARGIN.min(Duration::from_secs(expires_in));
        tracing::debug!(expires_in, "ebay token refreshed");

        let mut cached = self.token.write().await;
        *cached = Some(CachedToken {
            value: value.clone(),
            expires_at,
        });
        Ok(value)
    }

    fn search_target(&self, ident: &ProductIdent, token: &str) -> Result<FetchTarget> {
        // UPC matches sort highest-price-first so the best resale comp
        // leads; keyword fallbacks sort ascending to avoid accessory spam
        // pricing above the real product.
        let (sort, limit) = if ident.is_upc() {
            ("-price", UPC_RESULT_LIMIT)
        } else {
            ("price", KEYWORD_RESULT_LIMIT)
        };

        let url = url::Url::parse_with_params(
            SEARCH_URL,
            &[
                ("q", ident.search_term()),
                ("filter", "buyingOptions:{FIXED_PRICE}"),
                ("sort", sort),
                ("limit", &limit.to_string()),
            ],
        )
        .map_err(|e| MarketError::Parse(format!("search url: {e}")))?;

        Ok(FetchTarget::new(url.to_string())
            .with_header("Authorization", format!("Bearer {token}"))
            .with_header("X-EBAY-C-MARKETPLACE-ID", "EBAY_US"))
    }
}

#[async_trait]
impl MarketChecker for EbayChecker {
    fn marketplace(&self) -> Marketplace {
        Marketplace::Ebay
    }

    async fn lookup(&self, ident: &ProductIdent) -> Result<Vec<PriceQuote>> {
        let token = self.access_token().await?;
        let target = self.search_target(ident, &token)?;
        let content = fetch_guarded(&self.http, &self.limiter, &target).await?;
        parse_item_summaries(&content.body, ident)
    }
}

/// Parse a Browse API `item_summary/search` response body.
pub(crate) fn parse_item_summaries(body: &str, ident: &ProductIdent) -> Result<Vec<PriceQuote>> {
    let data: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| MarketError::Parse(format!("search response: {e}")))?;

    let Some(summaries) = data
        .get("itemSummaries")
        .and_then(serde_json::Value::as_array)
    else {
        // No listings for this query
        return Ok(Vec::new());
    };

    let low_confidence = !ident.is_upc();
    let mut quotes = Vec::new();
    for item in summaries {
        let Some(price) = money_value(item.pointer("/price/value")) else {
            continue;
        };
        if price <= 0.0 {
            continue;
        }
        let shipping_cost = money_value(item.pointer("/shippingOptions/0/shippingCost/value"))
            .unwrap_or(0.0);
        let condition = match item.get("condition").and_then(serde_json::Value::as_str) {
            Some(c) if c.eq_ignore_ascii_case("new") => Condition::New,
            Some(_) => Condition::Used,
            None => Condition::New,
        };

        quotes.push(PriceQuote {
            marketplace: Marketplace::Ebay,
            ident: ident.clone(),
            price,
            shipping_cost,
            condition,
            listing_id: item
                .get("itemId")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
            listing_url: item
                .get("itemWebUrl")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
            listing_title: item
                .get("title")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
            low_confidence,
            observed_at: Utc::now(),
        });
    }
    Ok(quotes)
}

/// Browse API money values arrive as strings; tolerate numbers too.
fn money_value(value: Option<&serde_json::Value>) -> Option<f64> {
    match value? {
        serde_json::Value::String(s) => s.parse().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_item_summaries() {
        let body = r#"{
            "itemSummaries": [
                {
                    "itemId": "v1|123456|0",
                    "title": "LEGO City Set New Sealed",
                    "itemWebUrl": "https://www.ebay.com/itm/123456",
                    "condition": "New",
                    "price": {"value": "34.99", "currency": "USD"},
                    "shippingOptions": [{"shippingCost": {"value": "4.50"}}]
                },
                {
                    "itemId": "v1|7890|0",
                    "title": "LEGO City Set used",
                    "condition": "Used",
                    "price": {"value": "22.00", "currency": "USD"}
                }
            ]
        }"#;
        let ident = ProductIdent::upc("673419340533").expect("valid UPC");
        let quotes = parse_item_summaries(body, &ident).expect("parse response");

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].price, 34.99);
        assert_eq!(quotes[0].shipping_cost, 4.50);
        assert_eq!(quotes[0].condition, Condition::New);
        assert_eq!(quotes[1].condition, Condition::Used);
        assert_eq!(quotes[1].shipping_cost, 0.0);
        assert!(quotes.iter().all(|q| !q.low_confidence));
    }

    #[test]
    fn test_keyword_lookup_flags_low_confidence() {
        let body = r#"{"itemSummaries":[
            {"itemId":"v1|1|0","title":"Gadget","condition":"New",
             "price":{"value":"10.00"}}
        ]}"#;
        let ident = ProductIdent::sku("55123", "Some Gadget");
        let quotes = parse_item_summaries(body, &ident).expect("parse response");
        assert!(quotes[0].low_confidence);
    }

    #[test]
    fn test_no_summaries_is_empty() {
        let ident = ProductIdent::upc("673419340533").expect("valid UPC");
        let quotes = parse_item_summaries(r#"{"total":0}"#, &ident).expect("parse response");
        assert!(quotes.is_empty());
    }

    #[test]
    fn test_garbage_body_is_parse_error() {
        let ident = ProductIdent::upc("673419340533").expect("valid UPC");
        assert!(matches!(
            parse_item_summaries("<html>oops</html>", &ident),
            Err(MarketError::Parse(_))
        ));
    }

    #[test]
    fn test_zero_price_listings_skipped() {
        let body = r#"{"itemSummaries":[
            {"itemId":"v1|1|0","price":{"value":"0"}}
        ]}"#;
        let ident = ProductIdent::upc("673419340533").expect("valid UPC");
        let quotes = parse_item_summaries(body, &ident).expect("parse response");
        assert!(quotes.is_empty());
    }
}
