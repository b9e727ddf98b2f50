//! Shared domain types for the arbitrage discovery pipeline.
//!
//! These types flow between every stage: scraped inventory, marketplace
//! quotes, and the identifiers that tie them together. Records are
//! point-in-time facts and are never mutated after creation; a re-scrape
//! produces a new record.

use crate::error::ScoutError;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Retailers the pipeline can scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Retailer {
    /// walmart.com store-filtered search pages
    Walmart,
    /// homedepot.com clearance and special-buy pages
    HomeDepot,
}

impl Retailer {
    /// Parse from the lowercase wire form used in configs and the database.
    pub fn parse(s: &str) -> Result<Self, ScoutError> {
        match s {
            "walmart" => Ok(Self::Walmart),
            "homedepot" => Ok(Self::HomeDepot),
            other => Err(ScoutError::Validation(format!(
                "unknown retailer '{other}'"
            ))),
        }
    }

    /// Stable lowercase name used in configs and the database.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Walmart => "walmart",
            Self::HomeDepot => "homedepot",
        }
    }

    /// The domain the rate limiter keys scraping traffic on.
    #[must_use]
    pub fn domain(&self) -> &'static str {
        match self {
            Self::Walmart => "www.walmart.com",
            Self::HomeDepot => "www.homedepot.com",
        }
    }
}

impl fmt::Display for Retailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Marketplaces checked for resale prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marketplace {
    /// amazon.com search results (scraped)
    Amazon,
    /// eBay Browse API
    Ebay,
}

impl Marketplace {
    /// Parse from the lowercase wire form.
    pub fn parse(s: &str) -> Result<Self, ScoutError> {
        match s {
            "amazon" => Ok(Self::Amazon),
            "ebay" => Ok(Self::Ebay),
            other => Err(ScoutError::Validation(format!(
                "unknown marketplace '{other}'"
            ))),
        }
    }

    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amazon => "amazon",
            Self::Ebay => "ebay",
        }
    }

    /// The domain the rate limiter keys lookup traffic on.
    #[must_use]
    pub fn domain(&self) -> &'static str {
        match self {
            Self::Amazon => "www.amazon.com",
            Self::Ebay => "api.ebay.com",
        }
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Newtype for retailer store identifiers with validation.
///
/// Store IDs are the retailer's own identifiers: short alphanumeric strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreId(String);

impl StoreId {
    /// Create a new `StoreId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is empty, too long, or not alphanumeric.
    pub fn new(id: impl Into<String>) -> Result<Self, ScoutError> {
        static STORE_REGEX: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"^[A-Za-z0-9-]{1,20}$").expect("valid regex"));

        let id = id.into();
        if STORE_REGEX.is_match(&id) {
            Ok(Self(id))
        } else {
            Err(ScoutError::Validation(format!(
                "invalid store ID: must be 1-20 alphanumeric characters, got '{id}'"
            )))
        }
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype for search job identifiers (UUID v4).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Create a new random `JobId`.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap an existing identifier string.
    #[must_use]
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cross-retailer product identity.
///
/// UPC is preferred; when a retailer page carries no UPC the item falls back
/// to the retailer SKU plus a normalized name, and downstream marketplace
/// matches on it are flagged low-confidence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductIdent {
    /// Universal Product Code / GTIN, 12-14 digits.
    Upc(String),
    /// Retailer-scoped fallback identity.
    Sku {
        /// The retailer's own product/item ID.
        retailer_sku: String,
        /// Lowercased, whitespace-collapsed display name for keyword search.
        normalized_name: String,
    },
}

impl ProductIdent {
    /// Build a UPC identity, validating digit count.
    pub fn upc(code: impl Into<String>) -> Result<Self, ScoutError> {
        static UPC_REGEX: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"^\d{12,14}$").expect("valid regex"));

        let code = code.into();
        if UPC_REGEX.is_match(&code) {
            Ok(Self::Upc(code))
        } else {
            Err(ScoutError::Validation(format!(
                "invalid UPC: expected 12-14 digits, got '{code}'"
            )))
        }
    }

    /// Build a SKU fallback identity from a raw display name.
    #[must_use]
    pub fn sku(retailer_sku: impl Into<String>, name: &str) -> Self {
        Self::Sku {
            retailer_sku: retailer_sku.into(),
            normalized_name: normalize_name(name),
        }
    }

    /// True when this identity is a UPC (marketplace matches are exact).
    #[must_use]
    pub fn is_upc(&self) -> bool {
        matches!(self, Self::Upc(_))
    }

    /// Canonical string key used for caching and natural-key dedup.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Upc(code) => format!("upc:{code}"),
            Self::Sku { retailer_sku, .. } => format!("sku:{retailer_sku}"),
        }
    }

    /// The term submitted to a marketplace search.
    #[must_use]
    pub fn search_term(&self) -> &str {
        match self {
            Self::Upc(code) => code,
            Self::Sku {
                normalized_name, ..
            } => normalized_name,
        }
    }
}

/// Lowercase a product name and collapse runs of whitespace/punctuation so
/// the same product scraped from two retailers keys identically.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_space = true;
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Retailer markdown category the item was found under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealType {
    /// Clearance markdown
    Clearance,
    /// Walmart rollback pricing
    Rollback,
    /// Home Depot special buy
    SpecialBuy,
}

impl DealType {
    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clearance => "clearance",
            Self::Rollback => "rollback",
            Self::SpecialBuy => "special_buy",
        }
    }

    /// Parse from the lowercase wire form, defaulting to clearance.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "rollback" => Self::Rollback,
            "special_buy" => Self::SpecialBuy,
            _ => Self::Clearance,
        }
    }
}

impl fmt::Display for DealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Listing condition on a marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// New in box
    New,
    /// Used / open box / refurbished
    Used,
}

impl Condition {
    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Used => "used",
        }
    }
}

/// A physical store resolved by the external locator.
///
/// Immutable once resolved; the pipeline never writes back to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    /// Which retailer runs this store
    pub retailer: Retailer,
    /// The retailer's store identifier
    pub store_id: StoreId,
    /// Display name
    pub name: String,
    /// Street address
    pub address: String,
    /// City
    pub city: String,
    /// Two-letter state code
    pub state: String,
    /// ZIP code
    pub zip_code: String,
    /// Latitude, if the locator supplied one
    pub latitude: Option<f64>,
    /// Longitude, if the locator supplied one
    pub longitude: Option<f64>,
    /// Distance from the search origin in miles
    pub distance_miles: Option<f64>,
}

/// A deal-priced item observed at one store at one moment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Which retailer the item was scraped from
    pub retailer: Retailer,
    /// Which store carried the price
    pub store_id: StoreId,
    /// Cross-retailer product identity (UPC preferred)
    pub ident: ProductIdent,
    /// Display name as scraped
    pub product_name: String,
    /// Brand, when the page carried one
    pub brand: Option<String>,
    /// Retailer category, when the page carried one
    pub category: Option<String>,
    /// Current (deal) price in dollars
    pub current_price: f64,
    /// The listed "was" price, when shown
    pub was_price: Option<f64>,
    /// Percent discount vs the was price
    pub discount_percent: Option<f64>,
    /// Which markdown program the item was found under
    pub deal_type: DealType,
    /// Product page URL
    pub product_url: Option<String>,
    /// When the price was observed
    pub observed_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Natural identity of the item within a job: (retailer, store, product).
    #[must_use]
    pub fn item_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.retailer.as_str(),
            self.store_id.as_str(),
            self.ident.key()
        )
    }
}

/// One marketplace listing price observed during a job.
///
/// Quotes are cached for the lifetime of a single job only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Marketplace the listing was found on
    pub marketplace: Marketplace,
    /// Product identity the lookup used
    pub ident: ProductIdent,
    /// Sale price in dollars
    pub price: f64,
    /// Separately-charged shipping, zero when free/included
    pub shipping_cost: f64,
    /// Listing condition
    pub condition: Condition,
    /// Marketplace listing identifier (ASIN, eBay item ID)
    pub listing_id: Option<String>,
    /// Listing URL
    pub listing_url: Option<String>,
    /// Listing title
    pub listing_title: Option<String>,
    /// True when the quote came from a name search rather than a UPC match
    pub low_confidence: bool,
    /// When the price was observed
    pub observed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retailer_roundtrip() {
        for r in [Retailer::Walmart, Retailer::HomeDepot] {
            assert_eq!(Retailer::parse(r.as_str()).expect("parse retailer"), r);
        }
        assert!(Retailer::parse("target").is_err());
    }

    #[test]
    fn test_marketplace_domains() {
        assert_eq!(Marketplace::Amazon.domain(), "www.amazon.com");
        assert_eq!(Marketplace::Ebay.domain(), "api.ebay.com");
    }

    #[test]
    fn test_store_id_valid() {
        for id in ["2648", "HD-0456", "w1"] {
            assert!(StoreId::new(id).is_ok(), "should accept {id}");
        }
    }

    #[test]
    fn test_store_id_invalid() {
        let too_long = "1".repeat(21);
        for id in ["", "store 12", too_long.as_str()] {
            assert!(StoreId::new(id).is_err(), "should reject {id}");
        }
    }

    #[test]
    fn test_upc_validation() {
        assert!(ProductIdent::upc("012345678905").is_ok());
        assert!(ProductIdent::upc("00012345678905").is_ok());
        assert!(ProductIdent::upc("12345").is_err());
        assert!(ProductIdent::upc("01234567890a").is_err());
    }

    #[test]
    fn test_ident_keys_distinct() {
        let upc = ProductIdent::upc("012345678905").expect("valid UPC");
        let sku = ProductIdent::sku("55123", "DeWalt 20V Drill");
        assert_ne!(upc.key(), sku.key());
        assert!(upc.is_upc());
        assert!(!sku.is_upc());
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(
            normalize_name("DeWalt 20V MAX* Drill/Driver Kit"),
            "dewalt 20v max drill driver kit"
        );
        assert_eq!(normalize_name("  Weird   spacing "), "weird spacing");
    }

    #[test]
    fn test_sku_search_term_is_normalized() {
        let sku = ProductIdent::sku("55123", "LEGO Star-Wars Set");
        assert_eq!(sku.search_term(), "lego star wars set");
    }

    #[test]
    fn test_deal_type_parse_defaults() {
        assert_eq!(DealType::parse("rollback"), DealType::Rollback);
        assert_eq!(DealType::parse("whatever"), DealType::Clearance);
    }

    #[test]
    fn test_job_id_unique() {
        assert_ne!(JobId::generate(), JobId::generate());
    }

    #[test]
    fn test_item_key_includes_store() {
        let item = InventoryItem {
            retailer: Retailer::Walmart,
            store_id: StoreId::new("2648").expect("valid store"),
            ident: ProductIdent::upc("012345678905").expect("valid UPC"),
            product_name: "Test".to_string(),
            brand: None,
            category: None,
            current_price: 9.99,
            was_price: None,
            discount_percent: None,
            deal_type: DealType::Clearance,
            product_url: None,
            observed_at: Utc::now(),
        };
        assert_eq!(item.item_key(), "walmart:2648:upc:012345678905");
    }
}
