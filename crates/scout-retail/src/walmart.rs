//! Walmart store-filtered deal searches.
//!
//! Walmart renders search results through Next.js, so the reliable path is
//! the `__NEXT_DATA__` JSON blob embedded in the page. The DOM fallback only
//! sees whatever was server-rendered and carries less detail (no UPC, no was
//! price), so those items land as SKU identities.

use crate::parse;
use crate::site::{ListingPage, RetailerSite};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use scout_core::{DealType, InventoryItem, ProductIdent, Retailer, Store};
use scout_fetch::{Content, FetchTarget};
use scraper::{Html, Selector};

const BASE_URL: &str = "https://www.walmart.com";

/// DOM-fallback item cap per page.
const HTML_FALLBACK_LIMIT: usize = 20;

static NEXT_DATA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<script id="__NEXT_DATA__"[^>]*>(.*?)</script>"#).expect("valid pattern")
});

static ITEM_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[data-item-id]").expect("valid selector"));
static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"[data-automation-id="product-title"]"#).expect("valid selector")
});
static PRICE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"[data-automation-id="product-price"]"#).expect("valid selector")
});

/// Walmart [`RetailerSite`]: clearance and rollback searches pinned to a
/// store via the `store_led` affinity override.
#[derive(Debug, Default)]
pub struct WalmartSite;

impl RetailerSite for WalmartSite {
    fn retailer(&self) -> Retailer {
        Retailer::Walmart
    }

    fn listing_pages(&self, store: &Store) -> Vec<ListingPage> {
        [(DealType::Clearance, "clearance"), (DealType::Rollback, "rollback")]
            .into_iter()
            .map(|(deal_type, query)| ListingPage {
                deal_type,
                target: FetchTarget::new(format!(
                    "{BASE_URL}/search?q={query}&affinityOverride=store_led&store={}",
                    store.store_id
                )),
            })
            .collect()
    }

    fn parse_listing(
        &self,
        content: &Content,
        deal_type: DealType,
        store: &Store,
    ) -> Vec<InventoryItem> {
        if let Some(data) = parse::extract_embedded_json(&content.body, &NEXT_DATA) {
            let items = parse_next_data(&data, deal_type, store);
            if !items.is_empty() {
                return items;
            }
        }
        parse_html_fallback(&content.body, deal_type, store)
    }
}

fn parse_next_data(
    data: &serde_json::Value,
    deal_type: DealType,
    store: &Store,
) -> Vec<InventoryItem> {
    let Some(stacks) = data
        .pointer("/props/pageProps/initialData/searchResult/itemStacks")
        .and_then(serde_json::Value::as_array)
    else {
        tracing::debug!("no itemStacks in __NEXT_DATA__");
        return Vec::new();
    };

    let mut items = Vec::new();
    for stack in stacks {
        let Some(products) = stack.get("items").and_then(serde_json::Value::as_array) else {
            continue;
        };
        for product in products {
            match parse_product(product, deal_type, store) {
                Some(item) => items.push(item),
                None => tracing::debug!("skipping unparseable walmart product"),
            }
        }
    }
    items
}

fn parse_product(
    product: &serde_json::Value,
    deal_type: DealType,
    store: &Store,
) -> Option<InventoryItem> {
    let product_id = product
        .get("id")
        .or_else(|| product.get("usItemId"))
        .and_then(json_id)?;

    let current_price = product
        .pointer("/price/currentPrice/price")
        .and_then(serde_json::Value::as_f64)
        .filter(|p| *p > 0.0)?;
    let was_price = product
        .pointer("/price/wasPrice/price")
        .and_then(serde_json::Value::as_f64)
        .filter(|p| *p > 0.0);

    let name = product
        .get("name")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("Unknown Product")
        .to_string();

    let upc = product
        .get("upc")
        .or_else(|| product.get("gtin"))
        .and_then(serde_json::Value::as_str);
    let ident = match upc.and_then(|code| ProductIdent::upc(code).ok()) {
        Some(ident) => ident,
        None => ProductIdent::sku(&product_id, &name),
    };

    Some(InventoryItem {
        retailer: Retailer::Walmart,
        store_id: store.store_id.clone(),
        ident,
        product_name: name,
        brand: non_empty_str(product.get("brand")),
        category: non_empty_str(product.get("category")),
        current_price,
        was_price,
        discount_percent: parse::discount_percent(current_price, was_price),
        deal_type,
        product_url: Some(format!("{BASE_URL}/ip/{product_id}")),
        observed_at: Utc::now(),
    })
}

fn parse_html_fallback(html: &str, deal_type: DealType, store: &Store) -> Vec<InventoryItem> {
    let document = Html::parse_document(html);
    let mut items = Vec::new();

    for element in document.select(&ITEM_SELECTOR).take(HTML_FALLBACK_LIMIT) {
        let Some(product_id) = element.value().attr("data-item-id") else {
            continue;
        };
        let name = element
            .select(&TITLE_SELECTOR)
            .next()
            .map(|e| e.text().collect::<String>().trim().to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        let Some(current_price) = element
            .select(&PRICE_SELECTOR)
            .next()
            .and_then(|e| parse::parse_price_text(&e.text().collect::<String>()))
        else {
            continue;
        };

        items.push(InventoryItem {
            retailer: Retailer::Walmart,
            store_id: store.store_id.clone(),
            ident: ProductIdent::sku(product_id, &name),
            product_name: name,
            brand: None,
            category: None,
            current_price,
            was_price: None,
            discount_percent: None,
            deal_type,
            product_url: Some(format!("{BASE_URL}/ip/{product_id}")),
            observed_at: Utc::now(),
        });
    }
    items
}

fn json_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty_str(value: Option<&serde_json::Value>) -> Option<String> {
    value
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
