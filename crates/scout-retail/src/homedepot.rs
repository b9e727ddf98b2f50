//! Home Depot clearance and special-buy pages.
//!
//! Deal listings hydrate from a `window.__INITIAL_STATE__` blob; the DOM
//! fallback keys off `data-productid` attributes and is best-effort only.
//! Listing URLs are store-agnostic, so the driver relies on the locator
//! having pinned the store upstream and records items under that store.

use crate::parse;
use crate::site::{ListingPage, RetailerSite};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use scout_core::{DealType, InventoryItem, ProductIdent, Retailer, Store};
use scout_fetch::{Content, FetchTarget};
use scraper::{Html, Selector};

const BASE_URL: &str = "https://www.homedepot.com";

const HTML_FALLBACK_LIMIT: usize = 20;

static INITIAL_STATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)window\.__INITIAL_STATE__\s*=\s*(\{.*?\});").expect("valid pattern")
});

static ITEM_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[data-productid]").expect("valid selector"));
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".product-title, .product-name").expect("valid selector"));
static PRICE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"[class*="price"]"#).expect("valid selector"));

/// Home Depot [`RetailerSite`]: the clearance browse node and the special-buy
/// category page.
#[derive(Debug, Default)]
pub struct HomeDepotSite;

impl RetailerSite for HomeDepotSite {
    fn retailer(&self) -> Retailer {
        Retailer::HomeDepot
    }

    fn listing_pages(&self, _store: &Store) -> Vec<ListingPage> {
        vec![
            ListingPage {
                deal_type: DealType::Clearance,
                target: FetchTarget::new(format!("{BASE_URL}/b/Clearance/N-5yc1vZ1z0z7d")),
            },
            ListingPage {
                deal_type: DealType::SpecialBuy,
                target: FetchTarget::new(format!("{BASE_URL}/c/Special_Buy")),
            },
        ]
    }

    fn parse_listing(
        &self,
        content: &Content,
        deal_type: DealType,
        store: &Store,
    ) -> Vec<InventoryItem> {
        if let Some(data) = parse::extract_embedded_json(&content.body, &INITIAL_STATE) {
            let items = parse_initial_state(&data, deal_type, store);
            if !items.is_empty() {
                return items;
            }
        }
        parse_html_fallback(&content.body, deal_type, store)
    }
}

fn parse_initial_state(
    data: &serde_json::Value,
    deal_type: DealType,
    store: &Store,
) -> Vec<InventoryItem> {
    let Some(results) = data
        .pointer("/search/results")
        .and_then(serde_json::Value::as_array)
    else {
        tracing::debug!("no search results in __INITIAL_STATE__");
        return Vec::new();
    };

    results
        .iter()
        .filter_map(|product| {
            let item = parse_product(product, deal_type, store);
            if item.is_none() {
                tracing::debug!("skipping unparseable home depot product");
            }
            item
        })
        .collect()
}

fn parse_product(
    product: &serde_json::Value,
    deal_type: DealType,
    store: &Store,
) -> Option<InventoryItem> {
    let product_id = product
        .get("productId")
        .or_else(|| product.get("itemId"))
        .and_then(json_id)?;

    // Deal price lives under the markdown program key; fall back to the
    // plain price node.
    let current_price = product
        .pointer("/pricing/specialBuy/price")
        .or_else(|| product.pointer("/pricing/clearance/price"))
        .or_else(|| product.pointer("/price/value"))
        .and_then(serde_json::Value::as_f64)
        .filter(|p| *p > 0.0)?;
    let was_price = product
        .pointer("/pricing/originalPrice/price")
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
        retailer: Retailer::HomeDepot,
        store_id: store.store_id.clone(),
        ident,
        product_name: name,
        brand: product
            .pointer("/brand/name")
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        category: product
            .get("category")
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        current_price,
        was_price,
        discount_percent: parse::discount_percent(current_price, was_price),
        deal_type,
        product_url: Some(format!("{BASE_URL}/p/{product_id}")),
        observed_at: Utc::now(),
    })
}

fn parse_html_fallback(html: &str, deal_type: DealType, store: &Store) -> Vec<InventoryItem> {
    let document = Html::parse_document(html);
    let mut items = Vec::new();

    for element in document.select(&ITEM_SELECTOR).take(HTML_FALLBACK_LIMIT) {
        let Some(product_id) = element.value().attr("data-productid") else {
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
            retailer: Retailer::HomeDepot,
            store_id: store.store_id.clone(),
            ident: ProductIdent::sku(product_id, &name),
            product_name: name,
            brand: None,
            category: None,
            current_price,
            was_price: None,
            discount_percent: None,
            deal_type,
            product_url: Some(format!("{BASE_URL}/p/{product_id}")),
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

#[cfg(test)]
mod tests {
    use super::*;
    use scout_core::StoreId;

    fn store() -> Store {
        Store {
            retailer: Retailer::HomeDepot,
            store_id: StoreId::new("0456").expect("valid store"),
            name: "Home Depot #0456".to_string(),
            address: "200 Commerce Dr".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            zip_code: "62702".to_string(),
            latitude: None,
            longitude: None,
            distance_miles: Some(5.1),
        }
    }

    fn state_page(results: &str) -> String {
        format!(
            concat!(
                r#"<html><body><script>window.__INITIAL_STATE__ = "#,
                r#"{{"search":{{"results":[{}]}}}};</script></body></html>"#
            ),
            results
        )
    }

    #[test]
    fn test_listing_pages() {
        let pages = HomeDepotSite.listing_pages(&store());
        assert_eq!(pages.len(), 2);
        assert!(pages[0].target.url.contains("/b/Clearance/"));
        assert!(pages[1].target.url.contains("/c/Special_Buy"));
    }

    #[test]
    fn test_parse_clearance_pricing() {
        let html = state_page(
            r#"{"productId":"312456789","name":"Ryobi 18V Blower","brand":{"name":"Ryobi"},
               "upc":"033287175673",
               "pricing":{"clearance":{"price":59.0},"originalPrice":{"price":99.0}}}"#,
        );
        let content = Content {
            url: "x".to_string(),
            body: html,
        };
        let items = HomeDepotSite.parse_listing(&content, DealType::Clearance, &store());

        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert!(item.ident.is_upc());
        assert_eq!(item.brand.as_deref(), Some("Ryobi"));
        assert_eq!(item.current_price, 59.0);
        assert_eq!(item.discount_percent, Some(40.4));
        assert_eq!(
            item.product_url.as_deref(),
            Some("https://www.homedepot.com/p/312456789")
        );
    }

    #[test]
    fn test_plain_price_fallback() {
        let html = state_page(
            r#"{"itemId":"445566","name":"Shop Vac","price":{"value":39.88}}"#,
        );
        let content = Content {
            url: "x".to_string(),
            body: html,
        };
        let items = HomeDepotSite.parse_listing(&content, DealType::SpecialBuy, &store());

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].current_price, 39.88);
        assert_eq!(items[0].ident.key(), "sku:445566");
    }

    #[test]
    fn test_html_fallback() {
        let html = r#"<html><body>
            <div data-productid="9001" class="product-pod">
              <span class="product-title">Fallback Saw</span>
              <div class="price-display">$89.00</div>
            </div>
        </body></html>"#;
        let content = Content {
            url: "x".to_string(),
            body: html.to_string(),
        };
        let items = HomeDepotSite.parse_listing(&content, DealType::Clearance, &store());

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_name, "Fallback Saw");
        assert_eq!(items[0].current_price, 89.0);
    }
}
