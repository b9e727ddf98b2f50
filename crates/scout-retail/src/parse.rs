//! Shared extraction helpers: UPC patterns, price text, embedded JSON blobs.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

/// Regex patterns that pull a UPC/GTIN out of raw page source.
///
/// Ordered by reliability; the first 12+ digit capture wins.
static UPC_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#""upc":"(\d{12})""#,
        r#""gtin":"(\d{14})""#,
        r#""gtin14":"(\d{14})""#,
        r#"data-upc="(\d{12})""#,
        r#""barcode":"(\d{12,14})""#,
        r#""ean":"(\d{13})""#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid UPC pattern"))
    .collect()
});

static JSON_LD_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid selector")
});

static PRICE_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([\d,]+\.?\d*)").expect("valid price pattern"));

/// Extract a UPC/GTIN from raw page source.
///
/// Tries the inline patterns first, then JSON-LD structured data
/// (`gtin`/`gtin14`/`gtin13`/`gtin12`, including nested offers).
pub fn extract_upc(html: &str) -> Option<String> {
    for pattern in UPC_PATTERNS.iter() {
        for captures in pattern.captures_iter(html) {
            let code = &captures[1];
            if code.len() >= 12 {
                return Some(code.to_string());
            }
        }
    }

    let document = Html::parse_document(html);
    for script in document.select(&JSON_LD_SELECTOR) {
        let text: String = script.text().collect();
        let Ok(data) = serde_json::from_str::<serde_json::Value>(&text) else {
            continue;
        };
        if let Some(gtin) = json_ld_gtin(&data) {
            return Some(gtin);
        }
    }

    None
}

fn json_ld_gtin(data: &serde_json::Value) -> Option<String> {
    for key in ["gtin", "gtin14", "gtin13", "gtin12"] {
        if let Some(code) = data.get(key).and_then(gtin_string) {
            return Some(code);
        }
    }
    let offers = data.get("offers")?;
    for key in ["gtin", "gtin14"] {
        if let Some(code) = offers.get(key).and_then(gtin_string) {
            return Some(code);
        }
    }
    None
}

fn gtin_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a display price like `$1,299.99` into dollars.
pub fn parse_price_text(text: &str) -> Option<f64> {
    let captures = PRICE_TEXT.captures(text)?;
    captures[1].replace(',', "").parse().ok()
}

/// Percent discount vs the was price, rounded to two decimals.
///
/// Returns `None` unless the was price actually exceeds the current price.
pub fn discount_percent(current: f64, was: Option<f64>) -> Option<f64> {
    let was = was?;
    if was > current && was > 0.0 {
        Some(((was - current) / was * 100.0 * 100.0).round() / 100.0)
    } else {
        None
    }
}

/// Grab an embedded JSON blob out of page source with the given pattern.
///
/// The pattern must have exactly one capture group around the JSON text.
pub fn extract_embedded_json(html: &str, pattern: &Regex) -> Option<serde_json::Value> {
    let captures = pattern.captures(html)?;
    serde_json::from_str(&captures[1]).ok()
}
