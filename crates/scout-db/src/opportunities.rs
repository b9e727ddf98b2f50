//! Ranked opportunity persistence.
//!
//! Opportunities carry a natural key (retailer, store, product, marketplace):
//! a re-run of the same search upserts the existing row instead of piling up
//! duplicates, and stale rows are soft-invalidated rather than deleted.

use crate::error::{DatabaseError, Result};
use crate::parse_timestamp;
use chrono::{DateTime, Duration, Utc};
use scout_core::{Marketplace, Retailer};
use scout_profit::Opportunity;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// One persisted opportunity row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityRow {
    /// Surrogate id, stable across upserts
    pub id: String,
    /// Retailer the item was found at
    pub retailer: Retailer,
    /// Store carrying the deal price
    pub store_id: String,
    /// Product identity key (`upc:…` / `sku:…`)
    pub product_key: String,
    /// Marketplace to sell through
    pub marketplace: Marketplace,
    /// Display name
    pub product_name: String,
    /// In-store buy price
    pub buy_price: f64,
    /// Marketplace sell price
    pub sell_price: f64,
    /// Total marketplace fees
    pub total_fees: f64,
    /// Net profit after all costs
    pub net_profit: f64,
    /// Margin percentage
    pub margin_pct: f64,
    /// Return on investment percentage
    pub roi_pct: f64,
    /// Composite ranking score
    pub score: f64,
    /// 1-based rank within the producing job
    pub rank: u32,
    /// Name-match quote rather than UPC match
    pub low_confidence: bool,
    /// Marketplace listing URL
    pub listing_url: Option<String>,
    /// False once aged out or superseded
    pub is_valid: bool,
    /// When the row was invalidated
    pub invalidated_at: Option<DateTime<Utc>>,
    /// First time this opportunity was seen
    pub created_at: DateTime<Utc>,
    /// Last upsert time
    pub last_updated: DateTime<Utc>,
}

/// Insert or refresh an opportunity by its natural key.
///
/// An upsert revalidates a previously invalidated row; `created_at` and the
/// surrogate id are preserved from the first sighting.
pub async fn upsert_opportunity(pool: &Pool<Sqlite>, opportunity: &Opportunity) -> Result<()> {
    let analysis = &opportunity.analysis;
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO opportunities
             (id, retailer, store_id, product_key, marketplace, product_name,
              buy_price, sell_price, total_fees, net_profit, margin_pct, roi_pct,
              score, rank, low_confidence, listing_url, is_valid, invalidated_at,
              created_at, last_updated)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, NULL, ?, ?)
         ON CONFLICT (retailer, store_id, product_key, marketplace) DO UPDATE SET
             product_name = excluded.product_name,
             buy_price = excluded.buy_price,
             sell_price = excluded.sell_price,
             total_fees = excluded.total_fees,
             net_profit = excluded.net_profit,
             margin_pct = excluded.margin_pct,
             roi_pct = excluded.roi_pct,
             score = excluded.score,
             rank = excluded.rank,
             low_confidence = excluded.low_confidence,
             listing_url = excluded.listing_url,
             is_valid = 1,
             invalidated_at = NULL,
             last_updated = excluded.last_updated",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(analysis.item.retailer.as_str())
    .bind(analysis.item.store_id.as_str())
    .bind(analysis.item.ident.key())
    .bind(analysis.quote.marketplace.as_str())
    .bind(&analysis.item.product_name)
    .bind(analysis.item.current_price)
    .bind(analysis.quote.price)
    .bind(analysis.total_fees)
    .bind(analysis.net_profit)
    .bind(analysis.margin_pct)
    .bind(analysis.roi_pct)
    .bind(opportunity.score)
    .bind(i64::from(opportunity.rank))
    .bind(analysis.low_confidence)
    .bind(&analysis.quote.listing_url)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Valid opportunities above the given thresholds, best score first.
pub async fn list_valid(
    pool: &Pool<Sqlite>,
    min_profit: Option<f64>,
    min_margin_pct: Option<f64>,
    limit: i64,
) -> Result<Vec<OpportunityRow>> {
    let rows = sqlx::query(
        "SELECT id, retailer, store_id, product_key, marketplace, product_name,
                buy_price, sell_price, total_fees, net_profit, margin_pct, roi_pct,
                score, rank, low_confidence, listing_url, is_valid, invalidated_at,
                created_at, last_updated
         FROM opportunities
         WHERE is_valid = 1
           AND net_profit >= COALESCE(?, net_profit)
           AND margin_pct >= COALESCE(?, margin_pct)
         ORDER BY score DESC
         LIMIT ?",
    )
    .bind(min_profit)
    .bind(min_margin_pct)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(|row| parse_row(&row)).collect()
}

/// Soft-invalidate one row by surrogate id.
pub async fn invalidate(pool: &Pool<Sqlite>, id: &str) -> Result<()> {
    let result = sqlx::query(
        "UPDATE opportunities SET is_valid = 0, invalidated_at = ? WHERE id = ? AND is_valid = 1",
    )
    .bind(Utc::now().to_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound(format!(
            "valid opportunity '{id}' not found"
        )));
    }
    Ok(())
}

/// Age out opportunities whose last update is older than `hours`.
///
/// Returns the number of rows invalidated.
pub async fn invalidate_older_than(pool: &Pool<Sqlite>, hours: i64) -> Result<u64> {
    let cutoff = (Utc::now() - Duration::hours(hours)).to_rfc3339();
    let result = sqlx::query(
        "UPDATE opportunities
         SET is_valid = 0, invalidated_at = ?
         WHERE is_valid = 1 AND last_updated < ?",
    )
    .bind(Utc::now().to_rfc3339())
    .bind(&cutoff)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

fn parse_row(row: &sqlx::sqlite::SqliteRow) -> Result<OpportunityRow> {
    let retailer_str: String = row.try_get("retailer")?;
    let retailer =
        Retailer::parse(&retailer_str).map_err(|e| DatabaseError::Decode(e.to_string()))?;
    let marketplace_str: String = row.try_get("marketplace")?;
    let marketplace =
        Marketplace::parse(&marketplace_str).map_err(|e| DatabaseError::Decode(e.to_string()))?;

    let created_at_str: String = row.try_get("created_at")?;
    let last_updated_str: String = row.try_get("last_updated")?;
    let invalidated_at: Option<String> = row.try_get("invalidated_at")?;

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let rank = row.try_get::<i64, _>("rank")? as u32;

    Ok(OpportunityRow {
        id: row.try_get("id")?,
        retailer,
        store_id: row.try_get("store_id")?,
        product_key: row.try_get("product_key")?,
        marketplace,
        product_name: row.try_get("product_name")?,
        buy_price: row.try_get("buy_price")?,
        sell_price: row.try_get("sell_price")?,
        total_fees: row.try_get("total_fees")?,
        net_profit: row.try_get("net_profit")?,
        margin_pct: row.try_get("margin_pct")?,
        roi_pct: row.try_get("roi_pct")?,
        score: row.try_get("score")?,
        rank,
        low_confidence: row.try_get("low_confidence")?,
        listing_url: row.try_get("listing_url")?,
        is_valid: row.try_get("is_valid")?,
        invalidated_at: invalidated_at.as_deref().map(parse_timestamp),
        created_at: parse_timestamp(&created_at_str),
        last_updated: parse_timestamp(&last_updated_str),
    })
}
