//! Marketplace price quote history.

use crate::error::Result;
use crate::{ident_from_key, parse_timestamp};
use scout_core::{Condition, JobId, Marketplace, PriceQuote};
use sqlx::{Pool, Row, Sqlite};

/// Record a batch of quotes fetched during a job. Returns the number inserted.
pub async fn record_quotes(
    pool: &Pool<Sqlite>,
    job_id: &JobId,
    quotes: &[PriceQuote],
) -> Result<u64> {
    let mut inserted = 0;
    for quote in quotes {
        sqlx::query(
            "INSERT INTO price_quotes
                 (id, job_id, marketplace, product_key, price, shipping_cost, condition,
                  listing_id, listing_url, listing_title, low_confidence, observed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(job_id.as_str())
        .bind(quote.marketplace.as_str())
        .bind(quote.ident.key())
        .bind(quote.price)
        .bind(quote.shipping_cost)
        .bind(quote.condition.as_str())
        .bind(&quote.listing_id)
        .bind(&quote.listing_url)
        .bind(&quote.listing_title)
        .bind(quote.low_confidence)
        .bind(quote.observed_at.to_rfc3339())
        .execute(pool)
        .await?;
        inserted += 1;
    }
    Ok(inserted)
}

/// Quote history for one product identity on one marketplace, newest first.
pub async fn get_by_ident(
    pool: &Pool<Sqlite>,
    marketplace: Marketplace,
    product_key: &str,
) -> Result<Vec<PriceQuote>> {
    let rows = sqlx::query(
        "SELECT marketplace, product_key, price, shipping_cost, condition,
                listing_id, listing_url, listing_title, low_confidence, observed_at
         FROM price_quotes
         WHERE marketplace = ? AND product_key = ?
         ORDER BY observed_at DESC",
    )
    .bind(marketplace.as_str())
    .bind(product_key)
    .fetch_all(pool)
    .await?;

    let mut quotes = Vec::new();
    for row in rows {
        let product_key: String = row.try_get("product_key")?;
        let listing_title: Option<String> = row.try_get("listing_title")?;
        let ident = ident_from_key(&product_key, listing_title.as_deref().unwrap_or(""))?;

        let condition_str: String = row.try_get("condition")?;
        let condition = if condition_str == "new" {
            Condition::New
        } else {
            Condition::Used
        };

        let observed_at_str: String = row.try_get("observed_at")?;

        quotes.push(PriceQuote {
            marketplace,
            ident,
            price: row.try_get("price")?,
            shipping_cost: row.try_get("shipping_cost")?,
            condition,
            listing_id: row.try_get("listing_id")?,
            listing_url: row.try_get("listing_url")?,
            listing_title,
            low_confidence: row.try_get("low_confidence")?,
            observed_at: parse_timestamp(&observed_at_str),
        });
    }
    Ok(quotes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{search_jobs, Database};
    use chrono::Utc;
    use scout_core::{ProductIdent, Retailer};

    async fn setup_test_db() -> (Database, JobId) {
        let db = Database::open_in_memory().await.expect("open database");
        db.run_migrations().await.expect("run migrations");

        let job_id = JobId::generate();
        search_jobs::create_search_job(db.pool(), &job_id, None, None, &[Retailer::Walmart])
            .await
            .expect("create job");

        (db, job_id)
    }

    fn quote(marketplace: Marketplace, price: f64) -> PriceQuote {
        PriceQuote {
            marketplace,
            ident: ProductIdent::upc("012345678905").expect("valid upc"),
            price,
            shipping_cost: 0.0,
            condition: Condition::New,
            listing_id: Some("B01ABCDEFG".to_string()),
            listing_url: Some("https://www.amazon.com/dp/B01ABCDEFG".to_string()),
            listing_title: Some("LEGO Star Wars Set".to_string()),
            low_confidence: false,
            observed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_record_and_get_by_ident() {
        let (db, job_id) = setup_test_db().await;

        let inserted = record_quotes(
            db.pool(),
            &job_id,
            &[
                quote(Marketplace::Amazon, 29.99),
                quote(Marketplace::Ebay, 27.50),
            ],
        )
        .await
        .expect("record quotes");
        assert_eq!(inserted, 2);

        let amazon = get_by_ident(db.pool(), Marketplace::Amazon, "upc:012345678905")
            .await
            .expect("get quotes");
        assert_eq!(amazon.len(), 1);
        assert_eq!(amazon[0].price, 29.99);
        assert_eq!(amazon[0].condition, Condition::New);
        assert!(amazon[0].ident.is_upc());
    }

    #[tokio::test]
    async fn test_low_confidence_flag_roundtrip() {
        let (db, job_id) = setup_test_db().await;

        let mut q = quote(Marketplace::Ebay, 19.99);
        q.ident = ProductIdent::sku("wm-123", "LEGO Star Wars Set");
        q.low_confidence = true;
        record_quotes(db.pool(), &job_id, &[q])
            .await
            .expect("record quote");

        let quotes = get_by_ident(db.pool(), Marketplace::Ebay, "sku:wm-123")
            .await
            .expect("get quotes");
        assert_eq!(quotes.len(), 1);
        assert!(quotes[0].low_confidence);
    }
}
