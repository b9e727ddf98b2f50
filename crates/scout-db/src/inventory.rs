//! Append-only inventory observations.
//!
//! Each scrape inserts fresh rows tied to the job that produced them; rows
//! are never updated in place.

use crate::error::{DatabaseError, Result};
use crate::{ident_from_key, parse_timestamp};
use scout_core::{DealType, InventoryItem, JobId, Retailer, StoreId};
use sqlx::{Pool, Row, Sqlite};

/// Record a batch of scraped items for a job. Returns the number inserted.
pub async fn record_items(
    pool: &Pool<Sqlite>,
    job_id: &JobId,
    items: &[InventoryItem],
) -> Result<u64> {
    let mut inserted = 0;
    for item in items {
        sqlx::query(
            "INSERT INTO inventory_items
                 (id, job_id, retailer, store_id, product_key, product_name, brand, category,
                  current_price, was_price, discount_percent, deal_type, product_url, observed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(job_id.as_str())
        .bind(item.retailer.as_str())
        .bind(item.store_id.as_str())
        .bind(item.ident.key())
        .bind(&item.product_name)
        .bind(&item.brand)
        .bind(&item.category)
        .bind(item.current_price)
        .bind(item.was_price)
        .bind(item.discount_percent)
        .bind(item.deal_type.as_str())
        .bind(&item.product_url)
        .bind(item.observed_at.to_rfc3339())
        .execute(pool)
        .await?;
        inserted += 1;
    }
    Ok(inserted)
}

/// All items observed during one job, in insertion order.
pub async fn get_by_job(pool: &Pool<Sqlite>, job_id: &JobId) -> Result<Vec<InventoryItem>> {
    let rows = sqlx::query(
        "SELECT retailer, store_id, product_key, product_name, brand, category,
                current_price, was_price, discount_percent, deal_type, product_url, observed_at
         FROM inventory_items
         WHERE job_id = ?
         ORDER BY rowid",
    )
    .bind(job_id.as_str())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(|row| parse_item(&row)).collect()
}

/// Items at or above a minimum discount, steepest first.
pub async fn get_deals(pool: &Pool<Sqlite>, min_discount: f64) -> Result<Vec<InventoryItem>> {
    let rows = sqlx::query(
        "SELECT retailer, store_id, product_key, product_name, brand, category,
                current_price, was_price, discount_percent, deal_type, product_url, observed_at
         FROM inventory_items
         WHERE discount_percent >= ?
         ORDER BY discount_percent DESC",
    )
    .bind(min_discount)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(|row| parse_item(&row)).collect()
}

fn parse_item(row: &sqlx::sqlite::SqliteRow) -> Result<InventoryItem> {
    let retailer_str: String = row.try_get("retailer")?;
    let retailer =
        Retailer::parse(&retailer_str).map_err(|e| DatabaseError::Decode(e.to_string()))?;
    let store_id_str: String = row.try_get("store_id")?;
    let store_id = StoreId::new(store_id_str).map_err(|e| DatabaseError::Decode(e.to_string()))?;

    let product_name: String = row.try_get("product_name")?;
    let product_key: String = row.try_get("product_key")?;
    let ident = ident_from_key(&product_key, &product_name)?;

    let deal_type_str: String = row.try_get("deal_type")?;
    let observed_at_str: String = row.try_get("observed_at")?;

    Ok(InventoryItem {
        retailer,
        store_id,
        ident,
        product_name,
        brand: row.try_get("brand")?,
        category: row.try_get("category")?,
        current_price: row.try_get("current_price")?,
        was_price: row.try_get("was_price")?,
        discount_percent: row.try_get("discount_percent")?,
        deal_type: DealType::parse(&deal_type_str),
        product_url: row.try_get("product_url")?,
        observed_at: parse_timestamp(&observed_at_str),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{search_jobs, Database};
    use chrono::Utc;
    use scout_core::ProductIdent;

    async fn setup_test_db() -> (Database, JobId) {
        let db = Database::open_in_memory().await.expect("open database");
        db.run_migrations().await.expect("run migrations");

        let job_id = JobId::generate();
        search_jobs::create_search_job(
            db.pool(),
            &job_id,
            Some("62704"),
            Some(20.0),
            &[Retailer::Walmart],
        )
        .await
        .expect("create job");

        (db, job_id)
    }

    fn item(sku: &str, discount: Option<f64>) -> InventoryItem {
        InventoryItem {
            retailer: Retailer::Walmart,
            store_id: StoreId::new("2648").expect("valid store id"),
            ident: ProductIdent::sku(sku, "LEGO Star Wars Set"),
            product_name: "LEGO Star Wars Set".to_string(),
            brand: Some("LEGO".to_string()),
            category: Some("Toys".to_string()),
            current_price: 24.97,
            was_price: discount.map(|_| 49.99),
            discount_percent: discount,
            deal_type: DealType::Clearance,
            product_url: Some("https://www.walmart.com/ip/123".to_string()),
            observed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_record_and_get_by_job() {
        let (db, job_id) = setup_test_db().await;

        let inserted = record_items(db.pool(), &job_id, &[item("a", None), item("b", None)])
            .await
            .expect("record items");
        assert_eq!(inserted, 2);

        let items = get_by_job(db.pool(), &job_id).await.expect("get items");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].ident.key(), "sku:a");
        assert_eq!(items[0].product_name, "LEGO Star Wars Set");
        assert_eq!(items[0].deal_type, DealType::Clearance);
    }

    #[tokio::test]
    async fn test_upc_ident_survives_roundtrip() {
        let (db, job_id) = setup_test_db().await;

        let mut upc_item = item("ignored", None);
        upc_item.ident = ProductIdent::upc("012345678905").expect("valid upc");
        record_items(db.pool(), &job_id, &[upc_item])
            .await
            .expect("record item");

        let items = get_by_job(db.pool(), &job_id).await.expect("get items");
        assert!(items[0].ident.is_upc());
        assert_eq!(items[0].ident.key(), "upc:012345678905");
    }

    #[tokio::test]
    async fn test_get_deals_filters_and_orders() {
        let (db, job_id) = setup_test_db().await;

        record_items(
            db.pool(),
            &job_id,
            &[
                item("shallow", Some(10.0)),
                item("steep", Some(60.0)),
                item("mid", Some(35.0)),
            ],
        )
        .await
        .expect("record items");

        let deals = get_deals(db.pool(), 20.0).await.expect("get deals");
        assert_eq!(deals.len(), 2);
        assert_eq!(deals[0].ident.key(), "sku:steep");
        assert_eq!(deals[1].ident.key(), "sku:mid");
    }

    #[tokio::test]
    async fn test_rescrape_appends_rather_than_updates() {
        let (db, job_id) = setup_test_db().await;

        record_items(db.pool(), &job_id, &[item("a", None)])
            .await
            .expect("first scrape");
        record_items(db.pool(), &job_id, &[item("a", None)])
            .await
            .expect("second scrape");

        let items = get_by_job(db.pool(), &job_id).await.expect("get items");
        assert_eq!(items.len(), 2);
    }
}
