//! Store records resolved by the external locator.

use crate::error::{DatabaseError, Result};
use chrono::Utc;
use scout_core::{Retailer, Store, StoreId};
use sqlx::{Pool, Row, Sqlite};

/// Insert or refresh a store record keyed by (retailer, store id).
pub async fn upsert_store(pool: &Pool<Sqlite>, store: &Store) -> Result<()> {
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO stores (store_id, retailer, name, address, city, state, zip_code,
                             latitude, longitude, distance_miles, created_at, last_updated)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (retailer, store_id) DO UPDATE SET
             name = excluded.name,
             address = excluded.address,
             city = excluded.city,
             state = excluded.state,
             zip_code = excluded.zip_code,
             latitude = excluded.latitude,
             longitude = excluded.longitude,
             distance_miles = excluded.distance_miles,
             last_updated = excluded.last_updated",
    )
    .bind(store.store_id.as_str())
    .bind(store.retailer.as_str())
    .bind(&store.name)
    .bind(&store.address)
    .bind(&store.city)
    .bind(&store.state)
    .bind(&store.zip_code)
    .bind(store.latitude)
    .bind(store.longitude)
    .bind(store.distance_miles)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(())
}

/// All known stores for a retailer.
pub async fn get_by_retailer(pool: &Pool<Sqlite>, retailer: Retailer) -> Result<Vec<Store>> {
    let rows = sqlx::query(
        "SELECT store_id, retailer, name, address, city, state, zip_code,
                latitude, longitude, distance_miles
         FROM stores
         WHERE retailer = ?
         ORDER BY store_id",
    )
    .bind(retailer.as_str())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(|row| parse_store(&row)).collect()
}

/// Stores for a retailer around a ZIP code, optionally radius-filtered.
pub async fn get_by_zip(
    pool: &Pool<Sqlite>,
    retailer: Retailer,
    zip_code: &str,
    radius_miles: Option<f64>,
) -> Result<Vec<Store>> {
    let rows = sqlx::query(
        "SELECT store_id, retailer, name, address, city, state, zip_code,
                latitude, longitude, distance_miles
         FROM stores
         WHERE retailer = ? AND zip_code = ?
         ORDER BY distance_miles",
    )
    .bind(retailer.as_str())
    .bind(zip_code)
    .fetch_all(pool)
    .await?;

    let mut stores = Vec::new();
    for row in rows {
        let store = parse_store(&row)?;
        if let Some(radius) = radius_miles {
            if store.distance_miles.is_some_and(|d| d > radius) {
                continue;
            }
        }
        stores.push(store);
    }
    Ok(stores)
}

fn parse_store(row: &sqlx::sqlite::SqliteRow) -> Result<Store> {
    let retailer_str: String = row.try_get("retailer")?;
    let retailer =
        Retailer::parse(&retailer_str).map_err(|e| DatabaseError::Decode(e.to_string()))?;
    let store_id_str: String = row.try_get("store_id")?;
    let store_id = StoreId::new(store_id_str).map_err(|e| DatabaseError::Decode(e.to_string()))?;

    Ok(Store {
        retailer,
        store_id,
        name: row.try_get("name")?,
        address: row.try_get("address")?,
        city: row.try_get("city")?,
        state: row.try_get("state")?,
        zip_code: row.try_get("zip_code")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        distance_miles: row.try_get("distance_miles")?,
    })
}
