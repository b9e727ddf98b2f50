//! Fee schedule overrides.
//!
//! The built-in US schedule is the baseline; the `fee_overrides` table holds
//! per-marketplace category referral rates layered on top of it. The
//! migration seeds the known non-default rate (Amazon Clothing at 17%).

use crate::error::{DatabaseError, Result};
use scout_core::Marketplace;
use scout_profit::FeeSchedule;
use sqlx::{Pool, Sqlite};

/// Load the fee schedule: defaults plus any stored category overrides.
pub async fn load_fee_schedule(pool: &Pool<Sqlite>) -> Result<FeeSchedule> {
    let mut schedule = FeeSchedule::default_us();

    let rows: Vec<(String, String, f64)> =
        sqlx::query_as("SELECT marketplace, category, referral_rate FROM fee_overrides")
            .fetch_all(pool)
            .await?;

    for (marketplace, category, rate) in rows {
        let marketplace =
            Marketplace::parse(&marketplace).map_err(|e| DatabaseError::Decode(e.to_string()))?;
        let fees = match marketplace {
            Marketplace::Amazon => &mut schedule.amazon,
            Marketplace::Ebay => &mut schedule.ebay,
        };
        fees.category_referral.insert(category, rate);
    }

    Ok(schedule)
}

/// Insert or replace one category referral-rate override.
pub async fn set_override(
    pool: &Pool<Sqlite>,
    marketplace: Marketplace,
    category: &str,
    referral_rate: f64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO fee_overrides (marketplace, category, referral_rate)
         VALUES (?, ?, ?)
         ON CONFLICT (marketplace, category) DO UPDATE SET
             referral_rate = excluded.referral_rate",
    )
    .bind(marketplace.as_str())
    .bind(category)
    .bind(referral_rate)
    .execute(pool)
    .await?;

    Ok(())
}
