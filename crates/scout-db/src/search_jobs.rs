//! Search job history and status tracking.

use crate::error::{DatabaseError, Result};
use crate::parse_timestamp;
use chrono::{DateTime, Utc};
use scout_core::{JobId, Retailer};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{Pool, Row, Sqlite};

/// One search job's persisted state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchJobRecord {
    /// Job identifier
    pub id: JobId,
    /// ZIP code the search centered on, when store resolution was requested
    pub zip_code: Option<String>,
    /// Search radius in miles
    pub radius_miles: Option<f64>,
    /// Retailers the job covered
    pub retailers: Vec<Retailer>,
    /// Current status
    pub status: JobStatus,
    /// Per-stage counters
    pub counters: JobCounters,
    /// Itemized error records (JSON array), populated at completion
    pub error_detail: Option<JsonValue>,
    /// When the job was submitted
    pub started_at: DateTime<Utc>,
    /// When the job reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall-clock duration, set at completion
    pub duration_seconds: Option<i64>,
}

/// Status of a search job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobStatus {
    /// Submitted but not yet started
    Pending,
    /// Currently executing
    Running,
    /// Finished with some sub-task failures but at least one item processed
    Partial,
    /// Finished with no sub-task failures
    Completed,
    /// Finished with nothing produced
    Failed,
    /// Cancelled before completion; results discarded
    Cancelled,
}

impl JobStatus {
    /// True once the job can no longer change state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    /// Parse from the stored string form, defaulting to `Pending`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "Running" => Self::Running,
            "Partial" => Self::Partial,
            "Completed" => Self::Completed,
            "Failed" => Self::Failed,
            "Cancelled" => Self::Cancelled,
            _ => Self::Pending,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Running => write!(f, "Running"),
            Self::Partial => write!(f, "Partial"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Per-stage progress counters for one job.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobCounters {
    /// Stores scraped to completion
    pub stores_scanned: u32,
    /// Stores abandoned after the consecutive-failure cap
    pub stores_failed: u32,
    /// Inventory items observed
    pub items_found: u32,
    /// Marketplace quotes fetched (cache misses)
    pub quotes_fetched: u32,
    /// Opportunities persisted
    pub opportunities_found: u32,
}

/// Create a new job row in `Pending` status.
pub async fn create_search_job(
    pool: &Pool<Sqlite>,
    id: &JobId,
    zip_code: Option<&str>,
    radius_miles: Option<f64>,
    retailers: &[Retailer],
) -> Result<SearchJobRecord> {
    let started_at = Utc::now();
    let status = JobStatus::Pending;
    let retailer_names: Vec<&str> = retailers.iter().map(Retailer::as_str).collect();
    let retailers_json = serde_json::to_string(&retailer_names)
        .map_err(|e| DatabaseError::Decode(e.to_string()))?;

    sqlx::query(
        "INSERT INTO search_jobs (id, zip_code, radius_miles, retailers, status, started_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id.as_str())
    .bind(zip_code)
    .bind(radius_miles)
    .bind(&retailers_json)
    .bind(status.to_string())
    .bind(started_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(SearchJobRecord {
        id: id.clone(),
        zip_code: zip_code.map(ToString::to_string),
        radius_miles,
        retailers: retailers.to_vec(),
        status,
        counters: JobCounters::default(),
        error_detail: None,
        started_at,
        completed_at: None,
        duration_seconds: None,
    })
}

/// Move a pending job to `Running`.
pub async fn mark_running(pool: &Pool<Sqlite>, id: &JobId) -> Result<()> {
    let result = sqlx::query("UPDATE search_jobs SET status = ? WHERE id = ?")
        .bind(JobStatus::Running.to_string())
        .bind(id.as_str())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound(format!(
            "search job '{id}' not found"
        )));
    }
    Ok(())
}

/// Write the current counters mid-flight.
pub async fn update_counters(pool: &Pool<Sqlite>, id: &JobId, counters: &JobCounters) -> Result<()> {
    sqlx::query(
        "UPDATE search_jobs
         SET stores_scanned = ?, stores_failed = ?, items_found = ?,
             quotes_fetched = ?, opportunities_found = ?
         WHERE id = ?",
    )
    .bind(i64::from(counters.stores_scanned))
    .bind(i64::from(counters.stores_failed))
    .bind(i64::from(counters.items_found))
    .bind(i64::from(counters.quotes_fetched))
    .bind(i64::from(counters.opportunities_found))
    .bind(id.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

/// Record a job's terminal status, final counters, and itemized errors.
pub async fn complete_search_job(
    pool: &Pool<Sqlite>,
    id: &JobId,
    status: JobStatus,
    counters: &JobCounters,
    error_detail: Option<&JsonValue>,
) -> Result<()> {
    let record = get_search_job(pool, id).await?;
    let completed_at = Utc::now();
    let duration_seconds = (completed_at - record.started_at).num_seconds();
    let error_json = error_detail
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| DatabaseError::Decode(e.to_string()))?;

    sqlx::query(
        "UPDATE search_jobs
         SET status = ?, stores_scanned = ?, stores_failed = ?, items_found = ?,
             quotes_fetched = ?, opportunities_found = ?, error_detail = ?,
             completed_at = ?, duration_seconds = ?
         WHERE id = ?",
    )
    .bind(status.to_string())
    .bind(i64::from(counters.stores_scanned))
    .bind(i64::from(counters.stores_failed))
    .bind(i64::from(counters.items_found))
    .bind(i64::from(counters.quotes_fetched))
    .bind(i64::from(counters.opportunities_found))
    .bind(error_json)
    .bind(completed_at.to_rfc3339())
    .bind(duration_seconds)
    .bind(id.as_str())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load one job by id.
pub async fn get_search_job(pool: &Pool<Sqlite>, id: &JobId) -> Result<SearchJobRecord> {
    let row = sqlx::query(
        "SELECT id, zip_code, radius_miles, retailers, status,
                stores_scanned, stores_failed, items_found, quotes_fetched,
                opportunities_found, error_detail, started_at, completed_at, duration_seconds
         FROM search_jobs
         WHERE id = ?",
    )
    .bind(id.as_str())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound(format!("search job '{id}' not found")))?;

    let retailers_json: String = row.try_get("retailers")?;
    let retailer_names: Vec<String> = serde_json::from_str(&retailers_json)
        .map_err(|e| DatabaseError::Decode(format!("invalid retailers column: {e}")))?;
    let retailers = retailer_names
        .iter()
        .map(|name| Retailer::parse(name).map_err(|e| DatabaseError::Decode(e.to_string())))
        .collect::<Result<Vec<_>>>()?;

    let status_str: String = row.try_get("status")?;
    let error_detail: Option<String> = row.try_get("error_detail")?;
    let error_detail = error_detail.and_then(|s| serde_json::from_str(&s).ok());

    let started_at_str: String = row.try_get("started_at")?;
    let completed_at: Option<String> = row.try_get("completed_at")?;

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let counters = JobCounters {
        stores_scanned: row.try_get::<i64, _>("stores_scanned")? as u32,
        stores_failed: row.try_get::<i64, _>("stores_failed")? as u32,
        items_found: row.try_get::<i64, _>("items_found")? as u32,
        quotes_fetched: row.try_get::<i64, _>("quotes_fetched")? as u32,
        opportunities_found: row.try_get::<i64, _>("opportunities_found")? as u32,
    };

    Ok(SearchJobRecord {
        id: JobId::from_string(row.try_get("id")?),
        zip_code: row.try_get("zip_code")?,
        radius_miles: row.try_get("radius_miles")?,
        retailers,
        status: JobStatus::parse(&status_str),
        counters,
        error_detail,
        started_at: parse_timestamp(&started_at_str),
        completed_at: completed_at.as_deref().map(parse_timestamp),
        duration_seconds: row.try_get("duration_seconds")?,
    })
}
