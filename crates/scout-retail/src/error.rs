use scout_fetch::FetchError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Failures surfaced by a store scrape.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The store was abandoned after too many consecutive fetch failures.
    #[error("store {store_id} abandoned after {failures} consecutive failures")]
    StoreFailed {
        store_id: String,
        failures: u32,
        #[source]
        last_error: FetchError,
    },
}
