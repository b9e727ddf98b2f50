use scout_fetch::FetchError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MarketError>;

/// Failures surfaced by a marketplace lookup.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Credentials missing or the token grant was rejected.
    #[error("marketplace auth failed: {0}")]
    Auth(String),

    /// The response arrived but did not have the expected shape.
    #[error("marketplace response unreadable: {0}")]
    Parse(String),
}

impl MarketError {
    /// True for failures worth retrying on a later job run.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Fetch(e) if e.is_transient())
    }
}
