use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FetchError>;

/// Failure taxonomy for a single page/request fetch.
///
/// `Blocked` must always surface rather than degrade into empty content:
/// it is the signal that drives rate-limiter cooldowns.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("blocked by {domain} (CAPTCHA or bot check)")]
    Blocked {
        domain: String,
        /// Server-suggested wait, when a Retry-After header was present
        retry_after: Option<Duration>,
    },

    #[error("target not found")]
    NotFound,

    #[error("transient fetch failure: {0}")]
    Transient(String),

    #[error("page loaded but expected structure absent: {0}")]
    ParseMismatch(String),
}

impl FetchError {
    /// True for failures worth an immediate local retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// True when the domain signalled a block and needs a cooldown.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}
