use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failures from job orchestration.
///
/// Store- and marketplace-level failures never surface here; they are
/// absorbed into the job's error records and status. These are the failures
/// of the job machinery itself.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Job parameters cannot describe a runnable search.
    #[error("invalid job parameters: {0}")]
    InvalidParams(String),

    /// No job with the given id.
    #[error("job '{0}' not found")]
    JobNotFound(String),

    /// The store locator could not resolve any stores.
    #[error("store location failed: {0}")]
    Locator(String),

    /// Persistence failure.
    #[error(transparent)]
    Database(#[from] scout_db::DatabaseError),
}
