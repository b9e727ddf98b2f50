use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProfitError>;

/// Failures from profit analysis.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProfitError {
    /// Division-undefined inputs: sell price or total buy cost not positive.
    /// Callers drop the pair from ranking rather than failing the job.
    #[error("invalid profit input: {0}")]
    InvalidInput(String),
}
