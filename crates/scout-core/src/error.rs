//! Error types shared across the Scout workspace.

use thiserror::Error;

/// Errors produced by core type validation and shared utilities.
#[derive(Debug, Error)]
pub enum ScoutError {
    /// A value failed domain validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration could not be loaded or saved.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors specific to configuration loading and persistence.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine configuration directory")]
    NoConfigDir,

    /// Filesystem access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file exists but is not valid TOML.
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized back to TOML.
    #[error("serialization failed: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A configured value is out of range or inconsistent.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// The offending config field.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Result alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
