//! Configuration management for Scout.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. Worker code never reads process-wide
//! settings; the orchestrator threads a loaded `AppConfig` into each job
//! at submission time.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration.
///
/// Loaded from `~/.config/scout/config.toml` (or platform equivalent).
/// Missing file or missing sections fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scrape/lookup worker pool sizes
    pub scraping: ScrapingConfig,
    /// Per-domain request spacing
    pub rate_limit: RateLimitConfig,
    /// Cooldown escalation after detected blocks
    pub backoff: BackoffConfig,
    /// Job-scoped quote cache behavior
    pub cache: CacheConfig,
    /// Job-level limits
    pub job: JobConfig,
    /// Opportunity scoring weights and thresholds
    pub scoring: ScoringConfig,
    /// Buy-side cost assumptions
    pub profit: ProfitConfig,
    /// Browser automation settings
    pub browser: BrowserConfig,
    /// Database location
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if the config directory cannot be determined, the file
    /// exists but cannot be read, or the contents are not valid TOML.
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supported overrides:
    /// - `SCOUT_HEADLESS`: browser headless mode (true/false)
    /// - `SCOUT_JOB_TIMEOUT_SECS`: overall job deadline
    /// - `SCOUT_DATABASE_PATH`: database file location
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;

        if let Ok(val) = std::env::var("SCOUT_HEADLESS") {
            if let Ok(headless) = val.parse() {
                config.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Ok(val) = std::env::var("SCOUT_JOB_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.job.timeout_secs = secs;
                tracing::debug!("Override job.timeout_secs from env: {}", secs);
            }
        }

        if let Ok(val) = std::env::var("SCOUT_DATABASE_PATH") {
            config.database.path = val;
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to disk, creating the config directory if needed.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "scout", "scout").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "scout", "scout").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }

    /// Reject configurations that cannot drive a job.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` for zero pools, inverted delay
    /// bounds, or a non-positive backoff multiplier.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.scraping.retailer_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scraping.retailer_concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.scraping.marketplace_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scraping.marketplace_concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.rate_limit.min_delay_secs > self.rate_limit.max_delay_secs {
            return Err(ConfigError::InvalidValue {
                field: "rate_limit.min_delay_secs".to_string(),
                reason: "must not exceed max_delay_secs".to_string(),
            });
        }
        if self.backoff.multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "backoff.multiplier".to_string(),
                reason: "must be >= 1.0".to_string(),
            });
        }
        Ok(())
    }
}

/// Worker pool sizing: one pool per retailer and per marketplace so a
/// blocked retailer cannot starve the others.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// Concurrent store scrapes per retailer
    pub retailer_concurrency: usize,
    /// Concurrent quote lookups per marketplace
    pub marketplace_concurrency: usize,
    /// Consecutive failures before a store is abandoned
    pub max_consecutive_failures: u32,
    /// Detail-page fetches per store for UPC backfill
    pub detail_fetch_limit: usize,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            retailer_concurrency: 2,
            marketplace_concurrency: 3,
            max_consecutive_failures: 3,
            detail_fetch_limit: 5,
        }
    }
}

/// Per-domain request spacing. Delays are jittered between the bounds so
/// request timing carries no periodic signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Minimum spacing between requests to one domain, seconds
    pub min_delay_secs: f64,
    /// Maximum spacing between requests to one domain, seconds
    pub max_delay_secs: f64,
    /// Token bucket capacity (burst allowance)
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: 2.0,
            max_delay_secs: 5.0,
            burst: 1,
        }
    }
}

/// Cooldown escalation applied when a domain reports a block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// First cooldown after a block, seconds
    pub initial_cooldown_secs: u64,
    /// Cooldown multiplier for repeated blocks
    pub multiplier: f64,
    /// Cooldown ceiling, seconds
    pub max_cooldown_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_cooldown_secs: 30,
            multiplier: 2.0,
            max_cooldown_secs: 900,
        }
    }
}

impl BackoffConfig {
    /// First cooldown as a `Duration`.
    #[must_use]
    pub fn initial_cooldown(&self) -> Duration {
        Duration::from_secs(self.initial_cooldown_secs)
    }

    /// Cooldown ceiling as a `Duration`.
    #[must_use]
    pub fn max_cooldown(&self) -> Duration {
        Duration::from_secs(self.max_cooldown_secs)
    }
}

/// Job-scoped quote cache behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Quote time-to-live within a job, seconds
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

/// Job-level limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Overall deadline for one search job, seconds
    pub timeout_secs: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self { timeout_secs: 600 }
    }
}

/// Opportunity scoring weights and default thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Weight on absolute net profit
    pub w_profit: f64,
    /// Weight on margin percent
    pub w_margin: f64,
    /// Default minimum net profit in dollars
    pub min_profit: f64,
    /// Default minimum margin percent
    pub min_margin_pct: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            w_profit: 1.0,
            w_margin: 1.0,
            min_profit: 5.0,
            min_margin_pct: 20.0,
        }
    }
}

/// Buy-side cost assumptions applied when a store doesn't supply them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfitConfig {
    /// Sales tax rate applied to the buy price
    pub sales_tax_rate: f64,
    /// Default outbound shipping cost in dollars
    pub default_shipping_cost: f64,
}

impl Default for ProfitConfig {
    fn default() -> Self {
        Self {
            sales_tax_rate: 0.08,
            default_shipping_cost: 5.0,
        }
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run the browser headless
    pub headless: bool,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            navigation_timeout_secs: 30,
        }
    }
}

/// Database location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite file, or `:memory:`
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "scout.db".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.scraping.retailer_concurrency, 2);
        assert_eq!(config.rate_limit.min_delay_secs, 2.0);
        assert_eq!(config.backoff.initial_cooldown_secs, 30);
        assert_eq!(config.job.timeout_secs, 600);
        assert!(config.browser.headless);
        config.validate().expect("defaults validate");
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[scraping]"));
        assert!(toml_str.contains("[rate_limit]"));
        assert!(toml_str.contains("[backoff]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(
            parsed.scoring.min_margin_pct,
            config.scoring.min_margin_pct
        );
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[scraping]
retailer_concurrency = 4

[job]
timeout_secs = 120
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.scraping.retailer_concurrency, 4);
        assert_eq!(config.job.timeout_secs, 120);
        // Untouched sections keep defaults
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.scoring.w_profit, 1.0);
    }

    #[test]
    fn test_validate_rejects_zero_pool() {
        let mut config = AppConfig::default();
        config.scraping.retailer_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_delays() {
        let mut config = AppConfig::default();
        config.rate_limit.min_delay_secs = 10.0;
        config.rate_limit.max_delay_secs = 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_save_load_roundtrip() {
        let tmp = tempfile::TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");

        let mut config = AppConfig::default();
        config.job.timeout_secs = 42;
        config.database.path = ":memory:".to_string();

        let contents = toml::to_string_pretty(&config).expect("serialize config");
        fs::write(&config_path, contents).expect("write config file");

        let loaded_contents = fs::read_to_string(&config_path).expect("read config file");
        let loaded: AppConfig = toml::from_str(&loaded_contents).expect("parse loaded config");

        assert_eq!(loaded.job.timeout_secs, 42);
        assert_eq!(loaded.database.path, ":memory:");
    }
}
