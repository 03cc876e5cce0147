//! Runtime settings.
//!
//! Loaded once at startup and handed to each component as a plain struct.
//! Sources, later overriding earlier: built-in defaults, an optional TOML
//! file (`--config` or `FAREPAY_CONFIG`), then `FAREPAY__*` environment
//! variables.

use crate::domain::money::RoundingMode;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "FAREPAY_CONFIG";
/// Prefix for per-key environment overrides, e.g. `FAREPAY__GPS_MAX_DISTANCE_METERS`.
pub const CONFIG_ENV_PREFIX: &str = "FAREPAY";
/// Environment variable holding the tracing filter.
pub const LOG_ENV_VAR: &str = "FAREPAY_LOG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] ::config::ConfigError),
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub gps_max_distance_meters: u32,
    pub gps_confidence_threshold_meters: u32,
    pub gps_max_freshness_secs: i64,
    pub commission_rounding: RoundingMode,
    pub currency: String,
    pub currency_minor_units: u32,
    pub store_timeout_ms: u64,
    pub commit_max_attempts: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gps_max_distance_meters: 500,
            gps_confidence_threshold_meters: 100,
            gps_max_freshness_secs: 600,
            commission_rounding: RoundingMode::HalfEven,
            currency: "KES".to_string(),
            currency_minor_units: 2,
            store_timeout_ms: 5_000,
            commit_max_attempts: 3,
        }
    }
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        use ::config::{Config, Environment, File, FileFormat};

        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        } else if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&path, FileFormat::Toml).required(true));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key, reason: &str| {
            Err(ConfigError::Invalid {
                key,
                reason: reason.to_string(),
            })
        };
        if self.gps_max_distance_meters == 0 {
            return invalid("gps_max_distance_meters", "must be positive");
        }
        if self.gps_confidence_threshold_meters == 0 {
            return invalid("gps_confidence_threshold_meters", "must be positive");
        }
        if self.gps_max_freshness_secs <= 0 {
            return invalid("gps_max_freshness_secs", "must be positive");
        }
        if self.currency.trim().is_empty() {
            return invalid("currency", "must not be empty");
        }
        if self.currency_minor_units > 8 {
            return invalid("currency_minor_units", "must be at most 8");
        }
        if self.commit_max_attempts == 0 {
            return invalid("commit_max_attempts", "must be at least 1");
        }
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}
