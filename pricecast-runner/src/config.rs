//! Serializable training configuration.
//!
//! Every field has a default, so an empty TOML file is a valid config.
//! CLI flags are applied on top of the loaded file.

use pricecast_core::data::polygon::{PolygonSettings, DEFAULT_BASE_URL};
use pricecast_core::domain::Horizon;
use pricecast_core::features::FeatureSet;
use pricecast_core::model::RidgeParams;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Longest accepted download window, in days.
pub const MAX_DAYS_BACK: u32 = 36_525;

/// Most retries accepted per aggregates request.
pub const MAX_RETRIES: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("environment variable {0} is not set")]
    MissingApiKey(String),
}

/// Where training bars come from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Polygon aggregates over the last `days_back` days.
    #[default]
    Polygon,
    /// A local CSV export.
    Csv { path: PathBuf },
    /// Deterministic random walk; results are tagged as synthetic.
    Synthetic { bars: usize, seed: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub multiplier: u32,
    pub timespan: String,
    pub chunk_days: u32,
    pub pause_ms: u64,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: "POLYGON_API_KEY".to_string(),
            multiplier: 1,
            timespan: "minute".to_string(),
            chunk_days: 7,
            pause_ms: 250,
            max_retries: 3,
            timeout_secs: 30,
        }
    }
}

impl ProviderConfig {
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    /// Resolve the API key from the environment into provider settings.
    pub fn settings(&self) -> Result<PolygonSettings, ConfigError> {
        let api_key = std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey(self.api_key_env.clone()))?;
        let mut settings = PolygonSettings::new(api_key);
        settings.base_url = self.base_url.clone();
        settings.multiplier = self.multiplier;
        settings.timespan = self.timespan.clone();
        settings.max_retries = self.max_retries;
        settings.timeout = Duration::from_secs(self.timeout_secs);
        Ok(settings)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub ticker: String,
    pub days_back: u32,
    pub horizons: Vec<Horizon>,
    pub feature_set: FeatureSet,
    /// Fraction of rows used for fitting; the rest is held out, in time order.
    pub split_ratio: f64,
    pub output_dir: PathBuf,
    pub model: RidgeParams,
    pub source: SourceConfig,
    pub provider: ProviderConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            ticker: "AAPL".to_string(),
            days_back: 90,
            horizons: Horizon::ALL.to_vec(),
            feature_set: FeatureSet::CloseOnly,
            split_ratio: 0.8,
            output_dir: PathBuf::from("models"),
            model: RidgeParams::default(),
            source: SourceConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

impl TrainingConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ticker.trim().is_empty() {
            return Err(ConfigError::Invalid("ticker must not be empty".into()));
        }
        if self
            .ticker
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == ':'))
        {
            return Err(ConfigError::Invalid(format!(
                "ticker {:?} contains characters not allowed in artifact names",
                self.ticker
            )));
        }
        if !(1..=MAX_DAYS_BACK).contains(&self.days_back) {
            return Err(ConfigError::Invalid(format!(
                "days_back must be in 1..={MAX_DAYS_BACK}, got {}",
                self.days_back
            )));
        }
        if !(self.split_ratio > 0.0 && self.split_ratio < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "split_ratio must be in (0, 1), got {}",
                self.split_ratio
            )));
        }
        if self.horizons.is_empty() {
            return Err(ConfigError::Invalid("at least one horizon is required".into()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.horizons.iter().find(|h| !seen.insert(**h)) {
            return Err(ConfigError::Invalid(format!("duplicate horizon {dup}")));
        }
        if !(self.model.alpha >= 0.0 && self.model.alpha.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "model.alpha must be a finite value >= 0, got {}",
                self.model.alpha
            )));
        }
        if self.provider.chunk_days == 0 {
            return Err(ConfigError::Invalid("provider.chunk_days must be at least 1".into()));
        }
        if self.provider.max_retries > MAX_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "provider.max_retries must be at most {MAX_RETRIES}, got {}",
                self.provider.max_retries
            )));
        }
        Ok(())
    }
}
