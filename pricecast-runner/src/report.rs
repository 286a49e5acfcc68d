//! Training report persisted next to the model artifacts.

use chrono::{DateTime, Utc};
use pricecast_core::data::DataSource;
use pricecast_core::domain::Horizon;
use pricecast_core::features::FeatureSet;
use serde::{Deserialize, Serialize};

/// Current schema version for persisted reports.
pub const REPORT_SCHEMA_VERSION: u32 = 1;

pub fn report_file_name(ticker: &str) -> String {
    format!("report_{ticker}.json")
}

/// Validation results for one horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonReport {
    pub horizon: Horizon,
    pub train_rows: usize,
    pub val_rows: usize,
    pub validation_rmse: f64,
    pub validation_mae: f64,
    /// RMSE of predicting "no change" (the current close).
    pub baseline_rmse: f64,
}

impl HorizonReport {
    /// True when the model beats the naive last-close baseline.
    pub fn beats_baseline(&self) -> bool {
        self.validation_rmse < self.baseline_rmse
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub ticker: String,
    pub feature_set: FeatureSet,
    pub source: DataSource,
    /// BLAKE3 over every bar used in the run.
    pub dataset_hash: String,
    pub schema_hash: String,
    pub bars: usize,
    pub feature_rows: usize,
    pub warmup: usize,
    pub horizons: Vec<HorizonReport>,
    pub created_at: DateTime<Utc>,
}

fn default_schema_version() -> u32 {
    REPORT_SCHEMA_VERSION
}

impl TrainingReport {
    pub fn horizon(&self, horizon: Horizon) -> Option<&HorizonReport> {
        self.horizons.iter().find(|h| h.horizon == horizon)
    }

    pub fn is_synthetic(&self) -> bool {
        self.source == DataSource::Synthetic
    }
}
