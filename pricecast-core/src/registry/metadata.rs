//! Persisted metadata document and artifact file naming.

use crate::domain::Horizon;
use crate::features::FeatureSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub fn metadata_file_name(ticker: &str) -> String {
    format!("meta_{ticker}.json")
}

pub fn model_file_name(ticker: &str, horizon: Horizon) -> String {
    format!("ridge_{ticker}_h{horizon}.json")
}

/// Validation numbers recorded for one horizon at training time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizonStats {
    pub validation_rmse: f64,
    pub validation_mae: f64,
    pub baseline_rmse: f64,
    pub train_rows: usize,
    pub val_rows: usize,
}

/// Per-horizon entry of the metadata document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonEntry {
    pub model_file: String,
    #[serde(flatten)]
    pub stats: Option<HorizonStats>,
}

/// The metadata document written next to the model files.
///
/// `ticker`, `feature_cols` and `horizons` are required; the remaining
/// fields are optional on load so older documents still parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub ticker: String,
    pub feature_cols: Vec<String>,
    pub horizons: BTreeMap<String, HorizonEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_set: Option<FeatureSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warmup: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ModelMetadata {
    /// Horizon keys in numeric order; unparsable keys are returned as errors.
    pub fn parsed_horizons(&self) -> Vec<(Result<Horizon, String>, &HorizonEntry)> {
        let mut out: Vec<_> = self
            .horizons
            .iter()
            .map(|(key, entry)| (key.parse::<Horizon>().map_err(|_| key.clone()), entry))
            .collect();
        out.sort_by_key(|(h, _)| h.as_ref().map(|h| *h as u32).unwrap_or(u32::MAX));
        out
    }
}
