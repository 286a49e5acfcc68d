//! Regression backend.
//!
//! The rest of the system treats a fitted model as an opaque black box behind
//! the `Regressor` trait. `ModelArtifact` is the persisted, tagged form.

pub mod metrics;
pub mod ridge;

pub use metrics::RegressionMetrics;
pub use ridge::{RidgeParams, RidgeRegressor};

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("empty training set")]
    EmptyTrainingSet,

    #[error("training data contains non-finite values")]
    NonFinite,

    #[error("normal equations are singular")]
    Singular,
}

/// A fitted single-output regressor.
pub trait Regressor: Send + Sync {
    /// Input dimensionality the model was fitted on.
    fn n_features(&self) -> usize;

    fn predict_row(&self, row: &[f64]) -> Result<f64, ModelError>;

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError>;
}

/// Serialized model, tagged by algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Ridge(RidgeRegressor),
}

impl ModelArtifact {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelArtifact::Ridge(_) => "ridge",
        }
    }
}

impl Regressor for ModelArtifact {
    fn n_features(&self) -> usize {
        match self {
            ModelArtifact::Ridge(m) => m.n_features(),
        }
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64, ModelError> {
        match self {
            ModelArtifact::Ridge(m) => m.predict_row(row),
        }
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        match self {
            ModelArtifact::Ridge(m) => m.predict(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn artifact_is_tagged_with_kind() {
        let model = RidgeRegressor::fit(
            &array![[1.0], [2.0], [3.0]],
            &array![2.0, 4.0, 6.0],
            RidgeParams::default(),
        )
        .unwrap();
        let artifact = ModelArtifact::Ridge(model);
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["kind"], "ridge");
        assert_eq!(artifact.kind(), "ridge");
        let back: ModelArtifact = serde_json::from_value(json).unwrap();
        assert_eq!(back.n_features(), 1);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = serde_json::from_str::<ModelArtifact>(r#"{"kind":"xgboost"}"#);
        assert!(err.is_err());
    }
}
