//! Regression error metrics for validation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub n_samples: usize,
}

impl RegressionMetrics {
    /// RMSE and MAE of `y_pred` against `y_true`. Empty input yields NaN errors.
    pub fn calculate(y_true: &[f64], y_pred: &[f64]) -> Self {
        let n = y_true.len().min(y_pred.len());
        if n == 0 {
            return Self {
                rmse: f64::NAN,
                mae: f64::NAN,
                n_samples: 0,
            };
        }
        let (sq, abs) = y_true
            .iter()
            .zip(y_pred)
            .fold((0.0, 0.0), |(sq, abs), (&t, &p)| {
                let e = t - p;
                (sq + e * e, abs + e.abs())
            });
        Self {
            rmse: (sq / n as f64).sqrt(),
            mae: abs / n as f64,
            n_samples: n,
        }
    }
}

pub fn rmse(y_true: &[f64], y_pred: &[f64]) -> f64 {
    RegressionMetrics::calculate(y_true, y_pred).rmse
}
