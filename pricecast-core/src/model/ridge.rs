//! Ridge regression on standardized features.
//!
//! Solves (Z'Z + alpha·n·I) w = Z'(y - ȳ) by Cholesky decomposition, where Z
//! is X with each column centred and scaled by its standard deviation.
//! Columns whose spread is negligible relative to their magnitude are only
//! centred, not scaled.

use super::{ModelError, Regressor};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Fixed hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RidgeParams {
    pub alpha: f64,
    pub fit_intercept: bool,
}

impl Default for RidgeParams {
    fn default() -> Self {
        Self {
            alpha: 1e-4,
            fit_intercept: true,
        }
    }
}

/// Fitted ridge model. Every field is needed to reproduce a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeRegressor {
    pub params: RidgeParams,
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

const RELATIVE_SCALE_FLOOR: f64 = 1e-8;

impl RidgeRegressor {
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, params: RidgeParams) -> Result<Self, ModelError> {
        let (n, f) = x.dim();
        if n != y.len() {
            return Err(ModelError::DimensionMismatch {
                expected: n,
                got: y.len(),
            });
        }
        if n == 0 || f == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite);
        }

        let (means, scales) = if params.fit_intercept {
            column_stats(x)
        } else {
            (vec![0.0; f], vec![1.0; f])
        };
        let mut z = x.clone();
        for (j, mut col) in z.axis_iter_mut(Axis(1)).enumerate() {
            col.mapv_inplace(|v| (v - means[j]) / scales[j]);
        }

        let y_mean = if params.fit_intercept {
            y.mean().unwrap_or(0.0)
        } else {
            0.0
        };
        let yc = y.mapv(|v| v - y_mean);

        let mut gram = z.t().dot(&z);
        let penalty = params.alpha.max(0.0) * n as f64;
        for i in 0..f {
            gram[[i, i]] += penalty;
        }
        let rhs = z.t().dot(&yc);
        let w = cholesky_solve(&gram, &rhs)?;

        Ok(Self {
            params,
            means,
            scales,
            coefficients: w.to_vec(),
            intercept: y_mean,
        })
    }

    fn predict_view(&self, row: ArrayView1<'_, f64>) -> f64 {
        row.iter()
            .zip(&self.means)
            .zip(&self.scales)
            .zip(&self.coefficients)
            .map(|(((&v, &m), &s), &w)| (v - m) / s * w)
            .sum::<f64>()
            + self.intercept
    }
}

impl Regressor for RidgeRegressor {
    fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64, ModelError> {
        if row.len() != self.n_features() {
            return Err(ModelError::DimensionMismatch {
                expected: self.n_features(),
                got: row.len(),
            });
        }
        Ok(self.predict_view(ArrayView1::from(row)))
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        if x.ncols() != self.n_features() {
            return Err(ModelError::DimensionMismatch {
                expected: self.n_features(),
                got: x.ncols(),
            });
        }
        Ok(x.axis_iter(Axis(0))
            .map(|row| self.predict_view(row))
            .collect())
    }
}

/// Per-column mean and population standard deviation, with near-constant
/// columns given scale 1.
fn column_stats(x: &Array2<f64>) -> (Vec<f64>, Vec<f64>) {
    let n = x.nrows() as f64;
    let mut means = Vec::with_capacity(x.ncols());
    let mut scales = Vec::with_capacity(x.ncols());
    for col in x.axis_iter(Axis(1)) {
        let mean = col.sum() / n;
        let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        let floor = RELATIVE_SCALE_FLOOR * mean.abs().max(1.0);
        means.push(mean);
        scales.push(if std > floor { std } else { 1.0 });
    }
    (means, scales)
}

/// Solve A x = b for symmetric positive-definite A.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>, ModelError> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return Err(ModelError::Singular);
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * z[j];
        }
        z[i] = (b[i] - sum) / l[[i, i]];
    }

    // L' x = z
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (z[i] - sum) / l[[i, i]];
    }

    Ok(x)
}
