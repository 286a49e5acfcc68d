//! Supervised targets and the chronological train/validation split.

use ndarray::{s, Array1, Array2};
use pricecast_core::domain::Horizon;
use pricecast_core::features::FeatureMatrix;

/// Design matrix and target for one horizon.
///
/// Row `i` pairs the features of matrix row `i` with the close of matrix
/// row `i + h`. `base_close[i]` is the close at row `i`, used by the naive
/// baseline.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub horizon: Horizon,
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub base_close: Vec<f64>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Split rows `[0, at)` for fitting and `[at, len)` for validation.
    pub fn split_at(&self, at: usize) -> (TrainingSlice<'_>, TrainingSlice<'_>) {
        let at = at.min(self.len());
        (self.slice(0, at), self.slice(at, self.len()))
    }

    fn slice(&self, from: usize, to: usize) -> TrainingSlice<'_> {
        TrainingSlice {
            x: self.x.slice(s![from..to, ..]).to_owned(),
            y: self.y.slice(s![from..to]).to_owned(),
            base_close: &self.base_close[from..to],
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainingSlice<'a> {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub base_close: &'a [f64],
}

/// Pair every feature row with the close `horizon` rows later. The last
/// `horizon` rows have no target and are dropped.
pub fn make_target(matrix: &FeatureMatrix, horizon: Horizon) -> TrainingSet {
    let h = horizon.steps();
    let n = matrix.len().saturating_sub(h);
    let closes = matrix.closes();
    let x = matrix.to_array();
    TrainingSet {
        horizon,
        x: x.slice(s![..n, ..]).to_owned(),
        y: Array1::from_iter(closes.iter().skip(h).take(n).copied()),
        base_close: closes[..n].to_vec(),
    }
}

/// Index splitting `n` rows at `floor(ratio · n)`. `None` when either side
/// would be empty.
pub fn chronological_split(n: usize, ratio: f64) -> Option<usize> {
    let split = (n as f64 * ratio).floor() as usize;
    (split > 0 && split < n).then_some(split)
}
