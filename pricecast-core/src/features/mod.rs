//! Feature engine: ordered price/volume series in, named feature matrix out.
//!
//! The engine is the single definition of every feature used by both the
//! training pipeline and the inference service. It is pure: no I/O, no
//! shared mutable state, and its column order is a function of the
//! `FeatureSet` alone.
//!
//! Warm-up policy: a row with any undefined (non-finite) value is dropped.
//! On clean input the first surviving row is at index `warmup()`, so a
//! series of `n > warmup()` bars yields `n - warmup()` rows.

pub mod columns;
pub mod feature;
pub mod rolling;
pub mod rsi;
pub mod schema;

pub use columns::ColumnStore;
pub use feature::{Feature, SeriesColumns, VOLUME_EPSILON};
pub use rsi::RSI_EPSILON;
pub use schema::{FeatureSchema, FeatureSet};

use crate::domain::RawSeries;
use ndarray::Array2;
use std::collections::BTreeMap;

pub const RETURN_LAGS: [usize; 3] = [1, 5, 15];
pub const MA_WINDOWS: [usize; 4] = [5, 10, 20, 50];
pub const DEVIATION_WINDOW: usize = 20;
pub const VOLATILITY_WINDOWS: [usize; 2] = [20, 50];
pub const RSI_PERIOD: usize = 14;
pub const VOLUME_WINDOW: usize = 20;
pub const FEATURE_LAGS: [usize; 4] = [1, 2, 3, 5];

/// Bases that get lagged copies, in schema order.
fn lag_bases() -> Vec<Feature> {
    vec![
        Feature::Return { lag: 1 },
        Feature::Return { lag: 5 },
        Feature::LogReturn { lag: 1 },
        Feature::LogReturn { lag: 5 },
        Feature::CloseSmaDiff {
            window: DEVIATION_WINDOW,
        },
        Feature::CloseEmaDiff {
            span: DEVIATION_WINDOW,
        },
        Feature::Rsi { period: RSI_PERIOD },
        Feature::Volatility {
            window: VOLATILITY_WINDOWS[0],
        },
        Feature::HlRange,
        Feature::BodySize,
    ]
}

/// Full ordered catalog for a feature set.
fn catalog(set: FeatureSet) -> Vec<Feature> {
    let mut features = Vec::new();

    features.extend(RETURN_LAGS.iter().map(|&lag| Feature::Return { lag }));
    features.extend(RETURN_LAGS.iter().map(|&lag| Feature::LogReturn { lag }));
    for &w in &MA_WINDOWS {
        features.push(Feature::Sma { window: w });
        features.push(Feature::Ema { span: w });
    }
    features.push(Feature::CloseSmaDiff {
        window: DEVIATION_WINDOW,
    });
    features.push(Feature::CloseEmaDiff {
        span: DEVIATION_WINDOW,
    });
    features.extend(
        VOLATILITY_WINDOWS
            .iter()
            .map(|&window| Feature::Volatility { window }),
    );
    features.push(Feature::Rsi { period: RSI_PERIOD });

    features.extend([
        Feature::HlRange,
        Feature::BodySize,
        Feature::UpperWick,
        Feature::LowerWick,
        Feature::VolumeChange,
        Feature::VolumeSma {
            window: VOLUME_WINDOW,
        },
        Feature::VolumeRel {
            window: VOLUME_WINDOW,
        },
    ]);

    for base in lag_bases() {
        for &lag in &FEATURE_LAGS {
            features.push(Feature::lagged(base.clone(), lag));
        }
    }

    match set {
        FeatureSet::Full => features,
        FeatureSet::CloseOnly => features.into_iter().filter(|f| !f.requires_ohlcv()).collect(),
    }
}

/// One surviving row of the matrix, with values in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    /// Index of the source bar in the input series.
    pub bar_index: usize,
    pub timestamp: i64,
    pub close: f64,
    pub values: Vec<f64>,
}

/// Chronologically ordered feature rows plus the schema that names the columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    schema: FeatureSchema,
    rows: Vec<FeatureRow>,
}

impl FeatureMatrix {
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Most recent valid row.
    pub fn last(&self) -> Option<&FeatureRow> {
        self.rows.last()
    }

    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        let col = self.schema.position(name)?;
        self.rows.get(row).map(|r| r.values[col])
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let col = self.schema.position(name)?;
        Some(self.rows.iter().map(|r| r.values[col]).collect())
    }

    /// Row `row` as a name → value mapping.
    pub fn row_map(&self, row: usize) -> Option<BTreeMap<String, f64>> {
        let r = self.rows.get(row)?;
        Some(
            self.schema
                .names()
                .iter()
                .cloned()
                .zip(r.values.iter().copied())
                .collect(),
        )
    }

    pub fn closes(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.close).collect()
    }

    /// Dense `rows x features` design matrix.
    pub fn to_array(&self) -> Array2<f64> {
        let mut x = Array2::zeros((self.rows.len(), self.schema.len()));
        for (i, row) in self.rows.iter().enumerate() {
            for (j, &v) in row.values.iter().enumerate() {
                x[[i, j]] = v;
            }
        }
        x
    }
}

/// Stateless feature engine for one feature set.
#[derive(Debug, Clone)]
pub struct FeatureEngine {
    features: Vec<Feature>,
    schema: FeatureSchema,
    warmup: usize,
}

impl FeatureEngine {
    pub fn new(set: FeatureSet) -> Self {
        let features = catalog(set);
        let names = features.iter().map(Feature::name).collect();
        let warmup = features.iter().map(Feature::lookback).max().unwrap_or(0);
        Self {
            features,
            schema: FeatureSchema::new(set, names),
            warmup,
        }
    }

    pub fn feature_set(&self) -> FeatureSet {
        self.schema.feature_set()
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Number of leading bars consumed before the first valid row.
    pub fn warmup(&self) -> usize {
        self.warmup
    }

    /// Smallest input length that can produce one row.
    pub fn min_history(&self) -> usize {
        self.warmup + 1
    }

    pub fn compute(&self, series: &RawSeries) -> FeatureMatrix {
        let bars = series.bars();
        if bars.is_empty() {
            return FeatureMatrix {
                schema: self.schema.clone(),
                rows: Vec::new(),
            };
        }

        let cols = SeriesColumns {
            open: bars.iter().map(|b| b.open).collect(),
            high: bars.iter().map(|b| b.high).collect(),
            low: bars.iter().map(|b| b.low).collect(),
            close: bars.iter().map(|b| b.close).collect(),
            volume: bars.iter().map(|b| b.volume).collect(),
        };

        let mut store = ColumnStore::with_capacity(self.features.len());
        for feature in &self.features {
            let values = feature.evaluate(&cols, &store);
            store.push(feature.name(), values);
        }
        debug_assert_eq!(store.width(), self.schema.len());

        let mut rows = Vec::with_capacity(bars.len().saturating_sub(self.warmup));
        for (i, bar) in bars.iter().enumerate().skip(self.warmup) {
            let values = store.row(i);
            if values.iter().all(|v| v.is_finite()) {
                rows.push(FeatureRow {
                    bar_index: i,
                    timestamp: bar.timestamp,
                    close: bar.close,
                    values,
                });
            }
        }

        tracing::debug!(
            symbol = series.symbol(),
            bars = bars.len(),
            rows = rows.len(),
            feature_set = %self.feature_set(),
            "computed features"
        );

        FeatureMatrix {
            schema: self.schema.clone(),
            rows,
        }
    }
}

/// Convenience wrapper: build an engine for `set` and run it once.
pub fn compute_features(series: &RawSeries, set: FeatureSet) -> FeatureMatrix {
    FeatureEngine::new(set).compute(series)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::domain::{PriceBar, RawSeries, SeriesKind};

    pub const DEFAULT_EPSILON: f64 = 1e-10;

    pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
        assert!(
            (actual - expected).abs() < epsilon,
            "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
            (actual - expected).abs()
        );
    }

    /// Plausible OHLCV around the given closes: open = previous close,
    /// high/low one unit outside the body, volume varying with the index.
    pub fn make_series(closes: &[f64]) -> RawSeries {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let open = if i == 0 { close } else { closes[i - 1] };
                PriceBar {
                    timestamp: 1_700_000_000_000 + i as i64 * 60_000,
                    open,
                    high: open.max(close) + 1.0,
                    low: open.min(close) - 1.0,
                    close,
                    volume: 1_000.0 + (i % 7) as f64 * 100.0,
                }
            })
            .collect();
        RawSeries::new("TEST", SeriesKind::Ohlcv, bars).expect("ascending timestamps")
    }

    pub fn wave(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + (i as f64 * 0.37).sin() * 3.0 + i as f64 * 0.05)
            .collect()
    }
}
