//! Feature definitions: name, lookback, and evaluation for every column.

use super::columns::ColumnStore;
use super::rolling::{
    ema, log_return, pct_change, relative_deviation, rolling_mean, rolling_std, shift,
};
use super::rsi::rsi;

/// Epsilon added to the volume average before taking the volume ratio.
pub const VOLUME_EPSILON: f64 = 1e-9;

/// Per-bar input columns pulled out of a `RawSeries` once per computation.
#[derive(Debug, Clone)]
pub struct SeriesColumns {
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl SeriesColumns {
    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }
}

/// One derived feature column.
///
/// `lookback()` is the first index at which the column is defined on clean
/// input; the engine's warm-up is the maximum over its schema.
#[derive(Debug, Clone, PartialEq)]
pub enum Feature {
    Return { lag: usize },
    LogReturn { lag: usize },
    Sma { window: usize },
    Ema { span: usize },
    CloseSmaDiff { window: usize },
    CloseEmaDiff { span: usize },
    Volatility { window: usize },
    Rsi { period: usize },
    HlRange,
    BodySize,
    UpperWick,
    LowerWick,
    VolumeChange,
    VolumeSma { window: usize },
    VolumeRel { window: usize },
    Lag { base: Box<Feature>, lag: usize },
}

impl Feature {
    pub fn lagged(base: Feature, lag: usize) -> Self {
        Feature::Lag {
            base: Box::new(base),
            lag,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Feature::Return { lag } => format!("ret_{lag}"),
            Feature::LogReturn { lag } => format!("log_ret_{lag}"),
            Feature::Sma { window } => format!("sma_{window}"),
            Feature::Ema { span } => format!("ema_{span}"),
            Feature::CloseSmaDiff { window } => format!("close_sma_{window}_diff"),
            Feature::CloseEmaDiff { span } => format!("close_ema_{span}_diff"),
            Feature::Volatility { window } => format!("vol_{window}"),
            Feature::Rsi { period } => format!("rsi_{period}"),
            Feature::HlRange => "hl_range".into(),
            Feature::BodySize => "body_size".into(),
            Feature::UpperWick => "upper_wick".into(),
            Feature::LowerWick => "lower_wick".into(),
            Feature::VolumeChange => "vol_chg".into(),
            Feature::VolumeSma { window } => format!("vol_sma_{window}"),
            Feature::VolumeRel { window } => format!("vol_rel_{window}"),
            Feature::Lag { base, lag } => format!("{}_lag{lag}", base.name()),
        }
    }

    pub fn lookback(&self) -> usize {
        match self {
            Feature::Return { lag } | Feature::LogReturn { lag } => *lag,
            Feature::Sma { window }
            | Feature::CloseSmaDiff { window }
            | Feature::VolumeSma { window }
            | Feature::VolumeRel { window } => window.saturating_sub(1),
            Feature::Ema { .. } | Feature::CloseEmaDiff { .. } => 0,
            // std of log_ret_1, which itself starts at index 1
            Feature::Volatility { window } => *window,
            Feature::Rsi { period } => *period,
            Feature::HlRange | Feature::BodySize | Feature::UpperWick | Feature::LowerWick => 0,
            Feature::VolumeChange => 1,
            Feature::Lag { base, lag } => base.lookback() + lag,
        }
    }

    /// True when the column reads open/high/low/volume, not just closes.
    pub fn requires_ohlcv(&self) -> bool {
        match self {
            Feature::HlRange
            | Feature::BodySize
            | Feature::UpperWick
            | Feature::LowerWick
            | Feature::VolumeChange
            | Feature::VolumeSma { .. }
            | Feature::VolumeRel { .. } => true,
            Feature::Lag { base, .. } => base.requires_ohlcv(),
            _ => false,
        }
    }

    /// Evaluate the column over the whole series.
    ///
    /// Lag features reuse the base column from `store` when it is present.
    pub fn evaluate(&self, cols: &SeriesColumns, store: &ColumnStore) -> Vec<f64> {
        let c = &cols.close;
        match self {
            Feature::Return { lag } => pct_change(c, *lag),
            Feature::LogReturn { lag } => log_return(c, *lag),
            Feature::Sma { window } => rolling_mean(c, *window),
            Feature::Ema { span } => ema(c, *span),
            Feature::CloseSmaDiff { window } => relative_deviation(c, &rolling_mean(c, *window)),
            Feature::CloseEmaDiff { span } => relative_deviation(c, &ema(c, *span)),
            Feature::Volatility { window } => rolling_std(&log_return(c, 1), *window),
            Feature::Rsi { period } => rsi(c, *period),
            Feature::HlRange => zip_map(cols, |_, h, l, c| (h - l) / c),
            Feature::BodySize => zip_map(cols, |o, _, _, c| (c - o) / o),
            Feature::UpperWick => zip_map(cols, |o, h, _, c| (h - c.max(o)) / c),
            Feature::LowerWick => zip_map(cols, |o, _, l, c| (c.min(o) - l) / c),
            Feature::VolumeChange => pct_change(&cols.volume, 1),
            Feature::VolumeSma { window } => rolling_mean(&cols.volume, *window),
            Feature::VolumeRel { window } => {
                let avg = rolling_mean(&cols.volume, *window);
                cols.volume
                    .iter()
                    .zip(&avg)
                    .map(|(&v, &a)| v / (a + VOLUME_EPSILON))
                    .collect()
            }
            Feature::Lag { base, lag } => match store.column(&base.name()) {
                Some(values) => shift(values, *lag),
                None => shift(&base.evaluate(cols, store), *lag),
            },
        }
    }
}

/// Candle-shape helper: `f(open, high, low, close)` per bar.
fn zip_map(cols: &SeriesColumns, f: impl Fn(f64, f64, f64, f64) -> f64) -> Vec<f64> {
    (0..cols.len())
        .map(|i| f(cols.open[i], cols.high[i], cols.low[i], cols.close[i]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::{assert_approx, DEFAULT_EPSILON};

    fn cols(closes: &[f64]) -> SeriesColumns {
        let n = closes.len();
        SeriesColumns {
            open: closes.iter().map(|c| c - 1.0).collect(),
            high: closes.iter().map(|c| c + 2.0).collect(),
            low: closes.iter().map(|c| c - 3.0).collect(),
            close: closes.to_vec(),
            volume: (0..n).map(|i| 100.0 + i as f64).collect(),
        }
    }

    #[test]
    fn names_match_persisted_schema() {
        assert_eq!(Feature::Return { lag: 5 }.name(), "ret_5");
        assert_eq!(Feature::CloseSmaDiff { window: 20 }.name(), "close_sma_20_diff");
        assert_eq!(Feature::Volatility { window: 50 }.name(), "vol_50");
        assert_eq!(
            Feature::lagged(Feature::Rsi { period: 14 }, 3).name(),
            "rsi_14_lag3"
        );
        assert_eq!(Feature::VolumeRel { window: 20 }.name(), "vol_rel_20");
    }

    #[test]
    fn lookbacks_chain_through_lags() {
        assert_eq!(Feature::Sma { window: 50 }.lookback(), 49);
        assert_eq!(Feature::Ema { span: 50 }.lookback(), 0);
        assert_eq!(Feature::Volatility { window: 50 }.lookback(), 50);
        assert_eq!(
            Feature::lagged(Feature::Volatility { window: 20 }, 5).lookback(),
            25
        );
        assert_eq!(Feature::lagged(Feature::Return { lag: 5 }, 5).lookback(), 10);
    }

    #[test]
    fn lookback_is_first_defined_index() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64 * 0.3).sin()).collect();
        let c = cols(&closes);
        let store = ColumnStore::default();
        let features = [
            Feature::Return { lag: 15 },
            Feature::Sma { window: 20 },
            Feature::Volatility { window: 20 },
            Feature::Rsi { period: 14 },
            Feature::VolumeChange,
            Feature::lagged(Feature::Volatility { window: 20 }, 5),
        ];
        for f in &features {
            let v = f.evaluate(&c, &store);
            let first = v.iter().position(|x| x.is_finite()).unwrap();
            assert_eq!(first, f.lookback(), "{}", f.name());
        }
    }

    #[test]
    fn ohlcv_requirement_propagates_through_lags() {
        assert!(Feature::HlRange.requires_ohlcv());
        assert!(Feature::lagged(Feature::BodySize, 2).requires_ohlcv());
        assert!(!Feature::lagged(Feature::Rsi { period: 14 }, 2).requires_ohlcv());
    }

    #[test]
    fn candle_shapes() {
        let c = cols(&[100.0]);
        let store = ColumnStore::default();
        // open 99, high 102, low 97, close 100
        assert_approx(Feature::HlRange.evaluate(&c, &store)[0], 5.0 / 100.0, DEFAULT_EPSILON);
        assert_approx(Feature::BodySize.evaluate(&c, &store)[0], 1.0 / 99.0, DEFAULT_EPSILON);
        assert_approx(Feature::UpperWick.evaluate(&c, &store)[0], 2.0 / 100.0, DEFAULT_EPSILON);
        assert_approx(Feature::LowerWick.evaluate(&c, &store)[0], 2.0 / 100.0, DEFAULT_EPSILON);
    }

    #[test]
    fn volume_ratio_is_epsilon_protected() {
        let mut c = cols(&[1.0; 25]);
        c.volume = vec![0.0; 25];
        let v = Feature::VolumeRel { window: 20 }.evaluate(&c, &ColumnStore::default());
        assert_approx(v[24], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn lag_uses_stored_base_column() {
        let c = cols(&[1.0, 2.0, 3.0, 4.0]);
        let mut store = ColumnStore::default();
        store.push("ret_1".into(), vec![9.0, 8.0, 7.0, 6.0]);
        let v = Feature::lagged(Feature::Return { lag: 1 }, 2).evaluate(&c, &store);
        assert_eq!(&v[2..], &[9.0, 8.0]);
    }
}
