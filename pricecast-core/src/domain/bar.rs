//! PriceBar and RawSeries, the raw inputs to the feature engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One OHLCV bar. `timestamp` is epoch milliseconds (the aggregates wire format).
///
/// Volume is a float because aggregate providers report fractional volume
/// for some instruments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Bar carrying only a close price. Open/high/low collapse onto the close
    /// and volume is NaN, so any volume-derived value is undefined.
    pub fn close_only(timestamp: i64, close: f64) -> Self {
        Self {
            timestamp,
            open: close,
            high: close,
            low: close,
            close,
            volume: f64::NAN,
        }
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    /// Returns true if any price field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }
}

/// Which fields of the bars are real data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    /// Full OHLCV bars from a provider or CSV file.
    Ohlcv,
    /// Bare closes; open/high/low/volume are placeholders.
    CloseOnly,
}

#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("bars out of order at index {index}: timestamp {timestamp} does not follow {previous}")]
    Unordered {
        index: usize,
        previous: i64,
        timestamp: i64,
    },
}

/// Ordered price history for one symbol.
///
/// Construction guarantees strictly ascending timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSeries {
    symbol: String,
    kind: SeriesKind,
    bars: Vec<PriceBar>,
}

impl RawSeries {
    pub fn new(
        symbol: impl Into<String>,
        kind: SeriesKind,
        bars: Vec<PriceBar>,
    ) -> Result<Self, SeriesError> {
        for (i, pair) in bars.windows(2).enumerate() {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(SeriesError::Unordered {
                    index: i + 1,
                    previous: pair[0].timestamp,
                    timestamp: pair[1].timestamp,
                });
            }
        }
        Ok(Self {
            symbol: symbol.into(),
            kind,
            bars,
        })
    }

    /// Build an OHLCV series from unsorted bars: sort by timestamp and keep
    /// the last bar seen for each duplicated timestamp.
    pub fn from_unsorted(symbol: impl Into<String>, mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.timestamp);
        let mut deduped: Vec<PriceBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.timestamp == bar.timestamp => *last = bar,
                _ => deduped.push(bar),
            }
        }
        Self {
            symbol: symbol.into(),
            kind: SeriesKind::Ohlcv,
            bars: deduped,
        }
    }

    /// Close-only series; bar `i` gets timestamp `i` (ordering is all that matters).
    pub fn from_closes(symbol: impl Into<String>, closes: &[f64]) -> Self {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar::close_only(i as i64, c))
            .collect();
        Self {
            symbol: symbol.into(),
            kind: SeriesKind::CloseOnly,
            bars,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn kind(&self) -> SeriesKind {
        self.kind
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Deterministic BLAKE3 hash over symbol and every bar field.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.symbol.as_bytes());
        for bar in &self.bars {
            hasher.update(&bar.timestamp.to_le_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}
