//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over bar sources so training can run
//! against the live aggregates API, a CSV export, or a mock in tests.

use crate::domain::{PriceBar, SeriesError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("no bars returned for {symbol} between {from} and {to}")]
    NoData {
        symbol: String,
        from: NaiveDate,
        to: NaiveDate,
    },

    #[error("CSV error in {path}: {reason}")]
    Csv { path: PathBuf, reason: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error("data error: {0}")]
    Other(String),
}

/// Result of a successful fetch for a single symbol and date range.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    pub bars: Vec<PriceBar>,
    pub source: DataSource,
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Polygon,
    CsvImport,
    Synthetic,
}

/// A source of OHLCV bars.
///
/// Implementations handle one transport; chunking and de-duplication live
/// in [`super::download`].
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch bars for a symbol over an inclusive date range.
    fn fetch(&self, symbol: &str, from: NaiveDate, to: NaiveDate)
        -> Result<FetchResult, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}

/// Progress callback for chunked downloads.
pub trait DownloadProgress: Send {
    fn on_chunk_start(&self, symbol: &str, from: NaiveDate, to: NaiveDate, index: usize, total: usize);

    fn on_chunk_complete(&self, symbol: &str, index: usize, total: usize, result: &Result<usize, DataError>);
}

/// Reports chunk progress through `tracing`.
pub struct LogProgress;

impl DownloadProgress for LogProgress {
    fn on_chunk_start(&self, symbol: &str, from: NaiveDate, to: NaiveDate, index: usize, total: usize) {
        tracing::info!(symbol, %from, %to, chunk = index + 1, total, "downloading chunk");
    }

    fn on_chunk_complete(&self, symbol: &str, index: usize, total: usize, result: &Result<usize, DataError>) {
        match result {
            Ok(bars) => tracing::debug!(symbol, chunk = index + 1, total, bars, "chunk done"),
            Err(e) => tracing::warn!(symbol, chunk = index + 1, total, error = %e, "chunk failed"),
        }
    }
}
