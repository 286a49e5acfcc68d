//! CSV bar import.
//!
//! Expected header: `timestamp,open,high,low,close,volume`. The timestamp
//! column accepts epoch milliseconds, RFC 3339 date-times, or plain
//! `YYYY-MM-DD` dates (midnight UTC).

use super::provider::DataError;
use crate::domain::{PriceBar, RawSeries};
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(ms) = raw.parse::<i64>() {
        return Some(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Read bars from any CSV source. Rows may arrive unsorted; the result is
/// sorted and de-duplicated by timestamp.
pub fn read_csv<R: Read>(reader: R, symbol: &str, origin: &Path) -> Result<RawSeries, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut bars = Vec::new();
    for (i, record) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = record.map_err(|e| DataError::Csv {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| DataError::Csv {
            path: origin.to_path_buf(),
            reason: format!("row {}: unparsable timestamp {:?}", i + 1, row.timestamp),
        })?;
        bars.push(PriceBar {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    let series = RawSeries::from_unsorted(symbol, bars);
    tracing::debug!(symbol, bars = series.len(), path = %origin.display(), "read CSV bars");
    Ok(series)
}

pub fn load_csv(path: impl AsRef<Path>, symbol: &str) -> Result<RawSeries, DataError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_csv(file, symbol, path)
}
