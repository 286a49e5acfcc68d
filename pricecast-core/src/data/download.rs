//! Chunked history download.
//!
//! Aggregate endpoints cap the rows per response, so a long window is
//! fetched as consecutive date chunks with a pause between requests.

use super::provider::{DataError, DataProvider, DownloadProgress};
use crate::domain::RawSeries;
use chrono::{Duration as ChronoDuration, NaiveDate};
use std::time::Duration;

/// Inclusive date ranges covering `[start, end]` in steps of `chunk_days`.
/// Adjacent ranges share their boundary date; overlap is removed later by
/// timestamp de-duplication.
pub fn chunk_ranges(start: NaiveDate, end: NaiveDate, chunk_days: u32) -> Vec<(NaiveDate, NaiveDate)> {
    let step = ChronoDuration::days(i64::from(chunk_days.max(1)));
    let mut ranges = Vec::new();
    let mut cur = start;
    while cur < end {
        let next = (cur + step).min(end);
        ranges.push((cur, next));
        cur = next;
    }
    if ranges.is_empty() && start == end {
        ranges.push((start, end));
    }
    ranges
}

/// Download `days_back` days ending at `end` for `symbol`.
///
/// Chunks are fetched sequentially; the first failing chunk aborts the
/// download. Bars are sorted by timestamp, de-duplicated, and void bars
/// are dropped. Zero bars overall is [`DataError::NoData`].
pub fn download_history(
    provider: &dyn DataProvider,
    symbol: &str,
    end: NaiveDate,
    days_back: u32,
    chunk_days: u32,
    pause: Duration,
    progress: &dyn DownloadProgress,
) -> Result<RawSeries, DataError> {
    let start = end
        .checked_sub_signed(ChronoDuration::days(i64::from(days_back)))
        .ok_or_else(|| {
            DataError::Other(format!(
                "{days_back} days before {end} is outside the supported date range"
            ))
        })?;
    let ranges = chunk_ranges(start, end, chunk_days);
    let total = ranges.len();
    let mut bars = Vec::new();

    for (i, &(from, to)) in ranges.iter().enumerate() {
        if i > 0 && !pause.is_zero() {
            std::thread::sleep(pause);
        }
        progress.on_chunk_start(symbol, from, to, i, total);
        let result = provider.fetch(symbol, from, to).map(|r| r.bars);
        let outcome = result.as_ref().map(Vec::len).map_err(clone_for_report);
        progress.on_chunk_complete(symbol, i, total, &outcome);
        bars.extend(result?);
    }

    bars.retain(|b| !b.is_void());
    let series = RawSeries::from_unsorted(symbol, bars);
    if series.is_empty() {
        return Err(DataError::NoData {
            symbol: symbol.to_string(),
            from: start,
            to: end,
        });
    }
    tracing::info!(
        symbol,
        provider = provider.name(),
        chunks = total,
        bars = series.len(),
        "downloaded history"
    );
    Ok(series)
}

/// DataError holds non-Clone sources; progress only needs the message.
fn clone_for_report(e: &DataError) -> DataError {
    DataError::Other(e.to_string())
}
