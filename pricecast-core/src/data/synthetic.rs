//! Deterministic synthetic series for offline training and tests.
//!
//! Seeds are derived from the symbol and a caller seed via BLAKE3, so the
//! same inputs always produce identical bars.

use crate::domain::{PriceBar, RawSeries};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 2023-11-14T22:13:20Z, one-minute spacing.
pub const BASE_TIMESTAMP_MS: i64 = 1_700_000_000_000;
pub const BAR_INTERVAL_MS: i64 = 60_000;

fn derive_seed(symbol: &str, seed: u64) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(symbol.as_bytes());
    hasher.update(&seed.to_le_bytes());
    let hash = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

fn timestamp(i: usize) -> i64 {
    BASE_TIMESTAMP_MS + i as i64 * BAR_INTERVAL_MS
}

/// Geometric random walk of `n` OHLCV bars starting at 100.
pub fn random_walk(symbol: &str, n: usize, seed: u64) -> RawSeries {
    let mut rng = StdRng::seed_from_u64(derive_seed(symbol, seed));
    let mut close = 100.0_f64;
    let bars = (0..n)
        .map(|i| {
            let open = close;
            close = (open * (1.0 + rng.gen_range(-0.002..0.002))).max(0.01);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.001));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.001));
            let volume = rng.gen_range(500.0..5_000.0_f64).round();
            PriceBar {
                timestamp: timestamp(i),
                open,
                high,
                low,
                close,
                volume,
            }
        })
        .collect();
    RawSeries::from_unsorted(symbol, bars)
}

/// Noise-free line: close `i` is `start + step * i`, open is the previous close.
pub fn linear_trend(symbol: &str, n: usize, start: f64, step: f64) -> RawSeries {
    let bars = (0..n)
        .map(|i| {
            let close = start + step * i as f64;
            let open = if i == 0 { close } else { close - step };
            PriceBar {
                timestamp: timestamp(i),
                open,
                high: open.max(close),
                low: open.min(close),
                close,
                volume: 1_000.0,
            }
        })
        .collect();
    RawSeries::from_unsorted(symbol, bars)
}
