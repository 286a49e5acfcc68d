//! Relative Strength Index from simple rolling averages of gains and losses.
//!
//! RSI = 100 - 100 / (1 + avg_gain / (avg_loss + RSI_EPSILON))
//! Lookback: period (the first difference is undefined at index 0).
//! The epsilon keeps a window with no losses finite: RSI approaches 100
//! instead of dividing by zero.

use super::rolling::rolling_mean;

pub const RSI_EPSILON: f64 = 1e-9;

pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    let mut gains = vec![f64::NAN; n];
    let mut losses = vec![f64::NAN; n];
    for i in 1..n {
        let change = closes[i] - closes[i - 1];
        if change.is_nan() {
            continue;
        }
        gains[i] = change.max(0.0);
        losses[i] = (-change).max(0.0);
    }

    let avg_gain = rolling_mean(&gains, period);
    let avg_loss = rolling_mean(&losses, period);

    avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(&g, &l)| {
            if g.is_nan() || l.is_nan() {
                f64::NAN
            } else {
                let rs = g / (l + RSI_EPSILON);
                100.0 - 100.0 / (1.0 + rs)
            }
        })
        .collect()
}
