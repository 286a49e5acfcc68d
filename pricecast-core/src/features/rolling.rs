//! Series primitives: shifts, returns, rolling statistics and the EMA.
//!
//! Every function returns a vector the same length as its input, with
//! `f64::NAN` wherever the value is undefined (warm-up, missing input,
//! degenerate denominator).
//!
//! Rolling windows are recomputed per position, never carried as a running
//! sum: a rolling value depends only on the bars inside its window.

/// `out[i] = values[i - k]`.
pub fn shift(values: &[f64], k: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    for i in k..n {
        out[i] = values[i - k];
    }
    out
}

/// Percentage change over `k` steps: `x[i] / x[i-k] - 1`.
///
/// Undefined when the earlier value is zero or either value is NaN.
pub fn pct_change(values: &[f64], k: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if k == 0 {
        return out;
    }
    for i in k..n {
        let prev = values[i - k];
        let curr = values[i];
        if prev != 0.0 && prev.is_finite() && curr.is_finite() {
            out[i] = curr / prev - 1.0;
        }
    }
    out
}

/// Log return over `k` steps: `ln(x[i] / x[i-k])`.
///
/// Non-positive prices leave the value undefined.
pub fn log_return(values: &[f64], k: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if k == 0 {
        return out;
    }
    for i in k..n {
        let prev = values[i - k];
        let curr = values[i];
        if prev > 0.0 && curr > 0.0 {
            out[i] = (curr / prev).ln();
        }
    }
    out
}

/// Rolling arithmetic mean over the last `window` values.
/// Lookback: window - 1. Any NaN inside the window makes the value NaN.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if window == 0 || n < window {
        return out;
    }
    for i in (window - 1)..n {
        let slice = &values[(i + 1 - window)..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        out[i] = slice.iter().sum::<f64>() / window as f64;
    }
    out
}

/// Rolling sample standard deviation (n - 1 denominator).
/// Lookback: window - 1. Requires `window >= 2`.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if window < 2 || n < window {
        return out;
    }
    for i in (window - 1)..n {
        let slice = &values[(i + 1 - window)..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        let mean = slice.iter().sum::<f64>() / window as f64;
        let ss: f64 = slice.iter().map(|v| (v - mean).powi(2)).sum();
        out[i] = (ss / (window - 1) as f64).sqrt();
    }
    out
}

/// Recursive EMA with `alpha = 2 / (span + 1)`, seeded at the first value.
///
/// EMA[0] = x[0]; EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1].
/// Defined from index 0 (lookback 0). A NaN input yields NaN at that index
/// and the recursion resumes from the last defined state.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if span == 0 {
        return out;
    }
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut prev: Option<f64> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        let next = match prev {
            None => v,
            Some(p) => alpha * v + (1.0 - alpha) * p,
        };
        out[i] = next;
        prev = Some(next);
    }
    out
}

/// Element-wise `a / b - 1`, undefined when `b` is zero or NaN.
pub fn relative_deviation(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| if y != 0.0 && !y.is_nan() { x / y - 1.0 } else { f64::NAN })
        .collect()
}
