//! Polygon aggregates provider.
//!
//! Fetches intraday or daily OHLCV bars from the `/v2/aggs` range endpoint.
//! Handles retries with exponential backoff, response parsing and the
//! circuit breaker. The API key is supplied by the caller and never logged.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, DataProvider, DataSource, FetchResult};
use crate::domain::PriceBar;
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.polygon.io";

#[derive(Debug, Deserialize)]
struct AggregatesResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    results: Option<Vec<AggregateBar>>,
}

/// One aggregate: `t` is epoch milliseconds.
#[derive(Debug, Deserialize)]
struct AggregateBar {
    t: i64,
    o: Option<f64>,
    h: Option<f64>,
    l: Option<f64>,
    c: Option<f64>,
    v: Option<f64>,
}

/// Connection settings for [`PolygonProvider`].
#[derive(Debug, Clone)]
pub struct PolygonSettings {
    pub base_url: String,
    pub api_key: String,
    pub multiplier: u32,
    pub timespan: String,
    pub max_retries: u32,
    pub timeout: Duration,
    pub base_delay: Duration,
}

impl PolygonSettings {
    /// One-minute bars against the public endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            multiplier: 1,
            timespan: "minute".to_string(),
            max_retries: 3,
            timeout: Duration::from_secs(30),
            base_delay: Duration::from_millis(500),
        }
    }
}

pub struct PolygonProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    settings: PolygonSettings,
}

impl PolygonProvider {
    pub fn new(
        settings: PolygonSettings,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, DataError> {
        if settings.api_key.trim().is_empty() {
            return Err(DataError::AuthenticationRequired(
                "Polygon API key is empty".into(),
            ));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            circuit_breaker,
            settings,
        })
    }

    fn aggregates_url(&self, symbol: &str, from: NaiveDate, to: NaiveDate) -> String {
        let s = &self.settings;
        format!(
            "{}/v2/aggs/ticker/{symbol}/range/{}/{}/{from}/{to}\
             ?adjusted=true&sort=asc&limit=50000&apiKey={}",
            s.base_url.trim_end_matches('/'),
            s.multiplier,
            s.timespan,
            s.api_key
        )
    }

    fn fetch_with_retry(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PriceBar>, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let url = self.aggregates_url(symbol, from, to);
        let mut last_error = None;

        for attempt in 0..=self.settings.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.settings.base_delay, attempt);
                tracing::debug!(symbol, attempt, ?delay, "retrying aggregates request");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let resp = match self.client.get(&url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::NetworkUnreachable(e.without_url().to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.without_url().to_string())),
            };

            let status = resp.status();
            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(DataError::AuthenticationRequired(
                    "Polygon rejected the API key".into(),
                ));
            }
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }
            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                continue;
            }

            let body: AggregatesResponse = resp.json().map_err(|e| {
                DataError::ResponseFormatChanged(format!(
                    "failed to parse aggregates for {symbol}: {}",
                    e.without_url()
                ))
            })?;
            let bars = parse_response(body)?;
            self.circuit_breaker.record_success();
            return Ok(bars);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

/// Convert an aggregates response into bars. Aggregates with any missing
/// price field are skipped; a missing volume becomes zero.
fn parse_response(resp: AggregatesResponse) -> Result<Vec<PriceBar>, DataError> {
    if let Some(status) = resp.status.as_deref() {
        if status == "ERROR" || status == "NOT_AUTHORIZED" {
            let msg = resp.error.unwrap_or_else(|| status.to_string());
            return Err(if status == "NOT_AUTHORIZED" {
                DataError::AuthenticationRequired(msg)
            } else {
                DataError::ResponseFormatChanged(msg)
            });
        }
    }

    let bars = resp
        .results
        .unwrap_or_default()
        .into_iter()
        .filter_map(|a| {
            Some(PriceBar {
                timestamp: a.t,
                open: a.o?,
                high: a.h?,
                low: a.l?,
                close: a.c?,
                volume: a.v.unwrap_or(0.0),
            })
        })
        .collect();
    Ok(bars)
}

impl DataProvider for PolygonProvider {
    fn name(&self) -> &str {
        "polygon"
    }

    fn fetch(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let bars = self.fetch_with_retry(symbol, from, to)?;
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::Polygon,
        })
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`, saturating.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Vec<PriceBar>, DataError> {
        parse_response(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn parses_aggregates() {
        let bars = parse(
            r#"{"ticker":"AAPL","status":"OK","resultsCount":2,"results":[
                {"v":1200,"vw":10.1,"o":10.0,"c":10.2,"h":10.3,"l":9.9,"t":1700000000000,"n":12},
                {"v":900,"o":10.2,"c":10.1,"h":10.25,"l":10.0,"t":1700000060000}
            ]}"#,
        )
        .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp, 1_700_000_000_000);
        assert_eq!(bars[0].close, 10.2);
        assert_eq!(bars[1].volume, 900.0);
    }

    #[test]
    fn missing_results_is_empty_not_error() {
        let bars = parse(r#"{"ticker":"AAPL","status":"OK","resultsCount":0}"#).unwrap();
        assert!(bars.is_empty());
    }

    #[test]
    fn incomplete_aggregate_skipped() {
        let bars = parse(
            r#"{"status":"OK","results":[
                {"o":10.0,"h":10.3,"l":9.9,"t":1700000000000},
                {"o":10.2,"c":10.1,"h":10.25,"l":10.0,"t":1700000060000}
            ]}"#,
        )
        .unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].volume, 0.0);
    }

    #[test]
    fn error_status_maps_to_error() {
        let err = parse(r#"{"status":"NOT_AUTHORIZED","error":"plan does not include minute bars"}"#)
            .unwrap_err();
        assert!(matches!(err, DataError::AuthenticationRequired(_)));
        let err = parse(r#"{"status":"ERROR","error":"bad range"}"#).unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn empty_api_key_rejected() {
        let cb = Arc::new(CircuitBreaker::default_provider());
        assert!(matches!(
            PolygonProvider::new(PolygonSettings::new("  "), cb),
            Err(DataError::AuthenticationRequired(_))
        ));
    }

    #[test]
    fn url_layout() {
        let cb = Arc::new(CircuitBreaker::default_provider());
        let mut settings = PolygonSettings::new("KEY");
        settings.base_url = "http://localhost:9/".into();
        let provider = PolygonProvider::new(settings, cb).unwrap();
        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        assert_eq!(
            provider.aggregates_url("AAPL", from, to),
            "http://localhost:9/v2/aggs/ticker/AAPL/range/1/minute/2024-01-01/2024-01-08\
             ?adjusted=true&sort=asc&limit=50000&apiKey=KEY"
        );
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 1), base);
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(2000));
        assert_eq!(backoff_delay(base, 40), base.saturating_mul(u32::MAX));
    }
}
