//! Inference service.
//!
//! Stateless request handling over a shared, immutable [`ModelRegistry`].
//! Every failure is a [`PredictionError`] value; nothing here panics or
//! mutates the registry, so one service can answer requests concurrently.

use crate::domain::{Horizon, RawSeries, SeriesKind};
use crate::features::FeatureSet;
use crate::model::{ModelError, Regressor};
use crate::registry::ModelRegistry;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Recoverable per-request failures. Each names the precondition that failed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PredictionError {
    #[error("unknown ticker {requested:?}: this service serves {served:?}")]
    UnknownTicker { requested: String, served: String },

    #[error("no model for horizon {horizon} (available: {available:?})")]
    UnknownHorizon { horizon: u32, available: Vec<u32> },

    #[error("models were trained on full OHLCV features; bare closes are not enough")]
    OhlcvRequired,

    #[error("insufficient data: need at least {required} bars, got {got}")]
    InsufficientHistory { required: usize, got: usize },

    #[error("no complete feature row could be computed from the input")]
    EmptyFeatureFrame,

    #[error("model evaluation failed: {0}")]
    Model(#[from] ModelError),
}

impl PredictionError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            PredictionError::UnknownTicker { .. } => "unknown_ticker",
            PredictionError::UnknownHorizon { .. } => "unknown_horizon",
            PredictionError::OhlcvRequired => "ohlcv_required",
            PredictionError::InsufficientHistory { .. } => "insufficient_data",
            PredictionError::EmptyFeatureFrame => "empty_feature_frame",
            PredictionError::Model(_) => "model_failure",
        }
    }
}

/// A successful prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub ticker: String,
    pub horizon: Horizon,
    pub value: f64,
    /// Index of the input bar whose feature row was used.
    pub bar_index: usize,
    pub timestamp: i64,
}

/// Wire request: `{"ticker": "AAPL", "horizon": 5, "closes": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub ticker: String,
    pub horizon: u32,
    pub closes: Vec<f64>,
}

/// Wire response: `{"prediction": f}` or `{"error": msg, "code": code}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictResponse {
    Prediction { prediction: f64 },
    Error { error: String, code: String },
}

impl PredictResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self, PredictResponse::Prediction { .. })
    }
}

impl From<Result<Prediction, PredictionError>> for PredictResponse {
    fn from(result: Result<Prediction, PredictionError>) -> Self {
        match result {
            Ok(p) => PredictResponse::Prediction {
                prediction: p.value,
            },
            Err(e) => PredictResponse::Error {
                error: e.to_string(),
                code: e.code().to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct InferenceService {
    registry: Arc<ModelRegistry>,
}

impl InferenceService {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Minimum input length, taken from the registry's feature engine.
    pub fn min_history(&self) -> usize {
        self.registry.engine().min_history()
    }

    /// Predict from bare closes.
    pub fn predict(
        &self,
        ticker: &str,
        horizon: u32,
        closes: &[f64],
    ) -> Result<Prediction, PredictionError> {
        let horizon = self.resolve(ticker, horizon)?;
        if self.registry.feature_set() == FeatureSet::Full {
            return Err(PredictionError::OhlcvRequired);
        }
        self.check_history(closes.len())?;
        let series = RawSeries::from_closes(ticker, closes);
        self.evaluate(ticker, horizon, &series)
    }

    /// Predict from a full bar series.
    pub fn predict_bars(
        &self,
        ticker: &str,
        horizon: u32,
        series: &RawSeries,
    ) -> Result<Prediction, PredictionError> {
        let horizon = self.resolve(ticker, horizon)?;
        if self.registry.feature_set() == FeatureSet::Full && series.kind() != SeriesKind::Ohlcv {
            return Err(PredictionError::OhlcvRequired);
        }
        self.check_history(series.len())?;
        self.evaluate(ticker, horizon, series)
    }

    pub fn handle(&self, request: &PredictRequest) -> PredictResponse {
        self.predict(&request.ticker, request.horizon, &request.closes)
            .into()
    }

    /// Evaluate independent requests in parallel; output order matches input.
    pub fn predict_batch(&self, requests: &[PredictRequest]) -> Vec<PredictResponse> {
        requests.par_iter().map(|r| self.handle(r)).collect()
    }

    fn resolve(&self, ticker: &str, horizon: u32) -> Result<Horizon, PredictionError> {
        if ticker != self.registry.ticker() {
            return Err(PredictionError::UnknownTicker {
                requested: ticker.to_string(),
                served: self.registry.ticker().to_string(),
            });
        }
        Horizon::try_from(horizon)
            .ok()
            .filter(|h| self.registry.get(*h).is_some())
            .ok_or_else(|| PredictionError::UnknownHorizon {
                horizon,
                available: self.registry.horizons().into_iter().map(u32::from).collect(),
            })
    }

    fn check_history(&self, got: usize) -> Result<(), PredictionError> {
        let required = self.min_history();
        if got < required {
            return Err(PredictionError::InsufficientHistory { required, got });
        }
        Ok(())
    }

    fn evaluate(
        &self,
        ticker: &str,
        horizon: Horizon,
        series: &RawSeries,
    ) -> Result<Prediction, PredictionError> {
        let matrix = self.registry.engine().compute(series);
        let row = matrix.last().ok_or(PredictionError::EmptyFeatureFrame)?;
        let bundle = self
            .registry
            .get(horizon)
            .ok_or_else(|| PredictionError::UnknownHorizon {
                horizon: horizon.into(),
                available: self.registry.horizons().into_iter().map(u32::from).collect(),
            })?;
        let value = bundle.model().predict_row(&row.values)?;
        tracing::debug!(
            ticker,
            horizon = %horizon,
            bar_index = row.bar_index,
            value,
            "prediction"
        );
        Ok(Prediction {
            ticker: ticker.to_string(),
            horizon,
            value,
            bar_index: row.bar_index,
            timestamp: row.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::{make_series, wave};
    use crate::registry::test_support::registry;

    fn service(set: FeatureSet) -> InferenceService {
        InferenceService::new(Arc::new(registry(
            "AAPL",
            set,
            &[Horizon::H1, Horizon::H5],
        )))
    }

    #[test]
    fn min_history_follows_engine() {
        let svc = service(FeatureSet::CloseOnly);
        assert_eq!(svc.min_history(), svc.registry().engine().warmup() + 1);
    }

    #[test]
    fn predicts_on_enough_history() {
        let svc = service(FeatureSet::CloseOnly);
        let closes = wave(120);
        let p = svc.predict("AAPL", 5, &closes).unwrap();
        assert_eq!(p.horizon, Horizon::H5);
        assert_eq!(p.bar_index, 119);
        assert!(p.value.is_finite());
    }

    #[test]
    fn exactly_min_history_is_enough() {
        let svc = service(FeatureSet::CloseOnly);
        let closes = wave(svc.min_history());
        assert!(svc.predict("AAPL", 1, &closes).is_ok());
    }

    #[test]
    fn short_input_is_insufficient() {
        let svc = service(FeatureSet::CloseOnly);
        let closes = wave(svc.min_history() - 1);
        let err = svc.predict("AAPL", 1, &closes).unwrap_err();
        assert_eq!(err.code(), "insufficient_data");
        assert_eq!(
            err,
            PredictionError::InsufficientHistory {
                required: svc.min_history(),
                got: svc.min_history() - 1
            }
        );
    }

    #[test]
    fn unsupported_and_untrained_horizons() {
        let svc = service(FeatureSet::CloseOnly);
        let closes = wave(120);
        assert_eq!(
            svc.predict("AAPL", 7, &closes).unwrap_err().code(),
            "unknown_horizon"
        );
        // 60 is a valid horizon but has no model here
        assert_eq!(
            svc.predict("AAPL", 60, &closes).unwrap_err().code(),
            "unknown_horizon"
        );
    }

    #[test]
    fn horizon_checked_before_history() {
        let svc = service(FeatureSet::CloseOnly);
        let err = svc.predict("AAPL", 7, &[1.0, 2.0]).unwrap_err();
        assert_eq!(err.code(), "unknown_horizon");
    }

    #[test]
    fn wrong_ticker() {
        let svc = service(FeatureSet::CloseOnly);
        let err = svc.predict("MSFT", 1, &wave(120)).unwrap_err();
        assert_eq!(err.code(), "unknown_ticker");
    }

    #[test]
    fn non_positive_closes_yield_empty_frame() {
        let svc = service(FeatureSet::CloseOnly);
        let closes = vec![0.0; 120];
        let err = svc.predict("AAPL", 1, &closes).unwrap_err();
        assert_eq!(err, PredictionError::EmptyFeatureFrame);
    }

    #[test]
    fn full_registry_needs_ohlcv() {
        let svc = service(FeatureSet::Full);
        let closes = wave(120);
        assert_eq!(
            svc.predict("AAPL", 1, &closes).unwrap_err(),
            PredictionError::OhlcvRequired
        );
        let bars = make_series(&closes);
        assert!(svc.predict_bars("AAPL", 1, &bars).is_ok());
    }

    #[test]
    fn close_only_registry_accepts_bars() {
        let svc = service(FeatureSet::CloseOnly);
        let closes = wave(120);
        let from_closes = svc.predict("AAPL", 1, &closes).unwrap();
        let from_bars = svc.predict_bars("AAPL", 1, &make_series(&closes)).unwrap();
        assert!((from_closes.value - from_bars.value).abs() < 1e-9);
    }

    #[test]
    fn batch_preserves_order() {
        let svc = service(FeatureSet::CloseOnly);
        let requests = vec![
            PredictRequest {
                ticker: "AAPL".into(),
                horizon: 1,
                closes: wave(120),
            },
            PredictRequest {
                ticker: "AAPL".into(),
                horizon: 7,
                closes: wave(120),
            },
            PredictRequest {
                ticker: "AAPL".into(),
                horizon: 5,
                closes: wave(10),
            },
        ];
        let responses = svc.predict_batch(&requests);
        assert_eq!(responses.len(), 3);
        assert!(responses[0].is_ok());
        assert!(
            matches!(&responses[1], PredictResponse::Error { code, .. } if code == "unknown_horizon")
        );
        assert!(
            matches!(&responses[2], PredictResponse::Error { code, .. } if code == "insufficient_data")
        );
    }

    #[test]
    fn response_wire_shape() {
        let ok = serde_json::to_value(PredictResponse::Prediction { prediction: 1.5 }).unwrap();
        assert_eq!(ok, serde_json::json!({"prediction": 1.5}));

        let err: PredictResponse = Err(PredictionError::EmptyFeatureFrame).into();
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["code"], "empty_feature_frame");
        assert!(value["error"].as_str().unwrap().contains("feature row"));

        let back: PredictResponse = serde_json::from_value(value).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn request_parses_from_json() {
        let req: PredictRequest =
            serde_json::from_str(r#"{"ticker":"AAPL","horizon":15,"closes":[1.0,2.0]}"#).unwrap();
        assert_eq!(req.horizon, 15);
        assert_eq!(req.closes.len(), 2);
    }
}
