//! End-to-end inference over a registry built from fitted models.

use ndarray::Array1;
use pricecast_core::data::synthetic::random_walk;
use pricecast_core::domain::{Horizon, RawSeries};
use pricecast_core::features::{compute_features, FeatureEngine, FeatureSet};
use pricecast_core::model::{ModelArtifact, RidgeParams, RidgeRegressor};
use pricecast_core::registry::{self, ModelBundle, ModelRegistry, RegistryError};
use pricecast_core::{InferenceService, PredictRequest, PredictResponse, PredictionError};
use std::sync::Arc;

/// Fit one ridge model per horizon on a synthetic walk, using the close
/// `h` rows ahead as the target.
fn trained_registry(set: FeatureSet, horizons: &[Horizon]) -> ModelRegistry {
    let series = random_walk("AAPL", 600, 11);
    let matrix = FeatureEngine::new(set).compute(&series);
    let x = matrix.to_array();
    let closes = matrix.closes();
    let bundles = horizons
        .iter()
        .map(|&h| {
            let n = matrix.len() - h.steps();
            let xs = x.slice(ndarray::s![..n, ..]).to_owned();
            let y = Array1::from_iter(closes[h.steps()..].iter().copied());
            let model = RidgeRegressor::fit(&xs, &y, RidgeParams::default()).unwrap();
            ModelBundle::new(h, ModelArtifact::Ridge(model))
        })
        .collect();
    ModelRegistry::from_parts("AAPL", set, bundles).unwrap()
}

fn service() -> InferenceService {
    InferenceService::new(Arc::new(trained_registry(
        FeatureSet::CloseOnly,
        &Horizon::ALL,
    )))
}

#[test]
fn predicts_near_last_close() {
    let svc = service();
    let closes = random_walk("AAPL", 200, 99).closes();
    for h in Horizon::ALL {
        let p = svc.predict("AAPL", h.into(), &closes).unwrap();
        let last = *closes.last().unwrap();
        assert!(
            (p.value - last).abs() / last < 0.05,
            "h={h}: prediction {} far from last close {last}",
            p.value
        );
    }
}

#[test]
fn horizon_seven_is_unknown() {
    let svc = service();
    let closes = random_walk("AAPL", 200, 1).closes();
    let err = svc.predict("AAPL", 7, &closes).unwrap_err();
    assert!(matches!(err, PredictionError::UnknownHorizon { horizon: 7, .. }));
    assert_eq!(err.code(), "unknown_horizon");
}

#[test]
fn insufficient_history_names_threshold() {
    let svc = service();
    let warmup = FeatureEngine::new(FeatureSet::CloseOnly).warmup();
    let closes = vec![100.0; warmup];
    let err = svc.predict("AAPL", 1, &closes).unwrap_err();
    assert_eq!(
        err,
        PredictionError::InsufficientHistory {
            required: warmup + 1,
            got: warmup
        }
    );
    assert!(err.to_string().contains(&(warmup + 1).to_string()));
}

#[test]
fn rising_closes_saturate_rsi() {
    let closes: Vec<f64> = (1..=100).map(f64::from).collect();
    let matrix = compute_features(&RawSeries::from_closes("UP", &closes), FeatureSet::CloseOnly);
    let last = matrix.len() - 1;
    let rsi = matrix.value(last, "rsi_14").unwrap();
    assert!(rsi > 99.99, "rsi = {rsi}");

    let svc = service();
    assert!(svc.predict("AAPL", 5, &closes).is_ok());
}

#[test]
fn batch_over_shared_registry() {
    let svc = service();
    let closes = random_walk("AAPL", 150, 2).closes();
    let requests: Vec<PredictRequest> = [1, 5, 7, 15, 30, 60]
        .iter()
        .map(|&h| PredictRequest {
            ticker: "AAPL".into(),
            horizon: h,
            closes: closes.clone(),
        })
        .collect();
    let responses = svc.predict_batch(&requests);
    let ok: Vec<bool> = responses.iter().map(PredictResponse::is_ok).collect();
    assert_eq!(ok, vec![true, true, false, true, true, true]);
}

#[test]
fn persisted_registry_serves_same_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let reg = trained_registry(FeatureSet::CloseOnly, &[Horizon::H1, Horizon::H15]);
    registry::write_registry(&reg, dir.path()).unwrap();

    let in_memory = InferenceService::new(Arc::new(reg));
    let loaded = InferenceService::new(Arc::new(ModelRegistry::load(dir.path(), "AAPL").unwrap()));
    let closes = random_walk("AAPL", 120, 8).closes();
    for h in [1, 15] {
        let a = in_memory.predict("AAPL", h, &closes).unwrap().value;
        let b = loaded.predict("AAPL", h, &closes).unwrap().value;
        assert!((a - b).abs() < 1e-6, "h={h}: {a} vs {b}");
    }
}

#[test]
fn narrower_model_is_fatal_at_load() {
    let dir = tempfile::tempdir().unwrap();
    let reg = trained_registry(FeatureSet::CloseOnly, &[Horizon::H1, Horizon::H5]);
    registry::write_registry(&reg, dir.path()).unwrap();

    // Replace the h5 model with one fitted on three columns.
    let x = ndarray::Array2::from_shape_fn((10, 3), |(i, j)| (i * (j + 1)) as f64 + j as f64 * 0.5);
    let y = Array1::from_iter((0..10).map(|i| i as f64));
    let narrow = ModelArtifact::Ridge(RidgeRegressor::fit(&x, &y, RidgeParams::default()).unwrap());
    registry::write_json_atomic(&dir.path().join("ridge_AAPL_h5.json"), &narrow).unwrap();

    match ModelRegistry::load(dir.path(), "AAPL") {
        Err(RegistryError::DimensionMismatch {
            horizon,
            model_width,
            schema_width,
        }) => {
            assert_eq!(horizon, Horizon::H5);
            assert_eq!(model_width, 3);
            assert_eq!(schema_width, reg_width());
        }
        other => panic!("expected dimension mismatch, got {other:?}"),
    }
}

fn reg_width() -> usize {
    FeatureEngine::new(FeatureSet::CloseOnly).schema().len()
}

#[test]
fn full_registry_requires_bars() {
    let svc = InferenceService::new(Arc::new(trained_registry(FeatureSet::Full, &[Horizon::H1])));
    let series = random_walk("AAPL", 120, 3);
    assert_eq!(
        svc.predict("AAPL", 1, &series.closes()).unwrap_err().code(),
        "ohlcv_required"
    );
    assert!(svc.predict_bars("AAPL", 1, &series).is_ok());
}
