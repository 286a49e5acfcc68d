//! PriceCast Core: feature engine, regressor, model registry and inference.
//!
//! This crate holds everything both training and serving depend on:
//! - Domain types (bars, series, horizons)
//! - The feature engine, the single definition of every model input
//! - The ridge regressor behind the `Regressor` trait
//! - The model registry and its on-disk artifact format
//! - The stateless inference service
//! - Market data acquisition (Polygon aggregates, CSV, synthetic)

pub mod data;
pub mod domain;
pub mod features;
pub mod inference;
pub mod model;
pub mod registry;

pub use domain::{Horizon, PriceBar, RawSeries, SeriesKind};
pub use features::{compute_features, FeatureEngine, FeatureMatrix, FeatureSchema, FeatureSet};
pub use inference::{InferenceService, PredictRequest, PredictResponse, Prediction, PredictionError};
pub use registry::{ModelBundle, ModelRegistry, RegistryError};
