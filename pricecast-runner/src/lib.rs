//! PriceCast Runner: the offline training pipeline.
//!
//! This crate builds on `pricecast-core` to provide:
//! - TOML training configuration with validation
//! - Bar acquisition from Polygon, CSV, or a synthetic walk
//! - Per-horizon targets and a chronological train/validation split
//! - Ridge fitting, validation RMSE/MAE and a naive baseline
//! - Atomic artifact persistence and the training report

pub mod config;
pub mod export;
pub mod pipeline;
pub mod report;
pub mod target;

pub use config::{ConfigError, ProviderConfig, SourceConfig, TrainingConfig};
pub use export::{export_features_csv, load_report};
pub use pipeline::{acquire, fetch_series, persist, train, train_series, TrainError, TrainedModels};
pub use report::{HorizonReport, TrainingReport};
pub use target::{chronological_split, make_target, TrainingSet};
