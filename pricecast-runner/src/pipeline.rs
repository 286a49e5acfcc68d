//! Training pipeline: acquisition, feature computation, per-horizon
//! fitting, validation and persistence.
//!
//! Entry points:
//! - `train()`: the whole run from a `TrainingConfig`. Used by the CLI.
//! - `acquire()` / `fetch_series()`: bars only, from the configured source.
//! - `train_series()`: fit every horizon in memory from a loaded series.
//! - `persist()`: write a fitted run to disk atomically.
//!
//! Nothing touches disk until every horizon has been fitted.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use pricecast_core::data::synthetic::random_walk;
use pricecast_core::data::{
    download_history, load_csv, CircuitBreaker, DataError, DataProvider, DataSource, LogProgress,
    PolygonProvider,
};
use pricecast_core::domain::{Horizon, RawSeries};
use pricecast_core::features::{FeatureEngine, FeatureMatrix};
use pricecast_core::model::metrics::{rmse, RegressionMetrics};
use pricecast_core::model::{ModelArtifact, ModelError, Regressor, RidgeParams, RidgeRegressor};
use pricecast_core::registry::{
    write_registry_with, HorizonStats, ModelBundle, ModelRegistry, PersistedArtifacts,
    RegistryError,
};

use crate::config::{ConfigError, SourceConfig, TrainingConfig};
use crate::report::{report_file_name, HorizonReport, TrainingReport, REPORT_SCHEMA_VERSION};
use crate::target::{chronological_split, make_target};

/// Errors from a training run. All are fatal: no partial artifacts remain.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("upstream fetch failed: {0}")]
    UpstreamFetchFailure(#[from] DataError),

    #[error("no bars available for {symbol}")]
    EmptySeries { symbol: String },

    #[error("{bars} bars produced no complete feature rows (warm-up is {warmup} bars)")]
    NoFeatureRows { bars: usize, warmup: usize },

    #[error(
        "horizon {horizon}: {rows} labelled rows cannot be split into non-empty train and validation sets"
    )]
    InsufficientRows { horizon: Horizon, rows: usize },

    #[error("fitting horizon {horizon} failed: {source}")]
    Model {
        horizon: Horizon,
        #[source]
        source: ModelError,
    },

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("failed to persist artifacts: {0}")]
    Persist(#[source] RegistryError),
}

/// A fully fitted run, not yet written anywhere.
#[derive(Debug, Clone)]
pub struct TrainedModels {
    pub registry: ModelRegistry,
    pub report: TrainingReport,
}

/// Load bars from the configured source.
pub fn acquire(config: &TrainingConfig) -> Result<(RawSeries, DataSource), TrainError> {
    let (series, source) = match &config.source {
        SourceConfig::Polygon => {
            let settings = config.provider.settings()?;
            let provider =
                PolygonProvider::new(settings, Arc::new(CircuitBreaker::default_provider()))?;
            (fetch_series(config, &provider)?, DataSource::Polygon)
        }
        SourceConfig::Csv { path } => (load_csv(path, &config.ticker)?, DataSource::CsvImport),
        SourceConfig::Synthetic { bars, seed } => {
            tracing::warn!(ticker = %config.ticker, bars, seed, "training on synthetic data");
            (random_walk(&config.ticker, *bars, *seed), DataSource::Synthetic)
        }
    };
    if series.is_empty() {
        return Err(TrainError::EmptySeries {
            symbol: config.ticker.clone(),
        });
    }
    tracing::info!(ticker = %config.ticker, bars = series.len(), ?source, "acquired bars");
    Ok((series, source))
}

/// Chunked download of `days_back` days ending today.
pub fn fetch_series(
    config: &TrainingConfig,
    provider: &dyn DataProvider,
) -> Result<RawSeries, TrainError> {
    let series = download_history(
        provider,
        &config.ticker,
        Utc::now().date_naive(),
        config.days_back,
        config.provider.chunk_days,
        config.provider.pause(),
        &LogProgress,
    )?;
    Ok(series)
}

/// Fit one horizon: chronological split, ridge fit, validation metrics.
pub fn fit_horizon(
    matrix: &FeatureMatrix,
    horizon: Horizon,
    split_ratio: f64,
    params: RidgeParams,
) -> Result<(ModelBundle, HorizonReport), TrainError> {
    let set = make_target(matrix, horizon);
    let at = chronological_split(set.len(), split_ratio).ok_or(TrainError::InsufficientRows {
        horizon,
        rows: set.len(),
    })?;
    let (train, val) = set.split_at(at);

    let model_err = |source| TrainError::Model { horizon, source };
    let model = RidgeRegressor::fit(&train.x, &train.y, params).map_err(model_err)?;
    let predictions = model.predict(&val.x).map_err(model_err)?;

    let actual = val.y.to_vec();
    let metrics = RegressionMetrics::calculate(&actual, &predictions.to_vec());
    let baseline_rmse = rmse(&actual, val.base_close);

    let report = HorizonReport {
        horizon,
        train_rows: train.y.len(),
        val_rows: val.y.len(),
        validation_rmse: metrics.rmse,
        validation_mae: metrics.mae,
        baseline_rmse,
    };
    tracing::info!(
        horizon = %horizon,
        train_rows = report.train_rows,
        val_rows = report.val_rows,
        rmse = report.validation_rmse,
        baseline_rmse,
        "fitted horizon"
    );

    let stats = HorizonStats {
        validation_rmse: report.validation_rmse,
        validation_mae: report.validation_mae,
        baseline_rmse,
        train_rows: report.train_rows,
        val_rows: report.val_rows,
    };
    let bundle = ModelBundle::new(horizon, ModelArtifact::Ridge(model)).with_stats(stats);
    Ok((bundle, report))
}

/// Compute features and fit every configured horizon in memory, one after
/// another in configuration order.
pub fn train_series(
    config: &TrainingConfig,
    series: &RawSeries,
    source: DataSource,
) -> Result<TrainedModels, TrainError> {
    if series.is_empty() {
        return Err(TrainError::EmptySeries {
            symbol: config.ticker.clone(),
        });
    }
    let engine = FeatureEngine::new(config.feature_set);
    let matrix = engine.compute(series);
    tracing::info!(
        bars = series.len(),
        feature_rows = matrix.len(),
        features = engine.schema().len(),
        feature_set = %config.feature_set,
        "computed feature matrix"
    );
    if matrix.is_empty() {
        return Err(TrainError::NoFeatureRows {
            bars: series.len(),
            warmup: engine.warmup(),
        });
    }

    let fitted: Vec<(ModelBundle, HorizonReport)> = config
        .horizons
        .iter()
        .map(|&h| fit_horizon(&matrix, h, config.split_ratio, config.model))
        .collect::<Result<_, _>>()?;
    let (bundles, horizons): (Vec<_>, Vec<_>) = fitted.into_iter().unzip();

    let registry = ModelRegistry::from_parts(&config.ticker, config.feature_set, bundles)?;
    let report = TrainingReport {
        schema_version: REPORT_SCHEMA_VERSION,
        ticker: config.ticker.clone(),
        feature_set: config.feature_set,
        source,
        dataset_hash: series.content_hash(),
        schema_hash: engine.schema().fingerprint(),
        bars: series.len(),
        feature_rows: matrix.len(),
        warmup: engine.warmup(),
        horizons,
        created_at: Utc::now(),
    };
    Ok(TrainedModels { registry, report })
}

/// Write models, the report and then the metadata into `dir`. All files are
/// staged before any is renamed, so a failed write leaves the previously
/// persisted run loadable.
pub fn persist(trained: &TrainedModels, dir: &Path) -> Result<PersistedArtifacts, TrainError> {
    let report_path = dir.join(report_file_name(trained.registry.ticker()));
    let artifacts = write_registry_with(
        &trained.registry,
        dir,
        &[(report_path.clone(), &trained.report)],
    )
    .map_err(TrainError::Persist)?;
    tracing::info!(report = %report_path.display(), "wrote training report");
    Ok(artifacts)
}

/// Full run: validate, acquire, fit, persist.
pub fn train(config: &TrainingConfig) -> Result<TrainingReport, TrainError> {
    config.validate()?;
    let (series, source) = acquire(config)?;
    let trained = train_series(config, &series, source)?;
    persist(&trained, &config.output_dir)?;
    Ok(trained.report)
}
