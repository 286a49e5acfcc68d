//! Failure paths: a failed run must leave no artifacts behind.

use chrono::NaiveDate;
use pricecast_core::data::{DataError, DataProvider, DataSource, FetchResult};
use pricecast_core::domain::Horizon;
use pricecast_core::registry::ModelRegistry;
use pricecast_runner::{
    fetch_series, load_report, train, SourceConfig, TrainError, TrainingConfig,
};

struct EmptyProvider;

impl DataProvider for EmptyProvider {
    fn name(&self) -> &str {
        "empty"
    }

    fn fetch(&self, symbol: &str, _: NaiveDate, _: NaiveDate) -> Result<FetchResult, DataError> {
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars: vec![],
            source: DataSource::Polygon,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

struct DownProvider;

impl DataProvider for DownProvider {
    fn name(&self) -> &str {
        "down"
    }

    fn fetch(&self, _: &str, _: NaiveDate, _: NaiveDate) -> Result<FetchResult, DataError> {
        Err(DataError::NetworkUnreachable("connection refused".into()))
    }

    fn is_available(&self) -> bool {
        false
    }
}

fn dir_is_empty_or_missing(path: &std::path::Path) -> bool {
    match std::fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

fn quick_config(dir: &std::path::Path) -> TrainingConfig {
    let mut config = TrainingConfig {
        days_back: 14,
        output_dir: dir.join("models"),
        ..TrainingConfig::default()
    };
    config.provider.pause_ms = 0;
    config
}

#[test]
fn empty_fetch_is_upstream_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = quick_config(dir.path());
    let err = fetch_series(&config, &EmptyProvider).unwrap_err();
    assert!(matches!(
        err,
        TrainError::UpstreamFetchFailure(DataError::NoData { .. })
    ));
    assert!(dir_is_empty_or_missing(&config.output_dir));
}

#[test]
fn unreachable_provider_is_upstream_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = quick_config(dir.path());
    let err = fetch_series(&config, &DownProvider).unwrap_err();
    assert!(matches!(
        err,
        TrainError::UpstreamFetchFailure(DataError::NetworkUnreachable(_))
    ));
}

#[test]
fn header_only_csv_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("empty.csv");
    std::fs::write(&csv, "timestamp,open,high,low,close,volume\n").unwrap();
    let config = TrainingConfig {
        source: SourceConfig::Csv { path: csv },
        ..quick_config(dir.path())
    };
    let err = train(&config).unwrap_err();
    assert!(matches!(err, TrainError::EmptySeries { .. }));
    assert!(dir_is_empty_or_missing(&config.output_dir));
}

#[test]
fn short_history_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig {
        source: SourceConfig::Synthetic { bars: 80, seed: 1 },
        ..quick_config(dir.path())
    };
    // 30 feature rows cannot label a 60-bar horizon
    let err = train(&config).unwrap_err();
    assert!(matches!(err, TrainError::InsufficientRows { .. }));
    assert!(dir_is_empty_or_missing(&config.output_dir));
}

#[test]
fn invalid_config_rejected_before_acquisition() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig {
        split_ratio: 1.5,
        ..quick_config(dir.path())
    };
    assert!(matches!(train(&config), Err(TrainError::Config(_))));
}

#[test]
fn missing_api_key_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = quick_config(dir.path());
    config.provider.api_key_env = "PRICECAST_HARD_FAIL_UNSET_KEY".into();
    assert!(matches!(train(&config), Err(TrainError::Config(_))));
    assert!(dir_is_empty_or_missing(&config.output_dir));
}

#[test]
fn output_path_that_is_a_file_fails_to_persist() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("models");
    std::fs::write(&blocker, "not a directory").unwrap();
    let config = TrainingConfig {
        source: SourceConfig::Synthetic { bars: 300, seed: 1 },
        output_dir: blocker.clone(),
        ..quick_config(dir.path())
    };
    assert!(matches!(train(&config), Err(TrainError::Persist(_))));
    assert_eq!(std::fs::read_to_string(&blocker).unwrap(), "not a directory");
}

#[test]
fn failed_retrain_keeps_previous_run_loadable() {
    let dir = tempfile::tempdir().unwrap();
    let first = TrainingConfig {
        source: SourceConfig::Synthetic { bars: 300, seed: 1 },
        horizons: vec![Horizon::H1],
        ..quick_config(dir.path())
    };
    let report = train(&first).unwrap();
    let out = &first.output_dir;
    let old_model = std::fs::read(out.join("ridge_AAPL_h1.json")).unwrap();

    std::fs::create_dir(out.join("ridge_AAPL_h5.json")).unwrap();
    let second = TrainingConfig {
        source: SourceConfig::Synthetic { bars: 300, seed: 2 },
        horizons: vec![Horizon::H1, Horizon::H5],
        ..first.clone()
    };
    assert!(matches!(train(&second), Err(TrainError::Persist(_))));

    assert_eq!(std::fs::read(out.join("ridge_AAPL_h1.json")).unwrap(), old_model);
    let registry = ModelRegistry::load(out, "AAPL").unwrap();
    assert_eq!(registry.horizons(), vec![Horizon::H1]);
    assert_eq!(load_report(out, "AAPL").unwrap().dataset_hash, report.dataset_hash);
    let leftovers = std::fs::read_dir(out)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|x| x == "tmp"))
        .count();
    assert_eq!(leftovers, 0);
}

#[test]
fn oversized_days_back_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig {
        days_back: u32::MAX,
        ..quick_config(dir.path())
    };
    assert!(matches!(config.validate(), Err(pricecast_runner::ConfigError::Invalid(_))));
    let err = fetch_series(&config, &EmptyProvider).unwrap_err();
    assert!(matches!(err, TrainError::UpstreamFetchFailure(DataError::Other(_))));
}
