//! PriceCast CLI: train, predict, features and inspect.
//!
//! Commands:
//! - `train`: acquire bars, fit one model per horizon, persist artifacts
//! - `predict`: load a registry and answer one prediction request
//! - `features`: compute the feature matrix of a CSV file
//! - `inspect`: load a registry and print its metadata summary

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use pricecast_core::data::load_csv;
use pricecast_core::features::{FeatureEngine, FeatureSet};
use pricecast_core::registry::ModelRegistry;
use pricecast_core::{InferenceService, PredictRequest, PredictResponse};
use pricecast_runner::{export_features_csv, train, SourceConfig, TrainingConfig};

#[derive(Parser)]
#[command(
    name = "pricecast",
    about = "PriceCast CLI: multi-horizon price prediction from technical features"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit one model per horizon and write the artifacts.
    Train {
        /// Path to a TOML training config. Flags override its values.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Ticker symbol.
        #[arg(long)]
        ticker: Option<String>,

        /// Days of history to download.
        #[arg(long)]
        days_back: Option<u32>,

        /// Train on a local CSV file instead of downloading.
        #[arg(long, conflicts_with = "synthetic")]
        csv: Option<PathBuf>,

        /// Train on a deterministic synthetic random walk.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Number of synthetic bars.
        #[arg(long, default_value_t = 5_000)]
        synthetic_bars: usize,

        /// Seed for the synthetic walk.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Feature set: close_only or full.
        #[arg(long)]
        feature_set: Option<FeatureSet>,

        /// Output directory for model artifacts.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Predict from a JSON file of closes (array or full request).
    Predict {
        /// Directory holding meta_<TICKER>.json and the model files.
        #[arg(long, default_value = "models")]
        models_dir: PathBuf,

        /// Ticker (required when the file is a bare array).
        #[arg(long)]
        ticker: Option<String>,

        /// Horizon in bars (required when the file is a bare array).
        #[arg(long)]
        horizon: Option<u32>,

        /// JSON file: `[c0, c1, ...]` or `{"ticker", "horizon", "closes"}`.
        #[arg(long)]
        closes: PathBuf,
    },
    /// Compute the feature matrix of a CSV file and write it as CSV.
    Features {
        /// Input CSV with header timestamp,open,high,low,close,volume.
        #[arg(long)]
        csv: PathBuf,

        /// Feature set: close_only or full.
        #[arg(long, default_value = "close_only")]
        feature_set: FeatureSet,

        /// Output file. Defaults to stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Load a registry and print its summary.
    Inspect {
        #[arg(long, default_value = "models")]
        models_dir: PathBuf,

        #[arg(long)]
        ticker: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            config,
            ticker,
            days_back,
            csv,
            synthetic,
            synthetic_bars,
            seed,
            feature_set,
            output_dir,
        } => {
            let mut cfg = match config {
                Some(path) => TrainingConfig::load(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => TrainingConfig::default(),
            };
            if let Some(t) = ticker {
                cfg.ticker = t;
            }
            if let Some(d) = days_back {
                cfg.days_back = d;
            }
            if let Some(path) = csv {
                cfg.source = SourceConfig::Csv { path };
            } else if synthetic {
                cfg.source = SourceConfig::Synthetic {
                    bars: synthetic_bars,
                    seed,
                };
            }
            if let Some(set) = feature_set {
                cfg.feature_set = set;
            }
            if let Some(dir) = output_dir {
                cfg.output_dir = dir;
            }
            run_train(&cfg)
        }
        Commands::Predict {
            models_dir,
            ticker,
            horizon,
            closes,
        } => run_predict(&models_dir, ticker, horizon, &closes),
        Commands::Features {
            csv,
            feature_set,
            out,
        } => run_features(&csv, feature_set, out.as_deref()),
        Commands::Inspect { models_dir, ticker } => run_inspect(&models_dir, &ticker),
    }
}

fn run_train(config: &TrainingConfig) -> Result<()> {
    let report = train(config)?;

    println!(
        "Trained {} models for {} ({} bars, {} feature rows, {})",
        report.horizons.len(),
        report.ticker,
        report.bars,
        report.feature_rows,
        report.feature_set
    );
    if report.is_synthetic() {
        println!("WARNING: trained on synthetic data");
    }
    println!(
        "{:>8} {:>8} {:>8} {:>12} {:>12} {:>12}",
        "horizon", "train", "val", "rmse", "mae", "baseline"
    );
    for h in &report.horizons {
        println!(
            "{:>8} {:>8} {:>8} {:>12.6} {:>12.6} {:>12.6}",
            h.horizon, h.train_rows, h.val_rows, h.validation_rmse, h.validation_mae, h.baseline_rmse
        );
    }
    println!("Artifacts saved to: {}", config.output_dir.display());
    Ok(())
}

/// Accept either a bare JSON array of closes or a full request object.
fn parse_predict_input(
    json: &str,
    ticker: Option<String>,
    horizon: Option<u32>,
) -> Result<PredictRequest> {
    let value: serde_json::Value = serde_json::from_str(json).context("input is not valid JSON")?;
    if value.is_array() {
        let closes: Vec<f64> =
            serde_json::from_value(value).context("expected an array of numbers")?;
        let (Some(ticker), Some(horizon)) = (ticker, horizon) else {
            bail!("--ticker and --horizon are required when the input is a bare array");
        };
        return Ok(PredictRequest {
            ticker,
            horizon,
            closes,
        });
    }
    let mut request: PredictRequest =
        serde_json::from_value(value).context("expected {\"ticker\", \"horizon\", \"closes\"}")?;
    if let Some(t) = ticker {
        request.ticker = t;
    }
    if let Some(h) = horizon {
        request.horizon = h;
    }
    Ok(request)
}

fn run_predict(
    models_dir: &Path,
    ticker: Option<String>,
    horizon: Option<u32>,
    closes_path: &Path,
) -> Result<()> {
    let json = std::fs::read_to_string(closes_path)
        .with_context(|| format!("reading {}", closes_path.display()))?;
    let request = parse_predict_input(&json, ticker, horizon)?;

    let registry = ModelRegistry::load(models_dir, &request.ticker)
        .with_context(|| format!("loading models for {}", request.ticker))?;
    let service = InferenceService::new(Arc::new(registry));
    let response = service.handle(&request);
    tracing::debug!(
        ticker = %request.ticker,
        horizon = request.horizon,
        closes = request.closes.len(),
        ok = response.is_ok(),
        "handled prediction request"
    );

    println!("{}", serde_json::to_string(&response)?);
    if let PredictResponse::Error { .. } = response {
        std::process::exit(1);
    }
    Ok(())
}

fn run_features(csv: &Path, feature_set: FeatureSet, out: Option<&Path>) -> Result<()> {
    let symbol = csv
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("CSV")
        .to_string();
    let series = load_csv(csv, &symbol)?;
    let engine = FeatureEngine::new(feature_set);
    let matrix = engine.compute(&series);
    let text = export_features_csv(&matrix)?;

    match out {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            eprintln!(
                "Wrote {} rows x {} features to {}",
                matrix.len(),
                engine.schema().len(),
                path.display()
            );
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn run_inspect(models_dir: &Path, ticker: &str) -> Result<()> {
    let registry = ModelRegistry::load(models_dir, ticker)
        .with_context(|| format!("loading models for {ticker}"))?;
    let engine = registry.engine();

    println!("Ticker:       {}", registry.ticker());
    println!("Feature set:  {}", registry.feature_set());
    println!("Features:     {}", registry.schema().len());
    println!("Schema hash:  {}", registry.schema().fingerprint());
    println!("Min history:  {} bars", engine.min_history());
    println!();
    println!("{:>8} {:>8} {:>8} {:>12} {:>12}", "horizon", "train", "val", "rmse", "baseline");
    for bundle in registry.bundles() {
        match bundle.stats() {
            Some(s) => println!(
                "{:>8} {:>8} {:>8} {:>12.6} {:>12.6}",
                bundle.horizon(),
                s.train_rows,
                s.val_rows,
                s.validation_rmse,
                s.baseline_rmse
            ),
            None => println!("{:>8} {:>8} {:>8} {:>12} {:>12}", bundle.horizon(), "-", "-", "-", "-"),
        }
    }
    Ok(())
}
