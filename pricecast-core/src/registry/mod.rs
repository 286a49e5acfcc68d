//! Model registry: one ticker's per-horizon models plus the feature schema
//! they were trained on.
//!
//! A registry is immutable once built. Every consistency check happens in
//! [`ModelRegistry::load`] / [`ModelRegistry::from_parts`]; a registry that
//! exists is a registry whose models all accept the schema's row width.

pub mod metadata;
pub mod persist;

pub use metadata::{
    metadata_file_name, model_file_name, HorizonEntry, HorizonStats, ModelMetadata,
};
pub use persist::{
    write_json_atomic, write_registry, write_registry_with, PersistedArtifacts, StagedArtifacts,
};

use crate::domain::Horizon;
use crate::features::{FeatureEngine, FeatureSchema, FeatureSet};
use crate::model::{ModelArtifact, Regressor};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fatal registry construction errors. None of these are recoverable at
/// request time; the service must not start with a broken registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed metadata {path}: {reason}")]
    MalformedMetadata { path: PathBuf, reason: String },

    #[error(
        "feature schema mismatch at column {position}: expected {expected:?}, found {found:?}"
    )]
    SchemaMismatch {
        position: usize,
        expected: Option<String>,
        found: Option<String>,
    },

    #[error("schema fingerprint mismatch: metadata has {recorded}, engine has {current}")]
    FingerprintMismatch { recorded: String, current: String },

    #[error("model for horizon {horizon} missing at {path}")]
    MissingModel { horizon: Horizon, path: PathBuf },

    #[error("malformed model file {path}: {reason}")]
    MalformedModel { path: PathBuf, reason: String },

    #[error("model for horizon {horizon} expects {model_width} features, schema has {schema_width}")]
    DimensionMismatch {
        horizon: Horizon,
        model_width: usize,
        schema_width: usize,
    },

    #[error("duplicate model for horizon {0}")]
    DuplicateHorizon(Horizon),

    #[error("registry holds no models")]
    Empty,
}

/// A fitted model bound to its horizon, with optional training statistics.
#[derive(Debug, Clone)]
pub struct ModelBundle {
    horizon: Horizon,
    model: ModelArtifact,
    stats: Option<HorizonStats>,
}

impl ModelBundle {
    pub fn new(horizon: Horizon, model: ModelArtifact) -> Self {
        Self {
            horizon,
            model,
            stats: None,
        }
    }

    pub fn with_stats(mut self, stats: HorizonStats) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    pub fn model(&self) -> &ModelArtifact {
        &self.model
    }

    pub fn stats(&self) -> Option<&HorizonStats> {
        self.stats.as_ref()
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    ticker: String,
    engine: FeatureEngine,
    models: BTreeMap<Horizon, ModelBundle>,
}

impl ModelRegistry {
    /// Build a registry from in-memory models, checking every model against
    /// the schema of `feature_set`.
    pub fn from_parts(
        ticker: impl Into<String>,
        feature_set: FeatureSet,
        bundles: Vec<ModelBundle>,
    ) -> Result<Self, RegistryError> {
        let engine = FeatureEngine::new(feature_set);
        let schema_width = engine.schema().len();
        let mut models = BTreeMap::new();
        for bundle in bundles {
            let model_width = bundle.model.n_features();
            if model_width != schema_width {
                return Err(RegistryError::DimensionMismatch {
                    horizon: bundle.horizon,
                    model_width,
                    schema_width,
                });
            }
            let horizon = bundle.horizon;
            if models.insert(horizon, bundle).is_some() {
                return Err(RegistryError::DuplicateHorizon(horizon));
            }
        }
        if models.is_empty() {
            return Err(RegistryError::Empty);
        }
        Ok(Self {
            ticker: ticker.into(),
            engine,
            models,
        })
    }

    /// Load `meta_<ticker>.json` and every model file it references from `dir`.
    pub fn load(dir: impl AsRef<Path>, ticker: &str) -> Result<Self, RegistryError> {
        let dir = dir.as_ref();
        let meta_path = dir.join(metadata_file_name(ticker));
        let text = fs::read_to_string(&meta_path).map_err(|source| RegistryError::Io {
            path: meta_path.clone(),
            source,
        })?;
        let metadata: ModelMetadata =
            serde_json::from_str(&text).map_err(|e| RegistryError::MalformedMetadata {
                path: meta_path.clone(),
                reason: e.to_string(),
            })?;
        let malformed = |reason: String| RegistryError::MalformedMetadata {
            path: meta_path.clone(),
            reason,
        };

        if metadata.ticker != ticker {
            return Err(malformed(format!(
                "metadata is for ticker {:?}, requested {ticker:?}",
                metadata.ticker
            )));
        }

        let feature_set = match metadata.feature_set {
            Some(set) => set,
            None => infer_feature_set(&metadata.feature_cols),
        };
        let engine = FeatureEngine::new(feature_set);
        check_schema(engine.schema(), &metadata.feature_cols)?;

        if let Some(recorded) = &metadata.schema_hash {
            let current = engine.schema().fingerprint();
            if *recorded != current {
                return Err(RegistryError::FingerprintMismatch {
                    recorded: recorded.clone(),
                    current,
                });
            }
        }
        if let Some(warmup) = metadata.warmup {
            if warmup != engine.warmup() {
                return Err(malformed(format!(
                    "recorded warmup {warmup} differs from engine warmup {}",
                    engine.warmup()
                )));
            }
        }

        let mut bundles = Vec::new();
        for (horizon, entry) in metadata.parsed_horizons() {
            let horizon =
                horizon.map_err(|key| malformed(format!("unsupported horizon key {key:?}")))?;
            if !is_plain_file_name(&entry.model_file) {
                return Err(malformed(format!(
                    "model file {:?} must be a bare file name",
                    entry.model_file
                )));
            }
            let model = read_model(&dir.join(&entry.model_file), horizon)?;
            let mut bundle = ModelBundle::new(horizon, model);
            bundle.stats = entry.stats;
            bundles.push(bundle);
        }

        let registry = Self::from_parts(ticker, feature_set, bundles)?;
        tracing::info!(
            ticker,
            feature_set = %feature_set,
            horizons = ?registry.horizons(),
            "loaded model registry"
        );
        Ok(registry)
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn feature_set(&self) -> FeatureSet {
        self.engine.feature_set()
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.engine.schema()
    }

    /// Feature engine configured for this registry's schema.
    pub fn engine(&self) -> &FeatureEngine {
        &self.engine
    }

    pub fn get(&self, horizon: Horizon) -> Option<&ModelBundle> {
        self.models.get(&horizon)
    }

    pub fn horizons(&self) -> Vec<Horizon> {
        self.models.keys().copied().collect()
    }

    pub fn bundles(&self) -> impl Iterator<Item = &ModelBundle> {
        self.models.values()
    }

    /// Metadata document describing this registry.
    pub fn metadata(&self) -> ModelMetadata {
        let horizons = self
            .models
            .values()
            .map(|b| {
                (
                    b.horizon.to_string(),
                    HorizonEntry {
                        model_file: model_file_name(&self.ticker, b.horizon),
                        stats: b.stats,
                    },
                )
            })
            .collect();
        ModelMetadata {
            ticker: self.ticker.clone(),
            feature_cols: self.schema().names().to_vec(),
            horizons,
            feature_set: Some(self.feature_set()),
            schema_hash: Some(self.schema().fingerprint()),
            warmup: Some(self.engine.warmup()),
            created_at: Some(chrono::Utc::now()),
        }
    }
}

/// Pick the feature set whose schema equals `cols`, falling back to the
/// default so the mismatch is reported against it.
fn infer_feature_set(cols: &[String]) -> FeatureSet {
    [FeatureSet::CloseOnly, FeatureSet::Full]
        .into_iter()
        .find(|set| {
            FeatureEngine::new(*set)
                .schema()
                .first_divergence(cols)
                .is_none()
        })
        .unwrap_or_default()
}

fn check_schema(schema: &FeatureSchema, cols: &[String]) -> Result<(), RegistryError> {
    match schema.first_divergence(cols) {
        None => Ok(()),
        Some(position) => Err(RegistryError::SchemaMismatch {
            position,
            expected: schema.names().get(position).cloned(),
            found: cols.get(position).cloned(),
        }),
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && Path::new(name)
            .file_name()
            .is_some_and(|f| f.to_str() == Some(name))
}

fn read_model(path: &Path, horizon: Horizon) -> Result<ModelArtifact, RegistryError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(RegistryError::MissingModel {
                horizon,
                path: path.to_path_buf(),
            })
        }
        Err(source) => {
            return Err(RegistryError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&text).map_err(|e| RegistryError::MalformedModel {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
