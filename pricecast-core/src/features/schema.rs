//! Feature sets and the ordered feature schema shared by training and serving.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which family of features the engine produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSet {
    /// Everything derivable from closes alone; servable from bare closes.
    #[default]
    CloseOnly,
    /// Close features plus candle and volume features; needs OHLCV to serve.
    Full,
}

impl FeatureSet {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureSet::CloseOnly => "close_only",
            FeatureSet::Full => "full",
        }
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FeatureSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "close_only" | "close-only" => Ok(FeatureSet::CloseOnly),
            "full" => Ok(FeatureSet::Full),
            other => Err(format!(
                "unknown feature set '{other}' (expected close_only or full)"
            )),
        }
    }
}

/// Fixed, ordered list of feature names.
///
/// Only the engine constructs schemas; a persisted name list is accepted
/// only after it has been compared against the engine's own schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureSchema {
    feature_set: FeatureSet,
    names: Vec<String>,
}

impl FeatureSchema {
    pub(crate) fn new(feature_set: FeatureSet, names: Vec<String>) -> Self {
        Self { feature_set, names }
    }

    pub fn feature_set(&self) -> FeatureSet {
        self.feature_set
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// BLAKE3 over the feature-set tag and the names in order.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.feature_set.as_str().as_bytes());
        for name in &self.names {
            hasher.update(b"\0");
            hasher.update(name.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Index of the first position where `other` diverges, if any.
    pub fn first_divergence(&self, other: &[String]) -> Option<usize> {
        let common = self.names.len().min(other.len());
        (0..common)
            .find(|&i| self.names[i] != other[i])
            .or_else(|| (self.names.len() != other.len()).then_some(common))
    }
}
