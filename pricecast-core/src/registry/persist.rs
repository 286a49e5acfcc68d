//! Atomic artifact persistence.
//!
//! A registry is written in two phases. Every document (models, then any
//! extra documents, then the metadata) is first staged to `<name>.tmp`;
//! only when all of them are staged are they renamed into place, metadata
//! last. A failure while staging removes the staged files and leaves the
//! previously committed artifacts in `dir` untouched.

use super::{metadata_file_name, model_file_name, ModelRegistry, RegistryError};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Paths written by one successful [`write_registry`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedArtifacts {
    pub model_files: Vec<PathBuf>,
    pub metadata_file: PathBuf,
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn stage_json<T: Serialize>(path: &Path, value: &T) -> Result<PathBuf, RegistryError> {
    let io_err = |source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    };
    if path.is_dir() {
        return Err(io_err(io::Error::new(
            io::ErrorKind::Other,
            "destination is a directory",
        )));
    }
    let json = serde_json::to_vec_pretty(value).map_err(|e| io_err(e.into()))?;
    let tmp = tmp_path(path);
    if let Err(e) = fs::write(&tmp, json) {
        remove_all(std::slice::from_ref(&tmp));
        return Err(io_err(e));
    }
    Ok(tmp)
}

/// Serialize `value` as pretty JSON and atomically place it at `path`.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), RegistryError> {
    let tmp = stage_json(path, value)?;
    fs::rename(&tmp, path).map_err(|source| {
        remove_all(std::slice::from_ref(&tmp));
        RegistryError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Documents staged as `.tmp` files, renamed into place by [`commit`].
///
/// Dropping an uncommitted set removes every staged file.
///
/// [`commit`]: StagedArtifacts::commit
#[derive(Debug, Default)]
pub struct StagedArtifacts {
    staged: Vec<(PathBuf, PathBuf)>,
}

impl StagedArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `value` to `<path>.tmp`. Nothing at `path` changes yet.
    pub fn stage<T: Serialize>(&mut self, path: &Path, value: &T) -> Result<(), RegistryError> {
        let tmp = stage_json(path, value)?;
        self.staged.push((tmp, path.to_path_buf()));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Rename every staged file into place in staging order.
    pub fn commit(mut self) -> Result<Vec<PathBuf>, RegistryError> {
        let mut committed = Vec::with_capacity(self.staged.len());
        let mut pending = std::mem::take(&mut self.staged).into_iter();
        while let Some((tmp, path)) = pending.next() {
            if let Err(source) = fs::rename(&tmp, &path) {
                let mut leftover = vec![tmp];
                leftover.extend(pending.map(|(tmp, _)| tmp));
                remove_all(&leftover);
                return Err(RegistryError::Io { path, source });
            }
            committed.push(path);
        }
        Ok(committed)
    }
}

impl Drop for StagedArtifacts {
    fn drop(&mut self) {
        let tmps: Vec<PathBuf> = self.staged.drain(..).map(|(tmp, _)| tmp).collect();
        remove_all(&tmps);
    }
}

/// Stage every model of `registry` into `staging`. Returns the final paths.
fn stage_models(
    registry: &ModelRegistry,
    dir: &Path,
    staging: &mut StagedArtifacts,
) -> Result<Vec<PathBuf>, RegistryError> {
    let mut paths = Vec::new();
    for bundle in registry.bundles() {
        let path = dir.join(model_file_name(registry.ticker(), bundle.horizon()));
        staging.stage(&path, bundle.model())?;
        paths.push(path);
    }
    Ok(paths)
}

/// Write every model of `registry`, then `extra` documents, then its
/// metadata into `dir`. Either all of them land or none do.
pub fn write_registry_with<T: Serialize>(
    registry: &ModelRegistry,
    dir: &Path,
    extra: &[(PathBuf, &T)],
) -> Result<PersistedArtifacts, RegistryError> {
    fs::create_dir_all(dir).map_err(|source| RegistryError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut staging = StagedArtifacts::new();
    let model_files = stage_models(registry, dir, &mut staging)?;
    for (path, value) in extra {
        staging.stage(path, value)?;
    }
    let metadata_file = dir.join(metadata_file_name(registry.ticker()));
    staging.stage(&metadata_file, &registry.metadata())?;
    staging.commit()?;

    tracing::info!(
        ticker = registry.ticker(),
        dir = %dir.display(),
        models = model_files.len(),
        "persisted model registry"
    );
    Ok(PersistedArtifacts {
        model_files,
        metadata_file,
    })
}

/// Write every model of `registry` and then its metadata into `dir`.
pub fn write_registry(
    registry: &ModelRegistry,
    dir: &Path,
) -> Result<PersistedArtifacts, RegistryError> {
    write_registry_with::<()>(registry, dir, &[])
}

pub(crate) fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove staged artifact")
            }
        }
    }
}
