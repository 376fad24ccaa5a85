//! Process-wide cache of loaded model artifacts
//!
//! Entries are keyed by canonical path and reused while the file's modification time
//! and the requested strategy are unchanged. A replaced file is reloaded on
//! the next lookup.

use super::{LoadStrategy, ModelArtifact, ModelLoader};
use crate::error::{Error, Result};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

struct CachedModel {
    modified: Option<SystemTime>,
    strategy: LoadStrategy,
    artifact: Arc<ModelArtifact>,
}

/// Registry of loaded models
#[derive(Default)]
pub struct ModelCache {
    /// Map of path -> loaded artifact
    entries: DashMap<PathBuf, CachedModel>,
}

/// Canonical form of `path`, or `path` itself when it cannot be resolved
fn cache_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached artifact for `path`, loading it if absent or stale
    ///
    /// Two concurrent misses may both load; the later insert wins and both
    /// callers receive a valid artifact.
    pub fn get_or_load(
        &self,
        path: impl AsRef<Path>,
        strategy: LoadStrategy,
    ) -> Result<Arc<ModelArtifact>> {
        let path = path.as_ref();
        let modified = match std::fs::metadata(path) {
            Ok(meta) => meta.modified().ok(),
            Err(_) => {
                // Drop entries for files that have gone away
                self.entries.retain(|key, _| key.exists());
                return Err(Error::ModelNotFound {
                    path: path.to_path_buf(),
                });
            }
        };

        let key = cache_key(path);
        if let Some(entry) = self.entries.get(&key) {
            if entry.modified == modified && entry.strategy == strategy {
                debug!(path = %path.display(), "Model cache hit");
                return Ok(Arc::clone(&entry.artifact));
            }
        }

        // No map guard is held while loading
        let artifact = Arc::new(ModelLoader::load(path, strategy)?);
        info!(
            path = %path.display(),
            version = %artifact.version(),
            "Model cached"
        );
        self.entries.insert(
            key,
            CachedModel {
                modified,
                strategy,
                artifact: Arc::clone(&artifact),
            },
        );
        Ok(artifact)
    }

    /// Cached artifact for `path` without touching the filesystem
    pub fn peek(&self, path: &Path) -> Option<Arc<ModelArtifact>> {
        self.entries
            .get(&cache_key(path))
            .map(|e| Arc::clone(&e.artifact))
    }

    pub fn invalidate(&self, path: &Path) -> bool {
        self.entries.remove(&cache_key(path)).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
