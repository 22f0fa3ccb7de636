//! On-disk memoization of computed embedding batches.
//!
//! A dataset run produces one embedding batch per augmentation (original
//! view, flipped view). Inference is the expensive step, so the batch list
//! is persisted wholesale as a single bincode file next to the dataset;
//! repeated evaluation invocations load it instead of recomputing unless
//! the caller forces a refresh. Entries are written once and never mutated;
//! a mutex scopes exclusive access around load/store so concurrent runs
//! never observe a partial write.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::{VerifyError, VerifyResult};
use crate::EmbeddingBatch;

/// File-backed cache for the per-augmentation embedding batch list.
#[derive(Debug)]
pub struct EmbeddingCache {
    path: PathBuf,
    guard: Mutex<()>,
}

impl EmbeddingCache {
    /// Cache backed by `path`; nothing is touched on disk until a load or
    /// store happens.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a cached batch list exists on disk.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the whole batch list from disk.
    pub fn load(&self) -> VerifyResult<Vec<EmbeddingBatch>> {
        let _held = self.guard.lock();
        self.load_locked()
    }

    /// Write the whole batch list to disk, replacing any previous content.
    pub fn store(&self, batches: &[EmbeddingBatch]) -> VerifyResult<()> {
        let _held = self.guard.lock();
        self.store_locked(batches)
    }

    /// Return the cached batch list, or run `compute`, persist its output,
    /// and return it. With `force` set the cache is ignored and rewritten.
    pub fn load_or_compute<F>(&self, force: bool, compute: F) -> VerifyResult<Vec<EmbeddingBatch>>
    where
        F: FnOnce() -> VerifyResult<Vec<EmbeddingBatch>>,
    {
        let _held = self.guard.lock();
        if !force && self.path.exists() {
            debug!(path = %self.path.display(), "loading embeddings from cache");
            return self.load_locked();
        }
        info!(path = %self.path.display(), "computing embeddings");
        let batches = compute()?;
        self.store_locked(&batches)?;
        Ok(batches)
    }

    fn load_locked(&self) -> VerifyResult<Vec<EmbeddingBatch>> {
        let bytes = std::fs::read(&self.path).map_err(|source| VerifyError::Cache {
            path: self.path.clone(),
            source,
        })?;
        bincode::deserialize(&bytes).map_err(|e| VerifyError::CacheCodec {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    fn store_locked(&self, batches: &[EmbeddingBatch]) -> VerifyResult<()> {
        let bytes = bincode::serialize(batches).map_err(|e| VerifyError::CacheCodec {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&self.path, bytes).map_err(|source| VerifyError::Cache {
            path: self.path.clone(),
            source,
        })
    }
}
