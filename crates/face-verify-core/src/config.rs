//! Evaluation configuration: fold counts, threshold grids, and the FAR target.
//!
//! Defaults encode the reference verification protocol: 10 folds, no
//! shuffling, no dimensionality reduction, a coarse accuracy grid of
//! 0..4 in steps of 0.01 and a fine TAR@FAR grid of 0..4 in steps of 0.001
//! with a target false-accept-rate of 1e-3. Normalized embeddings have
//! cosine-derived squared distances in [0, 4], which is why both grids
//! cover exactly that range.

use serde::{Deserialize, Serialize};

use crate::error::{VerifyError, VerifyResult};

/// An ascending, evenly spaced grid of threshold candidates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdGrid {
    /// First threshold candidate (inclusive).
    pub start: f64,
    /// Upper bound of the grid (exclusive).
    pub stop: f64,
    /// Spacing between consecutive candidates.
    pub step: f64,
}

impl ThresholdGrid {
    /// Coarse grid used for accuracy/ROC threshold search.
    pub fn roc() -> Self {
        Self {
            start: 0.0,
            stop: 4.0,
            step: 0.01,
        }
    }

    /// Fine grid used for TAR@FAR interpolation. Ten times finer than the
    /// ROC grid because the target FAR (1e-3) needs sub-0.01 resolution.
    pub fn tar() -> Self {
        Self {
            start: 0.0,
            stop: 4.0,
            step: 0.001,
        }
    }

    /// Materialize the grid as a vector of candidates.
    pub fn thresholds(&self) -> VerifyResult<Vec<f64>> {
        if !(self.step > 0.0) || !self.step.is_finite() {
            return Err(VerifyError::InvalidConfig(format!(
                "threshold grid step must be positive and finite, got {}",
                self.step
            )));
        }
        if self.stop <= self.start {
            return Err(VerifyError::InvalidConfig(format!(
                "threshold grid stop ({}) must exceed start ({})",
                self.stop, self.start
            )));
        }
        let count = ((self.stop - self.start) / self.step).ceil() as usize;
        Ok((0..count)
            .map(|i| self.start + i as f64 * self.step)
            .collect())
    }
}

/// Configuration for one evaluation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Number of cross-validation folds. `<= 1` means train == test ==
    /// everything (bootstrap mode, no held-out bias correction).
    pub n_folds: usize,
    /// Target dimensionality for the per-fold PCA projection; 0 disables it.
    pub pca_components: usize,
    /// Target false-accept-rate for the TAR@FAR solver.
    pub far_target: f64,
    /// Threshold grid for the accuracy/ROC search.
    pub roc_grid: ThresholdGrid,
    /// Threshold grid for the TAR@FAR search.
    pub tar_grid: ThresholdGrid,
    /// Shuffle pair indices before the fold split. Off by default so splits
    /// are contiguous and reproducible without a seed.
    pub shuffle: bool,
    /// Seed for the shuffle generator; ignored unless `shuffle` is set.
    pub seed: u64,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            n_folds: 10,
            pca_components: 0,
            far_target: 1e-3,
            roc_grid: ThresholdGrid::roc(),
            tar_grid: ThresholdGrid::tar(),
            shuffle: false,
            seed: 0,
        }
    }
}
