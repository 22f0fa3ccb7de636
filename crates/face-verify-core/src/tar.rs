//! TAR@FAR: the operating threshold that hits a target false-accept-rate.
//!
//! Per fold, the false-accept-rate is measured at every grid threshold on
//! the train split; the threshold achieving the target FAR is found by
//! monotone linear interpolation of (FAR -> threshold), which is valid
//! because FAR is non-decreasing in the threshold. When no grid threshold
//! reaches the target the solver falls back to threshold 0.0, an explicit
//! degenerate policy, not an error; the reported rates of such a run are
//! unreliable and callers should treat them accordingly.

use tracing::debug;

use crate::distance::pairwise_squared_distances;
use crate::error::{VerifyError, VerifyResult};
use crate::folds::KFold;
use crate::report::MeanStd;
use crate::roc::check_pair_batches;

/// Accept-decision counts at one threshold over a pair subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptCounts {
    /// Pairs accepted that actually match.
    pub true_accept: usize,
    /// Pairs accepted that do not match.
    pub false_accept: usize,
    /// Ground-truth matching pairs in the subset.
    pub n_same: usize,
    /// Ground-truth non-matching pairs in the subset.
    pub n_diff: usize,
}

impl AcceptCounts {
    /// Count accepts over the pairs named by `indices`.
    pub fn at_threshold(
        threshold: f64,
        dists: &[f64],
        actual_issame: &[bool],
        indices: &[usize],
    ) -> Self {
        let mut true_accept = 0;
        let mut false_accept = 0;
        let mut n_same = 0;
        let mut n_diff = 0;
        for &i in indices {
            let accepted = dists[i] < threshold;
            if actual_issame[i] {
                n_same += 1;
                if accepted {
                    true_accept += 1;
                }
            } else {
                n_diff += 1;
                if accepted {
                    false_accept += 1;
                }
            }
        }
        Self {
            true_accept,
            false_accept,
            n_same,
            n_diff,
        }
    }

    /// True-accept-rate and false-accept-rate, failing with `UndefinedRate`
    /// when either denominator is zero. The zero-denominator convention of
    /// the ROC path is deliberately not applied here.
    pub fn rates(&self, fold: usize) -> VerifyResult<(f64, f64)> {
        if self.n_same == 0 || self.n_diff == 0 {
            return Err(VerifyError::UndefinedRate {
                fold,
                n_same: self.n_same,
                n_diff: self.n_diff,
            });
        }
        Ok((
            self.true_accept as f64 / self.n_same as f64,
            self.false_accept as f64 / self.n_diff as f64,
        ))
    }

    /// Rates with zero denominators defined as 0, used only by the
    /// stratified per-combination path where small buckets are expected.
    pub fn rates_or_zero(&self) -> (f64, f64) {
        let tar = if self.n_same == 0 {
            0.0
        } else {
            self.true_accept as f64 / self.n_same as f64
        };
        let far = if self.n_diff == 0 {
            0.0
        } else {
            self.false_accept as f64 / self.n_diff as f64
        };
        (tar, far)
    }
}

/// Cross-fold TAR@FAR aggregates.
#[derive(Debug, Clone)]
pub struct TarFarOutcome {
    /// True-accept-rate across folds.
    pub tar: MeanStd,
    /// Mean false-accept-rate across folds.
    pub far_mean: f64,
    /// The interpolated (or fallback) threshold of each fold.
    pub fold_thresholds: Vec<f64>,
}

/// Interpolate the threshold achieving `far_target` from a non-decreasing
/// per-threshold FAR profile. Returns `None` when the target is unreachable
/// at any grid threshold.
pub(crate) fn interpolate_threshold(
    far_profile: &[f64],
    thresholds: &[f64],
    far_target: f64,
) -> Option<f64> {
    let hi = far_profile.iter().position(|&f| f >= far_target)?;
    if hi == 0 {
        return Some(thresholds[0]);
    }
    let lo = hi - 1;
    let span = far_profile[hi] - far_profile[lo];
    // far[lo] < target <= far[hi], so span > 0.
    let fraction = (far_target - far_profile[lo]) / span;
    Some(thresholds[lo] + fraction * (thresholds[hi] - thresholds[lo]))
}

/// Per-fold train-split FAR at every grid threshold, then the fold's
/// operating threshold (interpolated, or the 0.0 fallback).
pub(crate) fn fold_threshold(
    thresholds: &[f64],
    dists: &[f64],
    actual_issame: &[bool],
    train: &[usize],
    far_target: f64,
    fold_idx: usize,
) -> f64 {
    let far_profile: Vec<f64> = thresholds
        .iter()
        .map(|&t| {
            AcceptCounts::at_threshold(t, dists, actual_issame, train)
                .rates_or_zero()
                .1
        })
        .collect();

    match interpolate_threshold(&far_profile, thresholds, far_target) {
        Some(threshold) => threshold,
        None => {
            debug!(
                fold = fold_idx,
                far_target, "target FAR unreachable on train split, falling back to threshold 0.0"
            );
            0.0
        }
    }
}

/// Cross-validated TAR@FAR computation.
///
/// The reference protocol does not apply dimensionality reduction here;
/// distances come straight from the raw embeddings.
pub fn calculate_val(
    thresholds: &[f64],
    emb1: &[Vec<f64>],
    emb2: &[Vec<f64>],
    actual_issame: &[bool],
    far_target: f64,
    kfold: &KFold,
) -> VerifyResult<TarFarOutcome> {
    let n_pairs = check_pair_batches(emb1, emb2, actual_issame)?;
    let dists = pairwise_squared_distances(emb1, emb2)?;
    let splits = kfold.split(n_pairs);

    let mut tars = Vec::with_capacity(splits.len());
    let mut fars = Vec::with_capacity(splits.len());
    let mut fold_thresholds = Vec::with_capacity(splits.len());

    for (fold_idx, split) in splits.iter().enumerate() {
        let threshold = fold_threshold(
            thresholds,
            &dists,
            actual_issame,
            &split.train,
            far_target,
            fold_idx,
        );

        let counts = AcceptCounts::at_threshold(threshold, &dists, actual_issame, &split.test);
        let (tar, far) = counts.rates(fold_idx)?;
        tars.push(tar);
        fars.push(far);
        fold_thresholds.push(threshold);
    }

    let far_mean = fars.iter().sum::<f64>() / fars.len() as f64;
    Ok(TarFarOutcome {
        tar: MeanStd::from_samples(&tars),
        far_mean,
        fold_thresholds,
    })
}
