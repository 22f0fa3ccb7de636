//! Demographic-stratified verification metrics.
//!
//! Threshold selection is untouched: each fold's operating threshold comes
//! from the overall train split exactly as in the plain protocols, so every
//! subgroup combination is measured against one common decision boundary
//! per fold. Stratification happens only at the test-metric step, where the
//! confusion-matrix and accept counts are recomputed over the subset of
//! test pairs carrying each combination. Combinations are enumerated by the
//! caller, never discovered from the data, keeping the report deterministic.
//!
//! A combination with no pairs in a fold contributes zeros for that fold
//! (the ROC zero-denominator convention). Those zeros can dominate the
//! cross-fold standard deviation of small buckets; that is a documented
//! caveat of the protocol, not a bug.

use serde::{Deserialize, Serialize};

use crate::distance::pairwise_squared_distances;
use crate::error::{VerifyError, VerifyResult};
use crate::folds::KFold;
use crate::report::{GroupReport, MeanStd};
use crate::roc::{
    check_pair_batches, fold_distances, select_best_threshold, ConfusionMetrics, RocCurve,
    RocOutcome,
};
use crate::tar::{fold_threshold, AcceptCounts, TarFarOutcome};

/// The demographic labels of the two images of a pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupPair {
    /// Label of the first image.
    pub a: String,
    /// Label of the second image.
    pub b: String,
}

impl GroupPair {
    /// Build a combination from two per-image labels.
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
        }
    }

    /// The homogeneous combinations (x, x) for a label set, sorted. This is
    /// the enumeration the reference protocol evaluates.
    pub fn homogeneous(labels: &[&str]) -> Vec<GroupPair> {
        let mut combs: Vec<GroupPair> = labels.iter().map(|l| GroupPair::new(*l, *l)).collect();
        combs.sort();
        combs
    }
}

impl std::fmt::Display for GroupPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.a, self.b)
    }
}

/// Per-fold, per-combination ROC-side metrics.
#[derive(Debug, Clone, Default)]
struct GroupFoldRoc {
    accuracy: Vec<f64>,
    tpr: Vec<f64>,
    fpr: Vec<f64>,
}

/// Per-fold, per-combination accept-side metrics.
#[derive(Debug, Clone, Default)]
struct GroupFoldVal {
    tar: Vec<f64>,
    far: Vec<f64>,
}

fn check_group_assignment(n_pairs: usize, pair_groups: &[GroupPair]) -> VerifyResult<()> {
    if pair_groups.len() != n_pairs {
        return Err(VerifyError::PairCountMismatch {
            left: n_pairs,
            right: pair_groups.len(),
        });
    }
    Ok(())
}

/// Test-pair indices of one fold belonging to one combination.
fn combination_indices(test: &[usize], pair_groups: &[GroupPair], comb: &GroupPair) -> Vec<usize> {
    test.iter()
        .copied()
        .filter(|&i| pair_groups[i] == *comb)
        .collect()
}

/// Stratified variant of the cross-validated ROC computation.
///
/// Returns the overall [`RocOutcome`] (identical to the non-stratified
/// computation) plus per-combination accuracy/TPR/FPR aggregates measured
/// at each fold's overall selected threshold.
pub fn calculate_roc_stratified(
    thresholds: &[f64],
    emb1: &[Vec<f64>],
    emb2: &[Vec<f64>],
    actual_issame: &[bool],
    pair_groups: &[GroupPair],
    combinations: &[GroupPair],
    kfold: &KFold,
    pca_components: usize,
) -> VerifyResult<(RocOutcome, Vec<GroupReport>)> {
    let n_pairs = check_pair_batches(emb1, emb2, actual_issame)?;
    check_group_assignment(n_pairs, pair_groups)?;

    let splits = kfold.split(n_pairs);
    let n_folds = splits.len();

    let mut tpr_sums = vec![0.0; thresholds.len()];
    let mut fpr_sums = vec![0.0; thresholds.len()];
    let mut fold_accuracies = Vec::with_capacity(n_folds);
    let mut fold_thresholds = Vec::with_capacity(n_folds);
    let mut per_group: Vec<GroupFoldRoc> = vec![GroupFoldRoc::default(); combinations.len()];

    for (fold_idx, split) in splits.iter().enumerate() {
        let dists = fold_distances(emb1, emb2, split, pca_components, fold_idx)?;

        let best_idx = select_best_threshold(thresholds, &dists, actual_issame, &split.train);
        let best_threshold = thresholds[best_idx];

        for (t_idx, &threshold) in thresholds.iter().enumerate() {
            let m = ConfusionMetrics::at_threshold(threshold, &dists, actual_issame, &split.test);
            tpr_sums[t_idx] += m.tpr;
            fpr_sums[t_idx] += m.fpr;
        }

        let headline =
            ConfusionMetrics::at_threshold(best_threshold, &dists, actual_issame, &split.test);
        fold_accuracies.push(headline.accuracy);
        fold_thresholds.push(best_threshold);

        // Subgroup filtering happens only here, at the common threshold.
        for (comb, acc) in combinations.iter().zip(per_group.iter_mut()) {
            let subset = combination_indices(&split.test, pair_groups, comb);
            let m = ConfusionMetrics::at_threshold(best_threshold, &dists, actual_issame, &subset);
            acc.accuracy.push(m.accuracy);
            acc.tpr.push(m.tpr);
            acc.fpr.push(m.fpr);
        }
    }

    let scale = 1.0 / n_folds as f64;
    let outcome = RocOutcome {
        curve: RocCurve {
            thresholds: thresholds.to_vec(),
            tpr: tpr_sums.into_iter().map(|s| s * scale).collect(),
            fpr: fpr_sums.into_iter().map(|s| s * scale).collect(),
        },
        fold_accuracies,
        fold_thresholds,
    };

    let groups = combinations
        .iter()
        .zip(per_group.iter())
        .map(|(comb, folds)| GroupReport {
            combination: comb.clone(),
            accuracy: MeanStd::from_samples(&folds.accuracy),
            tpr: MeanStd::from_samples(&folds.tpr),
            fpr: MeanStd::from_samples(&folds.fpr),
            tar: MeanStd::default(),
            far: MeanStd::default(),
        })
        .collect();

    Ok((outcome, groups))
}

/// Stratified variant of the TAR@FAR computation.
///
/// The fold threshold is interpolated from the overall train split; the
/// per-combination accept rates use the zero-denominator convention (an
/// empty bucket yields 0, never a division by zero).
pub fn calculate_val_stratified(
    thresholds: &[f64],
    emb1: &[Vec<f64>],
    emb2: &[Vec<f64>],
    actual_issame: &[bool],
    pair_groups: &[GroupPair],
    combinations: &[GroupPair],
    far_target: f64,
    kfold: &KFold,
) -> VerifyResult<(TarFarOutcome, Vec<(MeanStd, MeanStd)>)> {
    let n_pairs = check_pair_batches(emb1, emb2, actual_issame)?;
    check_group_assignment(n_pairs, pair_groups)?;

    let dists = pairwise_squared_distances(emb1, emb2)?;
    let splits = kfold.split(n_pairs);

    let mut tars = Vec::with_capacity(splits.len());
    let mut fars = Vec::with_capacity(splits.len());
    let mut fold_thresholds = Vec::with_capacity(splits.len());
    let mut per_group: Vec<GroupFoldVal> = vec![GroupFoldVal::default(); combinations.len()];

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

        for (comb, acc) in combinations.iter().zip(per_group.iter_mut()) {
            let subset = combination_indices(&split.test, pair_groups, comb);
            let counts = AcceptCounts::at_threshold(threshold, &dists, actual_issame, &subset);
            let (tar, far) = counts.rates_or_zero();
            acc.tar.push(tar);
            acc.far.push(far);
        }
    }

    let far_mean = fars.iter().sum::<f64>() / fars.len() as f64;
    let outcome = TarFarOutcome {
        tar: MeanStd::from_samples(&tars),
        far_mean,
        fold_thresholds,
    };

    let groups = per_group
        .iter()
        .map(|folds| {
            (
                MeanStd::from_samples(&folds.tar),
                MeanStd::from_samples(&folds.far),
            )
        })
        .collect();

    Ok((outcome, groups))
}
