//! Cross-validated ROC curve and accuracy-maximizing threshold search.
//!
//! Per fold, the accuracy-maximizing threshold is selected on the train
//! split only and the headline accuracy is then measured on the held-out
//! test split; this train/test separation is what removes the optimistic
//! bias of tuning and scoring on the same pairs. TPR/FPR are additionally
//! evaluated at every grid threshold on the test split, giving one ROC
//! curve per fold which is averaged arithmetically across folds.

use tracing::debug;

use crate::distance::{normalize_rows, pairwise_squared_distances};
use crate::error::{VerifyError, VerifyResult};
use crate::folds::{FoldSplit, KFold};
use crate::pca::PcaProjection;

/// Confusion-matrix counts and derived rates at one threshold.
///
/// A pair is predicted matching iff its distance is strictly below the
/// threshold. Zero-denominator TPR/FPR are defined as 0, never NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfusionMetrics {
    /// True positives (predicted match, actually match).
    pub tp: usize,
    /// False positives (predicted match, actually non-match).
    pub fp: usize,
    /// True negatives.
    pub tn: usize,
    /// False negatives.
    pub fn_: usize,
    /// True-positive rate, 0 when there are no actual matches.
    pub tpr: f64,
    /// False-positive rate, 0 when there are no actual non-matches.
    pub fpr: f64,
    /// Fraction of correct predictions, 0 for an empty subset.
    pub accuracy: f64,
}

impl ConfusionMetrics {
    /// Evaluate the confusion matrix over the pairs named by `indices`.
    pub fn at_threshold(
        threshold: f64,
        dists: &[f64],
        actual_issame: &[bool],
        indices: &[usize],
    ) -> Self {
        let mut tp = 0;
        let mut fp = 0;
        let mut tn = 0;
        let mut fn_ = 0;
        for &i in indices {
            let predicted = dists[i] < threshold;
            match (predicted, actual_issame[i]) {
                (true, true) => tp += 1,
                (true, false) => fp += 1,
                (false, false) => tn += 1,
                (false, true) => fn_ += 1,
            }
        }

        let tpr = if tp + fn_ == 0 {
            0.0
        } else {
            tp as f64 / (tp + fn_) as f64
        };
        let fpr = if fp + tn == 0 {
            0.0
        } else {
            fp as f64 / (fp + tn) as f64
        };
        let accuracy = if indices.is_empty() {
            0.0
        } else {
            (tp + tn) as f64 / indices.len() as f64
        };

        Self {
            tp,
            fp,
            tn,
            fn_,
            tpr,
            fpr,
            accuracy,
        }
    }
}

/// Per-threshold TPR/FPR averaged across folds.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RocCurve {
    /// The threshold grid the curve was evaluated on.
    pub thresholds: Vec<f64>,
    /// Mean test-split TPR at each threshold.
    pub tpr: Vec<f64>,
    /// Mean test-split FPR at each threshold.
    pub fpr: Vec<f64>,
}

/// Outcome of the cross-validated threshold search.
#[derive(Debug, Clone)]
pub struct RocOutcome {
    /// Fold-averaged ROC curve.
    pub curve: RocCurve,
    /// Test-split accuracy at the selected threshold, one entry per fold.
    pub fold_accuracies: Vec<f64>,
    /// The train-selected threshold of each fold.
    pub fold_thresholds: Vec<f64>,
}

/// Validate batch agreement and return the pair count.
pub(crate) fn check_pair_batches(
    emb1: &[Vec<f64>],
    emb2: &[Vec<f64>],
    actual_issame: &[bool],
) -> VerifyResult<usize> {
    if emb1.len() != emb2.len() {
        return Err(VerifyError::PairCountMismatch {
            left: emb1.len(),
            right: emb2.len(),
        });
    }
    if emb1.len() != actual_issame.len() {
        return Err(VerifyError::PairCountMismatch {
            left: emb1.len(),
            right: actual_issame.len(),
        });
    }
    Ok(emb1.len())
}

/// Distances for one fold, applying the optional train-fit projection.
///
/// With `pca_components > 0` the projection is fit on the fold's train
/// embeddings only (both halves concatenated), applied to every pair, and
/// the projected vectors are re-normalized to unit length before the
/// distance computation. Returns distances for all pairs.
pub(crate) fn fold_distances(
    emb1: &[Vec<f64>],
    emb2: &[Vec<f64>],
    split: &FoldSplit,
    pca_components: usize,
    fold_idx: usize,
) -> VerifyResult<Vec<f64>> {
    if pca_components == 0 {
        return pairwise_squared_distances(emb1, emb2);
    }

    debug!(fold = fold_idx, components = pca_components, "fitting fold-local projection");
    let train_vectors: Vec<Vec<f64>> = split
        .train
        .iter()
        .map(|&i| emb1[i].clone())
        .chain(split.train.iter().map(|&i| emb2[i].clone()))
        .collect();
    let projection = PcaProjection::fit(&train_vectors, pca_components)?;

    let projected1 = normalize_rows(&projection.project(emb1)?);
    let projected2 = normalize_rows(&projection.project(emb2)?);
    pairwise_squared_distances(&projected1, &projected2)
}

/// Select the accuracy-maximizing threshold index on the train split.
///
/// Ties break to the first maximum in ascending threshold order.
pub(crate) fn select_best_threshold(
    thresholds: &[f64],
    dists: &[f64],
    actual_issame: &[bool],
    train: &[usize],
) -> usize {
    let mut best_idx = 0;
    let mut best_acc = f64::NEG_INFINITY;
    for (idx, &threshold) in thresholds.iter().enumerate() {
        let acc = ConfusionMetrics::at_threshold(threshold, dists, actual_issame, train).accuracy;
        if acc > best_acc {
            best_acc = acc;
            best_idx = idx;
        }
    }
    best_idx
}

/// Cross-validated ROC computation.
///
/// Returns the fold-averaged ROC curve plus per-fold accuracies at each
/// fold's train-selected threshold. `pca_components > 0` enables the
/// fold-local dimensionality reduction.
pub fn calculate_roc(
    thresholds: &[f64],
    emb1: &[Vec<f64>],
    emb2: &[Vec<f64>],
    actual_issame: &[bool],
    kfold: &KFold,
    pca_components: usize,
) -> VerifyResult<RocOutcome> {
    let n_pairs = check_pair_batches(emb1, emb2, actual_issame)?;
    let splits = kfold.split(n_pairs);
    let n_folds = splits.len();

    let mut tpr_sums = vec![0.0; thresholds.len()];
    let mut fpr_sums = vec![0.0; thresholds.len()];
    let mut fold_accuracies = Vec::with_capacity(n_folds);
    let mut fold_thresholds = Vec::with_capacity(n_folds);

    for (fold_idx, split) in splits.iter().enumerate() {
        let dists = fold_distances(emb1, emb2, split, pca_components, fold_idx)?;

        let best_idx = select_best_threshold(thresholds, &dists, actual_issame, &split.train);
        let best_threshold = thresholds[best_idx];
        debug!(fold = fold_idx, threshold = best_threshold, "selected fold threshold");

        for (t_idx, &threshold) in thresholds.iter().enumerate() {
            let m = ConfusionMetrics::at_threshold(threshold, &dists, actual_issame, &split.test);
            tpr_sums[t_idx] += m.tpr;
            fpr_sums[t_idx] += m.fpr;
        }

        let headline =
            ConfusionMetrics::at_threshold(best_threshold, &dists, actual_issame, &split.test);
        fold_accuracies.push(headline.accuracy);
        fold_thresholds.push(best_threshold);
    }

    let scale = 1.0 / n_folds as f64;
    Ok(RocOutcome {
        curve: RocCurve {
            thresholds: thresholds.to_vec(),
            tpr: tpr_sums.into_iter().map(|s| s * scale).collect(),
            fpr: fpr_sums.into_iter().map(|s| s * scale).collect(),
        },
        fold_accuracies,
        fold_thresholds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flattened 1-D embeddings whose pairwise distance equals `d`.
    fn pair_halves(dists: &[f64]) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
        let emb1 = vec![vec![0.0]; dists.len()];
        let emb2 = dists.iter().map(|d| vec![d.sqrt()]).collect();
        (emb1, emb2)
    }

    #[test]
    fn test_zero_denominator_rates_are_zero() {
        // All pairs actually match: no negatives, so FPR must be 0 not NaN.
        let dists = vec![0.5, 1.5];
        let labels = vec![true, true];
        let m = ConfusionMetrics::at_threshold(1.0, &dists, &labels, &[0, 1]);
        assert_eq!(m.fpr, 0.0);
        assert!((m.tpr - 0.5).abs() < 1e-12);

        // Empty subset: everything 0.
        let empty = ConfusionMetrics::at_threshold(1.0, &dists, &labels, &[]);
        assert_eq!(empty.accuracy, 0.0);
        assert_eq!(empty.tpr, 0.0);
        assert_eq!(empty.fpr, 0.0);
    }

    #[test]
    fn test_tie_break_takes_first_maximum() {
        // Distance 2.0 everywhere: every threshold <= 2.0 scores the same
        // accuracy, so the selected index must be 0.
        let dists = vec![2.0; 10];
        let labels: Vec<bool> = (0..10).map(|i| i % 3 == 0).collect();
        let thresholds: Vec<f64> = (0..20).map(|i| i as f64 * 0.1).collect();
        let indices: Vec<usize> = (0..10).collect();
        let best = select_best_threshold(&thresholds, &dists, &labels, &indices);
        assert_eq!(best, 0);
    }

    #[test]
    fn test_separable_data_scores_perfectly() {
        // Matches at distance 0.25, non-matches at 3.5; any mid threshold
        // classifies perfectly, so every fold accuracy is 1.0.
        let dists: Vec<f64> = (0..40)
            .map(|i| if i % 2 == 0 { 0.25 } else { 3.5 })
            .collect();
        let labels: Vec<bool> = (0..40).map(|i| i % 2 == 0).collect();
        let (emb1, emb2) = pair_halves(&dists);
        let thresholds: Vec<f64> = (0..400).map(|i| i as f64 * 0.01).collect();

        let outcome =
            calculate_roc(&thresholds, &emb1, &emb2, &labels, &KFold::new(4), 0).unwrap();
        assert_eq!(outcome.fold_accuracies.len(), 4);
        for acc in &outcome.fold_accuracies {
            assert!((acc - 1.0).abs() < 1e-12);
        }
        // Curve endpoints: at threshold 0 nothing accepted; near 4 all.
        assert_eq!(outcome.curve.tpr[0], 0.0);
        assert!((outcome.curve.tpr[399] - 1.0).abs() < 1e-12);
        assert!((outcome.curve.fpr[399] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pair_count_mismatch_surfaces() {
        let emb1 = vec![vec![0.0]];
        let emb2 = vec![vec![0.0], vec![1.0]];
        let labels = vec![true];
        assert!(matches!(
            calculate_roc(&[0.5], &emb1, &emb2, &labels, &KFold::new(1), 0),
            Err(VerifyError::PairCountMismatch { .. })
        ));
    }

    #[test]
    fn test_pca_path_preserves_perfect_separation() {
        // 3-D embeddings with class structure along one axis; projecting to
        // 2 components keeps the separation.
        let n = 20;
        let mut emb1 = Vec::new();
        let mut emb2 = Vec::new();
        let mut labels = Vec::new();
        for i in 0..n {
            let same = i % 2 == 0;
            let jitter = (i as f64) * 1e-3;
            emb1.push(vec![1.0, jitter, 0.0]);
            if same {
                emb2.push(vec![1.0, jitter + 0.01, 0.0]);
            } else {
                emb2.push(vec![-1.0, jitter, 0.0]);
            }
            labels.push(same);
        }
        let thresholds: Vec<f64> = (0..400).map(|i| i as f64 * 0.01).collect();
        let outcome =
            calculate_roc(&thresholds, &emb1, &emb2, &labels, &KFold::new(5), 2).unwrap();
        for acc in &outcome.fold_accuracies {
            assert!((acc - 1.0).abs() < 1e-12, "fold accuracy {acc} below 1.0");
        }
    }
}
