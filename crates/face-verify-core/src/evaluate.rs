//! Evaluation orchestration: the two top-level verification protocols.
//!
//! [`evaluate`] runs the plain protocol (cross-validated accuracy/ROC on
//! the coarse grid, then TAR@FAR on the fine grid) over a flattened
//! embedding sequence where even positions hold the first image of each
//! pair and odd positions the second. [`evaluate_stratified`] additionally
//! reports per-subgroup-combination aggregates. Neither owns any state
//! between invocations.

use tracing::info;

use crate::config::EvalConfig;
use crate::distance::{mean_norm, normalize_rows, sum_batches};
use crate::error::{VerifyError, VerifyResult};
use crate::folds::KFold;
use crate::report::{StratifiedReport, VerificationReport};
use crate::roc::calculate_roc;
use crate::stratified::{calculate_roc_stratified, calculate_val_stratified, GroupPair};
use crate::tar::calculate_val;
use crate::{report::MeanStd, EmbeddingBatch};

/// Embeddings ready for evaluation, plus the raw-batch norm statistic.
#[derive(Debug, Clone)]
pub struct PreparedEmbeddings {
    /// Flattened, unit-normalized embedding sequence (even/odd pair layout).
    pub vectors: EmbeddingBatch,
    /// Mean L2 norm of the raw batches before normalization.
    pub mean_norm: f64,
}

/// Merge the per-augmentation batches of a run into evaluation-ready
/// embeddings: sum the views element-wise (flip averaging up to scale),
/// L2-normalize, and record the raw mean norm.
///
/// A single batch passes through normalization unchanged in direction.
pub fn prepare_embeddings(batches: &[EmbeddingBatch]) -> VerifyResult<PreparedEmbeddings> {
    if batches.is_empty() {
        return Err(VerifyError::InvalidConfig(
            "no embedding batches supplied".into(),
        ));
    }
    let raw_norm = mean_norm(batches);
    let mut merged = batches[0].clone();
    for batch in &batches[1..] {
        merged = sum_batches(&merged, batch)?;
    }
    Ok(PreparedEmbeddings {
        vectors: normalize_rows(&merged),
        mean_norm: raw_norm,
    })
}

/// Split a flattened embedding sequence into the two pair halves and check
/// the `len(embeddings) == 2 * len(actual_issame)` invariant.
fn split_pairs(
    embeddings: &[Vec<f64>],
    actual_issame: &[bool],
) -> VerifyResult<(EmbeddingBatch, EmbeddingBatch)> {
    if embeddings.len() != 2 * actual_issame.len() {
        return Err(VerifyError::PairCountMismatch {
            left: embeddings.len() / 2,
            right: actual_issame.len(),
        });
    }
    let emb1: EmbeddingBatch = embeddings.iter().step_by(2).cloned().collect();
    let emb2: EmbeddingBatch = embeddings.iter().skip(1).step_by(2).cloned().collect();
    Ok((emb1, emb2))
}

fn make_kfold(config: &EvalConfig) -> KFold {
    if config.shuffle {
        KFold::with_shuffle(config.n_folds, config.seed)
    } else {
        KFold::new(config.n_folds)
    }
}

/// Run the plain verification protocol over prepared embeddings.
///
/// `embeddings` is the flattened sequence (even/odd pair layout) and must
/// hold exactly twice as many vectors as there are ground-truth labels.
/// The report's embedding-norm field reflects the input as given; use
/// [`evaluate_batches`] to evaluate raw augmentation batches and report the
/// pre-normalization norm.
pub fn evaluate(
    embeddings: &[Vec<f64>],
    actual_issame: &[bool],
    config: &EvalConfig,
) -> VerifyResult<VerificationReport> {
    let (emb1, emb2) = split_pairs(embeddings, actual_issame)?;
    let kfold = make_kfold(config);

    let roc_thresholds = config.roc_grid.thresholds()?;
    let roc = calculate_roc(
        &roc_thresholds,
        &emb1,
        &emb2,
        actual_issame,
        &kfold,
        config.pca_components,
    )?;

    let tar_thresholds = config.tar_grid.thresholds()?;
    let val = calculate_val(
        &tar_thresholds,
        &emb1,
        &emb2,
        actual_issame,
        config.far_target,
        &kfold,
    )?;

    let accuracy = MeanStd::from_samples(&roc.fold_accuracies);
    info!(
        accuracy = accuracy.mean,
        tar = val.tar.mean,
        far = val.far_mean,
        "verification evaluation complete"
    );

    Ok(VerificationReport {
        accuracy,
        fold_accuracies: roc.fold_accuracies,
        tar: val.tar,
        far_mean: val.far_mean,
        mean_embedding_norm: mean_norm(&[embeddings.to_vec()]),
        roc: roc.curve,
    })
}

/// Prepare raw augmentation batches and run the plain protocol.
///
/// The reported mean embedding norm is taken from the raw batches, before
/// the flip merge and normalization.
pub fn evaluate_batches(
    batches: &[EmbeddingBatch],
    actual_issame: &[bool],
    config: &EvalConfig,
) -> VerifyResult<VerificationReport> {
    let prepared = prepare_embeddings(batches)?;
    let mut report = evaluate(&prepared.vectors, actual_issame, config)?;
    report.mean_embedding_norm = prepared.mean_norm;
    Ok(report)
}

/// Run the stratified verification protocol.
///
/// `pair_groups` assigns each pair its subgroup combination;
/// `combinations` enumerates the combinations to report on (pairs carrying
/// a non-enumerated combination still contribute to the overall metrics).
/// Threshold selection is shared with the plain protocol; stratification
/// applies only at the test-metric step.
pub fn evaluate_stratified(
    embeddings: &[Vec<f64>],
    actual_issame: &[bool],
    pair_groups: &[GroupPair],
    combinations: &[GroupPair],
    config: &EvalConfig,
) -> VerifyResult<StratifiedReport> {
    let (emb1, emb2) = split_pairs(embeddings, actual_issame)?;
    let kfold = make_kfold(config);

    let roc_thresholds = config.roc_grid.thresholds()?;
    let (roc, mut groups) = calculate_roc_stratified(
        &roc_thresholds,
        &emb1,
        &emb2,
        actual_issame,
        pair_groups,
        combinations,
        &kfold,
        config.pca_components,
    )?;

    let tar_thresholds = config.tar_grid.thresholds()?;
    let (val, group_rates) = calculate_val_stratified(
        &tar_thresholds,
        &emb1,
        &emb2,
        actual_issame,
        pair_groups,
        combinations,
        config.far_target,
        &kfold,
    )?;

    for (group, (tar, far)) in groups.iter_mut().zip(group_rates.into_iter()) {
        group.tar = tar;
        group.far = far;
    }

    let accuracy = MeanStd::from_samples(&roc.fold_accuracies);
    info!(
        accuracy = accuracy.mean,
        tar = val.tar.mean,
        combinations = combinations.len(),
        "stratified verification evaluation complete"
    );

    Ok(StratifiedReport {
        overall: VerificationReport {
            accuracy,
            fold_accuracies: roc.fold_accuracies,
            tar: val.tar,
            far_mean: val.far_mean,
            mean_embedding_norm: mean_norm(&[embeddings.to_vec()]),
            roc: roc.curve,
        },
        groups,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_invariant_enforced() {
        let embeddings = vec![vec![0.0]; 5]; // odd length
        let labels = vec![true, false];
        assert!(matches!(
            evaluate(&embeddings, &labels, &EvalConfig::default()),
            Err(VerifyError::PairCountMismatch { .. })
        ));
    }

    #[test]
    fn test_prepare_merges_and_normalizes() {
        let batches = vec![
            vec![vec![1.0, 0.0], vec![0.0, 2.0]],
            vec![vec![1.0, 0.0], vec![0.0, 2.0]],
        ];
        let prepared = prepare_embeddings(&batches).unwrap();
        // Summed then normalized: directions preserved, unit length.
        assert!((prepared.vectors[0][0] - 1.0).abs() < 1e-12);
        assert!((prepared.vectors[1][1] - 1.0).abs() < 1e-12);
        // Raw mean norm: (1 + 2 + 1 + 2) / 4.
        assert!((prepared.mean_norm - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_prepare_rejects_empty_input() {
        assert!(matches!(
            prepare_embeddings(&[]),
            Err(VerifyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_even_odd_pair_layout() {
        // Pair 0 = (emb[0], emb[1]) identical; pair 1 = (emb[2], emb[3])
        // opposite. With one fold, accuracy is computed in-sample.
        let embeddings = vec![
            vec![1.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
        ];
        let labels = vec![true, false];
        let config = EvalConfig {
            n_folds: 1,
            ..EvalConfig::default()
        };
        let report = evaluate(&embeddings, &labels, &config).unwrap();
        assert!((report.accuracy.mean - 1.0).abs() < 1e-12);
        assert_eq!(report.fold_accuracies.len(), 1);
    }
}
