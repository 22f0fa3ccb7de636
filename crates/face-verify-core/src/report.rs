//! Result bundles produced by an evaluation pass.
//!
//! These structs are the sole externally consumed artifact of the engine;
//! downstream summary output depends on their fields staying stable.

use serde::{Deserialize, Serialize};

use crate::roc::RocCurve;
use crate::stratified::GroupPair;

/// Mean and population standard deviation of a per-fold scalar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MeanStd {
    /// Arithmetic mean across folds.
    pub mean: f64,
    /// Population standard deviation (ddof = 0) across folds.
    pub std: f64,
}

impl MeanStd {
    /// Aggregate a per-fold sample set. Empty input yields zeros.
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            std: variance.sqrt(),
        }
    }
}

/// Metric bundle for one plain (non-stratified) evaluation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Headline accuracy across folds, at each fold's train-selected threshold.
    pub accuracy: MeanStd,
    /// The per-fold accuracies behind [`Self::accuracy`].
    pub fold_accuracies: Vec<f64>,
    /// True-accept-rate at the target FAR, across folds.
    pub tar: MeanStd,
    /// Mean observed false-accept-rate across folds.
    pub far_mean: f64,
    /// Mean L2 norm of the raw embeddings that entered the run.
    pub mean_embedding_norm: f64,
    /// Fold-averaged ROC curve over the coarse threshold grid.
    pub roc: RocCurve,
}

/// Per-subgroup-combination aggregates for one stratified pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupReport {
    /// The demographic label pair this entry covers.
    pub combination: GroupPair,
    /// Accuracy at the common (non-stratified) fold threshold.
    pub accuracy: MeanStd,
    /// True-positive rate restricted to this combination.
    pub tpr: MeanStd,
    /// False-positive rate restricted to this combination.
    pub fpr: MeanStd,
    /// True-accept-rate restricted to this combination.
    pub tar: MeanStd,
    /// False-accept-rate restricted to this combination.
    pub far: MeanStd,
}

/// Metric bundle for a stratified evaluation pass.
///
/// Contains the full plain report plus one [`GroupReport`] per
/// caller-enumerated subgroup combination, in enumeration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StratifiedReport {
    /// The overall, non-stratified metrics.
    pub overall: VerificationReport,
    /// Per-combination aggregates, one entry per enumerated combination.
    pub groups: Vec<GroupReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_std_population_semantics() {
        let agg = MeanStd::from_samples(&[1.0, 2.0, 3.0, 4.0]);
        assert!((agg.mean - 2.5).abs() < 1e-12);
        // Population std of {1,2,3,4} is sqrt(1.25).
        assert!((agg.std - 1.25f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_empty_samples_yield_zeros() {
        let agg = MeanStd::from_samples(&[]);
        assert_eq!(agg.mean, 0.0);
        assert_eq!(agg.std, 0.0);
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = VerificationReport {
            accuracy: MeanStd::from_samples(&[0.9, 1.0]),
            fold_accuracies: vec![0.9, 1.0],
            tar: MeanStd::default(),
            far_mean: 0.001,
            mean_embedding_norm: 22.5,
            roc: RocCurve {
                thresholds: vec![0.0, 0.01],
                tpr: vec![0.0, 0.1],
                fpr: vec![0.0, 0.0],
            },
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("fold_accuracies"));
        let back: VerificationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.fold_accuracies, report.fold_accuracies);
    }
}
