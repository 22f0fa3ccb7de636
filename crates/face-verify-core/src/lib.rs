//! # Face Verification Evaluation Engine
//!
//! Bias-corrected verification metrics for face-embedding models: given a
//! flattened sequence of embedding vectors (even/odd positions form each
//! comparison pair) and ground-truth match labels, the engine produces
//! k-fold cross-validated accuracy, ROC curves, and TAR@FAR statistics,
//! optionally broken down by demographic subgroup combination.
//!
//! The engine is a pure, synchronous computation over in-memory arrays.
//! Model inference, image decoding, and dataset loading are external
//! collaborators; the engine only consumes their outputs.
//!
//! ## Protocol
//!
//! Per fold, the decision threshold is selected on the train split only
//! (accuracy-maximizing for ROC, FAR-target interpolation for TAR@FAR) and
//! metrics are then measured on the held-out test split. Per-fold results
//! are aggregated into mean ± population standard deviation.
//!
//! ## Usage
//!
//! ```rust
//! use face_verify_core::{evaluate, EvalConfig};
//!
//! // 4 pairs of 2-D embeddings: even/odd positions form each pair.
//! let embeddings: Vec<Vec<f64>> = vec![
//!     vec![1.0, 0.0], vec![1.0, 0.0],   // match
//!     vec![1.0, 0.0], vec![0.0, 1.0],   // non-match
//!     vec![0.0, 1.0], vec![0.0, 1.0],   // match
//!     vec![0.0, 1.0], vec![1.0, 0.0],   // non-match
//! ];
//! let actual_issame = vec![true, false, true, false];
//!
//! let config = EvalConfig { n_folds: 1, ..EvalConfig::default() };
//! let report = evaluate(&embeddings, &actual_issame, &config).unwrap();
//! assert!((report.accuracy.mean - 1.0).abs() < 1e-9);
//! ```
//!
//! ## Caveats
//!
//! When the target false-accept-rate is unreachable on a fold's train
//! split, the TAR@FAR solver falls back to threshold 0.0 and the run
//! completes; the reported accept rates of such a run are near-meaningless
//! and should not be trusted without checking the fold thresholds.

pub mod cache;
pub mod config;
pub mod distance;
pub mod error;
pub mod evaluate;
pub mod folds;
pub mod pca;
pub mod report;
pub mod roc;
pub mod stratified;
pub mod tar;

/// One batch of embedding vectors, one `Vec<f64>` per image.
pub type EmbeddingBatch = Vec<Vec<f64>>;

pub use cache::EmbeddingCache;
pub use config::{EvalConfig, ThresholdGrid};
pub use error::{VerifyError, VerifyResult};
pub use evaluate::{
    evaluate, evaluate_batches, evaluate_stratified, prepare_embeddings, PreparedEmbeddings,
};
pub use folds::{FoldSplit, KFold};
pub use pca::PcaProjection;
pub use report::{GroupReport, MeanStd, StratifiedReport, VerificationReport};
pub use roc::{calculate_roc, ConfusionMetrics, RocCurve, RocOutcome};
pub use stratified::{calculate_roc_stratified, calculate_val_stratified, GroupPair};
pub use tar::{calculate_val, AcceptCounts, TarFarOutcome};
