//! Error types for face-verify-core.
//!
//! This module defines the central error type [`VerifyError`] used throughout
//! the crate, along with the [`VerifyResult<T>`] type alias.
//!
//! # Examples
//!
//! ```rust
//! use face_verify_core::VerifyError;
//!
//! fn check_dim(expected: usize, actual: usize) -> Result<(), VerifyError> {
//!     if expected != actual {
//!         return Err(VerifyError::ShapeMismatch { expected, actual });
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_dim(512, 256).is_err());
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for verification evaluation operations.
///
/// Fatal conditions abort the evaluation call; no partial report is returned.
/// Non-fatal protocol conditions (unreachable FAR target, empty subgroup
/// buckets) are absorbed as defined values and deliberately have no variant
/// here.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Two embedding batches disagree in vector dimension.
    ///
    /// # When This Occurs
    ///
    /// - Mixing embeddings from models with different output sizes
    /// - Corrupted embedding data after deserialization
    /// - Comparing a projected batch against an unprojected one
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Vector dimension of the first batch
        expected: usize,
        /// Vector dimension of the offending batch
        actual: usize,
    },

    /// Two embedding batches disagree in pair count.
    ///
    /// The pair sequence requires `len(emb1) == len(emb2) == len(labels)`.
    #[error("Pair count mismatch: left batch has {left} vectors, right batch has {right}")]
    PairCountMismatch {
        /// Number of vectors in the first batch
        left: usize,
        /// Number of vectors in the second batch
        right: usize,
    },

    /// A fold's test split has no same-pairs or no different-pairs, so
    /// TAR or FAR is undefined.
    ///
    /// This is deliberately fatal: TAR/FAR are headline numbers and zeroing
    /// them silently would mask a sampling problem. The zero-denominator
    /// convention used for TPR/FPR does not apply here.
    #[error(
        "Undefined accept rate in fold {fold}: {n_same} same-pairs, {n_diff} different-pairs in test split"
    )]
    UndefinedRate {
        /// Index of the fold whose test split is degenerate
        fold: usize,
        /// Number of ground-truth matching pairs in the test split
        n_same: usize,
        /// Number of ground-truth non-matching pairs in the test split
        n_diff: usize,
    },

    /// An embedding cache file could not be read or written.
    #[error("Cache I/O error at {path}: {source}")]
    Cache {
        /// Path of the cache file
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// An embedding cache file could not be encoded or decoded.
    #[error("Cache codec error at {path}: {message}")]
    CacheCodec {
        /// Path of the cache file
        path: PathBuf,
        /// Description of the codec failure
        message: String,
    },

    /// Configuration is invalid (bad threshold grid, zero PCA components, ...).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for verification evaluation operations.
pub type VerifyResult<T> = Result<T, VerifyError>;
