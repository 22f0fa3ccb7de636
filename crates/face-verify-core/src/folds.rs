//! K-fold splitting of pair indices for cross-validated threshold selection.
//!
//! The split is contiguous and deterministic: the first `n % k` test folds
//! receive `n / k + 1` indices, the remainder receive `n / k`, and each
//! fold's train set is the complement. With `n_splits <= 1` the splitter
//! degenerates to a single fold where train == test == all indices, which
//! disables the train/test bias correction but keeps the calling code
//! uniform.
//!
//! Shuffling is opt-in and seeded; there is no ambient random state.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// One train/test partition of the pair index range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldSplit {
    /// Indices used for threshold selection.
    pub train: Vec<usize>,
    /// Indices used for held-out metric computation.
    pub test: Vec<usize>,
}

/// Deterministic k-fold splitter over pair indices.
#[derive(Debug, Clone)]
pub struct KFold {
    n_splits: usize,
    shuffle_seed: Option<u64>,
}

impl KFold {
    /// Contiguous, unshuffled splitter.
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle_seed: None,
        }
    }

    /// Splitter that permutes indices with a ChaCha8 generator seeded from
    /// `seed` before the contiguous split. Same (n, k, seed) always yields
    /// the same folds.
    pub fn with_shuffle(n_splits: usize, seed: u64) -> Self {
        Self {
            n_splits,
            shuffle_seed: Some(seed),
        }
    }

    /// Number of splits this splitter produces for `n_pairs > 0`.
    pub fn n_splits(&self) -> usize {
        self.n_splits.max(1)
    }

    /// Partition `0..n_pairs` into folds.
    ///
    /// Every index appears in exactly one test set across the folds when
    /// `n_splits > 1`. For `n_splits <= 1` the single returned fold has
    /// train == test == all indices.
    pub fn split(&self, n_pairs: usize) -> Vec<FoldSplit> {
        let mut indices: Vec<usize> = (0..n_pairs).collect();

        if self.n_splits <= 1 {
            return vec![FoldSplit {
                train: indices.clone(),
                test: indices,
            }];
        }

        if let Some(seed) = self.shuffle_seed {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            indices.shuffle(&mut rng);
        }

        let k = self.n_splits;
        let base = n_pairs / k;
        let remainder = n_pairs % k;

        let mut folds = Vec::with_capacity(k);
        let mut cursor = 0usize;
        for fold_idx in 0..k {
            let fold_size = base + usize::from(fold_idx < remainder);
            let test: Vec<usize> = indices[cursor..cursor + fold_size].to_vec();
            let train: Vec<usize> = indices[..cursor]
                .iter()
                .chain(indices[cursor + fold_size..].iter())
                .copied()
                .collect();
            folds.push(FoldSplit { train, test });
            cursor += fold_size;
        }
        folds
    }
}
