//! Pairwise squared-Euclidean distances and embedding batch preparation.
//!
//! Squared Euclidean distance is the single dissimilarity measure used by
//! the whole protocol. For unit-normalized embeddings it equals
//! `2 - 2*cos(a, b)` and therefore falls in [0, 4], which is what the
//! threshold grids assume.

use rayon::prelude::*;

use crate::error::{VerifyError, VerifyResult};

/// Validate that two batches agree in pair count and vector dimension.
fn check_shapes(a: &[Vec<f64>], b: &[Vec<f64>]) -> VerifyResult<()> {
    if a.len() != b.len() {
        return Err(VerifyError::PairCountMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    if let Some(first) = a.first() {
        let dim = first.len();
        for v in a.iter().chain(b.iter()) {
            if v.len() != dim {
                return Err(VerifyError::ShapeMismatch {
                    expected: dim,
                    actual: v.len(),
                });
            }
        }
    }
    Ok(())
}

/// Compute `sum((a_i - b_i)^2)` for every pair of vectors.
///
/// Pairs are independent, so the loop parallelizes over rayon without
/// affecting the result.
pub fn pairwise_squared_distances(a: &[Vec<f64>], b: &[Vec<f64>]) -> VerifyResult<Vec<f64>> {
    check_shapes(a, b)?;
    Ok(a.par_iter()
        .zip(b.par_iter())
        .map(|(va, vb)| {
            va.iter()
                .zip(vb.iter())
                .map(|(x, y)| {
                    let d = x - y;
                    d * d
                })
                .sum()
        })
        .collect())
}

/// L2-normalize each vector in place semantics: returns a new batch with
/// unit-length rows. Zero vectors pass through unchanged.
pub fn normalize_rows(batch: &[Vec<f64>]) -> Vec<Vec<f64>> {
    batch
        .iter()
        .map(|v| {
            let norm: f64 = v.iter().map(|x| x * x).sum::<f64>().sqrt();
            if norm > 0.0 {
                v.iter().map(|x| x / norm).collect()
            } else {
                v.clone()
            }
        })
        .collect()
}

/// Element-wise sum of two augmentation batches (original + flipped view),
/// the first step of the flip-averaging merge.
pub fn sum_batches(a: &[Vec<f64>], b: &[Vec<f64>]) -> VerifyResult<Vec<Vec<f64>>> {
    check_shapes(a, b)?;
    Ok(a.iter()
        .zip(b.iter())
        .map(|(va, vb)| va.iter().zip(vb.iter()).map(|(x, y)| x + y).collect())
        .collect())
}

/// Mean L2 norm across every vector of every batch, before normalization.
///
/// Reported as the embedding norm statistic of a run; 0.0 for empty input.
pub fn mean_norm(batches: &[Vec<Vec<f64>>]) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for batch in batches {
        for v in batch {
            total += v.iter().map(|x| x * x).sum::<f64>().sqrt();
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_squared_distance() {
        let a = vec![vec![0.0, 0.0], vec![1.0, 1.0]];
        let b = vec![vec![3.0, 4.0], vec![1.0, 1.0]];
        let dists = pairwise_squared_distances(&a, &b).unwrap();
        assert!((dists[0] - 25.0).abs() < 1e-12);
        assert!(dists[1].abs() < 1e-12);
    }

    #[test]
    fn test_pair_count_mismatch() {
        let a = vec![vec![0.0]];
        let b = vec![vec![0.0], vec![1.0]];
        match pairwise_squared_distances(&a, &b) {
            Err(VerifyError::PairCountMismatch { left: 1, right: 2 }) => {}
            other => panic!("expected PairCountMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = vec![vec![0.0, 1.0]];
        let b = vec![vec![0.0, 1.0, 2.0]];
        assert!(matches!(
            pairwise_squared_distances(&a, &b),
            Err(VerifyError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_normalize_rows_unit_length() {
        let batch = vec![vec![3.0, 4.0], vec![0.0, 0.0]];
        let normed = normalize_rows(&batch);
        let norm: f64 = normed[0].iter().map(|x| x * x).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
        // Zero vector untouched.
        assert_eq!(normed[1], vec![0.0, 0.0]);
    }

    #[test]
    fn test_sum_batches() {
        let a = vec![vec![1.0, 2.0]];
        let b = vec![vec![3.0, -2.0]];
        let sum = sum_batches(&a, &b).unwrap();
        assert_eq!(sum, vec![vec![4.0, 0.0]]);
    }

    #[test]
    fn test_mean_norm() {
        let batches = vec![vec![vec![3.0, 4.0]], vec![vec![0.0, 2.0]]];
        assert!((mean_norm(&batches) - 3.5).abs() < 1e-12);
        assert_eq!(mean_norm(&[]), 0.0);
    }
}
