//! Fold-local linear dimensionality reduction.
//!
//! The projection is fit on the train-fold embeddings only (both halves of
//! each train pair, concatenated) and refit independently per fold, so the
//! test-set distribution never leaks into the fitted axes. Leading
//! principal axes are extracted from the mean-centered covariance matrix by
//! power iteration with deflation, which is adequate for the small
//! component counts this protocol uses.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{VerifyError, VerifyResult};

const POWER_ITERATIONS: usize = 200;

/// A fitted variance-maximizing linear projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcaProjection {
    mean: Vec<f64>,
    /// Row-major principal axes, one unit-length row per output component.
    components: Vec<Vec<f64>>,
}

impl PcaProjection {
    /// Fit a projection to `n_components` dimensions from `samples`.
    ///
    /// Fails with `InvalidConfig` when there are no samples, zero requested
    /// components, or more components than the input dimension.
    pub fn fit(samples: &[Vec<f64>], n_components: usize) -> VerifyResult<Self> {
        let n = samples.len();
        if n == 0 {
            return Err(VerifyError::InvalidConfig(
                "cannot fit projection to an empty training set".into(),
            ));
        }
        let dim = samples[0].len();
        for v in samples {
            if v.len() != dim {
                return Err(VerifyError::ShapeMismatch {
                    expected: dim,
                    actual: v.len(),
                });
            }
        }
        if n_components == 0 || n_components > dim {
            return Err(VerifyError::InvalidConfig(format!(
                "requested {n_components} components from dimension {dim}"
            )));
        }

        let mut mean = vec![0.0; dim];
        for v in samples {
            for (m, x) in mean.iter_mut().zip(v.iter()) {
                *m += x;
            }
        }
        for m in &mut mean {
            *m /= n as f64;
        }

        // Covariance of the centered samples.
        let mut cov = vec![vec![0.0; dim]; dim];
        for v in samples {
            let centered: Vec<f64> = v.iter().zip(mean.iter()).map(|(x, m)| x - m).collect();
            for i in 0..dim {
                let ci = centered[i];
                for j in i..dim {
                    cov[i][j] += ci * centered[j];
                }
            }
        }
        for i in 0..dim {
            for j in i..dim {
                cov[i][j] /= n as f64;
                cov[j][i] = cov[i][j];
            }
        }

        let mut components = Vec::with_capacity(n_components);
        let mut deflated = cov;
        for rank in 0..n_components {
            let (axis, eigenvalue) = power_iteration(&deflated, dim);
            debug!(rank, eigenvalue, "extracted principal axis");
            for i in 0..dim {
                for j in 0..dim {
                    deflated[i][j] -= eigenvalue * axis[i] * axis[j];
                }
            }
            components.push(axis);
        }

        Ok(Self { mean, components })
    }

    /// Output dimensionality of the projection.
    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    /// Project a batch through the fitted axes.
    ///
    /// Callers re-normalize the output to unit length before distance
    /// computation.
    pub fn project(&self, batch: &[Vec<f64>]) -> VerifyResult<Vec<Vec<f64>>> {
        let dim = self.mean.len();
        batch
            .iter()
            .map(|v| {
                if v.len() != dim {
                    return Err(VerifyError::ShapeMismatch {
                        expected: dim,
                        actual: v.len(),
                    });
                }
                let centered: Vec<f64> =
                    v.iter().zip(self.mean.iter()).map(|(x, m)| x - m).collect();
                Ok(self
                    .components
                    .iter()
                    .map(|axis| axis.iter().zip(centered.iter()).map(|(a, c)| a * c).sum())
                    .collect())
            })
            .collect()
    }
}

/// Dominant eigenvector of a symmetric matrix by power iteration.
fn power_iteration(matrix: &[Vec<f64>], dim: usize) -> (Vec<f64>, f64) {
    let mut v = vec![1.0 / (dim as f64).sqrt(); dim];

    for _ in 0..POWER_ITERATIONS {
        let mut w = vec![0.0; dim];
        for i in 0..dim {
            let row = &matrix[i];
            w[i] = row.iter().zip(v.iter()).map(|(m, x)| m * x).sum();
        }
        let norm: f64 = w.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm < 1e-12 {
            break;
        }
        for (vi, wi) in v.iter_mut().zip(w.iter()) {
            *vi = wi / norm;
        }
    }

    // Rayleigh quotient v' M v for the converged direction.
    let mut eigenvalue = 0.0;
    for i in 0..dim {
        let mv: f64 = matrix[i].iter().zip(v.iter()).map(|(m, x)| m * x).sum();
        eigenvalue += v[i] * mv;
    }
    (v, eigenvalue)
}
