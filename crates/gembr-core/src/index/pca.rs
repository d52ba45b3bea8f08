//! Principal component analysis of the scaled environmental matrix.
//!
//! The covariance matrix of the (re-centred) data is decomposed with
//! nalgebra's symmetric eigen-solver. Components are returned in order of
//! decreasing variance; each loading vector is oriented so that its
//! largest-magnitude entry is positive, which makes the projected scores,
//! and therefore the index, independent of the solver's sign choice.
use nalgebra::{DMatrix, SymmetricEigen};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct PrincipalComponents {
    /// Column means removed before projection.
    pub means: Vec<f64>,
    /// p × p; column k is the loading vector of component k.
    pub loadings: DMatrix<f64>,
    /// Component variances, descending. Negative round-off is clamped to 0.
    pub eigenvalues: Vec<f64>,
    /// Share of total variance per component; sums to 1 unless all variance is 0.
    pub explained_ratio: Vec<f64>,
}

/// Fit principal components to `data` (rows = observations).
pub fn fit(data: &DMatrix<f64>) -> Result<PrincipalComponents> {
    let (n, p) = data.shape();
    if n < 2 {
        return Err(Error::InsufficientPopulation { valid: n, required: 2 });
    }

    let means: Vec<f64> = (0..p).map(|j| data.column(j).sum() / n as f64).collect();
    let centered = center(data, &means);
    let cov = (centered.transpose() * &centered) / (n - 1) as f64;

    let eig = SymmetricEigen::new(cov);
    if eig.eigenvalues.iter().any(|v| !v.is_finite())
        || eig.eigenvectors.iter().any(|v| !v.is_finite())
    {
        return Err(Error::Decomposition(
            "non-finite eigenvalues or eigenvectors".into(),
        ));
    }

    let mut order: Vec<usize> = (0..p).collect();
    order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));

    let eigenvalues: Vec<f64> = order.iter().map(|&i| eig.eigenvalues[i].max(0.0)).collect();
    let total: f64 = eigenvalues.iter().sum();
    let explained_ratio = eigenvalues
        .iter()
        .map(|ev| if total > 0.0 { ev / total } else { 0.0 })
        .collect();

    let mut loadings = DMatrix::from_fn(p, p, |i, k| eig.eigenvectors[(i, order[k])]);
    for k in 0..p {
        let mut col = loadings.column_mut(k);
        let pivot = col
            .iter()
            .copied()
            .fold(0.0f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
        if pivot < 0.0 {
            for v in col.iter_mut() {
                *v = -*v;
            }
        }
    }

    Ok(PrincipalComponents {
        means,
        loadings,
        eigenvalues,
        explained_ratio,
    })
}

impl PrincipalComponents {
    /// Scores of every row of `data` on the first `k` components (n × k).
    pub fn project(&self, data: &DMatrix<f64>, k: usize) -> DMatrix<f64> {
        let k = k.min(self.loadings.ncols());
        center(data, &self.means) * self.loadings.columns(0, k)
    }

    /// Smallest prefix of components whose cumulative explained-variance
    /// ratio reaches `threshold`. 0 when the data has no variance at all.
    pub fn retained_count(&self, threshold: f64) -> usize {
        let mut cumulative = 0.0;
        for (k, ratio) in self.explained_ratio.iter().enumerate() {
            if *ratio <= 0.0 {
                break;
            }
            cumulative += ratio;
            if cumulative >= threshold - 1e-12 {
                return k + 1;
            }
        }
        if cumulative > 0.0 {
            self.explained_ratio.iter().take_while(|r| **r > 0.0).count()
        } else {
            0
        }
    }
}

fn center(data: &DMatrix<f64>, means: &[f64]) -> DMatrix<f64> {
    DMatrix::from_fn(data.nrows(), data.ncols(), |i, j| data[(i, j)] - means[j])
}
