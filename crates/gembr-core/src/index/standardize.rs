//! Column-wise scaling of the environmental matrix.
//!
//! Rows are pixels, columns are variables. A constant column (every pixel
//! carries the same value) is mapped to 0 everywhere instead of being
//! divided by zero, so it contributes nothing to the index. Robust scaling
//! of a varying column whose IQR is zero only subtracts the median.
use log::warn;
use nalgebra::DMatrix;

use crate::config::Scaling;

/// Per-column centre and spread used to scale the matrix.
#[derive(Debug, Clone)]
pub struct ColumnScaling {
    pub centers: Vec<f64>,
    /// `None` for constant columns.
    pub spreads: Vec<Option<f64>>,
}

impl ColumnScaling {
    pub fn constant_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.spreads
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_none())
            .map(|(j, _)| j)
    }
}

/// Scale `data` in place and return the parameters that were applied.
pub fn standardize(data: &mut DMatrix<f64>, scaling: Scaling) -> ColumnScaling {
    let (n, p) = data.shape();
    let mut centers = Vec::with_capacity(p);
    let mut spreads = Vec::with_capacity(p);

    for j in 0..p {
        let (lo, hi) = data
            .column(j)
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let (center, spread) = match scaling {
            Scaling::ZScore => {
                let mean = data.column(j).sum() / n.max(1) as f64;
                let var = data.column(j).iter().map(|v| (v - mean).powi(2)).sum::<f64>()
                    / n.max(1) as f64;
                (mean, var.sqrt())
            }
            Scaling::Robust => {
                let mut sorted: Vec<f64> = data.column(j).iter().copied().collect();
                sorted.sort_by(f64::total_cmp);
                let median = quantile(&sorted, 0.5);
                let iqr = quantile(&sorted, 0.75) - quantile(&sorted, 0.25);
                // Zero IQR on a varying column: centre only.
                (median, if iqr > 0.0 { iqr } else { 1.0 })
            }
        };

        let constant = !(hi - lo > 1e-12 * (1.0 + center.abs())) || !(spread > 0.0);
        let spread = (!constant).then_some(spread);
        for v in data.column_mut(j).iter_mut() {
            *v = match spread {
                Some(s) => (*v - center) / s,
                None => 0.0,
            };
        }
        centers.push(center);
        spreads.push(spread);
    }

    if scaling == Scaling::ZScore {
        check_unit_scale(data, &spreads);
    }

    ColumnScaling { centers, spreads }
}

/// Largest |mean| and |std − 1| over the non-constant columns of a z-scored matrix.
pub fn scale_deviation(data: &DMatrix<f64>, spreads: &[Option<f64>]) -> (f64, f64) {
    let n = data.nrows().max(1) as f64;
    let mut mean_dev = 0.0f64;
    let mut std_dev = 0.0f64;
    for (j, spread) in spreads.iter().enumerate() {
        if spread.is_none() {
            continue;
        }
        let col = data.column(j);
        let mean = col.sum() / n;
        let std = (col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        mean_dev = mean_dev.max(mean.abs());
        std_dev = std_dev.max((std - 1.0).abs());
    }
    (mean_dev, std_dev)
}

fn check_unit_scale(data: &DMatrix<f64>, spreads: &[Option<f64>]) {
    let (mean_dev, std_dev) = scale_deviation(data, spreads);
    if mean_dev > 1e-3 || std_dev > 1e-3 {
        warn!(
            "standardization deviation detected: mean {:.4}, std {:.4}",
            mean_dev, std_dev
        );
    }
}

/// Linear-interpolated quantile of an ascending slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let t = pos - lo as f64;
    sorted[lo] * (1.0 - t) + sorted[hi] * t
}
