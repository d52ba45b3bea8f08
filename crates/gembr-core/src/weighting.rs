//! Inverse-distance-weighted aggregation over a reference set.
//!
//! ```text
//! value = Σ(wᵢ · zᵢ) / Σ(wᵢ),   wᵢ = 1 / dᵢ^p
//! ```
//!
//! Weights are evaluated as (d_min / dᵢ)^p, which is the same after
//! normalisation and stays finite for any positive distances. A reference
//! within the snap distance of the target is an exact match: its raw value
//! is returned and no weighting happens (several coincident references are
//! averaged).
use crate::config::AnalysisConfig;
use crate::pixel::{ForestMetric, Snapshot};
use crate::screening::{Reference, ReferenceSet};

/// Weighted reference value and the metadata that goes with it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregate {
    pub value: f64,
    /// Distance of the nearest reference that contributed.
    pub nearest_distance: f64,
    /// References whose value was valid and took part.
    pub count_used: usize,
}

/// Normalised IDW weights for `distances` (all strictly positive).
pub fn idw_weights(distances: &[f64], power: f64) -> Vec<f64> {
    let Some(d_min) = distances.iter().copied().reduce(f64::min) else {
        return Vec::new();
    };
    let raw: Vec<f64> = distances.iter().map(|&d| (d_min / d).powf(power)).collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|w| w / sum).collect()
}

/// Aggregate whatever `value_of` reads from each reference.
///
/// Returns `None` when the set is insufficient, or when fewer than the
/// minimum number of references carry a valid value.
pub fn aggregate_by<F>(refs: &ReferenceSet<'_>, value_of: F, config: &AnalysisConfig) -> Option<Aggregate>
where
    F: Fn(&Reference<'_>) -> f64,
{
    if !refs.is_sufficient() {
        return None;
    }

    // Members are already nearest-first, so `valid` is too.
    let valid: Vec<(f64, f64)> = refs
        .members()
        .iter()
        .filter_map(|r| config.valid(value_of(r)).map(|v| (r.distance, v)))
        .collect();
    if valid.len() < config.min_reference_count {
        return None;
    }
    let nearest_distance = valid[0].0;
    let count_used = valid.len();

    let snap = config.weighting.snap_distance;
    let coincident: Vec<f64> = valid
        .iter()
        .filter(|(d, _)| *d <= snap)
        .map(|&(_, v)| v)
        .collect();
    if !coincident.is_empty() {
        let value = coincident.iter().sum::<f64>() / coincident.len() as f64;
        return Some(Aggregate { value, nearest_distance, count_used });
    }

    let distances: Vec<f64> = valid.iter().map(|&(d, _)| d).collect();
    let weights = idw_weights(&distances, config.weighting.power);
    let value = weights.iter().zip(&valid).map(|(w, &(_, v))| w * v).sum();

    Some(Aggregate { value, nearest_distance, count_used })
}

/// Distance-weighted reference value of one forest metric at one snapshot.
pub fn aggregate(
    refs: &ReferenceSet<'_>,
    metric: ForestMetric,
    snapshot: Snapshot,
    config: &AnalysisConfig,
) -> Option<Aggregate> {
    aggregate_by(refs, |r| r.pixel.metric(metric, snapshot), config)
}

/// Distance-weighted CEI of the references (the target's environmental background).
pub fn background_cei(refs: &ReferenceSet<'_>, config: &AnalysisConfig) -> Option<f64> {
    aggregate_by(refs, |r| r.cei, config).map(|a| a.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::{BufferType, Pixel};
    use crate::screening::tests::pixel;
    use approx::assert_abs_diff_eq;

    fn refs_with(values: &[f64], distances: &[f64]) -> Vec<Pixel> {
        values
            .iter()
            .zip(distances)
            .enumerate()
            .map(|(i, (&v, &d))| {
                let mut p = pixel(i as i64 + 1, d, 0.0, BufferType::Candidate, i as f64);
                p.forest[Snapshot::Y2000.index()].npp = v;
                p
            })
            .collect()
    }

    fn set<'a>(pixels: &'a [Pixel], min: usize) -> ReferenceSet<'a> {
        let members = pixels
            .iter()
            .map(|p| Reference { pixel: p, distance: p.x, cei: 0.5 })
            .collect();
        ReferenceSet::new(members, 0.5, min)
    }

    fn config(power: f64) -> AnalysisConfig {
        let mut cfg = AnalysisConfig::default();
        cfg.weighting.power = power;
        cfg
    }

    #[test]
    fn weights_sum_to_one() {
        for power in [0.0, 1.0, 2.0, 3.5] {
            let w = idw_weights(&[1.0, 2.0, 7.5, 40_000.0], power);
            let sum: f64 = w.iter().sum();
            assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn four_references_power_one() {
        // Distances 1, 2, 2, 5 km → weights ∝ 1, 0.5, 0.5, 0.2.
        let w = idw_weights(&[1_000.0, 2_000.0, 2_000.0, 5_000.0], 1.0);
        let expected = [0.4545, 0.2273, 0.2273, 0.0909];
        for (a, b) in w.iter().zip(expected) {
            assert_abs_diff_eq!(*a, b, epsilon = 1e-4);
        }

        let pixels = refs_with(&[10.0, 12.0, 12.0, 14.0], &[1_000.0, 2_000.0, 2_000.0, 5_000.0]);
        let agg = aggregate(&set(&pixels, 3), ForestMetric::Npp, Snapshot::Y2000, &config(1.0)).unwrap();
        // (10·1 + 12·0.5 + 12·0.5 + 14·0.2) / 2.2
        assert_abs_diff_eq!(agg.value, 24.8 / 2.2, epsilon = 1e-9);
        assert_eq!(agg.nearest_distance, 1_000.0);
        assert_eq!(agg.count_used, 4);
    }

    #[test]
    fn zero_distance_returns_raw_value() {
        let pixels = refs_with(&[42.0, 10.0, 20.0, 30.0], &[0.0, 5.0, 6.0, 7.0]);
        let agg = aggregate(&set(&pixels, 3), ForestMetric::Npp, Snapshot::Y2000, &config(2.0)).unwrap();
        assert_eq!(agg.value, 42.0);
        assert_eq!(agg.nearest_distance, 0.0);
        assert!(agg.value.is_finite());
    }

    #[test]
    fn insufficient_set_yields_nothing() {
        let pixels = refs_with(&[1.0, 2.0], &[10.0, 20.0]);
        let refs = set(&pixels, 3);
        assert!(aggregate(&refs, ForestMetric::Npp, Snapshot::Y2000, &config(2.0)).is_none());
        assert!(background_cei(&refs, &config(2.0)).is_none());
    }

    #[test]
    fn missing_reference_values_are_skipped() {
        let pixels = refs_with(&[5.0, -9999.0, 7.0, f64::NAN, 9.0], &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let agg = aggregate(&set(&pixels, 3), ForestMetric::Npp, Snapshot::Y2000, &config(0.0)).unwrap();
        assert_eq!(agg.count_used, 3);
        assert_abs_diff_eq!(agg.value, 7.0, epsilon = 1e-12);

        // Only two valid values left → below the minimum.
        let pixels = refs_with(&[5.0, -9999.0, f64::NAN, 9.0], &[1.0, 2.0, 3.0, 4.0]);
        assert!(aggregate(&set(&pixels, 3), ForestMetric::Npp, Snapshot::Y2000, &config(2.0)).is_none());
    }

    #[test]
    fn order_of_input_does_not_matter() {
        let pixels = refs_with(&[3.0, 8.0, 1.0, 6.0], &[300.0, 120.0, 950.0, 40.0]);
        let mut reversed = pixels.clone();
        reversed.reverse();
        let cfg = config(2.0);
        let a = aggregate(&set(&pixels, 3), ForestMetric::Npp, Snapshot::Y2000, &cfg).unwrap();
        let b = aggregate(&set(&reversed, 3), ForestMetric::Npp, Snapshot::Y2000, &cfg).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn background_cei_weights_reference_indices() {
        let pixels = refs_with(&[0.0; 3], &[1.0, 1.0, 1.0]);
        let members = pixels
            .iter()
            .zip([0.2, 0.4, 0.6])
            .map(|(p, cei)| Reference { pixel: p, distance: 1.0, cei })
            .collect();
        let refs = ReferenceSet::new(members, 0.5, 3);
        assert_abs_diff_eq!(background_cei(&refs, &config(2.0)).unwrap(), 0.4, epsilon = 1e-12);
    }
}
