//! Comprehensive Environmental Index (CEI).
//!
//! Pipeline:
//!   screen invalid pixels → scale the 13 variables → PCA →
//!   keep the shortest component prefix reaching the variance target →
//!   variance-share weights → weighted score sum → min-max to [0, 1].
//!
//! The population is every valid pixel passed in, road and candidate alike,
//! so the index is comparable across zones.

pub mod pca;
pub mod standardize;

use std::collections::HashMap;

use log::{info, warn};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::config::{is_valid_value, AnalysisConfig};
use crate::error::{Error, Result};
use crate::pixel::{EnvVariable, EnvVariables, Pixel, PointId, N_ENV_VARIABLES};
use crate::record::{SkippedPixel, SkippedReason};

/// One retained principal component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentSummary {
    pub eigenvalue: f64,
    pub explained_ratio: f64,
    /// Normalised weight in the index; weights of all retained components sum to 1.
    pub weight: f64,
}

/// Output A row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CeiRow {
    #[serde(rename = "pointID")]
    pub point_id: PointId,
    #[serde(rename = "CEI")]
    pub cei: f64,
}

/// CEI per pointID plus the decomposition that produced it. Read-only once built.
#[derive(Debug, Clone)]
pub struct EnvironmentalIndex {
    values: HashMap<PointId, f64>,
    pub components: Vec<ComponentSummary>,
    /// Cumulative explained-variance ratio of the retained components.
    pub retained_variance: f64,
    /// Variables with zero spread over the population.
    pub constant_variables: Vec<EnvVariable>,
}

impl EnvironmentalIndex {
    #[inline]
    pub fn get(&self, id: PointId) -> Option<f64> {
        self.values.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Output A, ascending pointID.
    pub fn rows(&self) -> Vec<CeiRow> {
        let mut rows: Vec<CeiRow> = self
            .values
            .iter()
            .map(|(&point_id, &cei)| CeiRow { point_id, cei })
            .collect();
        rows.sort_by_key(|r| r.point_id);
        rows
    }
}

/// Index plus the pixels excluded from its population.
#[derive(Debug, Clone)]
pub struct IndexBuild {
    pub index: EnvironmentalIndex,
    pub skipped: Vec<SkippedPixel>,
}

/// Compute the CEI for every pixel with a complete set of valid variables.
pub fn compute_index(pixels: &[Pixel], config: &AnalysisConfig) -> Result<IndexBuild> {
    build_index(pixels.iter().map(|p| (p.point_id, &p.env)), config)
}

/// Same as [`compute_index`] over bare (pointID, variables) pairs, e.g. an
/// Input A table that has not been joined with the forest table.
pub fn build_index<'a, I>(entries: I, config: &AnalysisConfig) -> Result<IndexBuild>
where
    I: IntoIterator<Item = (PointId, &'a EnvVariables)>,
{
    let mut ids: Vec<PointId> = Vec::new();
    let mut flat: Vec<f64> = Vec::new();
    let mut skipped = Vec::new();

    for (id, env) in entries {
        if env.values().iter().all(|&v| is_valid_value(v, &config.invalid_sentinels)) {
            ids.push(id);
            flat.extend_from_slice(env.values());
        } else {
            skipped.push(SkippedPixel::new(id, SkippedReason::InvalidVariables));
        }
    }

    if !skipped.is_empty() {
        warn!("removed {} pixel(s) with invalid environmental values", skipped.len());
    }
    info!("{} valid pixel(s) in the index population", ids.len());

    let n = ids.len();
    if n < 2 {
        return Err(Error::InsufficientPopulation { valid: n, required: 2 });
    }

    let mut data = DMatrix::from_row_slice(n, N_ENV_VARIABLES, &flat);
    let scaling = standardize::standardize(&mut data, config.index.scaling);
    let constant_variables: Vec<EnvVariable> = scaling
        .constant_columns()
        .map(|j| EnvVariable::ALL[j])
        .collect();
    if !constant_variables.is_empty() {
        let names: Vec<&str> = constant_variables.iter().map(|v| v.column()).collect();
        info!("constant variable(s) carry no weight: {}", names.join(", "));
    }

    let pcs = pca::fit(&data)?;
    let threshold = config.index.variance_retention;
    let retained = pcs.retained_count(threshold);
    if retained < config.index.min_components {
        return Err(Error::DegenerateVariance {
            retained,
            required: config.index.min_components,
            threshold,
        });
    }

    let retained_variance: f64 = pcs.explained_ratio[..retained].iter().sum();
    let components: Vec<ComponentSummary> = (0..retained)
        .map(|k| ComponentSummary {
            eigenvalue: pcs.eigenvalues[k],
            explained_ratio: pcs.explained_ratio[k],
            weight: pcs.explained_ratio[k] / retained_variance,
        })
        .collect();

    let scores = pcs.project(&data, retained);
    let raw: Vec<f64> = (0..n)
        .map(|i| {
            components
                .iter()
                .enumerate()
                .map(|(k, c)| c.weight * scores[(i, k)])
                .sum()
        })
        .collect();

    let lo = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = hi - lo;
    let values: HashMap<PointId, f64> = ids
        .iter()
        .zip(&raw)
        .map(|(&id, &r)| {
            let cei = if range > 0.0 { ((r - lo) / range).clamp(0.0, 1.0) } else { 0.0 };
            (id, cei)
        })
        .collect();

    info!(
        "CEI: retained {} component(s), explained variance {:.4}",
        retained, retained_variance
    );

    Ok(IndexBuild {
        index: EnvironmentalIndex {
            values,
            components,
            retained_variance,
            constant_variables,
        },
        skipped,
    })
}
