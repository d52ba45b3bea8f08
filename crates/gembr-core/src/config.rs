//! Run configuration.
//!
//! One immutable [`AnalysisConfig`] is built up front, validated, and passed
//! by reference to every component. Defaults reproduce the reference
//! workflow: 50 km search radius, IDW power 2, at least 3 references.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How the 13 environmental variables are put on a common scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scaling {
    /// (x − mean) / population std.
    ZScore,
    /// (x − median) / IQR.
    Robust,
}

/// Units of the relative impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelativeScale {
    /// (road − ref) / (|road| + |ref|), in [-1, 1].
    Fraction,
    /// Same ratio × 100.
    Percent,
}

impl RelativeScale {
    pub fn factor(self) -> f64 {
        match self {
            RelativeScale::Fraction => 1.0,
            RelativeScale::Percent => 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Cumulative explained-variance ratio the retained components must reach.
    pub variance_retention: f64,
    /// Retaining fewer components than this is fatal. At least 2.
    pub min_components: usize,
    pub scaling: Scaling,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            variance_retention: 0.85,
            min_components: 2,
            scaling: Scaling::ZScore,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningConfig {
    /// Maximum target-to-reference distance, projection units (m). Exclusive.
    pub search_radius: f64,
    /// Maximum |CEI(candidate) − CEI(target)|. Exclusive.
    pub cei_threshold: f64,
    /// Maximum |ForestChange| (%). Exclusive.
    pub max_forest_change: f64,
    /// Maximum |Plantations| (%). Exclusive.
    pub max_plantation: f64,
    /// Nighttime lights must stay below this at every snapshot.
    pub max_night_lights: f64,
    /// Keep only the most CEI-similar fraction of the qualified set.
    pub top_similar_fraction: Option<f64>,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            search_radius: 50_000.0,
            cei_threshold: 0.05,
            max_forest_change: 10.0,
            max_plantation: 10.0,
            max_night_lights: 1.0,
            top_similar_fraction: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightingConfig {
    /// Distance-decay exponent p in w = 1 / d^p.
    pub power: f64,
    /// References at or below this distance count as coincident with the target.
    pub snap_distance: f64,
}

impl Default for WeightingConfig {
    fn default() -> Self {
        Self {
            power: 2.0,
            snap_distance: 1e-9,
        }
    }
}

/// Full configuration of an impact run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub index: IndexConfig,
    pub screening: ScreeningConfig,
    pub weighting: WeightingConfig,
    /// Fewer qualified references than this marks a target unavailable.
    pub min_reference_count: usize,
    pub relative_scale: RelativeScale,
    /// Input values treated as missing data.
    pub invalid_sentinels: Vec<f64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            index: IndexConfig::default(),
            screening: ScreeningConfig::default(),
            weighting: WeightingConfig::default(),
            min_reference_count: 3,
            relative_scale: RelativeScale::Fraction,
            invalid_sentinels: vec![-9999.0, 65535.0],
        }
    }
}

impl AnalysisConfig {
    /// Parse a JSON configuration (missing fields take defaults) and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: AnalysisConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<()> {
        let idx = &self.index;
        if !(idx.variance_retention > 0.0 && idx.variance_retention <= 1.0) {
            return Err(Error::invalid(
                "index.variance_retention",
                idx.variance_retention,
                "must be in (0, 1]",
            ));
        }
        if idx.min_components < 2 {
            return Err(Error::invalid(
                "index.min_components",
                idx.min_components,
                "must be at least 2",
            ));
        }

        let scr = &self.screening;
        if !(scr.search_radius.is_finite() && scr.search_radius > 0.0) {
            return Err(Error::invalid(
                "screening.search_radius",
                scr.search_radius,
                "must be positive and finite",
            ));
        }
        if !(scr.cei_threshold > 0.0) {
            return Err(Error::invalid(
                "screening.cei_threshold",
                scr.cei_threshold,
                "must be positive",
            ));
        }
        for (name, v) in [
            ("screening.max_forest_change", scr.max_forest_change),
            ("screening.max_plantation", scr.max_plantation),
            ("screening.max_night_lights", scr.max_night_lights),
        ] {
            if !(v > 0.0) {
                return Err(Error::invalid(name, v, "must be positive"));
            }
        }
        if let Some(f) = scr.top_similar_fraction {
            if !(f > 0.0 && f <= 1.0) {
                return Err(Error::invalid(
                    "screening.top_similar_fraction",
                    f,
                    "must be in (0, 1]",
                ));
            }
        }

        let w = &self.weighting;
        if !(w.power.is_finite() && w.power >= 0.0) {
            return Err(Error::invalid(
                "weighting.power",
                w.power,
                "must be finite and non-negative",
            ));
        }
        if !(w.snap_distance >= 0.0) {
            return Err(Error::invalid(
                "weighting.snap_distance",
                w.snap_distance,
                "must be non-negative",
            ));
        }

        if self.min_reference_count == 0 {
            return Err(Error::invalid(
                "min_reference_count",
                0,
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// `Some(value)` unless it is non-finite or one of the invalid sentinels.
    #[inline]
    pub fn valid(&self, value: f64) -> Option<f64> {
        is_valid_value(value, &self.invalid_sentinels).then_some(value)
    }
}

/// True when `value` is finite and not one of `sentinels`.
pub fn is_valid_value(value: f64, sentinels: &[f64]) -> bool {
    value.is_finite() && !sentinels.iter().any(|&s| s == value)
}
