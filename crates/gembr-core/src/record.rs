//! Output records.
//!
//! [`ImpactRecord`] is the long form (one row per target × metric × snapshot).
//! [`TargetImpact`] groups a target's records and serializes to the wide
//! Output B row. Missing values are `None` and serialize as `null`, so they
//! can never be confused with a genuine 0.

use std::fmt;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::pixel::{BufferType, ForestMetric, PointId, Snapshot};

// ── Skip report ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkippedReason {
    /// Missing or non-finite environmental variable; excluded from the index.
    InvalidVariables,
    /// Target has no CEI, so no reference can be screened for it.
    MissingIndex,
    /// Fewer qualified references than the configured minimum.
    InsufficientReferences { found: usize },
    /// pointID present in only one of the two input tables.
    Unmatched,
}

impl fmt::Display for SkippedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkippedReason::InvalidVariables => write!(f, "Invalid environmental variables"),
            SkippedReason::MissingIndex => write!(f, "No CEI value"),
            SkippedReason::InsufficientReferences { found } => {
                write!(f, "Not enough reference points ({found})")
            }
            SkippedReason::Unmatched => write!(f, "pointID missing from one input table"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SkippedPixel {
    #[serde(rename = "pointID")]
    pub point_id: PointId,
    #[serde(rename = "Reason", serialize_with = "serialize_display")]
    pub reason: SkippedReason,
}

impl SkippedPixel {
    pub fn new(point_id: PointId, reason: SkippedReason) -> Self {
        Self { point_id, reason }
    }
}

fn serialize_display<T: fmt::Display, S: Serializer>(v: &T, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(v)
}

// ── Impact records ────────────────────────────────────────────────────────────

/// One target pixel, one metric, one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactRecord {
    pub point_id: PointId,
    pub metric: ForestMetric,
    pub snapshot: Snapshot,
    pub road_value: Option<f64>,
    pub reference_value: Option<f64>,
    pub absolute_impact: Option<f64>,
    pub relative_impact: Option<f64>,
    /// Target CEI minus the distance-weighted CEI of its references.
    pub cei_diff: Option<f64>,
    pub nearest_ref_distance: Option<f64>,
    pub ref_points_used: usize,
    /// Absolute impact at the later snapshot minus the earlier one.
    pub absolute_trend: Option<f64>,
    /// Relative impact at the later snapshot minus the earlier one.
    pub relative_trend: Option<f64>,
}

/// Change in impact between the two snapshots for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MetricTrend {
    pub absolute: Option<f64>,
    pub relative: Option<f64>,
}

/// Why a target's reference-dependent fields are present or missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TargetStatus {
    Assessed,
    MissingIndex,
    InsufficientReferences { found: usize },
}

/// All impact records for one target pixel (one Output B row).
#[derive(Debug, Clone, PartialEq)]
pub struct TargetImpact {
    pub point_id: PointId,
    pub x: f64,
    pub y: f64,
    pub buffer: BufferType,
    pub status: TargetStatus,
    pub cei_diff: Option<f64>,
    pub nearest_ref_distance: Option<f64>,
    pub ref_points_used: usize,
    /// Ordered by metric, then snapshot.
    pub records: Vec<ImpactRecord>,
}

impl TargetImpact {
    pub fn record(&self, metric: ForestMetric, snapshot: Snapshot) -> Option<&ImpactRecord> {
        self.records
            .iter()
            .find(|r| r.metric == metric && r.snapshot == snapshot)
    }

    pub fn trend(&self, metric: ForestMetric) -> Option<MetricTrend> {
        self.records
            .iter()
            .find(|r| r.metric == metric)
            .map(|r| MetricTrend {
                absolute: r.absolute_trend,
                relative: r.relative_trend,
            })
    }

    /// Metrics present in this row, in canonical column order.
    fn metrics(&self) -> impl Iterator<Item = ForestMetric> + '_ {
        ForestMetric::ALL
            .into_iter()
            .filter(|m| self.records.iter().any(|r| r.metric == *m))
    }
}

impl Serialize for TargetImpact {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("pointID", &self.point_id)?;
        map.serialize_entry("X", &self.x)?;
        map.serialize_entry("Y", &self.y)?;
        map.serialize_entry("Buffer_type", &self.buffer.code())?;

        for metric in self.metrics() {
            for snapshot in Snapshot::ALL {
                let Some(r) = self.record(metric, snapshot) else { continue };
                let col = metric.column(snapshot);
                map.serialize_entry(&format!("{col}_road"), &r.road_value)?;
                map.serialize_entry(&format!("{col}_ref"), &r.reference_value)?;
                map.serialize_entry(&format!("{col}_AC"), &r.absolute_impact)?;
                map.serialize_entry(&format!("{col}_RC"), &r.relative_impact)?;
            }
        }
        for metric in self.metrics() {
            let trend = self.trend(metric).unwrap_or_default();
            let prefix = metric.column_prefix();
            map.serialize_entry(&format!("{prefix}_AC_trend"), &trend.absolute)?;
            map.serialize_entry(&format!("{prefix}_RC_trend"), &trend.relative)?;
        }

        map.serialize_entry("CEI_Diff", &self.cei_diff)?;
        map.serialize_entry("Nearest_Ref_Distance", &self.nearest_ref_distance)?;
        map.serialize_entry("Ref_Points_Used", &self.ref_points_used)?;
        map.end()
    }
}
