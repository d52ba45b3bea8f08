use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Unique point identifier shared by both input tables.
pub type PointId = i64;

// ── Environmental variables ───────────────────────────────────────────────────

/// The 13 climate, soil and topography variables feeding the environmental index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvVariable {
    Temperature,
    Precipitation,
    Radiation,
    VaporPressureDeficit,
    SoilDepth,
    Sand,
    Clay,
    SoilOrganicCarbon,
    CationExchangeCapacity,
    Ph,
    Elevation,
    Aspect,
    Slope,
}

pub const N_ENV_VARIABLES: usize = 13;

impl EnvVariable {
    /// All variables in Input A column order.
    pub const ALL: [EnvVariable; N_ENV_VARIABLES] = [
        EnvVariable::Temperature,
        EnvVariable::Precipitation,
        EnvVariable::Radiation,
        EnvVariable::VaporPressureDeficit,
        EnvVariable::SoilDepth,
        EnvVariable::Sand,
        EnvVariable::Clay,
        EnvVariable::SoilOrganicCarbon,
        EnvVariable::CationExchangeCapacity,
        EnvVariable::Ph,
        EnvVariable::Elevation,
        EnvVariable::Aspect,
        EnvVariable::Slope,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Input A column name.
    pub fn column(self) -> &'static str {
        match self {
            EnvVariable::Temperature => "TEM",
            EnvVariable::Precipitation => "PRE",
            EnvVariable::Radiation => "SRAD",
            EnvVariable::VaporPressureDeficit => "VPD",
            EnvVariable::SoilDepth => "SoilDepth",
            EnvVariable::Sand => "Sand",
            EnvVariable::Clay => "Clay",
            EnvVariable::SoilOrganicCarbon => "SOC",
            EnvVariable::CationExchangeCapacity => "CEC",
            EnvVariable::Ph => "pH",
            EnvVariable::Elevation => "DEM",
            EnvVariable::Aspect => "Aspect",
            EnvVariable::Slope => "Slope",
        }
    }
}

/// One pixel's 13 environmental values, indexed by [`EnvVariable`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvVariables(pub [f64; N_ENV_VARIABLES]);

impl EnvVariables {
    #[inline]
    pub fn get(&self, var: EnvVariable) -> f64 {
        self.0[var.index()]
    }

    #[inline]
    pub fn set(&mut self, var: EnvVariable, value: f64) {
        self.0[var.index()] = value;
    }

    pub fn values(&self) -> &[f64; N_ENV_VARIABLES] {
        &self.0
    }
}

// ── Zones, snapshots and forest metrics ───────────────────────────────────────

/// Buffer/zone classification (Input B `Buffer_type`, codes 1-6).
///
/// Code 1 marks reference candidates; codes 2-6 are the five road-proximity
/// bands, nearest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BufferType {
    Candidate,
    Band1,
    Band2,
    Band3,
    Band4,
    Band5,
}

impl BufferType {
    pub fn code(self) -> u8 {
        match self {
            BufferType::Candidate => 1,
            BufferType::Band1 => 2,
            BufferType::Band2 => 3,
            BufferType::Band3 => 4,
            BufferType::Band4 => 5,
            BufferType::Band5 => 6,
        }
    }

    pub fn is_candidate(self) -> bool {
        self == BufferType::Candidate
    }
}

impl TryFrom<u8> for BufferType {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(BufferType::Candidate),
            2 => Ok(BufferType::Band1),
            3 => Ok(BufferType::Band2),
            4 => Ok(BufferType::Band3),
            5 => Ok(BufferType::Band4),
            6 => Ok(BufferType::Band5),
            other => Err(Error::InvalidBufferType(other)),
        }
    }
}

impl From<BufferType> for u8 {
    fn from(b: BufferType) -> u8 {
        b.code()
    }
}

/// Observation year of the forest metrics and nighttime lights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Snapshot {
    Y2000,
    Y2020,
}

impl Snapshot {
    pub const ALL: [Snapshot; 2] = [Snapshot::Y2000, Snapshot::Y2020];

    pub fn year(self) -> u16 {
        match self {
            Snapshot::Y2000 => 2000,
            Snapshot::Y2020 => 2020,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Forest condition metrics compared between road and reference pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForestMetric {
    /// Forest area fraction (%).
    Area,
    /// Mean canopy height (m).
    Height,
    /// Patch density (patches/km²).
    PatchDensity,
    /// Net primary productivity (gC/m²/yr).
    Npp,
}

impl ForestMetric {
    pub const ALL: [ForestMetric; 4] = [
        ForestMetric::Area,
        ForestMetric::Height,
        ForestMetric::PatchDensity,
        ForestMetric::Npp,
    ];

    /// Column prefix used in Input B and Output B (`Area2000`, `H_AC_trend`, ...).
    pub fn column_prefix(self) -> &'static str {
        match self {
            ForestMetric::Area => "Area",
            ForestMetric::Height => "H",
            ForestMetric::PatchDensity => "PD",
            ForestMetric::Npp => "NPP",
        }
    }

    /// Column name for this metric at one snapshot, e.g. `NPP2020`.
    pub fn column(self, snapshot: Snapshot) -> String {
        format!("{}{}", self.column_prefix(), snapshot.year())
    }
}

/// Forest metrics of one pixel at one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ForestMetrics {
    pub area: f64,
    pub height: f64,
    pub patch_density: f64,
    pub npp: f64,
}

impl ForestMetrics {
    pub fn get(&self, metric: ForestMetric) -> f64 {
        match metric {
            ForestMetric::Area => self.area,
            ForestMetric::Height => self.height,
            ForestMetric::PatchDensity => self.patch_density,
            ForestMetric::Npp => self.npp,
        }
    }
}

// ── Pixel ─────────────────────────────────────────────────────────────────────

/// A sample point with every attribute the impact engine reads.
/// Coordinates are planar (projection units, metres).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pixel {
    pub point_id: PointId,
    pub x: f64,
    pub y: f64,
    pub buffer: BufferType,
    pub env: EnvVariables,
    /// Indexed by [`Snapshot::index`].
    pub forest: [ForestMetrics; 2],
    /// Nighttime-lights digital number, indexed by [`Snapshot::index`].
    pub night_lights: [f64; 2],
    /// Signed forest-cover change (%).
    pub forest_change: f64,
    /// Plantation fraction (%).
    pub plantations: f64,
    pub in_window: bool,
}

impl Pixel {
    #[inline]
    pub fn metric(&self, metric: ForestMetric, snapshot: Snapshot) -> f64 {
        self.forest[snapshot.index()].get(metric)
    }

    #[inline]
    pub fn lights(&self, snapshot: Snapshot) -> f64 {
        self.night_lights[snapshot.index()]
    }

    /// Straight-line planar distance to `other`.
    #[inline]
    pub fn distance_to(&self, other: &Pixel) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Road/RRI-zone pixel inside the analysis window.
    pub fn is_target(&self) -> bool {
        self.in_window && !self.buffer.is_candidate()
    }
}
