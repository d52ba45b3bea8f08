//! Input table rows and the pointID join that produces [`Pixel`]s.
//!
//! Field names follow the input column headers exactly, so rows can be
//! deserialized from any serde source (CSV readers, JSON records) by the
//! caller. Empty/null numeric cells become NaN and are treated as missing
//! downstream.

use std::collections::{HashMap, HashSet};

use log::warn;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::pixel::{BufferType, EnvVariables, ForestMetrics, Pixel, PointId};
use crate::record::{SkippedPixel, SkippedReason};

// ── Serde helpers ─────────────────────────────────────────────────────────────

fn null_as_nan<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<f64, D::Error> {
    let v: Option<f64> = Option::deserialize(d)?;
    Ok(v.unwrap_or(f64::NAN))
}

fn flag_from_number<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<bool, D::Error> {
    let v: f64 = f64::deserialize(d)?;
    Ok(v != 0.0)
}

fn flag_as_number<S: serde::Serializer>(v: &bool, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u8(u8::from(*v))
}

// ── Input A ───────────────────────────────────────────────────────────────────

/// Input A: environmental variables per point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvRow {
    #[serde(rename = "pointID")]
    pub point_id: PointId,
    #[serde(rename = "TEM", deserialize_with = "null_as_nan")]
    pub temperature: f64,
    #[serde(rename = "PRE", deserialize_with = "null_as_nan")]
    pub precipitation: f64,
    #[serde(rename = "SRAD", deserialize_with = "null_as_nan")]
    pub radiation: f64,
    #[serde(rename = "VPD", deserialize_with = "null_as_nan")]
    pub vpd: f64,
    #[serde(rename = "SoilDepth", deserialize_with = "null_as_nan")]
    pub soil_depth: f64,
    #[serde(rename = "Sand", deserialize_with = "null_as_nan")]
    pub sand: f64,
    #[serde(rename = "Clay", deserialize_with = "null_as_nan")]
    pub clay: f64,
    #[serde(rename = "SOC", deserialize_with = "null_as_nan")]
    pub soc: f64,
    #[serde(rename = "CEC", deserialize_with = "null_as_nan")]
    pub cec: f64,
    #[serde(rename = "pH", deserialize_with = "null_as_nan")]
    pub ph: f64,
    #[serde(rename = "DEM", deserialize_with = "null_as_nan")]
    pub elevation: f64,
    #[serde(rename = "Aspect", deserialize_with = "null_as_nan")]
    pub aspect: f64,
    #[serde(rename = "Slope", deserialize_with = "null_as_nan")]
    pub slope: f64,
}

impl EnvRow {
    /// Values in [`crate::pixel::EnvVariable::ALL`] order.
    pub fn variables(&self) -> EnvVariables {
        EnvVariables([
            self.temperature,
            self.precipitation,
            self.radiation,
            self.vpd,
            self.soil_depth,
            self.sand,
            self.clay,
            self.soc,
            self.cec,
            self.ph,
            self.elevation,
            self.aspect,
            self.slope,
        ])
    }
}

// ── Input B ───────────────────────────────────────────────────────────────────

/// Input B: location, zone and forest attributes per point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRow {
    #[serde(rename = "pointID")]
    pub point_id: PointId,
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
    #[serde(rename = "Buffer_type")]
    pub buffer_type: BufferType,
    #[serde(rename = "Area2000", deserialize_with = "null_as_nan")]
    pub area_2000: f64,
    #[serde(rename = "Area2020", deserialize_with = "null_as_nan")]
    pub area_2020: f64,
    #[serde(rename = "H2000", deserialize_with = "null_as_nan")]
    pub height_2000: f64,
    #[serde(rename = "H2020", deserialize_with = "null_as_nan")]
    pub height_2020: f64,
    #[serde(rename = "PD2000", deserialize_with = "null_as_nan")]
    pub patch_density_2000: f64,
    #[serde(rename = "PD2020", deserialize_with = "null_as_nan")]
    pub patch_density_2020: f64,
    #[serde(rename = "NPP2000", deserialize_with = "null_as_nan")]
    pub npp_2000: f64,
    #[serde(rename = "NPP2020", deserialize_with = "null_as_nan")]
    pub npp_2020: f64,
    #[serde(rename = "NTL2000", deserialize_with = "null_as_nan")]
    pub ntl_2000: f64,
    #[serde(rename = "NTL2020", deserialize_with = "null_as_nan")]
    pub ntl_2020: f64,
    #[serde(
        rename = "Windowflag",
        deserialize_with = "flag_from_number",
        serialize_with = "flag_as_number"
    )]
    pub window_flag: bool,
    #[serde(rename = "ForestChange", deserialize_with = "null_as_nan")]
    pub forest_change: f64,
    #[serde(rename = "Plantations", deserialize_with = "null_as_nan")]
    pub plantations: f64,
}

impl SiteRow {
    pub fn into_pixel(self, env: EnvVariables) -> Pixel {
        Pixel {
            point_id: self.point_id,
            x: self.x,
            y: self.y,
            buffer: self.buffer_type,
            env,
            forest: [
                ForestMetrics {
                    area: self.area_2000,
                    height: self.height_2000,
                    patch_density: self.patch_density_2000,
                    npp: self.npp_2000,
                },
                ForestMetrics {
                    area: self.area_2020,
                    height: self.height_2020,
                    patch_density: self.patch_density_2020,
                    npp: self.npp_2020,
                },
            ],
            night_lights: [self.ntl_2000, self.ntl_2020],
            forest_change: self.forest_change,
            plantations: self.plantations,
            in_window: self.window_flag,
        }
    }
}

// ── Join ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct JoinedTables {
    /// Ascending pointID.
    pub pixels: Vec<Pixel>,
    /// pointIDs present in only one table.
    pub unmatched: Vec<SkippedPixel>,
}

/// Inner-join Input A and Input B on pointID.
pub fn join(env_rows: &[EnvRow], site_rows: Vec<SiteRow>) -> Result<JoinedTables> {
    let mut env: HashMap<PointId, EnvVariables> = HashMap::with_capacity(env_rows.len());
    for row in env_rows {
        if env.insert(row.point_id, row.variables()).is_some() {
            return Err(Error::DuplicatePoint(row.point_id));
        }
    }

    let mut seen: HashSet<PointId> = HashSet::with_capacity(site_rows.len());
    let mut pixels = Vec::with_capacity(site_rows.len());
    let mut unmatched = Vec::new();
    for row in site_rows {
        if !seen.insert(row.point_id) {
            return Err(Error::DuplicatePoint(row.point_id));
        }
        match env.get(&row.point_id) {
            Some(vars) => {
                let vars = *vars;
                pixels.push(row.into_pixel(vars));
            }
            None => unmatched.push(SkippedPixel::new(row.point_id, SkippedReason::Unmatched)),
        }
    }
    unmatched.extend(
        env.keys()
            .filter(|id| !seen.contains(id))
            .map(|&id| SkippedPixel::new(id, SkippedReason::Unmatched)),
    );

    pixels.sort_by_key(|p| p.point_id);
    unmatched.sort_by_key(|s| s.point_id);
    if !unmatched.is_empty() {
        warn!("{} pointID(s) present in only one input table", unmatched.len());
    }
    Ok(JoinedTables { pixels, unmatched })
}
