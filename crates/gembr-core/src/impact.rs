//! Road-versus-reference impact.
//!
//! absolute = road − ref
//! relative = (road − ref) / (|road| + |ref|)   (× 100 with `RelativeScale::Percent`)
//!
//! The relative impact is undefined when both values are exactly zero.
use crate::config::RelativeScale;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impact {
    pub absolute: f64,
    pub relative: Option<f64>,
}

pub fn estimate(road_value: f64, ref_value: f64, scale: RelativeScale) -> Impact {
    let absolute = road_value - ref_value;
    let denominator = road_value.abs() + ref_value.abs();
    let relative = (denominator != 0.0).then(|| absolute / denominator * scale.factor());
    Impact { absolute, relative }
}

/// Impact at the later snapshot minus impact at the earlier one.
pub fn trend(earlier: Option<f64>, later: Option<f64>) -> Option<f64> {
    Some(later? - earlier?)
}
