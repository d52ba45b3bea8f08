//! Reference screening.
//!
//! A candidate qualifies as a reference for a target only when all six
//! constraints hold at once:
//!   1. planar distance below the search radius,
//!   2. |ΔCEI| below the similarity threshold,
//!   3. |ForestChange| below its limit (stable forest cover),
//!   4. |Plantations| below its limit (natural forest),
//!   5. nighttime lights below the near-zero limit at every snapshot,
//!   6. the candidate lies in the reference-candidate zone (Buffer_type 1).
//!
//! Comparisons are written so that NaN fails every constraint.
use log::{debug, log_enabled, Level};

use crate::config::AnalysisConfig;
use crate::index::EnvironmentalIndex;
use crate::pixel::{Pixel, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constraint {
    Proximity,
    CeiSimilarity,
    ForestStability,
    NaturalForest,
    LowDisturbance,
    CandidateZone,
}

impl Constraint {
    pub const ALL: [Constraint; 6] = [
        Constraint::Proximity,
        Constraint::CeiSimilarity,
        Constraint::ForestStability,
        Constraint::NaturalForest,
        Constraint::LowDisturbance,
        Constraint::CandidateZone,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Constraint::Proximity => "radius",
            Constraint::CeiSimilarity => "cei",
            Constraint::ForestStability => "change",
            Constraint::NaturalForest => "plantation",
            Constraint::LowDisturbance => "lights",
            Constraint::CandidateZone => "zone",
        }
    }
}

/// A qualified reference and its distance to the target.
#[derive(Debug, Clone, Copy)]
pub struct Reference<'a> {
    pub pixel: &'a Pixel,
    pub distance: f64,
    pub cei: f64,
}

/// Number of candidates rejected per constraint (first failing constraint only).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rejections([usize; 6]);

impl Rejections {
    pub fn count(&self, c: Constraint) -> usize {
        self.0[c as usize]
    }

    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }
}

/// Qualified references for one target, nearest first (ties by pointID).
///
/// The set is built fresh per target and is kept even when too small; callers
/// must check [`ReferenceSet::is_sufficient`] before aggregating.
#[derive(Debug, Clone)]
pub struct ReferenceSet<'a> {
    members: Vec<Reference<'a>>,
    min_required: usize,
    pub target_cei: f64,
    pub rejections: Rejections,
}

impl<'a> ReferenceSet<'a> {
    pub fn new(members: Vec<Reference<'a>>, target_cei: f64, min_required: usize) -> Self {
        let mut set = Self {
            members,
            min_required,
            target_cei,
            rejections: Rejections::default(),
        };
        set.sort();
        set
    }

    fn sort(&mut self) {
        self.members.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.pixel.point_id.cmp(&b.pixel.point_id))
        });
    }

    pub fn members(&self) -> &[Reference<'a>] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_sufficient(&self) -> bool {
        self.members.len() >= self.min_required
    }

    pub fn nearest(&self) -> Option<&Reference<'a>> {
        self.members.first()
    }

    /// Keep the `max(min_required, ⌊n·fraction⌋)` most CEI-similar members.
    fn keep_most_similar(&mut self, fraction: f64) {
        let n = self.members.len();
        let keep = ((n as f64 * fraction).floor() as usize).max(self.min_required).min(n);
        if keep == n {
            return;
        }
        let target = self.target_cei;
        self.members.sort_by(|a, b| {
            (a.cei - target)
                .abs()
                .total_cmp(&(b.cei - target).abs())
                .then(a.distance.total_cmp(&b.distance))
                .then(a.pixel.point_id.cmp(&b.pixel.point_id))
        });
        self.members.truncate(keep);
        self.sort();
    }
}

/// The first constraint `candidate` violates for this target, if any.
pub fn first_violation(
    target: &Pixel,
    target_cei: f64,
    candidate: &Pixel,
    candidate_cei: Option<f64>,
    distance: f64,
    config: &AnalysisConfig,
) -> Option<Constraint> {
    let limits = &config.screening;
    if !candidate.buffer.is_candidate() || candidate.point_id == target.point_id {
        return Some(Constraint::CandidateZone);
    }
    if !(distance < limits.search_radius) {
        return Some(Constraint::Proximity);
    }
    match candidate_cei {
        Some(cei) if (cei - target_cei).abs() < limits.cei_threshold => {}
        _ => return Some(Constraint::CeiSimilarity),
    }
    if !(candidate.forest_change.abs() < limits.max_forest_change) {
        return Some(Constraint::ForestStability);
    }
    if !(candidate.plantations.abs() < limits.max_plantation) {
        return Some(Constraint::NaturalForest);
    }
    if !Snapshot::ALL
        .iter()
        .all(|&s| candidate.lights(s) < limits.max_night_lights)
    {
        return Some(Constraint::LowDisturbance);
    }
    None
}

/// Screen `candidates` for `target`.
///
/// Returns `None` when the target itself has no CEI.
pub fn screen<'a, I>(
    target: &Pixel,
    candidates: I,
    index: &EnvironmentalIndex,
    config: &AnalysisConfig,
) -> Option<ReferenceSet<'a>>
where
    I: IntoIterator<Item = &'a Pixel>,
{
    let target_cei = index.get(target.point_id)?;
    let mut rejections = Rejections::default();
    let mut members = Vec::new();

    for candidate in candidates {
        let distance = target.distance_to(candidate);
        let cei = index.get(candidate.point_id);
        match first_violation(target, target_cei, candidate, cei, distance, config) {
            Some(c) => rejections.0[c as usize] += 1,
            None => members.push(Reference {
                pixel: candidate,
                distance,
                cei: cei.unwrap_or(target_cei),
            }),
        }
    }

    let mut set = ReferenceSet::new(members, target_cei, config.min_reference_count);
    set.rejections = rejections;
    if let Some(fraction) = config.screening.top_similar_fraction {
        set.keep_most_similar(fraction);
    }

    if log_enabled!(Level::Debug) {
        let detail: Vec<String> = Constraint::ALL
            .iter()
            .map(|&c| format!("{} {}", c.label(), rejections.count(c)))
            .collect();
        debug!(
            "pointID {}: {} qualified reference(s), {} rejected ({})",
            target.point_id,
            set.len(),
            rejections.total(),
            detail.join(", ")
        );
    }
    Some(set)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::index::build_index;
    use crate::pixel::{BufferType, EnvVariables, ForestMetrics, PointId, N_ENV_VARIABLES};

    /// A clean reference candidate at (x, y); `env_seed` shifts its environment.
    pub(crate) fn pixel(id: PointId, x: f64, y: f64, buffer: BufferType, env_seed: f64) -> Pixel {
        let mut vars = [0.0; N_ENV_VARIABLES];
        for (j, v) in vars.iter_mut().enumerate() {
            *v = ((env_seed + 1.0) * (j as f64 + 1.3)).sin() * 10.0;
        }
        Pixel {
            point_id: id,
            x,
            y,
            buffer,
            env: EnvVariables(vars),
            forest: [ForestMetrics { area: 50.0, height: 20.0, patch_density: 1.0, npp: 600.0 }; 2],
            night_lights: [0.0, 0.0],
            forest_change: 0.0,
            plantations: 0.0,
            in_window: !buffer.is_candidate(),
        }
    }

    fn permissive() -> AnalysisConfig {
        let mut cfg = AnalysisConfig::default();
        cfg.screening.cei_threshold = 2.0;
        cfg
    }

    fn index_for(pixels: &[Pixel]) -> EnvironmentalIndex {
        build_index(pixels.iter().map(|p| (p.point_id, &p.env)), &permissive())
            .unwrap()
            .index
    }

    #[test]
    fn each_constraint_rejects() {
        let target = pixel(1, 0.0, 0.0, BufferType::Band1, 0.0);
        let ok = pixel(2, 100.0, 0.0, BufferType::Candidate, 1.0);
        let cfg = permissive();
        assert_eq!(first_violation(&target, 0.5, &ok, Some(0.5), 100.0, &cfg), None);

        let road = Pixel { buffer: BufferType::Band2, ..ok.clone() };
        assert_eq!(
            first_violation(&target, 0.5, &road, Some(0.5), 100.0, &cfg),
            Some(Constraint::CandidateZone)
        );
        assert_eq!(
            first_violation(&target, 0.5, &ok, Some(0.5), 50_000.0, &cfg),
            Some(Constraint::Proximity)
        );
        let mut strict = cfg.clone();
        strict.screening.cei_threshold = 0.05;
        assert_eq!(
            first_violation(&target, 0.5, &ok, Some(0.56), 100.0, &strict),
            Some(Constraint::CeiSimilarity)
        );
        assert_eq!(
            first_violation(&target, 0.5, &ok, None, 100.0, &cfg),
            Some(Constraint::CeiSimilarity)
        );
        let changed = Pixel { forest_change: -10.0, ..ok.clone() };
        assert_eq!(
            first_violation(&target, 0.5, &changed, Some(0.5), 100.0, &cfg),
            Some(Constraint::ForestStability)
        );
        let planted = Pixel { plantations: 12.0, ..ok.clone() };
        assert_eq!(
            first_violation(&target, 0.5, &planted, Some(0.5), 100.0, &cfg),
            Some(Constraint::NaturalForest)
        );
        let lit = Pixel { night_lights: [0.0, 3.0], ..ok.clone() };
        assert_eq!(
            first_violation(&target, 0.5, &lit, Some(0.5), 100.0, &cfg),
            Some(Constraint::LowDisturbance)
        );
        let unknown = Pixel { plantations: f64::NAN, ..ok };
        assert_eq!(
            first_violation(&target, 0.5, &unknown, Some(0.5), 100.0, &cfg),
            Some(Constraint::NaturalForest)
        );
    }

    #[test]
    fn screen_sorts_by_distance_then_id() {
        let target = pixel(100, 0.0, 0.0, BufferType::Band1, 0.0);
        let pixels = vec![
            target.clone(),
            pixel(5, 300.0, 0.0, BufferType::Candidate, 1.0),
            pixel(3, 0.0, 200.0, BufferType::Candidate, 2.0),
            pixel(2, 200.0, 0.0, BufferType::Candidate, 3.0),
            pixel(9, 0.0, 60_000.0, BufferType::Candidate, 4.0),
            pixel(7, 10.0, 0.0, BufferType::Band3, 5.0),
        ];
        let idx = index_for(&pixels);
        let set = screen(&target, &pixels, &idx, &permissive()).unwrap();

        let ids: Vec<PointId> = set.members().iter().map(|r| r.pixel.point_id).collect();
        assert_eq!(ids, vec![2, 3, 5]);
        assert!(set.is_sufficient());
        assert_eq!(set.nearest().unwrap().distance, 200.0);
        assert_eq!(set.rejections.count(Constraint::Proximity), 1);
        // Target itself and the road pixel.
        assert_eq!(set.rejections.count(Constraint::CandidateZone), 2);
        let tallied: usize = Constraint::ALL.iter().map(|&c| set.rejections.count(c)).sum();
        assert_eq!(tallied, set.rejections.total());
        for r in set.members() {
            assert!(r.pixel.buffer.is_candidate());
        }
    }

    #[test]
    fn small_set_is_flagged_insufficient() {
        let target = pixel(1, 0.0, 0.0, BufferType::Band1, 0.0);
        let pixels = vec![
            target.clone(),
            pixel(2, 50.0, 0.0, BufferType::Candidate, 1.0),
            pixel(3, 80.0, 0.0, BufferType::Candidate, 2.0),
            Pixel { forest_change: 40.0, ..pixel(4, 10.0, 0.0, BufferType::Candidate, 3.0) },
        ];
        let idx = index_for(&pixels);
        let set = screen(&target, &pixels, &idx, &permissive()).unwrap();
        assert_eq!(set.len(), 2);
        assert!(!set.is_sufficient());
    }

    #[test]
    fn target_without_cei_cannot_be_screened() {
        let target = pixel(1, 0.0, 0.0, BufferType::Band1, 0.0);
        let pixels = vec![
            pixel(2, 50.0, 0.0, BufferType::Candidate, 1.0),
            pixel(3, 80.0, 0.0, BufferType::Candidate, 2.0),
            pixel(4, 90.0, 0.0, BufferType::Candidate, 3.0),
        ];
        let idx = index_for(&pixels);
        assert!(screen(&target, &pixels, &idx, &permissive()).is_none());
    }

    #[test]
    fn top_fraction_keeps_most_similar() {
        let refs: Vec<Pixel> = (0..10)
            .map(|i| pixel(10 + i, 100.0 * (i + 1) as f64, 0.0, BufferType::Candidate, 0.0))
            .collect();
        let members: Vec<Reference> = refs
            .iter()
            .enumerate()
            .map(|(i, p)| Reference { pixel: p, distance: 100.0 * (i + 1) as f64, cei: 0.5 + 0.01 * (9 - i) as f64 })
            .collect();
        let mut set = ReferenceSet::new(members, 0.5, 3);
        set.keep_most_similar(0.2);
        // ⌊10 × 0.2⌋ = 2 < 3 → keep 3: the farthest three have the closest CEI.
        let ids: Vec<PointId> = set.members().iter().map(|r| r.pixel.point_id).collect();
        assert_eq!(ids, vec![17, 18, 19]);
    }
}
