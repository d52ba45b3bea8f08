//! Pipeline orchestrator: index → screening → weighting → impacts.
//!
//! Every target is assessed by a pure function of (target, candidate pool,
//! index, config), so targets can be mapped in parallel with the
//! `threading` feature. Output is always in ascending pointID order.

use std::collections::HashSet;
use std::io::Write;

use log::info;

use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::impact::{estimate, trend};
use crate::index::{build_index, compute_index, CeiRow, EnvironmentalIndex, IndexBuild};
use crate::maybe_rayon::*;
use crate::pixel::{ForestMetric, Pixel, Snapshot};
use crate::record::{ImpactRecord, SkippedPixel, SkippedReason, TargetImpact, TargetStatus};
use crate::screening::screen;
use crate::tables::{join, EnvRow, SiteRow};
use crate::weighting::{aggregate, background_cei};

// ── Output ────────────────────────────────────────────────────────────────────

/// Everything one run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub index: EnvironmentalIndex,
    /// One entry per in-window road/RRI-zone pixel, ascending pointID.
    pub impacts: Vec<TargetImpact>,
    /// Excluded, unmatched and unassessable pixels, ascending pointID.
    pub skipped: Vec<SkippedPixel>,
}

impl PipelineOutput {
    /// Output A rows.
    pub fn cei_rows(&self) -> Vec<CeiRow> {
        self.index.rows()
    }

    /// Long-form records over all targets.
    pub fn records(&self) -> impl Iterator<Item = &ImpactRecord> {
        self.impacts.iter().flat_map(|t| t.records.iter())
    }

    pub fn write_index_json<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, &self.cei_rows())?;
        Ok(())
    }

    /// Output B as a JSON array of wide rows.
    pub fn write_impacts_json<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, &self.impacts)?;
        Ok(())
    }

    pub fn write_skipped_json<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, &self.skipped)?;
        Ok(())
    }
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

pub struct ImpactPipeline {
    config: AnalysisConfig,
    metrics: Vec<ForestMetric>,
}

impl ImpactPipeline {
    /// Validate `config`; configuration errors are fatal here, before any work.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            metrics: ForestMetric::ALL.to_vec(),
        })
    }

    /// Restrict the run to `metrics` (kept in canonical order).
    pub fn with_metrics(mut self, metrics: &[ForestMetric]) -> Self {
        self.metrics = ForestMetric::ALL
            .into_iter()
            .filter(|m| metrics.contains(m))
            .collect();
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run on already-joined pixels. The index population is `pixels`.
    pub fn run(&self, pixels: &[Pixel]) -> Result<PipelineOutput> {
        let mut seen = HashSet::with_capacity(pixels.len());
        for p in pixels {
            if !seen.insert(p.point_id) {
                return Err(Error::DuplicatePoint(p.point_id));
            }
        }
        let build = compute_index(pixels, &self.config)?;
        Ok(self.assess_all(pixels, build, Vec::new()))
    }

    /// Run on the two input tables. The index population is every Input A
    /// row; impacts are computed for pixels present in both tables.
    pub fn run_tables(&self, env_rows: &[EnvRow], site_rows: Vec<SiteRow>) -> Result<PipelineOutput> {
        let joined = join(env_rows, site_rows)?;
        let envs: Vec<_> = env_rows.iter().map(|r| (r.point_id, r.variables())).collect();
        let build = build_index(envs.iter().map(|(id, env)| (*id, env)), &self.config)?;
        Ok(self.assess_all(&joined.pixels, build, joined.unmatched))
    }

    fn assess_all(&self, pixels: &[Pixel], build: IndexBuild, mut skipped: Vec<SkippedPixel>) -> PipelineOutput {
        let IndexBuild { index, skipped: excluded } = build;
        skipped.extend(excluded);

        let pool: Vec<&Pixel> = pixels
            .iter()
            .filter(|p| p.buffer.is_candidate() && index.get(p.point_id).is_some())
            .collect();
        let targets: Vec<&Pixel> = pixels.iter().filter(|p| p.is_target()).collect();
        info!(
            "assessing {} target(s) against {} reference candidate(s)",
            targets.len(),
            pool.len()
        );

        let mut impacts: Vec<TargetImpact> = targets
            .as_slice()
            .into_par_iter()
            .map(|t| self.assess_target(t, &pool, &index))
            .collect();
        impacts.sort_by_key(|t| t.point_id);

        for t in &impacts {
            match t.status {
                TargetStatus::Assessed => {}
                TargetStatus::MissingIndex => {
                    skipped.push(SkippedPixel::new(t.point_id, SkippedReason::MissingIndex))
                }
                TargetStatus::InsufficientReferences { found } => skipped.push(SkippedPixel::new(
                    t.point_id,
                    SkippedReason::InsufficientReferences { found },
                )),
            }
        }
        skipped.sort_by_key(|s| s.point_id);

        let unavailable = impacts
            .iter()
            .filter(|t| t.status != TargetStatus::Assessed)
            .count();
        info!(
            "{} target(s) assessed, {} without a usable reference set",
            impacts.len() - unavailable,
            unavailable
        );

        PipelineOutput { index, impacts, skipped }
    }

    /// Assess one target. Never fails: missing inputs produce missing fields.
    pub fn assess_target(&self, target: &Pixel, pool: &[&Pixel], index: &EnvironmentalIndex) -> TargetImpact {
        let refs = screen(target, pool.iter().copied(), index, &self.config);

        let (status, usable) = match &refs {
            None => (TargetStatus::MissingIndex, None),
            Some(set) if !set.is_sufficient() => {
                (TargetStatus::InsufficientReferences { found: set.len() }, None)
            }
            Some(set) => (TargetStatus::Assessed, Some(set)),
        };
        let nearest_ref_distance = refs.as_ref().and_then(|s| s.nearest()).map(|r| r.distance);
        let ref_points_used = refs.as_ref().map_or(0, |s| s.len());
        let cei_diff = usable.and_then(|set| {
            background_cei(set, &self.config).map(|bg| set.target_cei - bg)
        });

        let mut records = Vec::with_capacity(self.metrics.len() * Snapshot::ALL.len());
        for &metric in &self.metrics {
            let mut pair: Vec<ImpactRecord> = Snapshot::ALL
                .iter()
                .map(|&snapshot| {
                    let road_value = self.config.valid(target.metric(metric, snapshot));
                    let reference_value = usable
                        .and_then(|set| aggregate(set, metric, snapshot, &self.config))
                        .map(|a| a.value);
                    let impact = road_value
                        .zip(reference_value)
                        .map(|(road, reference)| estimate(road, reference, self.config.relative_scale));
                    ImpactRecord {
                        point_id: target.point_id,
                        metric,
                        snapshot,
                        road_value,
                        reference_value,
                        absolute_impact: impact.map(|i| i.absolute),
                        relative_impact: impact.and_then(|i| i.relative),
                        cei_diff,
                        nearest_ref_distance,
                        ref_points_used,
                        absolute_trend: None,
                        relative_trend: None,
                    }
                })
                .collect();

            let absolute_trend = trend(pair[0].absolute_impact, pair[1].absolute_impact);
            let relative_trend = trend(pair[0].relative_impact, pair[1].relative_impact);
            for r in &mut pair {
                r.absolute_trend = absolute_trend;
                r.relative_trend = relative_trend;
            }
            records.extend(pair);
        }

        TargetImpact {
            point_id: target.point_id,
            x: target.x,
            y: target.y,
            buffer: target.buffer,
            status,
            cei_diff,
            nearest_ref_distance,
            ref_points_used,
            records,
        }
    }
}
