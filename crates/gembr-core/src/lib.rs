//! Road-impact assessment on forests.
//!
//! A Comprehensive Environmental Index (CEI) is computed from 13
//! environmental variables by PCA. Each road-zone pixel is then compared
//! with distance-weighted reference pixels that are environmentally similar
//! and undisturbed, giving absolute and relative impacts per forest metric
//! and snapshot.

pub mod config;
pub mod error;
pub mod impact;
pub mod index;
mod maybe_rayon;
pub mod pipeline;
pub mod pixel;
pub mod record;
pub mod screening;
pub mod tables;
pub mod weighting;

pub use config::{AnalysisConfig, IndexConfig, RelativeScale, Scaling, ScreeningConfig, WeightingConfig};
pub use error::{Error, Result};
pub use index::{build_index, compute_index, CeiRow, EnvironmentalIndex, IndexBuild};
pub use pipeline::{ImpactPipeline, PipelineOutput};
pub use pixel::{BufferType, EnvVariable, EnvVariables, ForestMetric, ForestMetrics, Pixel, PointId, Snapshot};
pub use record::{ImpactRecord, MetricTrend, SkippedPixel, SkippedReason, TargetImpact, TargetStatus};
pub use screening::{screen, Constraint, Reference, ReferenceSet};
pub use tables::{join, EnvRow, JoinedTables, SiteRow};
pub use weighting::{aggregate, background_cei, Aggregate};
