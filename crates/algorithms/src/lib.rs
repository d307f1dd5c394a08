//! # Riparia Algorithms
//!
//! Valley-bottom and centerline extraction for drainage networks.
//!
//! ## Pipeline
//!
//! - **evidence**: per-zone transforms and blockwise fusion of slope,
//!   HAND and TWI rasters with channel presence
//! - **mask**: threshold, sieve, label and close the fused evidence into
//!   a clean binary valley-bottom mask
//! - **cost**: proximity-based exponential cost surface over the mask
//! - **path**: network extremity detection and raster least-cost-path
//!   centerlines
//! - **voronoi**: medial-axis centerlines from a classified Voronoi
//!   diagram of the valley polygon
//! - **stitch**: drives per-level-path processing headwater to outlet
//!   and merges results into one non-overlapping network centerline

pub mod cost;
pub mod evidence;
pub mod mask;
pub mod path;
pub mod stitch;
pub mod voronoi;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::cost::{build_cost_surface, proximity, CostSurfaceParams};
    pub use crate::evidence::{
        fuse_evidence, EvidenceInputs, FusionParams, TransformTable, ZoneTransform,
    };
    pub use crate::mask::{build_valley_mask, ValleyMaskParams};
    pub use crate::path::{find_extremities, least_cost_path, LeastCostPathParams};
    pub use crate::stitch::{
        stitch_network, CenterlineBuilder, Checkpoint, LevelPathContext, NetworkStitchState,
        RasterMethod, Reach, RunSummary, StitchParams, VoronoiMethod,
    };
    pub use crate::voronoi::{CenterlineOutcome, VoronoiCenterline, VoronoiParams};
    pub use riparia_core::prelude::*;
}
