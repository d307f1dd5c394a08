//! Evidence normalization and fusion
//!
//! Turns raw geomorphic rasters into a single [0,1] evidence surface:
//! per-zone transforms first ([`transform`]), then blockwise fusion with
//! channel presence ([`fusion`]).

mod fusion;
mod transform;

pub use fusion::{ensure_aligned, fuse_evidence, EvidenceInputs, FusionParams};
pub use transform::{TransformTable, ZoneTransform};
