//! Raster centerline pathfinding
//!
//! Detects a level path's network extremities from its flowline
//! endpoints, then runs an 8-connected least-cost grid search over the
//! valley cost surface between them and vectorizes the result.

mod extremity;
mod lcp;

pub use extremity::find_extremities;
pub use lcp::{least_cost_path, vectorize_path, LeastCostPathParams};
