//! Network stitcher
//!
//! Drives per-level-path centerline construction headwater to outlet.
//! A level path whose upstream neighbors are all finished consumes the
//! merged centerline built so far, so reconnection always snaps onto
//! geometry that already exists. The loop owns all mutable state in one
//! `NetworkStitchState` value and appends to a single output layer.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use geo::{Coord, Geometry, Intersects, LineString, MultiLineString, Polygon};
use riparia_core::raster::Raster;
use riparia_core::vector::{AttributeValue, Feature, FeatureCollection};
use riparia_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::path::{find_extremities, least_cost_path, LeastCostPathParams};
use crate::voronoi::{CenterlineOutcome, VoronoiCenterline, VoronoiParams};

/// One flowline reach as consumed from the hydrography collaborator
#[derive(Debug, Clone)]
pub struct Reach {
    pub reach_id: i64,
    /// Owning level path
    pub level_path: i64,
    /// Downstream reach, if any; crosses into another level path at
    /// confluences
    pub downstream: Option<i64>,
    pub geometry: LineString<f64>,
}

/// Per-level-path inputs handed to a centerline builder
pub struct LevelPathContext<'a> {
    pub level_path: i64,
    /// Union of the level path's reach geometries in downstream order
    pub thalweg: &'a LineString<f64>,
    /// The individual reach geometries, for extremity detection
    pub flowlines: &'a [LineString<f64>],
    /// Valley polygons intersecting this level path
    pub valleys: &'a [&'a Polygon<f64>],
    /// Network centerline built so far
    pub merged: &'a MultiLineString<f64>,
}

/// A strategy producing one level path's centerline
pub trait CenterlineBuilder {
    fn name(&self) -> &'static str;
    fn build(&self, ctx: &LevelPathContext<'_>) -> Result<CenterlineOutcome>;
}

/// Medial-axis strategy: one Voronoi build per intersecting valley
/// polygon, each consuming the union left by the previous one.
pub struct VoronoiMethod {
    pub params: VoronoiParams,
}

impl CenterlineBuilder for VoronoiMethod {
    fn name(&self) -> &'static str {
        "voronoi"
    }

    fn build(&self, ctx: &LevelPathContext<'_>) -> Result<CenterlineOutcome> {
        if ctx.valleys.is_empty() {
            return Err(Error::EmptyMask);
        }

        let mut merged = ctx.merged.clone();
        let mut pieces = Vec::new();
        let mut used_fallback = false;

        for polygon in ctx.valleys {
            let builder =
                VoronoiCenterline::new(ctx.thalweg, (*polygon).clone(), self.params.clone())?;
            let outcome = builder.build(&merged, ctx.thalweg)?;
            pieces.extend(outcome.pieces);
            merged = outcome.merged;
            used_fallback |= outcome.used_fallback;
        }

        Ok(CenterlineOutcome { pieces, merged, used_fallback })
    }
}

/// Raster strategy: least-cost path over a per-level-path cost surface
/// between the level path's two network extremities.
pub struct RasterMethod {
    /// Cost surface per level path, prepared by the caller
    pub cost_surfaces: HashMap<i64, Raster<f64>>,
    pub params: LeastCostPathParams,
}

impl CenterlineBuilder for RasterMethod {
    fn name(&self) -> &'static str {
        "raster"
    }

    fn build(&self, ctx: &LevelPathContext<'_>) -> Result<CenterlineOutcome> {
        let cost = self
            .cost_surfaces
            .get(&ctx.level_path)
            .ok_or_else(|| Error::MissingInput { variable: "cost_surface".into() })?;

        let extremities = find_extremities(ctx.flowlines);
        if extremities.len() < 2 {
            return Err(Error::GeometryDegeneracy { stage: "extremity" });
        }
        // A level path is an unbranched chain; with more than two
        // candidates take the farthest-apart pair.
        let (a, b) = farthest_pair(&extremities);

        let line = least_cost_path(cost, (a.x, a.y), (b.x, b.y), &self.params)?;

        let mut union = ctx.merged.0.clone();
        union.push(line.clone());
        Ok(CenterlineOutcome {
            pieces: vec![line],
            merged: MultiLineString::new(union),
            used_fallback: false,
        })
    }
}

fn farthest_pair(coords: &[Coord<f64>]) -> (Coord<f64>, Coord<f64>) {
    let mut best = (coords[0], coords[1]);
    let mut best_d2 = -1.0;
    for (i, &a) in coords.iter().enumerate() {
        for &b in &coords[i + 1..] {
            let d2 = (a.x - b.x).powi(2) + (a.y - b.y).powi(2);
            if d2 > best_d2 {
                best_d2 = d2;
                best = (a, b);
            }
        }
    }
    best
}

/// Serializable per-run checkpoint, written after each level path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Level paths whose centerline is finished
    pub completed: Vec<i64>,
    /// Merged centerline at the time of the checkpoint
    pub merged: MultiLineString<f64>,
}

/// Counters for a whole network run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Level paths that emitted a centerline
    pub completed: Vec<i64>,
    /// Level paths skipped without a centerline
    pub skipped: Vec<i64>,
    /// Level paths that used the raw-skeleton fallback
    pub fallbacks: Vec<i64>,
    /// Skip/fallback tallies keyed by error kind
    pub error_counts: HashMap<&'static str, usize>,
}

impl RunSummary {
    fn record_skip(&mut self, level_path: i64, err: &Error) {
        self.skipped.push(level_path);
        *self.error_counts.entry(err.kind()).or_insert(0) += 1;
    }

    fn record_fallback(&mut self, level_path: i64) {
        self.fallbacks.push(level_path);
        *self.error_counts.entry("geometry_degeneracy").or_insert(0) += 1;
    }

    /// Level paths lacking a centerline after the run
    pub fn missing_centerlines(&self) -> &[i64] {
        &self.skipped
    }
}

/// All mutable state of one stitch run, threaded by ownership
#[derive(Debug, Clone)]
pub struct NetworkStitchState {
    /// Running merged centerline
    pub merged: MultiLineString<f64>,
    /// Reach ids already walked, for cycle safety
    pub visited: HashSet<i64>,
    pub summary: RunSummary,
}

impl Default for NetworkStitchState {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkStitchState {
    pub fn new() -> Self {
        Self {
            merged: MultiLineString::new(Vec::new()),
            visited: HashSet::new(),
            summary: RunSummary::default(),
        }
    }

    /// Snapshot for crash recovery; taken after each level path
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            completed: self.summary.completed.clone(),
            merged: self.merged.clone(),
        }
    }

    /// Restore a run from a checkpoint; completed level paths are
    /// skipped, their geometry already part of the merged line.
    pub fn resume(checkpoint: Checkpoint) -> Self {
        let mut state = Self::new();
        state.merged = checkpoint.merged;
        state.summary.completed = checkpoint.completed;
        state
    }

    fn is_completed(&self, level_path: i64) -> bool {
        self.summary.completed.contains(&level_path)
    }
}

/// Parameters for a network stitch run
#[derive(Debug, Clone, Default)]
pub struct StitchParams {
    /// Checkpoint to resume from, if any
    pub resume_from: Option<Checkpoint>,
}

/// Level paths in headwater-to-outlet order.
///
/// Kahn ordering over the downstream links between level paths; a
/// headwater has no upstream neighbor. Cyclic leftovers (bad topology)
/// are appended in id order with a warning rather than dropped.
pub fn order_level_paths(reaches: &[Reach]) -> Vec<i64> {
    let mut reach_lp: HashMap<i64, i64> = HashMap::new();
    for r in reaches {
        reach_lp.insert(r.reach_id, r.level_path);
    }

    let mut downstream_of: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
    let mut in_degree: BTreeMap<i64, usize> = BTreeMap::new();
    for r in reaches {
        in_degree.entry(r.level_path).or_insert(0);
        if let Some(down) = r.downstream {
            if let Some(&down_lp) = reach_lp.get(&down) {
                if down_lp != r.level_path
                    && downstream_of.entry(r.level_path).or_default().insert(down_lp)
                {
                    *in_degree.entry(down_lp).or_insert(0) += 1;
                }
            }
        }
    }

    let mut queue: VecDeque<i64> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&lp, _)| lp)
        .collect();
    let mut order = Vec::with_capacity(in_degree.len());

    while let Some(lp) = queue.pop_front() {
        order.push(lp);
        if let Some(downs) = downstream_of.get(&lp) {
            for &down in downs {
                if let Some(deg) = in_degree.get_mut(&down) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(down);
                    }
                }
            }
        }
    }

    if order.len() < in_degree.len() {
        let leftover: Vec<i64> = in_degree
            .keys()
            .filter(|lp| !order.contains(lp))
            .copied()
            .collect();
        warn!(?leftover, "cyclic level-path topology, appending in id order");
        order.extend(leftover);
    }
    order
}

/// Union a level path's reach geometries in downstream order.
///
/// Walks the downstream chain from each head reach with an explicit
/// visited set, so cyclic references terminate. Returns the chained
/// thalweg and the individual flowlines in walk order.
fn union_level_path(
    reaches: &[&Reach],
    visited: &mut HashSet<i64>,
) -> (LineString<f64>, Vec<LineString<f64>>) {
    let targets: HashSet<i64> = reaches.iter().filter_map(|r| r.downstream).collect();
    let by_id: HashMap<i64, &Reach> = reaches.iter().map(|r| (r.reach_id, *r)).collect();

    let mut heads: Vec<i64> = reaches
        .iter()
        .filter(|r| !targets.contains(&r.reach_id))
        .map(|r| r.reach_id)
        .collect();
    heads.sort_unstable();
    if heads.is_empty() {
        // Pure cycle; start anywhere deterministic
        heads = reaches.iter().map(|r| r.reach_id).take(1).collect();
    }

    let mut coords: Vec<Coord<f64>> = Vec::new();
    let mut flowlines = Vec::new();

    for head in heads {
        let mut cursor = Some(head);
        while let Some(id) = cursor {
            let Some(reach) = by_id.get(&id) else { break };
            if !visited.insert(id) {
                break; // Cycle or shared reach, already walked
            }
            for &c in &reach.geometry.0 {
                if coords.last() != Some(&c) {
                    coords.push(c);
                }
            }
            flowlines.push(reach.geometry.clone());
            cursor = reach.downstream.filter(|d| by_id.contains_key(d));
        }
    }

    (LineString::from(coords), flowlines)
}

/// Stitch a whole network into one centerline layer.
///
/// Level paths are processed headwater to outlet; each one's builder
/// consumes the merged centerline left by its upstream neighbors.
/// Fatal errors abort the run before any further output; level-path
/// local errors skip that level path with a warning and a summary
/// tally.
pub fn stitch_network(
    reaches: &[Reach],
    valleys: &[Polygon<f64>],
    builder: &dyn CenterlineBuilder,
    params: &StitchParams,
) -> Result<(FeatureCollection, NetworkStitchState)> {
    let mut state = match &params.resume_from {
        Some(cp) => NetworkStitchState::resume(cp.clone()),
        None => NetworkStitchState::new(),
    };
    let mut output = FeatureCollection::new();

    let mut by_lp: BTreeMap<i64, Vec<&Reach>> = BTreeMap::new();
    for r in reaches {
        by_lp.entry(r.level_path).or_default().push(r);
    }

    for level_path in order_level_paths(reaches) {
        if state.is_completed(level_path) {
            info!(level_path, "already completed, skipping");
            continue;
        }
        let Some(lp_reaches) = by_lp.get(&level_path) else { continue };

        let (thalweg, flowlines) = union_level_path(lp_reaches, &mut state.visited);
        if thalweg.0.len() < 2 {
            state.summary.record_skip(level_path, &Error::EmptyMask);
            warn!(level_path, "no usable flowline geometry, skipping");
            continue;
        }

        let lp_valleys: Vec<&Polygon<f64>> =
            valleys.iter().filter(|v| v.intersects(&thalweg)).collect();

        let ctx = LevelPathContext {
            level_path,
            thalweg: &thalweg,
            flowlines: &flowlines,
            valleys: &lp_valleys,
            merged: &state.merged,
        };

        match builder.build(&ctx) {
            Ok(outcome) => {
                for piece in &outcome.pieces {
                    let mut feature = Feature::new(Geometry::LineString(piece.clone()));
                    feature.set_property("level_path", AttributeValue::Int(level_path));
                    output.push(feature);
                }
                state.merged = outcome.merged;
                if outcome.used_fallback {
                    state.summary.record_fallback(level_path);
                }
                state.summary.completed.push(level_path);
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(level_path, kind = err.kind(), %err, "skipping level path");
                state.summary.record_skip(level_path, &err);
            }
        }
    }

    info!(
        completed = state.summary.completed.len(),
        skipped = state.summary.skipped.len(),
        fallbacks = state.summary.fallbacks.len(),
        "network stitch finished"
    );
    Ok((output, state))
}
