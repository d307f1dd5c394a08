//! Skeleton refinement
//!
//! Clips raw medial-axis segments to the valley polygon, chains them
//! into polylines, smooths them, and reconnects new pieces onto the
//! running merged centerline so the network carries no dangling gaps.

use std::collections::HashMap;

use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{
    ChaikinSmoothing, Closest, ClosestPoint, Contains, Coord, Densify, EuclideanDistance, Line,
    LineString, MultiLineString, Point, Polygon, Simplify,
};

const NODE_SCALE: f64 = 1e6;

fn node_key(c: Coord<f64>) -> (i64, i64) {
    ((c.x * NODE_SCALE).round() as i64, (c.y * NODE_SCALE).round() as i64)
}

/// Clip a segment to the polygon interior.
///
/// The segment is split at every boundary crossing and each sub-segment
/// is kept when its midpoint is inside the polygon (holes excluded).
pub fn clip_segment_to_polygon(segment: Line<f64>, polygon: &Polygon<f64>) -> Vec<Line<f64>> {
    let mut params = vec![0.0f64, 1.0];

    let rings =
        std::iter::once(polygon.exterior()).chain(polygon.interiors().iter());
    for ring in rings {
        for boundary in ring.lines() {
            match line_intersection(segment, boundary) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    if let Some(t) = param_along(segment, intersection) {
                        params.push(t);
                    }
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    for c in [intersection.start, intersection.end] {
                        if let Some(t) = param_along(segment, c) {
                            params.push(t);
                        }
                    }
                }
                None => {}
            }
        }
    }

    params.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    params.dedup_by(|a, b| (*a - *b).abs() < 1e-12);

    let mut kept = Vec::new();
    for pair in params.windows(2) {
        let (t0, t1) = (pair[0], pair[1]);
        if t1 - t0 < 1e-12 {
            continue;
        }
        let mid = point_at(segment, (t0 + t1) / 2.0);
        if polygon.contains(&Point::from(mid)) {
            kept.push(Line::new(point_at(segment, t0), point_at(segment, t1)));
        }
    }
    kept
}

fn param_along(segment: Line<f64>, c: Coord<f64>) -> Option<f64> {
    let (dx, dy) = (segment.end.x - segment.start.x, segment.end.y - segment.start.y);
    let len2 = dx * dx + dy * dy;
    if len2 < 1e-24 {
        return None;
    }
    let t = ((c.x - segment.start.x) * dx + (c.y - segment.start.y) * dy) / len2;
    (0.0..=1.0).contains(&t).then_some(t)
}

fn point_at(segment: Line<f64>, t: f64) -> Coord<f64> {
    Coord {
        x: segment.start.x + t * (segment.end.x - segment.start.x),
        y: segment.start.y + t * (segment.end.y - segment.start.y),
    }
}

/// Chain loose segments into maximal polylines by shared endpoints.
///
/// Walks from degree-1 nodes first so open paths come out whole; any
/// remaining segments (cycles) start wherever they are found.
pub fn chain_segments(segments: &[Line<f64>]) -> Vec<LineString<f64>> {
    // node -> (segment index, end: 0 = start, 1 = end)
    let mut nodes: HashMap<(i64, i64), Vec<(usize, u8)>> = HashMap::new();
    for (si, seg) in segments.iter().enumerate() {
        nodes.entry(node_key(seg.start)).or_default().push((si, 0));
        nodes.entry(node_key(seg.end)).or_default().push((si, 1));
    }

    let mut used = vec![false; segments.len()];
    let mut chains = Vec::new();

    let mut seeds: Vec<usize> = (0..segments.len())
        .filter(|&si| {
            let seg = &segments[si];
            nodes[&node_key(seg.start)].len() == 1 || nodes[&node_key(seg.end)].len() == 1
        })
        .collect();
    seeds.extend(0..segments.len());

    for seed in seeds {
        if used[seed] {
            continue;
        }
        used[seed] = true;
        let seg = &segments[seed];

        // Orient the seed so a free end (if any) comes first
        let (mut coords, mut tail) = if nodes[&node_key(seg.end)].len() == 1 {
            (vec![seg.end, seg.start], seg.start)
        } else {
            (vec![seg.start, seg.end], seg.end)
        };

        loop {
            let candidates = &nodes[&node_key(tail)];
            let next = candidates
                .iter()
                .find(|(si, _)| !used[*si]);
            let Some(&(si, end)) = next else { break };
            used[si] = true;
            tail = if end == 0 { segments[si].end } else { segments[si].start };
            coords.push(tail);
        }
        chains.push(LineString::from(coords));
    }
    chains
}

/// Simplify then Chaikin-smooth one polyline. Endpoints are preserved.
pub fn smooth_piece(
    piece: &LineString<f64>,
    tolerance: f64,
    iterations: usize,
) -> LineString<f64> {
    if piece.0.len() < 3 {
        return piece.clone();
    }
    piece.simplify(&tolerance).chaikin_smoothing(iterations)
}

/// A residual run left over after subtracting the merged centerline.
///
/// `head_cut` and `tail_cut` record whether the corresponding end lost
/// a vertex to the subtraction. Only a cut end sits at a genuine
/// junction with the merged line; an uncut end was never near it.
#[derive(Debug, Clone)]
pub struct ResidualRun {
    pub line: LineString<f64>,
    pub head_cut: bool,
    pub tail_cut: bool,
}

/// Remove the part of a piece that re-walks the merged centerline.
///
/// Vertices within `tolerance` of the merged line are dropped; the
/// surviving vertices split into residual runs, each tagged with which
/// of its ends the subtraction truncated.
pub fn subtract_merged(
    piece: &LineString<f64>,
    merged: &MultiLineString<f64>,
    tolerance: f64,
) -> Vec<ResidualRun> {
    let mut runs = Vec::new();
    let mut current: Vec<Coord<f64>> = Vec::new();
    let mut head_cut = false;
    let mut prev_dropped = false;

    for &c in &piece.0 {
        let d = Point::from(c).euclidean_distance(merged);
        if d > tolerance {
            if current.is_empty() {
                head_cut = prev_dropped;
            }
            current.push(c);
        } else {
            if current.len() >= 2 {
                runs.push(ResidualRun {
                    line: LineString::from(std::mem::take(&mut current)),
                    head_cut,
                    tail_cut: true,
                });
            } else {
                current.clear();
            }
            prev_dropped = true;
        }
    }
    if current.len() >= 2 {
        runs.push(ResidualRun {
            line: LineString::from(current),
            head_cut,
            tail_cut: false,
        });
    }
    runs
}

/// Snap the cut ends of a run onto the merged centerline.
///
/// A flagged end within `radius` of the merged line gains the exact
/// closest point as a new terminal vertex, so the junction is
/// coordinate-exact rather than merely close. Unflagged ends stay where
/// they are: a tributary running parallel to the merged line must not
/// be bent onto it just because it passes within the snap radius.
pub fn snap_endpoints(
    run: &LineString<f64>,
    merged: &MultiLineString<f64>,
    radius: f64,
    snap_head: bool,
    snap_tail: bool,
) -> LineString<f64> {
    let mut coords = run.0.clone();
    if coords.len() < 2 {
        return run.clone();
    }

    if snap_head {
        if let Some(p) = closest_within(coords[0], merged, radius) {
            coords.insert(0, p);
        }
    }
    if snap_tail {
        if let Some(p) = closest_within(coords[coords.len() - 1], merged, radius) {
            coords.push(p);
        }
    }
    LineString::from(coords)
}

fn closest_within(
    c: Coord<f64>,
    merged: &MultiLineString<f64>,
    radius: f64,
) -> Option<Coord<f64>> {
    let point = Point::from(c);
    let target = match merged.closest_point(&point) {
        Closest::SinglePoint(p) | Closest::Intersection(p) => p,
        Closest::Indeterminate => return None,
    };
    let d = point.euclidean_distance(&target);
    (d > 1e-12 && d <= radius).then(|| target.into())
}

/// Reconnect new pieces onto the merged centerline.
///
/// Subtracts the merged line from each piece, keeps residual runs that
/// stay near the reach's raw geometry, and snaps truncated run ends
/// onto the merged line. Runs the subtraction never touched pass
/// through unchanged. The snap radius must exceed the subtraction
/// tolerance: a surviving head vertex is by construction farther than
/// `subtract_tol` from the merged line.
pub fn reconnect_pieces(
    pieces: &[LineString<f64>],
    merged: &MultiLineString<f64>,
    reach_raw: &LineString<f64>,
    subtract_tol: f64,
    snap_radius: f64,
    keep_distance: f64,
) -> Vec<LineString<f64>> {
    if merged.0.is_empty() {
        return pieces.to_vec();
    }

    let mut out = Vec::new();
    for piece in pieces {
        // Subtraction walks vertices, so simplified long segments must
        // be densified or a dropped head vertex could erase the piece.
        let dense = piece.densify(subtract_tol.max(1e-6));
        for run in subtract_merged(&dense, merged, subtract_tol) {
            if run.line.euclidean_distance(reach_raw) > keep_distance {
                continue;
            }
            out.push(snap_endpoints(
                &run.line,
                merged,
                snap_radius,
                run.head_cut,
                run.tail_cut,
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, polygon, EuclideanLength};

    #[test]
    fn test_clip_keeps_inside_part() {
        let poly: Polygon<f64> = polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 0.0, y: 10.0),
            (x: 0.0, y: 0.0),
        ];
        // Crosses the polygon horizontally, overshooting both sides
        let seg = Line::new(Coord { x: -5.0, y: 5.0 }, Coord { x: 15.0, y: 5.0 });
        let kept = clip_segment_to_polygon(seg, &poly);
        assert_eq!(kept.len(), 1);
        let total: f64 = kept
            .iter()
            .map(|l| LineString::from(vec![l.start, l.end]).euclidean_length())
            .sum();
        assert!((total - 10.0).abs() < 1e-9, "kept length should be 10, got {total}");
    }

    #[test]
    fn test_clip_respects_holes() {
        let poly = Polygon::new(
            line_string![
                (x: 0.0, y: 0.0), (x: 20.0, y: 0.0), (x: 20.0, y: 10.0),
                (x: 0.0, y: 10.0), (x: 0.0, y: 0.0)
            ],
            vec![line_string![
                (x: 8.0, y: 3.0), (x: 12.0, y: 3.0), (x: 12.0, y: 7.0),
                (x: 8.0, y: 7.0), (x: 8.0, y: 3.0)
            ]],
        );
        let seg = Line::new(Coord { x: 1.0, y: 5.0 }, Coord { x: 19.0, y: 5.0 });
        let kept = clip_segment_to_polygon(seg, &poly);
        assert_eq!(kept.len(), 2, "segment through a hole splits in two");
    }

    #[test]
    fn test_chain_orders_segments() {
        let segs = vec![
            Line::new(Coord { x: 10.0, y: 0.0 }, Coord { x: 20.0, y: 0.0 }),
            Line::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 10.0, y: 0.0 }),
            Line::new(Coord { x: 20.0, y: 0.0 }, Coord { x: 30.0, y: 0.0 }),
        ];
        let chains = chain_segments(&segs);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].0.len(), 4);
        let xs: Vec<f64> = chains[0].0.iter().map(|c| c.x).collect();
        assert!(xs == [0.0, 10.0, 20.0, 30.0] || xs == [30.0, 20.0, 10.0, 0.0]);
    }

    #[test]
    fn test_smooth_preserves_endpoints() {
        let zigzag = line_string![
            (x: 0.0, y: 0.0), (x: 10.0, y: 2.0), (x: 20.0, y: -2.0),
            (x: 30.0, y: 2.0), (x: 40.0, y: 0.0)
        ];
        let smooth = smooth_piece(&zigzag, 0.5, 3);
        assert_eq!(smooth.0.first(), zigzag.0.first());
        assert_eq!(smooth.0.last(), zigzag.0.last());
    }

    #[test]
    fn test_subtract_drops_overlap() {
        let merged = MultiLineString::new(vec![line_string![
            (x: 0.0, y: 0.0), (x: 50.0, y: 0.0)
        ]]);
        // First half re-walks the merged line, second half is new
        let piece = line_string![
            (x: 30.0, y: 0.5), (x: 40.0, y: 0.5), (x: 50.0, y: 8.0),
            (x: 60.0, y: 12.0), (x: 70.0, y: 15.0)
        ];
        let runs = subtract_merged(&piece, &merged, 2.0);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].line.0.len(), 3, "only the vertices clear of the merged line survive");
        assert!(runs[0].head_cut, "the run lost its head to the subtraction");
        assert!(!runs[0].tail_cut, "the tail is the original piece end");
    }

    #[test]
    fn test_snap_closes_gap_exactly() {
        let merged = MultiLineString::new(vec![line_string![
            (x: 0.0, y: 0.0), (x: 50.0, y: 0.0)
        ]]);
        let run = line_string![(x: 25.0, y: 5.0), (x: 25.0, y: 20.0)];
        let snapped = snap_endpoints(&run, &merged, 10.0, true, false);
        let first = snapped.0[0];
        assert_eq!(first, Coord { x: 25.0, y: 0.0 }, "gap must close onto the merged line");
        assert_eq!(
            Point::from(first).euclidean_distance(&merged),
            0.0,
            "junction must be coordinate-exact"
        );
    }

    #[test]
    fn test_snap_ignores_uncut_ends() {
        let merged = MultiLineString::new(vec![line_string![
            (x: 0.0, y: 0.0), (x: 50.0, y: 0.0)
        ]]);
        // Both ends well within the radius, but neither was truncated
        let run = line_string![(x: 25.0, y: 5.0), (x: 25.0, y: 20.0)];
        let snapped = snap_endpoints(&run, &merged, 10.0, false, false);
        assert_eq!(snapped, run, "uncut ends must never gain a connector vertex");
    }

    #[test]
    fn test_reconnect_leaves_parallel_tributary_alone() {
        // A tributary centerline running parallel to the merged line,
        // inside the snap radius but outside the subtraction tolerance.
        let merged = MultiLineString::new(vec![line_string![
            (x: 0.0, y: 0.0), (x: 80.0, y: 0.0)
        ]]);
        let piece = line_string![(x: 0.0, y: 30.0), (x: 80.0, y: 30.0)];
        let reach = line_string![(x: 0.0, y: 30.0), (x: 80.0, y: 30.0)];

        let out = reconnect_pieces(&[piece.clone()], &merged, &reach, 10.0, 40.0, 40.0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0.first(), piece.0.first());
        assert_eq!(out[0].0.last(), piece.0.last());
        for c in &out[0].0 {
            assert!(
                (c.y - 30.0).abs() < 1e-9,
                "vertex ({}, {}) strays off the tributary onto the merged line",
                c.x,
                c.y
            );
        }
    }

    #[test]
    fn test_reconnect_snaps_truncated_head() {
        // The piece re-walks the merged terminus, so its surviving head
        // is a cut end and must be joined coordinate-exactly.
        let merged = MultiLineString::new(vec![line_string![
            (x: 0.0, y: 0.0), (x: 50.0, y: 0.0)
        ]]);
        let piece = line_string![(x: 45.0, y: 0.0), (x: 60.0, y: 15.0), (x: 80.0, y: 30.0)];
        let reach = piece.clone();

        let out = reconnect_pieces(&[piece], &merged, &reach, 5.0, 20.0, 50.0);
        assert_eq!(out.len(), 1);
        let head = Point::from(out[0].0[0]);
        assert_eq!(
            head.euclidean_distance(&merged),
            0.0,
            "the truncated head must land exactly on the merged line"
        );
    }
}
