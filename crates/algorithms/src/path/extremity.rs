//! Network extremity detection
//!
//! A level path's flowlines chain end to end; the chain's true ends are
//! the vertices that appear as a flowline endpoint exactly once. A
//! vertex shared by two or more flowline endpoints is an interior
//! junction and is excluded.

use geo::{Coord, LineString};
use std::collections::HashMap;

/// Quantization for coordinate keys; endpoints closer than this are the
/// same vertex.
const KEY_SCALE: f64 = 1e6;

fn key(c: Coord<f64>) -> (i64, i64) {
    ((c.x * KEY_SCALE).round() as i64, (c.y * KEY_SCALE).round() as i64)
}

/// Find the extremities of a set of flowlines.
///
/// Builds the multiset of (first, last) vertices over every flowline;
/// a vertex occurring exactly once is a true extremity, a vertex
/// occurring more than once is an interior junction and is dropped.
/// Degenerate flowlines (fewer than two vertices) are ignored.
pub fn find_extremities(flowlines: &[LineString<f64>]) -> Vec<Coord<f64>> {
    let mut counts: HashMap<(i64, i64), (usize, Coord<f64>)> = HashMap::new();

    for line in flowlines {
        if line.0.len() < 2 {
            continue;
        }
        for &endpoint in [&line.0[0], &line.0[line.0.len() - 1]] {
            let entry = counts.entry(key(endpoint)).or_insert((0, endpoint));
            entry.0 += 1;
        }
    }

    let mut out: Vec<(i64, i64, Coord<f64>)> = counts
        .into_iter()
        .filter(|(_, (count, _))| *count == 1)
        .map(|((kx, ky), (_, c))| (kx, ky, c))
        .collect();
    // Deterministic output order regardless of hash iteration
    out.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
    out.into_iter().map(|(_, _, c)| c).collect()
}
