//! Grid least-cost path
//!
//! 8-connected Dijkstra between two geographic coordinates over a cost
//! surface, with predecessor backtrace and vectorization of the pixel
//! path back to a map-space line.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use geo::{Coord, LineString};
use riparia_core::raster::Raster;
use riparia_core::{Error, Result};

/// Parameters for the least-cost path search
#[derive(Debug, Clone)]
pub struct LeastCostPathParams {
    /// Slack factor on the pixel diagonal when chaining vectorized
    /// vertices; separations beyond `diagonal * slack` break the line.
    pub diagonal_slack: f64,
}

impl Default for LeastCostPathParams {
    fn default() -> Self {
        Self { diagonal_slack: 1.01 }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct State {
    cost: f64,
    idx: usize,
}

impl Eq for State {}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other.cost.partial_cmp(&self.cost).unwrap_or(Ordering::Equal)
    }
}

const NEIGHBORS: [(isize, isize, f64); 8] = [
    (-1, -1, std::f64::consts::SQRT_2),
    (-1,  0, 1.0),
    (-1,  1, std::f64::consts::SQRT_2),
    ( 0, -1, 1.0),
    ( 0,  1, 1.0),
    ( 1, -1, std::f64::consts::SQRT_2),
    ( 1,  0, 1.0),
    ( 1,  1, std::f64::consts::SQRT_2),
];

fn to_pixel(cost: &Raster<f64>, x: f64, y: f64) -> Result<(usize, usize)> {
    let (rows, cols) = cost.shape();
    let (col, row) = cost.geo_to_pixel(x, y);
    if !col.is_finite() || !row.is_finite() || col < 0.0 || row < 0.0 {
        return Err(Error::OutOfBounds { x, y });
    }
    let (col, row) = (col.floor() as usize, row.floor() as usize);
    if row >= rows || col >= cols {
        return Err(Error::OutOfBounds { x, y });
    }
    Ok((row, col))
}

/// Find the minimum-cost 8-connected pixel path between two geographic
/// coordinates and vectorize it.
///
/// The traversal cost between two cells is the average of their cost
/// values times the step distance (1 cardinal, sqrt(2) diagonal), the
/// convention of accumulated-cost analysis. NaN cells are impassable.
///
/// Out-of-extent coordinates are `Error::OutOfBounds`; an exhausted
/// frontier is `Error::NoPath`.
pub fn least_cost_path(
    cost: &Raster<f64>,
    start: (f64, f64),
    end: (f64, f64),
    params: &LeastCostPathParams,
) -> Result<LineString<f64>> {
    let (rows, cols) = cost.shape();
    let (sr, sc) = to_pixel(cost, start.0, start.1)?;
    let (er, ec) = to_pixel(cost, end.0, end.1)?;
    let target = er * cols + ec;

    let mut dist = vec![f64::INFINITY; rows * cols];
    let mut prev: Vec<Option<usize>> = vec![None; rows * cols];
    let mut heap = BinaryHeap::new();

    dist[sr * cols + sc] = 0.0;
    heap.push(State { cost: 0.0, idx: sr * cols + sc });

    while let Some(State { cost: d, idx }) = heap.pop() {
        if idx == target {
            break;
        }
        if d > dist[idx] {
            continue;
        }

        let (row, col) = (idx / cols, idx % cols);
        let cost_here = unsafe { cost.get_unchecked(row, col) };

        for &(dr, dc, step) in &NEIGHBORS {
            let nr = row as isize + dr;
            let nc = col as isize + dc;
            if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                continue;
            }
            let (nr, nc) = (nr as usize, nc as usize);
            let cost_neighbor = unsafe { cost.get_unchecked(nr, nc) };
            if cost_neighbor.is_nan() || cost_neighbor < 0.0 {
                continue; // Impassable
            }

            let nd = d + (cost_here + cost_neighbor) / 2.0 * step;
            let nidx = nr * cols + nc;
            if nd < dist[nidx] {
                dist[nidx] = nd;
                prev[nidx] = Some(idx);
                heap.push(State { cost: nd, idx: nidx });
            }
        }
    }

    if dist[target].is_infinite() {
        return Err(Error::NoPath);
    }

    // Backtrace target -> start, then reverse
    let mut cells = Vec::new();
    let mut cursor = target;
    loop {
        cells.push((cursor / cols, cursor % cols));
        match prev[cursor] {
            Some(p) => cursor = p,
            None => break,
        }
    }
    cells.reverse();

    Ok(vectorize_path(cost, &cells, params))
}

/// Vectorize a pixel path by connecting pixel centers whose separation
/// does not exceed the pixel diagonal.
///
/// Prevents diagonal-adjacency gaps in the output line: if the path is
/// broken (separation beyond the diagonal), the longest contiguous chain
/// wins.
pub fn vectorize_path(
    cost: &Raster<f64>,
    cells: &[(usize, usize)],
    params: &LeastCostPathParams,
) -> LineString<f64> {
    let max_sep = cost.transform().pixel_diagonal() * params.diagonal_slack;

    let centers: Vec<Coord<f64>> = cells
        .iter()
        .map(|&(row, col)| {
            let (x, y) = cost.pixel_to_geo(col, row);
            Coord { x, y }
        })
        .collect();

    let mut best: Vec<Coord<f64>> = Vec::new();
    let mut current: Vec<Coord<f64>> = Vec::new();
    for c in centers {
        if let Some(&last) = current.last() {
            let sep = ((c.x - last.x).powi(2) + (c.y - last.y).powi(2)).sqrt();
            if sep > max_sep {
                if current.len() > best.len() {
                    best = std::mem::take(&mut current);
                } else {
                    current.clear();
                }
            }
        }
        current.push(c);
    }
    if current.len() > best.len() {
        best = current;
    }

    LineString::from(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use riparia_core::GeoTransform;

    /// Corridor cost surface: cheap along the center row, sentinel
    /// penalty elsewhere.
    fn corridor(rows: usize, cols: usize) -> Raster<f64> {
        let mut r = Raster::filled(rows, cols, 1e12);
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        let mid = rows / 2;
        for col in 0..cols {
            r.set(mid, col, 1.0).unwrap();
        }
        r
    }

    #[test]
    fn test_path_follows_corridor() {
        let cost = corridor(9, 20);
        // Center row = 4 → y = 9 - 4.5 = 4.5
        let path = least_cost_path(
            &cost,
            (0.5, 4.5),
            (19.5, 4.5),
            &LeastCostPathParams::default(),
        )
        .unwrap();

        assert!(path.0.len() >= 20, "path should span the corridor");
        for c in &path.0 {
            assert!((c.y - 4.5).abs() < 1e-9, "path must stay on the cheap row, got y={}", c.y);
        }
    }

    #[test]
    fn test_path_out_of_bounds() {
        let cost = corridor(9, 20);
        let result = least_cost_path(
            &cost,
            (-100.0, 4.5),
            (19.5, 4.5),
            &LeastCostPathParams::default(),
        );
        match result {
            Err(Error::OutOfBounds { x, .. }) => assert_eq!(x, -100.0),
            other => panic!("expected OutOfBounds, got {other:?}"),
        }
    }

    #[test]
    fn test_path_blocked_is_no_path() {
        let mut cost = corridor(9, 20);
        // NaN wall across the corridor
        for row in 0..9 {
            cost.set(row, 10, f64::NAN).unwrap();
        }
        let result = least_cost_path(
            &cost,
            (0.5, 4.5),
            (19.5, 4.5),
            &LeastCostPathParams::default(),
        );
        assert!(matches!(result, Err(Error::NoPath)));
    }

    #[test]
    fn test_vectorize_no_diagonal_gaps() {
        let cost = corridor(9, 20);
        // A diagonal pixel path: consecutive centers are sqrt(2) apart,
        // within the pixel diagonal, so the line must stay connected.
        let cells: Vec<(usize, usize)> = (0..5).map(|i| (i, i)).collect();
        let line = vectorize_path(&cost, &cells, &LeastCostPathParams::default());
        assert_eq!(line.0.len(), 5);
    }

    #[test]
    fn test_vectorize_splits_on_gap() {
        let cost = corridor(9, 20);
        // Jump from (0,0) to (0,5) exceeds the diagonal: keep the longer run
        let cells = vec![(0, 0), (0, 1), (0, 2), (0, 5)];
        let line = vectorize_path(&cost, &cells, &LeastCostPathParams::default());
        assert_eq!(line.0.len(), 3, "longest contiguous chain wins");
    }
}
