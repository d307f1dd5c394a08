//! Cost surface construction
//!
//! Turns the valley mask into a least-cost-path surface: a proximity
//! transform gives every valley cell its distance to the nearest
//! non-valley cell, which is rescaled to [0,10] and mapped through a
//! decaying exponential. Deep valley interior is cheap; the boundary is
//! expensive; everything outside the mask carries a sentinel penalty so
//! paths never leave the valley.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ndarray::Array2;
use riparia_core::raster::Raster;
use riparia_core::{Error, Result};

/// Parameters for the cost surface
#[derive(Debug, Clone)]
pub struct CostSurfaceParams {
    /// Upper bound of the linear rescale of proximity
    pub rescale_max: f64,
    /// Exponential base of the cost decay
    pub base: f64,
    /// Sentinel penalty added outside the mask; must stay >= 1e12
    pub outside_penalty: f64,
}

impl Default for CostSurfaceParams {
    fn default() -> Self {
        Self {
            rescale_max: 10.0,
            base: 10.0,
            outside_penalty: 1e12,
        }
    }
}

/// State in the priority queue (min-heap via reversed ordering).
#[derive(Debug, Clone, PartialEq)]
struct State {
    dist: f64,
    row: usize,
    col: usize,
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
        other.dist.partial_cmp(&self.dist).unwrap_or(Ordering::Equal)
    }
}

/// 8-connected neighbor offsets with their distance multipliers.
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

/// Proximity transform: distance in pixel units from each cell to the
/// nearest non-mask cell.
///
/// Multi-source Dijkstra seeded from every zero cell (distance 0). The
/// grid edge counts as outside, so a mask that fills the raster still
/// gets finite distances.
pub fn proximity(mask: &Raster<u8>) -> Raster<f64> {
    let (rows, cols) = mask.shape();
    let mut dist = vec![f64::INFINITY; rows * cols];
    let mut heap = BinaryHeap::new();

    for row in 0..rows {
        for col in 0..cols {
            let outside = unsafe { mask.get_unchecked(row, col) } == 0;
            let on_edge = row == 0 || col == 0 || row == rows - 1 || col == cols - 1;
            let d = if outside {
                0.0
            } else if on_edge {
                // A mask cell on the raster edge is one step from the
                // implicit outside.
                1.0
            } else {
                continue;
            };
            dist[row * cols + col] = d;
            heap.push(State { dist: d, row, col });
        }
    }

    while let Some(State { dist: d, row, col }) = heap.pop() {
        if d > dist[row * cols + col] {
            continue;
        }
        for &(dr, dc, step) in &NEIGHBORS {
            let nr = row as isize + dr;
            let nc = col as isize + dc;
            if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                continue;
            }
            let (nr, nc) = (nr as usize, nc as usize);
            let nd = d + step;
            if nd < dist[nr * cols + nc] {
                dist[nr * cols + nc] = nd;
                heap.push(State { dist: nd, row: nr, col: nc });
            }
        }
    }

    let mut output = mask.with_same_meta::<f64>(rows, cols);
    let mut data = Array2::<f64>::zeros((rows, cols));
    for row in 0..rows {
        for col in 0..cols {
            data[(row, col)] = dist[row * cols + col];
        }
    }
    *output.data_mut() = data;
    output
}

/// Build the exponential cost surface from a valley mask.
///
/// `cost = base^(rescale_max - rescaled) + outside_penalty` for cells
/// with zero rescaled proximity (outside the mask). An all-empty mask is
/// an error, distinct from "a path exists but is costly": this must
/// never silently return an all-penalty raster.
pub fn build_cost_surface(mask: &Raster<u8>, params: &CostSurfaceParams) -> Result<Raster<f64>> {
    if mask.count_equal(1) == 0 {
        return Err(Error::EmptyMask);
    }

    let prox = proximity(mask);
    let (rows, cols) = mask.shape();

    let max_prox = prox
        .data()
        .iter()
        .copied()
        .fold(0.0f64, f64::max)
        .max(f64::MIN_POSITIVE);

    let mut output = mask.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    let mut data = Array2::<f64>::zeros((rows, cols));

    for row in 0..rows {
        for col in 0..cols {
            let rescaled = unsafe { prox.get_unchecked(row, col) } / max_prox * params.rescale_max;
            let mut cost = params.base.powf(params.rescale_max - rescaled);
            if rescaled <= 0.0 {
                cost += params.outside_penalty;
            }
            data[(row, col)] = cost;
        }
    }

    *output.data_mut() = data;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use riparia_core::GeoTransform;

    /// Mask with a filled rectangle [r0..r1) x [c0..c1)
    fn rect_mask(rows: usize, cols: usize, r0: usize, r1: usize, c0: usize, c1: usize) -> Raster<u8> {
        let mut m: Raster<u8> = Raster::new(rows, cols);
        m.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        for row in r0..r1 {
            for col in c0..c1 {
                m.set(row, col, 1).unwrap();
            }
        }
        m
    }

    #[test]
    fn test_proximity_zero_outside() {
        let m = rect_mask(10, 10, 3, 7, 3, 7);
        let prox = proximity(&m);
        assert_eq!(prox.get(0, 0).unwrap(), 0.0);
        assert_eq!(prox.get(9, 9).unwrap(), 0.0);
    }

    #[test]
    fn test_proximity_increases_inward() {
        let m = rect_mask(11, 11, 2, 9, 2, 9);
        let prox = proximity(&m);
        let edge = prox.get(2, 5).unwrap();
        let center = prox.get(5, 5).unwrap();
        assert!(
            center > edge,
            "interior must be farther from the boundary: center={center}, edge={edge}"
        );
    }

    #[test]
    fn test_cost_outside_at_least_sentinel() {
        let m = rect_mask(10, 10, 3, 7, 3, 7);
        let cost = build_cost_surface(&m, &CostSurfaceParams::default()).unwrap();
        let v = cost.get(0, 0).unwrap();
        assert!(v >= 1e12, "outside-mask cost must carry the sentinel, got {v}");
    }

    #[test]
    fn test_cost_decreases_toward_interior() {
        let m = rect_mask(21, 21, 2, 19, 2, 19);
        let cost = build_cost_surface(&m, &CostSurfaceParams::default()).unwrap();
        let near_edge = cost.get(3, 10).unwrap();
        let mid = cost.get(6, 10).unwrap();
        let center = cost.get(10, 10).unwrap();
        assert!(
            near_edge > mid && mid > center,
            "cost must decrease inward: {near_edge} > {mid} > {center}"
        );
    }

    #[test]
    fn test_cost_empty_mask_errors() {
        let m = rect_mask(5, 5, 0, 0, 0, 0);
        match build_cost_surface(&m, &CostSurfaceParams::default()) {
            Err(Error::EmptyMask) => {}
            other => panic!("expected EmptyMask, got {other:?}"),
        }
    }
}
