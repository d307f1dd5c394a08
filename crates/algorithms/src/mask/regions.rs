//! Connected-component labeling and sieve filtering
//!
//! 8-connectivity throughout, matching the mask-building contract:
//! diagonal neighbors keep a region connected.

use riparia_core::raster::Raster;
use std::collections::VecDeque;

/// 8-connected neighbor offsets
pub(crate) const NEIGHBORS_8: [(isize, isize); 8] = [
    (-1, -1), (-1, 0), (-1, 1),
    ( 0, -1),          ( 0, 1),
    ( 1, -1), ( 1, 0), ( 1, 1),
];

/// Label 8-connected regions of set cells.
///
/// Background is 0; regions get labels 1..=n in scan order, which makes
/// the labeling (and everything built on it) deterministic.
pub fn label_regions(mask: &Raster<u8>) -> Raster<u32> {
    let (rows, cols) = mask.shape();
    let mut labels = mask.with_same_meta::<u32>(rows, cols);
    let mut next_label = 0u32;
    let mut queue = VecDeque::new();

    for row in 0..rows {
        for col in 0..cols {
            if unsafe { mask.get_unchecked(row, col) } == 0
                || unsafe { labels.get_unchecked(row, col) } != 0
            {
                continue;
            }

            next_label += 1;
            queue.push_back((row, col));
            unsafe { labels.set_unchecked(row, col, next_label) };

            while let Some((r, c)) = queue.pop_front() {
                for &(dr, dc) in &NEIGHBORS_8 {
                    let nr = r as isize + dr;
                    let nc = c as isize + dc;
                    if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                        continue;
                    }
                    let (nr, nc) = (nr as usize, nc as usize);
                    if unsafe { mask.get_unchecked(nr, nc) } != 0
                        && unsafe { labels.get_unchecked(nr, nc) } == 0
                    {
                        unsafe { labels.set_unchecked(nr, nc, next_label) };
                        queue.push_back((nr, nc));
                    }
                }
            }
        }
    }

    labels
}

/// Cell count per label; index 0 is the background count.
pub fn region_sizes(labels: &Raster<u32>) -> Vec<usize> {
    let max_label = labels.data().iter().copied().max().unwrap_or(0) as usize;
    let mut sizes = vec![0usize; max_label + 1];
    for &label in labels.data().iter() {
        sizes[label as usize] += 1;
    }
    sizes
}

/// Remove 8-connected regions smaller than `min_pixels`.
pub fn sieve(mask: &Raster<u8>, min_pixels: usize) -> Raster<u8> {
    let labels = label_regions(mask);
    let sizes = region_sizes(&labels);
    let (rows, cols) = mask.shape();

    let mut out = mask.clone();
    for row in 0..rows {
        for col in 0..cols {
            let label = unsafe { labels.get_unchecked(row, col) };
            if label != 0 && sizes[label as usize] < min_pixels {
                unsafe { out.set_unchecked(row, col, 0) };
            }
        }
    }
    out
}

/// Keep only regions touching the channel mask.
///
/// A region touches the channel if any of its cells is a channel cell or
/// is 8-adjacent to one. Evidence-positive islands with no channel
/// connection are discarded.
pub fn retain_channel_regions(mask: &Raster<u8>, channel: &Raster<u8>) -> Raster<u8> {
    let labels = label_regions(mask);
    let sizes = region_sizes(&labels);
    let (rows, cols) = mask.shape();

    let mut touches = vec![false; sizes.len()];
    for row in 0..rows {
        for col in 0..cols {
            let label = unsafe { labels.get_unchecked(row, col) } as usize;
            if label == 0 || touches[label] {
                continue;
            }
            if unsafe { channel.get_unchecked(row, col) } != 0 {
                touches[label] = true;
                continue;
            }
            for &(dr, dc) in &NEIGHBORS_8 {
                let nr = row as isize + dr;
                let nc = col as isize + dc;
                if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                    continue;
                }
                if unsafe { channel.get_unchecked(nr as usize, nc as usize) } != 0 {
                    touches[label] = true;
                    break;
                }
            }
        }
    }

    let mut out = mask.clone();
    for row in 0..rows {
        for col in 0..cols {
            let label = unsafe { labels.get_unchecked(row, col) } as usize;
            if label != 0 && !touches[label] {
                unsafe { out.set_unchecked(row, col, 0) };
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: usize, cols: usize, set: &[(usize, usize)]) -> Raster<u8> {
        let mut m: Raster<u8> = Raster::new(rows, cols);
        for &(r, c) in set {
            m.set(r, c, 1).unwrap();
        }
        m
    }

    #[test]
    fn test_label_diagonal_connectivity() {
        // Two diagonally touching cells form one region under 8-conn
        let m = mask_from(4, 4, &[(0, 0), (1, 1)]);
        let labels = label_regions(&m);
        assert_eq!(labels.get(0, 0).unwrap(), labels.get(1, 1).unwrap());
    }

    #[test]
    fn test_label_separate_regions() {
        let m = mask_from(5, 5, &[(0, 0), (4, 4)]);
        let labels = label_regions(&m);
        assert_ne!(labels.get(0, 0).unwrap(), labels.get(4, 4).unwrap());
        assert_eq!(region_sizes(&labels).len(), 3); // background + 2
    }

    #[test]
    fn test_sieve_removes_small() {
        // One 3-cell region, one 1-cell region
        let m = mask_from(6, 6, &[(1, 1), (1, 2), (2, 1), (4, 4)]);
        let sieved = sieve(&m, 2);
        assert_eq!(sieved.get(1, 1).unwrap(), 1, "large region survives");
        assert_eq!(sieved.get(4, 4).unwrap(), 0, "singleton removed");
    }

    #[test]
    fn test_retain_channel_regions() {
        let m = mask_from(6, 6, &[(1, 1), (1, 2), (4, 4), (4, 5)]);
        let channel = mask_from(6, 6, &[(2, 2)]); // adjacent to (1,1)-(1,2) region
        let kept = retain_channel_regions(&m, &channel);
        assert_eq!(kept.get(1, 1).unwrap(), 1, "channel-adjacent region kept");
        assert_eq!(kept.get(4, 4).unwrap(), 0, "detached region dropped");
    }
}
