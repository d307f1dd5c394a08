//! Binary morphological closing
//!
//! Dilation then erosion over a 3x3 square element, specialized for
//! binary u8 masks: the kernel is clamped at raster borders instead of
//! NaN-bordering, so the output stays strictly binary.

use riparia_core::raster::Raster;

/// Binary dilation: a cell is set if any cell in its (clamped) 3x3
/// neighborhood is set.
pub fn binary_dilate(mask: &Raster<u8>) -> Raster<u8> {
    let (rows, cols) = mask.shape();
    let mut out = mask.like(0);

    for row in 0..rows {
        for col in 0..cols {
            let mut hit = false;
            'kernel: for dr in -1isize..=1 {
                for dc in -1isize..=1 {
                    let nr = row as isize + dr;
                    let nc = col as isize + dc;
                    if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                        continue;
                    }
                    if unsafe { mask.get_unchecked(nr as usize, nc as usize) } != 0 {
                        hit = true;
                        break 'kernel;
                    }
                }
            }
            if hit {
                unsafe { out.set_unchecked(row, col, 1) };
            }
        }
    }
    out
}

/// Binary erosion: a cell stays set only if every in-bounds cell of its
/// 3x3 neighborhood is set.
pub fn binary_erode(mask: &Raster<u8>) -> Raster<u8> {
    let (rows, cols) = mask.shape();
    let mut out = mask.like(0);

    for row in 0..rows {
        for col in 0..cols {
            if unsafe { mask.get_unchecked(row, col) } == 0 {
                continue;
            }
            let mut keep = true;
            'kernel: for dr in -1isize..=1 {
                for dc in -1isize..=1 {
                    let nr = row as isize + dr;
                    let nc = col as isize + dc;
                    if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                        continue;
                    }
                    if unsafe { mask.get_unchecked(nr as usize, nc as usize) } == 0 {
                        keep = false;
                        break 'kernel;
                    }
                }
            }
            if keep {
                unsafe { out.set_unchecked(row, col, 1) };
            }
        }
    }
    out
}

/// Binary closing: `iterations` dilations followed by `iterations`
/// erosions. Fills boundary gaps up to roughly `iterations` cells wide
/// while preserving the overall mask footprint.
pub fn binary_closing(mask: &Raster<u8>, iterations: usize) -> Raster<u8> {
    let mut current = mask.clone();
    for _ in 0..iterations {
        current = binary_dilate(&current);
    }
    for _ in 0..iterations {
        current = binary_erode(&current);
    }
    current
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
    fn test_closing_fills_one_cell_gap() {
        // Horizontal bar with a hole at (3,3)
        let cells: Vec<(usize, usize)> = (1..6)
            .flat_map(|c| (2..5).map(move |r| (r, c)))
            .filter(|&(r, c)| !(r == 3 && c == 3))
            .collect();
        let m = mask_from(7, 7, &cells);

        let closed = binary_closing(&m, 1);
        assert_eq!(closed.get(3, 3).unwrap(), 1, "closing should fill the hole");
    }

    #[test]
    fn test_closing_preserves_background() {
        let m = mask_from(9, 9, &[(4, 4)]);
        let closed = binary_closing(&m, 1);
        assert_eq!(closed.get(0, 0).unwrap(), 0, "far background must stay clear");
    }

    #[test]
    fn test_closing_idempotent_on_solid_block() {
        let cells: Vec<(usize, usize)> = (2..7).flat_map(|r| (2..7).map(move |c| (r, c))).collect();
        let m = mask_from(9, 9, &cells);
        let once = binary_closing(&m, 2);
        let twice = binary_closing(&once, 2);
        assert_eq!(once.data(), twice.data(), "closing a closed block must be stable");
    }

    #[test]
    fn test_erode_respects_border_clamp() {
        // A solid block touching the border must not be eroded away at
        // the border, since out-of-bounds cells are not counted.
        let cells: Vec<(usize, usize)> = (0..3).flat_map(|r| (0..3).map(move |c| (r, c))).collect();
        let m = mask_from(5, 5, &cells);
        let eroded = binary_erode(&m);
        assert_eq!(eroded.get(0, 0).unwrap(), 1);
        assert_eq!(eroded.get(2, 2).unwrap(), 0, "interior edge erodes normally");
    }
}
