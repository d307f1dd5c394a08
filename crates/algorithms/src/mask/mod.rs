//! Valley mask construction
//!
//! Thresholds the fused evidence into a raw binary mask, sieves out
//! speckle, discards components with no channel connection, and smooths
//! boundary gaps with a binary closing. The result is the clean valley
//! bottom consumed by the cost surface and downstream polygonization.

mod closing;
mod regions;

pub use closing::{binary_closing, binary_dilate, binary_erode};
pub use regions::{label_regions, region_sizes, retain_channel_regions, sieve};

use riparia_core::raster::Raster;
use riparia_core::Result;

use crate::evidence::ensure_aligned;

/// Parameters for valley mask construction.
///
/// The defaults reproduce the established configuration; the threshold
/// and sieve minimum are deliberately exposed rather than hard-coded.
#[derive(Debug, Clone)]
pub struct ValleyMaskParams {
    /// Evidence-plus-channel threshold for a cell to enter the raw mask
    pub threshold: f64,
    /// Minimum region size in pixels to survive the sieve
    pub min_region_pixels: usize,
    /// Binary closing iterations applied to the filtered mask
    pub closing_iterations: usize,
}

impl Default for ValleyMaskParams {
    fn default() -> Self {
        Self {
            threshold: 0.68,
            min_region_pixels: 10,
            closing_iterations: 2,
        }
    }
}

/// Build the cleaned binary valley-bottom mask.
///
/// 1. `raw = 1` iff `(fused + channel) >= threshold` and
///    `(hand + channel) > 0` — evidence-positive-or-channel, excluding
///    high terrain with zero HAND contribution unless evidence alone
///    clears the threshold with channel adjacency.
/// 2. Sieve 8-connected regions smaller than `min_region_pixels`.
/// 3. Discard components not touching the channel mask.
/// 4. Binary closing to smooth boundary gaps, then re-filter so the
///    postcondition holds: every set cell is 8-connected, through set
///    cells, to a channel cell.
///
/// Deterministic: identical input yields bit-identical output.
pub fn build_valley_mask(
    fused: &Raster<f64>,
    hand: &Raster<f64>,
    channel: &Raster<u8>,
    params: &ValleyMaskParams,
) -> Result<Raster<u8>> {
    let ref_shape = channel.shape();
    let ref_transform = *channel.transform();
    ensure_aligned("fused", fused.shape(), fused.transform(), ref_shape, &ref_transform)?;
    ensure_aligned("hand", hand.shape(), hand.transform(), ref_shape, &ref_transform)?;

    let (rows, cols) = ref_shape;
    let mut raw = channel.with_same_meta::<u8>(rows, cols);
    raw.set_nodata(Some(0));

    for row in 0..rows {
        for col in 0..cols {
            let ch = unsafe { channel.get_unchecked(row, col) } as f64;
            let f = unsafe { fused.get_unchecked(row, col) };
            let h = unsafe { hand.get_unchecked(row, col) };
            let f = if f.is_nan() { 0.0 } else { f };
            let h = if h.is_nan() { 0.0 } else { h };
            if f + ch >= params.threshold && h + ch > 0.0 {
                unsafe { raw.set_unchecked(row, col, 1) };
            }
        }
    }

    let sieved = sieve(&raw, params.min_region_pixels);
    let connected = retain_channel_regions(&sieved, channel);
    let closed = binary_closing(&connected, params.closing_iterations);
    // Closing can in principle bridge a region away from its channel
    // seed; re-filtering restores the connectivity postcondition.
    Ok(retain_channel_regions(&closed, channel))
}
