//! Blockwise evidence fusion
//!
//! Combines the normalized evidence layers and channel presence into a
//! single [0,1] evidence raster: `fused = max(mean(layers), w * channel)`.
//!
//! Inputs are processed in row bands so the full extent is never
//! materialized more than once; bands have no inter-band dependency and
//! run in parallel, each with its own non-aliased input views and owned
//! output buffer.

use ndarray::{s, Array2};
use rayon::prelude::*;
use riparia_core::raster::Raster;
use riparia_core::{Error, GeoTransform, Result};

use super::transform::TransformTable;

/// Raw evidence inputs: named variable rasters plus the zone map that
/// selects the per-cell transform.
pub struct EvidenceInputs<'a> {
    /// (variable name, raw raster) pairs
    pub layers: Vec<(&'a str, &'a Raster<f64>)>,
    /// Categorical zone raster (small/medium/large stream settings)
    pub zones: &'a Raster<u8>,
}

impl<'a> EvidenceInputs<'a> {
    fn layer(&self, variable: &str) -> Option<&'a Raster<f64>> {
        self.layers
            .iter()
            .find(|(name, _)| *name == variable)
            .map(|(_, r)| *r)
    }
}

/// Parameters for evidence fusion
#[derive(Debug, Clone)]
pub struct FusionParams {
    /// Weight applied to channel presence before the max
    pub channel_weight: f64,
    /// Rows per processing band
    pub block_rows: usize,
    /// Variables that must be present in the inputs
    pub required: Vec<String>,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            channel_weight: 1.0,
            block_rows: 256,
            required: vec!["slope".into(), "hand".into(), "twi".into()],
        }
    }
}

/// Check that a raster shares the reference grid exactly.
pub fn ensure_aligned(
    layer: &str,
    shape: (usize, usize),
    transform: &GeoTransform,
    ref_shape: (usize, usize),
    ref_transform: &GeoTransform,
) -> Result<()> {
    if shape != ref_shape {
        return Err(Error::Alignment {
            layer: layer.to_string(),
            detail: format!("shape {shape:?} vs {ref_shape:?}"),
        });
    }
    if !transform.approx_eq(ref_transform, 1e-9) {
        return Err(Error::Alignment {
            layer: layer.to_string(),
            detail: "geotransform differs".to_string(),
        });
    }
    Ok(())
}

/// Fuse normalized evidence layers with channel presence.
///
/// Preconditions: all inputs co-registered (`Error::Alignment`); every
/// required variable present (`Error::MissingInput`); every zone value
/// under a valid cell configured in the table (`Error::Configuration`).
///
/// The output raster copies the channel raster's georeference; a cell is
/// NaN iff any evidence layer is NaN there.
pub fn fuse_evidence(
    inputs: &EvidenceInputs<'_>,
    channel: &Raster<u8>,
    table: &TransformTable,
    params: &FusionParams,
) -> Result<Raster<f64>> {
    let ref_shape = channel.shape();
    let ref_transform = *channel.transform();

    for variable in &params.required {
        if inputs.layer(variable).is_none() {
            return Err(Error::MissingInput {
                variable: variable.clone(),
            });
        }
    }
    for (name, raster) in &inputs.layers {
        ensure_aligned(name, raster.shape(), raster.transform(), ref_shape, &ref_transform)?;
    }
    ensure_aligned(
        "zones",
        inputs.zones.shape(),
        inputs.zones.transform(),
        ref_shape,
        &ref_transform,
    )?;

    let (rows, cols) = ref_shape;
    let block_rows = params.block_rows.max(1);
    let band_starts: Vec<usize> = (0..rows).step_by(block_rows).collect();

    // One band = read N input windows + produce one owned output band.
    let bands: Vec<Array2<f64>> = band_starts
        .par_iter()
        .map(|&r0| {
            let r1 = (r0 + block_rows).min(rows);
            fuse_band(inputs, channel, table, params, r0, r1, cols)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut data = Array2::<f64>::zeros((rows, cols));
    for (&r0, band) in band_starts.iter().zip(bands) {
        let r1 = r0 + band.nrows();
        data.slice_mut(s![r0..r1, ..]).assign(&band);
    }

    let mut output = channel.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = data;
    Ok(output)
}

fn fuse_band(
    inputs: &EvidenceInputs<'_>,
    channel: &Raster<u8>,
    table: &TransformTable,
    params: &FusionParams,
    r0: usize,
    r1: usize,
    cols: usize,
) -> Result<Array2<f64>> {
    let zones = inputs.zones.view();
    let zone_band = zones.slice(s![r0..r1, ..]);

    // Normalize each layer's window for this band
    let mut normalized = Vec::with_capacity(inputs.layers.len());
    for (name, raster) in &inputs.layers {
        let view = raster.view();
        let band = table.normalize(name, view.slice(s![r0..r1, ..]), zone_band)?;
        normalized.push(band);
    }

    let n = normalized.len() as f64;
    let channel_view = channel.view();
    let mut out = Array2::<f64>::from_elem((r1 - r0, cols), f64::NAN);

    for row in 0..(r1 - r0) {
        for col in 0..cols {
            let mut sum = 0.0;
            let mut masked = false;
            for layer in &normalized {
                let v = layer[(row, col)];
                if v.is_nan() {
                    masked = true;
                    break;
                }
                sum += v;
            }
            if masked {
                continue;
            }
            let ch = channel_view[(r0 + row, col)] as f64;
            out[(row, col)] = (sum / n).max(params.channel_weight * ch);
        }
    }
    Ok(out)
}
