//! Error taxonomy for Riparia
//!
//! Two families share one enum: raster bookkeeping errors (dimensions,
//! indexing, size mismatches) and the engine taxonomy consumed by the
//! network stitcher. The stitcher uses [`Error::is_fatal`] to decide
//! between aborting the whole watershed run and skipping the current
//! level path.

use thiserror::Error;

/// Main error type for Riparia operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    /// No transform configured for a (variable, zone) pair. Never a
    /// silent default: an unknown zone value must surface here.
    #[error("No transform configured for variable '{variable}', zone {zone}")]
    Configuration { variable: String, zone: u8 },

    /// Input rasters are not co-registered (transform/extent differ).
    #[error("Raster '{layer}' is not co-registered with the reference: {detail}")]
    Alignment { layer: String, detail: String },

    /// A required evidence variable was not supplied.
    #[error("Missing required input raster for variable '{variable}'")]
    MissingInput { variable: String },

    /// The valley mask has no set cells; distinct from "path exists but
    /// is costly", which is not an error at all.
    #[error("Valley mask is empty; cannot build a cost surface")]
    EmptyMask,

    /// A geographic coordinate fell outside the raster extent.
    #[error("Coordinate ({x}, {y}) is outside the raster extent")]
    OutOfBounds { x: f64, y: f64 },

    /// The grid search exhausted the frontier without reaching the target.
    #[error("No least-cost path exists between the given extremities")]
    NoPath,

    /// A geometry stage produced empty or degenerate output from
    /// non-empty input. Callers fall back to the raw skeleton.
    #[error("Degenerate geometry produced at stage '{stage}'")]
    GeometryDegeneracy { stage: &'static str },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error aborts the whole watershed run.
    ///
    /// Configuration, alignment and missing-input problems (and raster
    /// bookkeeping bugs) are fatal before any output is written.
    /// Empty-mask and no-path are fatal only to the current level path;
    /// geometry degeneracy triggers the raw-skeleton fallback.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::EmptyMask | Error::NoPath | Error::GeometryDegeneracy { .. }
        )
    }

    /// Short stable name used for per-run summary tallies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidDimensions { .. } => "invalid_dimensions",
            Error::IndexOutOfBounds { .. } => "index_out_of_bounds",
            Error::SizeMismatch { .. } => "size_mismatch",
            Error::Configuration { .. } => "configuration",
            Error::Alignment { .. } => "alignment",
            Error::MissingInput { .. } => "missing_input",
            Error::EmptyMask => "empty_mask",
            Error::OutOfBounds { .. } => "out_of_bounds",
            Error::NoPath => "no_path",
            Error::GeometryDegeneracy { .. } => "geometry_degeneracy",
            Error::Other(_) => "other",
        }
    }
}

/// Result type alias for Riparia operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::Configuration { variable: "slope".into(), zone: 3 }.is_fatal());
        assert!(Error::MissingInput { variable: "twi".into() }.is_fatal());
        assert!(!Error::EmptyMask.is_fatal());
        assert!(!Error::NoPath.is_fatal());
        assert!(!Error::GeometryDegeneracy { stage: "smooth" }.is_fatal());
    }

    #[test]
    fn test_kind_names_stable() {
        assert_eq!(Error::EmptyMask.kind(), "empty_mask");
        assert_eq!(Error::NoPath.kind(), "no_path");
    }
}
