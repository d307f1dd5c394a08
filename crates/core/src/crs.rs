//! Coordinate Reference System handle
//!
//! Riparia never reprojects; the CRS rides along on rasters and features
//! so collaborators can round-trip it. The one piece the engine reads is
//! `metres_per_unit`, which scales metre-denominated defaults (densify
//! spacing, smoothing tolerance) into local map units.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crs {
    /// EPSG code if known
    epsg: Option<u32>,
    /// WKT representation if known
    wkt: Option<String>,
    /// Linear-unit size in metres (1.0 for metric CRSs)
    metres_per_unit: f64,
}

impl Crs {
    /// Create a CRS from an EPSG code (assumed metric)
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            wkt: None,
            metres_per_unit: 1.0,
        }
    }

    /// Create a CRS from a WKT string (assumed metric)
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            epsg: None,
            wkt: Some(wkt.into()),
            metres_per_unit: 1.0,
        }
    }

    /// Override the linear-unit factor (e.g. US survey feet = 0.3048)
    pub fn with_metres_per_unit(mut self, factor: f64) -> Self {
        self.metres_per_unit = factor;
        self
    }

    /// EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// WKT representation if known
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Size of one linear unit in metres
    pub fn metres_per_unit(&self) -> f64 {
        self.metres_per_unit
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.epsg, &self.wkt) {
            (Some(code), _) => write!(f, "EPSG:{code}"),
            (None, Some(wkt)) => write!(f, "{}", &wkt[..wkt.len().min(40)]),
            (None, None) => write!(f, "unknown CRS"),
        }
    }
}
