//! Per-zone evidence transforms
//!
//! Maps raw geomorphic values (slope, HAND, TWI) to [0,1] suitability
//! scores. Which transform applies to a cell depends on its zone (small,
//! medium or large stream setting), configured declaratively in a
//! [`TransformTable`]. An unconfigured (variable, zone) pair is a
//! configuration error, never a silent default.

use ndarray::{Array2, ArrayView2};
use riparia_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One transform mapping a raw value to [0,1] evidence.
///
/// Every variant is monotonic over its documented domain; results are
/// clipped to [0,1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ZoneTransform {
    /// Pass the value through, clipped to [0,1]
    Identity,
    /// `1 - v/scale`, clipped; high raw values score low
    Inverse { scale: f64 },
    /// Logistic `1 / (1 + exp((v - midpoint) / spread))`.
    /// Positive `spread` scores low values high (slope, HAND);
    /// negative `spread` flips the direction (TWI).
    Sigmoid { midpoint: f64, spread: f64 },
    /// Piecewise-constant bands: `values[i]` applies below `breaks[i]`,
    /// `values[n]` above the last break. Breaks must be ascending and
    /// values monotone for the transform to be valid.
    ThresholdBands { breaks: Vec<f64>, values: Vec<f64> },
}

impl ZoneTransform {
    /// Apply the transform to one raw value. NaN passes through.
    pub fn apply(&self, v: f64) -> f64 {
        if v.is_nan() {
            return f64::NAN;
        }
        let out = match self {
            ZoneTransform::Identity => v,
            ZoneTransform::Inverse { scale } => 1.0 - v / scale,
            ZoneTransform::Sigmoid { midpoint, spread } => {
                1.0 / (1.0 + ((v - midpoint) / spread).exp())
            }
            ZoneTransform::ThresholdBands { breaks, values } => {
                let band = breaks.iter().take_while(|&&b| v >= b).count();
                match values.get(band).or_else(|| values.last()) {
                    Some(&value) => value,
                    None => return f64::NAN,
                }
            }
        };
        out.clamp(0.0, 1.0)
    }

    /// Validate structural invariants (band shapes, monotonicity).
    fn validate(&self, variable: &str, zone: u8) -> Result<()> {
        if let ZoneTransform::ThresholdBands { breaks, values } = self {
            let ascending = breaks.windows(2).all(|w| w[0] < w[1]);
            let monotone = values.windows(2).all(|w| w[0] <= w[1])
                || values.windows(2).all(|w| w[0] >= w[1]);
            if values.len() != breaks.len() + 1 || !ascending || !monotone {
                return Err(Error::Configuration {
                    variable: variable.to_string(),
                    zone,
                });
            }
        }
        Ok(())
    }
}

/// Declarative (variable × zone → transform) configuration table.
///
/// Serde-deserializable so callers can load it from TOML or JSON.
/// Entries are validated on the way in, whether through [`insert`] or
/// deserialization, so a malformed band table never reaches `apply`.
///
/// [`insert`]: TransformTable::insert
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct TransformTable {
    entries: HashMap<String, HashMap<u8, ZoneTransform>>,
}

impl<'de> Deserialize<'de> for TransformTable {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let entries =
            HashMap::<String, HashMap<u8, ZoneTransform>>::deserialize(deserializer)?;
        for (variable, zones) in &entries {
            for (&zone, transform) in zones {
                if transform.validate(variable, zone).is_err() {
                    return Err(serde::de::Error::custom(format!(
                        "invalid transform for variable `{variable}`, zone {zone}"
                    )));
                }
            }
        }
        Ok(Self { entries })
    }
}

impl TransformTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transform for a (variable, zone) pair.
    pub fn insert(
        &mut self,
        variable: impl Into<String>,
        zone: u8,
        transform: ZoneTransform,
    ) -> Result<()> {
        let variable = variable.into();
        transform.validate(&variable, zone)?;
        self.entries
            .entry(variable)
            .or_default()
            .insert(zone, transform);
        Ok(())
    }

    /// Look up the transform for a (variable, zone) pair.
    pub fn get(&self, variable: &str, zone: u8) -> Result<&ZoneTransform> {
        self.entries
            .get(variable)
            .and_then(|zones| zones.get(&zone))
            .ok_or_else(|| Error::Configuration {
                variable: variable.to_string(),
                zone,
            })
    }

    /// Whether any zone is configured for a variable.
    pub fn has_variable(&self, variable: &str) -> bool {
        self.entries.contains_key(variable)
    }

    /// Normalize a raw value array into [0,1] evidence, selecting the
    /// transform per cell from the zone array. NaN (masked) cells stay
    /// NaN; an unconfigured zone under a valid cell is an error.
    pub fn normalize(
        &self,
        variable: &str,
        values: ArrayView2<'_, f64>,
        zones: ArrayView2<'_, u8>,
    ) -> Result<Array2<f64>> {
        let (rows, cols) = values.dim();
        let (zr, zc) = zones.dim();
        if (rows, cols) != (zr, zc) {
            return Err(Error::SizeMismatch { er: rows, ec: cols, ar: zr, ac: zc });
        }

        let mut out = Array2::<f64>::from_elem((rows, cols), f64::NAN);
        for row in 0..rows {
            for col in 0..cols {
                let v = values[(row, col)];
                if v.is_nan() {
                    continue;
                }
                let transform = self.get(variable, zones[(row, col)])?;
                out[(row, col)] = transform.apply(v);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_identity_clips() {
        let t = ZoneTransform::Identity;
        assert_eq!(t.apply(0.5), 0.5);
        assert_eq!(t.apply(1.5), 1.0);
        assert_eq!(t.apply(-0.5), 0.0);
    }

    #[test]
    fn test_inverse_monotone_decreasing() {
        let t = ZoneTransform::Inverse { scale: 10.0 };
        let a = t.apply(1.0);
        let b = t.apply(5.0);
        let c = t.apply(9.0);
        assert!(a > b && b > c, "inverse must decrease: {a}, {b}, {c}");
        assert_eq!(t.apply(20.0), 0.0, "values past scale clip to 0");
    }

    #[test]
    fn test_sigmoid_direction() {
        // Positive spread: low slope scores high
        let t = ZoneTransform::Sigmoid { midpoint: 12.0, spread: 3.0 };
        assert!(t.apply(2.0) > 0.9);
        assert!(t.apply(25.0) < 0.1);

        // Negative spread: high TWI scores high
        let t = ZoneTransform::Sigmoid { midpoint: 8.0, spread: -2.0 };
        assert!(t.apply(15.0) > 0.9);
        assert!(t.apply(2.0) < 0.1);
    }

    #[test]
    fn test_threshold_bands() {
        let t = ZoneTransform::ThresholdBands {
            breaks: vec![2.0, 5.0],
            values: vec![1.0, 0.5, 0.0],
        };
        assert_eq!(t.apply(1.0), 1.0);
        assert_eq!(t.apply(3.0), 0.5);
        assert_eq!(t.apply(7.0), 0.0);
    }

    #[test]
    fn test_empty_bands_score_nothing() {
        // Structurally invalid, but `apply` must stay panic-free even
        // if such a value is constructed directly.
        let t = ZoneTransform::ThresholdBands { breaks: vec![], values: vec![] };
        assert!(t.apply(0.5).is_nan());
    }

    #[test]
    fn test_malformed_table_rejected_on_deserialize() {
        let json = r#"{
            "slope": {
                "1": { "kind": "threshold_bands", "breaks": [], "values": [] }
            }
        }"#;
        let result: std::result::Result<TransformTable, _> = serde_json::from_str(json);
        assert!(result.is_err(), "an empty band table must not deserialize");
    }

    #[test]
    fn test_table_loads_from_json() {
        let json = r#"{
            "slope": { "1": { "kind": "sigmoid", "midpoint": 12.0, "spread": 3.0 } },
            "hand": { "1": { "kind": "inverse", "scale": 10.0 } }
        }"#;
        let table: TransformTable = serde_json::from_str(json).unwrap();
        assert!(table.has_variable("slope"));
        assert!(table.get("hand", 1).is_ok());
        assert!(table.get("slope", 2).is_err());
    }

    #[test]
    fn test_bad_bands_rejected() {
        let mut table = TransformTable::new();
        let result = table.insert(
            "slope",
            1,
            ZoneTransform::ThresholdBands {
                breaks: vec![5.0, 2.0], // not ascending
                values: vec![1.0, 0.5, 0.0],
            },
        );
        assert!(result.is_err(), "descending breaks must be rejected");
    }

    #[test]
    fn test_unconfigured_zone_errors() {
        let mut table = TransformTable::new();
        table.insert("slope", 1, ZoneTransform::Identity).unwrap();

        let values = array![[0.5, 0.5]];
        let zones = array![[1u8, 2u8]];
        let result = table.normalize("slope", values.view(), zones.view());
        match result {
            Err(Error::Configuration { variable, zone }) => {
                assert_eq!(variable, "slope");
                assert_eq!(zone, 2);
            }
            other => panic!("expected Configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_nan_propagates_without_lookup() {
        // A NaN cell over an unconfigured zone must not error: the mask
        // is propagated, not evaluated.
        let mut table = TransformTable::new();
        table.insert("slope", 1, ZoneTransform::Identity).unwrap();

        let values = array![[f64::NAN]];
        let zones = array![[99u8]];
        let out = table.normalize("slope", values.view(), zones.view()).unwrap();
        assert!(out[(0, 0)].is_nan());
    }
}
