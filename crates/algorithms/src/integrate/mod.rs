//! Weighted multi-hazard fusion

use crate::grid::{normalize_with, zip_valid, Normalization};
use georisk_core::{Error, Raster, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Allowed overshoot of the [0, 1] range in input hazard grids
pub const RANGE_TOLERANCE: f64 = 1e-6;

/// Hazard name to non-negative weight
///
/// Weights need not sum to one. A weight of zero, or a hazard with no
/// weight, leaves that hazard out of the composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HazardWeights(BTreeMap<String, f64>);

impl Default for HazardWeights {
    fn default() -> Self {
        Self::new().with("landslide", 0.4).with("flood", 0.4).with("exposure", 0.2)
    }
}

impl HazardWeights {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, hazard: impl Into<String>, weight: f64) -> Self {
        self.0.insert(hazard.into(), weight);
        self
    }

    pub fn set(&mut self, hazard: impl Into<String>, weight: f64) {
        self.0.insert(hazard.into(), weight);
    }

    pub fn get(&self, hazard: &str) -> f64 {
        self.0.get(hazard).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, &v)| (k.as_str(), v))
    }

    pub fn validate(&self) -> Result<()> {
        for (name, w) in self.iter() {
            if !(w.is_finite() && w >= 0.0) {
                return Err(Error::invalid_param("hazard weight", format!("{}={}", name, w), "must be finite and non-negative"));
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, f64)> for HazardWeights {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Fuse named hazard grids as `sum(w * h) / sum(w)` over the hazards with a
/// positive weight.
///
/// Every included grid must lie on the same lattice and within [0, 1]; each
/// is rescaled by `normalization` before fusion. A cell that is no-data in
/// any included grid is no-data in the composite.
pub fn integrate(
    hazards: &[(&str, &Raster<f64>)],
    weights: &HazardWeights,
    normalization: Normalization,
) -> Result<Raster<f64>> {
    weights.validate()?;

    let mut included: Vec<(f64, Raster<f64>)> = Vec::new();
    for &(name, grid) in hazards {
        let w = weights.get(name);
        if w <= 0.0 {
            tracing::debug!(hazard = name, "hazard excluded by zero weight");
            continue;
        }
        check_range(name, grid)?;
        included.push((w, normalize_with(grid, normalization)?));
    }

    if included.is_empty() {
        return Err(Error::invalid_param(
            "weights",
            format!("{:?}", weights.0),
            "no supplied hazard has a positive weight",
        ));
    }

    let total: f64 = included.iter().map(|(w, _)| w).sum();
    let w: Vec<f64> = included.iter().map(|(w, _)| w / total).collect();
    let grids: Vec<&Raster<f64>> = included.iter().map(|(_, g)| g).collect();

    let composite = zip_valid(&grids, |values| values.iter().zip(&w).map(|(v, w)| v * w).sum::<f64>().clamp(0.0, 1.0))?;
    tracing::info!(hazards = grids.len(), "multi-hazard composite built");
    Ok(composite)
}

fn check_range(name: &str, grid: &Raster<f64>) -> Result<()> {
    let stats = grid.statistics();
    if let (Some(lo), Some(hi)) = (stats.min, stats.max) {
        if lo < -RANGE_TOLERANCE || hi > 1.0 + RANGE_TOLERANCE {
            return Err(Error::invalid_param(
                "hazard grid",
                name,
                format!("values span [{}, {}], outside [0, 1]", lo, hi),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid(values: Vec<f64>) -> Raster<f64> {
        let mut g = Raster::from_vec(values, 2, 2).unwrap();
        g.set_nodata(Some(f64::NAN));
        g
    }

    #[test]
    fn equal_inputs_give_same_value() {
        let a = grid(vec![0.5; 4]);
        let b = grid(vec![0.5; 4]);
        let c = grid(vec![0.5; 4]);
        let out = integrate(
            &[("landslide", &a), ("flood", &b), ("exposure", &c)],
            &HazardWeights::default(),
            Normalization::MinMax,
        )
        .unwrap();
        for v in out.data().iter() {
            assert_relative_eq!(*v, 0.5);
        }
    }

    #[test]
    fn zero_weight_excludes_hazard() {
        let landslide = grid(vec![0.0, 0.25, 0.5, 1.0]);
        let flood = grid(vec![1.0, f64::NAN, 1.0, 1.0]);
        let weights = HazardWeights::new().with("landslide", 2.0).with("flood", 0.0);
        let out = integrate(&[("landslide", &landslide), ("flood", &flood)], &weights, Normalization::None).unwrap();
        assert_eq!(out.data(), landslide.data());
    }

    #[test]
    fn nodata_in_any_input_propagates() {
        let a = grid(vec![0.2, 0.4, f64::NAN, 0.8]);
        let b = grid(vec![0.6, f64::NAN, 0.5, 0.0]);
        let weights = HazardWeights::new().with("a", 1.0).with("b", 3.0);
        let out = integrate(&[("a", &a), ("b", &b)], &weights, Normalization::None).unwrap();
        assert_relative_eq!(out.get(0, 0).unwrap(), 0.5);
        assert!(out.get(0, 1).unwrap().is_nan());
        assert!(out.get(1, 0).unwrap().is_nan());
        assert_relative_eq!(out.get(1, 1).unwrap(), 0.2);
    }

    #[test]
    fn invalid_weights_rejected() {
        let a = grid(vec![0.5; 4]);
        let negative = HazardWeights::new().with("a", -1.0);
        assert!(matches!(
            integrate(&[("a", &a)], &negative, Normalization::None),
            Err(Error::InvalidParameter { .. })
        ));
        let zeros = HazardWeights::new().with("a", 0.0);
        assert!(matches!(
            integrate(&[("a", &a)], &zeros, Normalization::None),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn out_of_range_and_misregistered_rejected() {
        let a = grid(vec![0.5, 0.5, 0.5, 3.0]);
        let w = HazardWeights::new().with("a", 1.0).with("b", 1.0);
        assert!(integrate(&[("a", &a)], &w, Normalization::None).is_err());

        let ok = grid(vec![0.5; 4]);
        let other = Raster::from_vec(vec![0.5; 6], 3, 2).unwrap();
        assert!(matches!(
            integrate(&[("a", &ok), ("b", &other)], &w, Normalization::None),
            Err(Error::GridMismatch(_))
        ));
    }
}
