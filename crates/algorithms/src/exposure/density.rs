//! Weighted exposure density on the hazard grid

use crate::grid::normalize_min_max;
use crate::maybe_rayon::*;
use georisk_core::{Error, Raster, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Component weights. They need not sum to one; a zero weight drops the
/// component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureWeights {
    pub structures: f64,
    pub population: f64,
    /// Weight of the reference hazard grid itself
    pub hazard: f64,
}

impl Default for ExposureWeights {
    fn default() -> Self {
        Self {
            structures: 0.4,
            population: 0.2,
            hazard: 0.4,
        }
    }
}

impl ExposureWeights {
    pub fn validate(&self) -> Result<()> {
        for (name, w) in [
            ("structures", self.structures),
            ("population", self.population),
            ("hazard", self.hazard),
        ] {
            if !(w.is_finite() && w >= 0.0) {
                return Err(Error::invalid_param("exposure weight", format!("{}={}", name, w), "must be finite and non-negative"));
            }
        }
        Ok(())
    }
}

/// Inputs to [`exposure_density`], all on the grid of `reference`
#[derive(Debug, Clone, Copy)]
pub struct ExposureInputs<'a> {
    /// Hazard grid defining the lattice; its no-data propagates
    pub reference: &'a Raster<f64>,
    /// Rasterized structure counts or values
    pub structures: Option<&'a Raster<f64>>,
    pub population: Option<&'a Raster<f64>>,
}

/// Combine min-max normalized components as `sum(w * v) / sum(w)` and
/// rescale the result to [0, 1].
///
/// No-data in the reference grid or in any weighted component gives
/// no-data. Fails with [`Error::InvalidParameter`] when no component has a
/// positive weight.
pub fn exposure_density(inputs: &ExposureInputs<'_>, weights: &ExposureWeights) -> Result<Raster<f64>> {
    weights.validate()?;
    let reference = inputs.reference;

    let mut components: Vec<(f64, Raster<f64>)> = Vec::new();
    for (name, grid, weight) in [
        ("structures", inputs.structures, weights.structures),
        ("population", inputs.population, weights.population),
        ("hazard", Some(reference), weights.hazard),
    ] {
        let Some(grid) = grid else {
            continue;
        };
        if weight <= 0.0 {
            continue;
        }
        reference.ensure_same_grid(grid, &format!("hazard/{}", name))?;
        components.push((weight, normalize_min_max(grid)?));
        tracing::debug!(component = name, weight, "exposure component");
    }

    if components.is_empty() {
        return Err(Error::invalid_param(
            "exposure",
            "no components",
            "at least one of structures, population or hazard needs a positive weight",
        ));
    }
    let total: f64 = components.iter().map(|(w, _)| w).sum();

    let (rows, cols) = reference.shape();
    let output: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    let h = unsafe { reference.get_unchecked(row, col) };
                    if reference.is_nodata(h) {
                        return f64::NAN;
                    }
                    let mut sum = 0.0;
                    for (w, g) in &components {
                        let v = unsafe { g.get_unchecked(row, col) };
                        if g.is_nodata(v) {
                            return f64::NAN;
                        }
                        sum += w * v;
                    }
                    sum / total
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let combined = reference.derive(
        Array2::from_shape_vec((rows, cols), output).map_err(|e| Error::Other(e.to_string()))?,
        Some(f64::NAN),
    )?;
    normalize_min_max(&combined)
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
    fn structures_and_population_combined() {
        let hazard = grid(vec![0.1, 0.5, f64::NAN, 0.9]);
        let structures = grid(vec![0.0, 4.0, 2.0, 2.0]);
        let population = grid(vec![100.0, 0.0, 50.0, 100.0]);
        let inputs = ExposureInputs {
            reference: &hazard,
            structures: Some(&structures),
            population: Some(&population),
        };
        let without_hazard = ExposureWeights {
            hazard: 0.0,
            ..Default::default()
        };
        let out = exposure_density(&inputs, &without_hazard).unwrap();

        // raw: (0.4*s + 0.2*p) / 0.6 with s = [0, 1, _, .5], p = [1, 0, _, 1]
        // = [1/3, 2/3, _, 2/3] -> rescaled [0, 1, _, 1]
        assert!(out.get(1, 0).unwrap().is_nan());
        assert_relative_eq!(out.get(0, 0).unwrap(), 0.0);
        assert_relative_eq!(out.get(0, 1).unwrap(), 1.0);
        assert_relative_eq!(out.get(1, 1).unwrap(), 1.0);

        // default weights add the hazard itself: h = [0, .5, _, 1]
        // raw = [0.2, 0.6, _, 0.8] -> rescaled [0, 2/3, _, 1]
        let out = exposure_density(&inputs, &ExposureWeights::default()).unwrap();
        assert_relative_eq!(out.get(0, 0).unwrap(), 0.0);
        assert_relative_eq!(out.get(0, 1).unwrap(), 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(out.get(1, 1).unwrap(), 1.0);
    }

    #[test]
    fn component_nodata_propagates() {
        let hazard = grid(vec![0.2; 4]);
        let structures = grid(vec![0.0, 1.0, 2.0, 3.0]);
        let population = grid(vec![10.0, f64::NAN, 30.0, 40.0]);
        let inputs = ExposureInputs {
            reference: &hazard,
            structures: Some(&structures),
            population: Some(&population),
        };
        let out = exposure_density(&inputs, &ExposureWeights::default()).unwrap();
        assert!(out.get(0, 1).unwrap().is_nan());
        assert_eq!(out.valid_values().count(), 3);

        // a component with zero weight is not consulted
        let no_population = ExposureWeights {
            population: 0.0,
            ..Default::default()
        };
        let out = exposure_density(&inputs, &no_population).unwrap();
        assert!(out.get(0, 1).unwrap().is_finite());
    }

    #[test]
    fn missing_structures_still_uses_population() {
        let hazard = grid(vec![0.2; 4]);
        let population = grid(vec![0.0, 10.0, 20.0, 40.0]);
        let inputs = ExposureInputs {
            reference: &hazard,
            structures: None,
            population: Some(&population),
        };
        let out = exposure_density(&inputs, &ExposureWeights::default()).unwrap();
        assert_relative_eq!(out.get(0, 1).unwrap(), 0.25);
        assert_relative_eq!(out.get(1, 1).unwrap(), 1.0);
    }

    #[test]
    fn no_component_is_an_error() {
        let hazard = grid(vec![0.2; 4]);
        let inputs = ExposureInputs {
            reference: &hazard,
            structures: None,
            population: None,
        };
        let without_hazard = ExposureWeights {
            hazard: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            exposure_density(&inputs, &without_hazard),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(exposure_density(&inputs, &ExposureWeights::default()).is_ok());
    }

    #[test]
    fn misregistered_component_rejected() {
        let hazard = grid(vec![0.2; 4]);
        let other = Raster::from_vec(vec![1.0; 6], 2, 3).unwrap();
        let inputs = ExposureInputs {
            reference: &hazard,
            structures: Some(&other),
            population: None,
        };
        assert!(matches!(
            exposure_density(&inputs, &ExposureWeights::default()),
            Err(Error::GridMismatch(_))
        ));
    }
}
