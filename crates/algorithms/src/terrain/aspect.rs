//! Aspect: compass direction of steepest descent

use super::focal_map;
use georisk_core::{Algorithm, Error, Raster, Result};
use std::f64::consts::PI;

/// Value assigned to flat cells. It is a valid value, not no-data.
pub const FLAT_ASPECT: f64 = -1.0;

const FLAT_THRESHOLD: f64 = 1e-10;

/// Output encoding for aspect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectOutput {
    /// Degrees clockwise from north, 0 to 360
    #[default]
    Degrees,
    /// Eight compass sectors: 1 = N, 2 = NE, ... 8 = NW
    Compass,
}

/// Aspect algorithm
#[derive(Debug, Clone, Default)]
pub struct Aspect;

impl Algorithm for Aspect {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = AspectOutput;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Aspect"
    }

    fn description(&self) -> &'static str {
        "Direction of steepest descent from a DEM"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        aspect(&input, params)
    }
}

/// Calculate aspect from a DEM using Horn gradients.
///
/// Flat cells get [`FLAT_ASPECT`]; edges and no-data windows are NaN.
pub fn aspect(dem: &Raster<f64>, output: AspectOutput) -> Result<Raster<f64>> {
    focal_map(dem, 1.0, |w| {
        let dz_dx = w.horn_dz_dx();
        let dz_dy = w.horn_dz_dy();

        if dz_dx.abs() < FLAT_THRESHOLD && dz_dy.abs() < FLAT_THRESHOLD {
            return FLAT_ASPECT;
        }

        let mut bearing = (-dz_dx).atan2(dz_dy);
        if bearing < 0.0 {
            bearing += 2.0 * PI;
        }
        let degrees = bearing.to_degrees();

        match output {
            AspectOutput::Degrees => degrees,
            AspectOutput::Compass => compass_sector(degrees),
        }
    })
}

fn compass_sector(degrees: f64) -> f64 {
    (((degrees + 22.5) / 45.0).floor() as i64 % 8 + 1) as f64
}
