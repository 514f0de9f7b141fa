//! Slope from a DEM (Horn 1981)

use super::focal_map;
use georisk_core::{Algorithm, Error, Raster, Result};

/// Units for slope output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlopeUnits {
    /// Degrees (0-90)
    #[default]
    Degrees,
    /// Percent rise
    Percent,
}

/// Parameters for slope calculation
#[derive(Debug, Clone, Copy)]
pub struct SlopeParams {
    pub units: SlopeUnits,
    /// Elevation multiplier (e.g. feet to metres)
    pub z_factor: f64,
}

impl Default for SlopeParams {
    fn default() -> Self {
        Self {
            units: SlopeUnits::Degrees,
            z_factor: 1.0,
        }
    }
}

/// Slope algorithm
#[derive(Debug, Clone, Default)]
pub struct Slope;

impl Algorithm for Slope {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = SlopeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Slope"
    }

    fn description(&self) -> &'static str {
        "Steepness of the terrain surface using Horn's 3x3 method"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        slope(&input, params)
    }
}

/// Calculate slope from a DEM.
///
/// ```text
/// a b c
/// d e f
/// g h i
/// ```
///
/// dz/dx = ((c + 2f + i) - (a + 2d + g)) / (8 * dx)
/// dz/dy = ((g + 2h + i) - (a + 2b + c)) / (8 * dy)
/// slope = atan(sqrt(dz/dx² + dz/dy²))
pub fn slope(dem: &Raster<f64>, params: SlopeParams) -> Result<Raster<f64>> {
    focal_map(dem, params.z_factor, |w| {
        let dz_dx = w.horn_dz_dx();
        let dz_dy = w.horn_dz_dy();
        let rise = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt();

        match params.units {
            SlopeUnits::Degrees => rise.atan().to_degrees(),
            SlopeUnits::Percent => rise * 100.0,
        }
    })
}
