//! Surface curvature (Zevenbergen & Thorne 1987)
//!
//! Fits a partial quartic to the 3x3 window:
//!   p = dz/dx, q = dz/dy, r = d²z/dx², s = d²z/dxdy, t = d²z/dy²
//!
//!   General  = -(r + t) / 2
//!   Profile  = -(r*p² + 2*s*p*q + t*q²) / (p² + q²)
//!   Plan     = -(r*q² - 2*s*p*q + t*p²) / (p² + q²)
//!
//! Sign convention: positive convex (ridges, crests), negative concave
//! (hollows, channels).

use super::focal_map;
use georisk_core::{Algorithm, Error, Raster, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurvatureType {
    #[default]
    General,
    /// Along the direction of maximum slope
    Profile,
    /// Perpendicular to the slope direction
    Plan,
}

#[derive(Debug, Clone, Copy)]
pub struct CurvatureParams {
    pub curvature_type: CurvatureType,
    pub z_factor: f64,
}

impl Default for CurvatureParams {
    fn default() -> Self {
        Self {
            curvature_type: CurvatureType::General,
            z_factor: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Curvature;

impl Algorithm for Curvature {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = CurvatureParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Curvature"
    }

    fn description(&self) -> &'static str {
        "Signed surface curvature from a DEM (Zevenbergen-Thorne)"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        curvature(&input, params)
    }
}

/// Calculate curvature in 1/map-units.
pub fn curvature(dem: &Raster<f64>, params: CurvatureParams) -> Result<Raster<f64>> {
    focal_map(dem, params.z_factor, |w| {
        let [z1, z2, z3, z4, z5, z6, z7, z8, z9] = w.z;
        let (dx, dy) = (w.dx, w.dy);

        let p = (z6 - z4) / (2.0 * dx);
        let q = (z2 - z8) / (2.0 * dy);
        let r = (z4 - 2.0 * z5 + z6) / (dx * dx);
        let s = (z3 - z1 - z9 + z7) / (4.0 * dx * dy);
        let t = (z2 - 2.0 * z5 + z8) / (dy * dy);

        let p2q2 = p * p + q * q;
        match params.curvature_type {
            CurvatureType::General => -(r + t) / 2.0,
            CurvatureType::Profile if p2q2 < 1e-20 => 0.0,
            CurvatureType::Profile => -(r * p * p + 2.0 * s * p * q + t * q * q) / p2q2,
            CurvatureType::Plan if p2q2 < 1e-20 => 0.0,
            CurvatureType::Plan => -(r * q * q - 2.0 * s * p * q + t * p * p) / p2q2,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn surface(n: usize, f: impl Fn(f64, f64) -> f64) -> Raster<f64> {
        let mut dem = Raster::new(n, n);
        let half = (n / 2) as f64;
        for r in 0..n {
            for c in 0..n {
                dem.set(r, c, f(c as f64 - half, r as f64 - half)).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_plane_has_zero_curvature() {
        let dem = surface(9, |x, y| 2.0 * x + y);
        for kind in [CurvatureType::General, CurvatureType::Profile, CurvatureType::Plan] {
            let result = curvature(&dem, CurvatureParams { curvature_type: kind, z_factor: 1.0 }).unwrap();
            assert!(result.get(4, 4).unwrap().abs() < 1e-10, "{:?}", kind);
        }
    }

    #[test]
    fn test_hollow_is_negative_and_crest_positive() {
        // z = x² + y²: d²z/dx² = d²z/dy² = 2, general = -2
        let bowl = curvature(&surface(21, |x, y| x * x + y * y), CurvatureParams::default()).unwrap();
        assert_relative_eq!(bowl.get(10, 10).unwrap(), -2.0, epsilon = 1e-9);

        let dome = curvature(&surface(21, |x, y| -(x * x + y * y)), CurvatureParams::default()).unwrap();
        assert_relative_eq!(dome.get(10, 10).unwrap(), 2.0, epsilon = 1e-9);
    }
}
