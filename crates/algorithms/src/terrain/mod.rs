//! Terrain features derived from a DEM
//!
//! Slope, aspect and curvature over a 3x3 window. Edge cells, and cells with
//! a no-data value anywhere in their window, are no-data (NaN).

mod aspect;
mod curvature;
mod slope;

pub use aspect::{aspect, Aspect, AspectOutput, FLAT_ASPECT};
pub use curvature::{curvature, Curvature, CurvatureParams, CurvatureType};
pub use slope::{slope, Slope, SlopeParams, SlopeUnits};

use crate::maybe_rayon::*;
use ndarray::Array2;
use georisk_core::{Error, Raster, RasterElement, Result};

/// Elevations of a 3x3 window, row-major (z1 = north-west, z9 = south-east),
/// already scaled by the z-factor, plus the cell spacing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Window {
    pub z: [f64; 9],
    pub dx: f64,
    pub dy: f64,
}

impl Window {
    /// Horn (1981) east-west gradient
    pub fn horn_dz_dx(&self) -> f64 {
        let z = &self.z;
        ((z[2] + 2.0 * z[5] + z[8]) - (z[0] + 2.0 * z[3] + z[6])) / (8.0 * self.dx)
    }

    /// Horn (1981) gradient along the row direction (positive = rising southward)
    pub fn horn_dz_dy(&self) -> f64 {
        let z = &self.z;
        ((z[6] + 2.0 * z[7] + z[8]) - (z[0] + 2.0 * z[1] + z[2])) / (8.0 * self.dy)
    }
}

/// Apply `f` to every interior cell whose full window is valid.
pub(crate) fn focal_map<F>(dem: &Raster<f64>, z_factor: f64, f: F) -> Result<Raster<f64>>
where
    F: Fn(&Window) -> f64 + Sync + Send,
{
    let (rows, cols) = dem.shape();
    let nodata = dem.nodata();
    let dx = dem.transform().pixel_width.abs();
    let dy = dem.transform().pixel_height.abs();

    if dx <= 0.0 || dy <= 0.0 {
        return Err(Error::invalid_param("cell_size", dx.min(dy), "must be positive"));
    }

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            if row == 0 || row + 1 >= rows {
                return row_data;
            }

            'cells: for col in 1..cols.saturating_sub(1) {
                let mut z = [0.0; 9];
                for (k, cell) in z.iter_mut().enumerate() {
                    let v = unsafe { dem.get_unchecked(row + k / 3 - 1, col + k % 3 - 1) };
                    if v.is_nodata(nodata) {
                        continue 'cells;
                    }
                    *cell = v * z_factor;
                }
                row_data[col] = f(&Window { z, dx, dy });
            }

            row_data
        })
        .collect();

    let data = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;
    dem.derive(data, Some(f64::NAN))
}

/// Parameters shared by the terrain feature stack
#[derive(Debug, Clone, Copy)]
pub struct TerrainParams {
    /// Multiplier applied to elevations before differencing
    pub z_factor: f64,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self { z_factor: 1.0 }
    }
}

/// Slope, aspect and curvature computed from one DEM
#[derive(Debug, Clone)]
pub struct TerrainFeatures {
    /// Degrees, 0 to 90
    pub slope: Raster<f64>,
    /// Degrees clockwise from north; flat cells are [`FLAT_ASPECT`]
    pub aspect: Raster<f64>,
    /// General curvature, positive convex
    pub curvature: Raster<f64>,
}

/// Derive the three terrain features of `dem` in parallel.
pub fn terrain_features(dem: &Raster<f64>, params: TerrainParams) -> Result<TerrainFeatures> {
    let slope_params = SlopeParams {
        units: SlopeUnits::Degrees,
        z_factor: params.z_factor,
    };
    let curvature_params = CurvatureParams {
        curvature_type: CurvatureType::General,
        z_factor: params.z_factor,
    };

    let (slope_result, (aspect_result, curvature_result)) = join(
        || slope(dem, slope_params),
        || {
            join(
                || aspect(dem, AspectOutput::Degrees),
                || curvature(dem, curvature_params),
            )
        },
    );

    let features = TerrainFeatures {
        slope: slope_result?,
        aspect: aspect_result?,
        curvature: curvature_result?,
    };
    tracing::debug!(rows = dem.rows(), cols = dem.cols(), "terrain features derived");
    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use georisk_core::{Algorithm, GeoTransform};

    #[test]
    fn features_share_grid_and_edges_are_nodata() {
        let mut dem = Raster::new(6, 7);
        dem.set_transform(GeoTransform::new(0.0, 60.0, 10.0, -10.0));
        for r in 0..6 {
            for c in 0..7 {
                dem.set(r, c, (r * 3 + c) as f64).unwrap();
            }
        }

        let tf = terrain_features(&dem, TerrainParams::default()).unwrap();
        for grid in [&tf.slope, &tf.aspect, &tf.curvature] {
            assert!(grid.ensure_same_grid(&dem, "feature/dem").is_ok());
            for c in 0..7 {
                assert!(grid.get(0, c).unwrap().is_nan());
                assert!(grid.get(5, c).unwrap().is_nan());
            }
            for r in 0..6 {
                assert!(grid.get(r, 0).unwrap().is_nan());
                assert!(grid.get(r, 6).unwrap().is_nan());
            }
            assert!(grid.get(2, 3).unwrap().is_finite());
        }
    }

    #[test]
    fn nodata_in_window_propagates() {
        let mut dem: Raster<f64> = Raster::filled(5, 5, 10.0);
        dem.set_nodata(Some(-9999.0));
        dem.set(2, 2, -9999.0).unwrap();

        let tf = terrain_features(&dem, TerrainParams::default()).unwrap();
        for r in 1..4 {
            for c in 1..4 {
                assert!(tf.slope.get(r, c).unwrap().is_nan(), "slope ({}, {})", r, c);
                assert!(tf.aspect.get(r, c).unwrap().is_nan(), "aspect ({}, {})", r, c);
                assert!(tf.curvature.get(r, c).unwrap().is_nan(), "curvature ({}, {})", r, c);
            }
        }
    }

    #[test]
    fn degenerate_grids_are_all_nodata() {
        let dem: Raster<f64> = Raster::filled(2, 2, 1.0);
        let tf = terrain_features(&dem, TerrainParams::default()).unwrap();
        assert!(tf.slope.data().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn slope_algorithm_agrees_with_stack() {
        let mut dem = Raster::new(5, 5);
        dem.set_transform(GeoTransform::new(0.0, 50.0, 10.0, -10.0));
        for r in 0..5 {
            for c in 0..5 {
                dem.set(r, c, (c * 5) as f64).unwrap();
            }
        }
        let tf = terrain_features(&dem, TerrainParams::default()).unwrap();
        let s = Slope.execute_default(dem.clone()).unwrap();
        assert_eq!(Slope.name(), "Slope");
        assert_eq!(s.get(2, 2).unwrap(), tf.slope.get(2, 2).unwrap());
    }
}
