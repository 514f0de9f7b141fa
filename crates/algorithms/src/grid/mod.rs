//! Grid utilities shared by every pipeline: alignment, resampling,
//! normalization and no-data masking.

mod align;
mod normalize;

pub use align::{align, resample_onto, resample_to, Resampling};
pub use normalize::{normalize, normalize_min_max, normalize_with, normalize_z_score, Normalization};

use georisk_core::{Error, Raster, RasterElement, Result};
use ndarray::Array2;

/// Convert any grid to `f64` with NaN as the only no-data marker.
///
/// Cells equal to the source sentinel become NaN.
pub fn standardize_nodata<T: RasterElement>(grid: &Raster<T>) -> Result<Raster<f64>> {
    let nodata = grid.nodata();
    let data = grid.data().mapv(|v| {
        if v.is_nodata(nodata) {
            f64::NAN
        } else {
            v.to_f64().unwrap_or(f64::NAN)
        }
    });
    grid.derive(data, Some(f64::NAN))
}

/// Set cells to no-data where `mask` is no-data or zero.
///
/// Both grids must be co-registered.
pub fn apply_mask<T: RasterElement>(grid: &Raster<f64>, mask: &Raster<T>) -> Result<Raster<f64>> {
    grid.ensure_same_grid(mask, "grid/mask")?;
    let mask_nodata = mask.nodata();
    let data = ndarray::Zip::from(grid.data())
        .and(mask.data())
        .map_collect(|&v, &m| {
            let keep = !m.is_nodata(mask_nodata) && m.to_f64().map_or(false, |f| f != 0.0);
            if keep {
                v
            } else {
                f64::NAN
            }
        });
    grid.derive(data, Some(f64::NAN))
}

/// Combine co-registered grids cell by cell. Cells where any input is
/// no-data are no-data in the result.
pub(crate) fn zip_valid<F>(grids: &[&Raster<f64>], f: F) -> Result<Raster<f64>>
where
    F: Fn(&[f64]) -> f64 + Sync + Send,
{
    use crate::maybe_rayon::*;

    let first = grids
        .first()
        .ok_or_else(|| Error::invalid_param("grids", 0, "at least one grid is required"))?;
    for (i, g) in grids.iter().enumerate().skip(1) {
        first.ensure_same_grid(g, &format!("input 0 / input {}", i))?;
    }

    let (rows, cols) = first.shape();
    let output: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut values = vec![0.0; grids.len()];
            let mut out = vec![f64::NAN; cols];
            'cells: for (col, cell) in out.iter_mut().enumerate() {
                for (k, g) in grids.iter().enumerate() {
                    let v = unsafe { g.get_unchecked(row, col) };
                    if g.is_nodata(v) {
                        continue 'cells;
                    }
                    values[k] = v;
                }
                *cell = f(&values);
            }
            out
        })
        .collect();

    let data = Array2::from_shape_vec((rows, cols), output).map_err(|e| Error::Other(e.to_string()))?;
    first.derive(data, Some(f64::NAN))
}
