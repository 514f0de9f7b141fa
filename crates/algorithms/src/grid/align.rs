//! Co-registration of grids onto a common lattice

use crate::maybe_rayon::*;
use georisk_core::{Error, GeoTransform, Raster, RasterElement, Result, CRS};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Resampling kernel used when a grid is moved onto another lattice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resampling {
    /// Value of the source cell containing the target centre
    #[default]
    Nearest,
    /// Distance-weighted mean of the four surrounding source centres.
    /// Falls back to nearest when any of the four is no-data.
    Bilinear,
}

/// Resample/crop `grids` onto the intersection of their extents at the
/// finest common resolution.
///
/// The target lattice is snapped to the finest input grid, so that grid is
/// reproduced without interpolation. All outputs share shape, transform and
/// CRS. Fails with [`Error::GridMismatch`] when CRSs differ, when a grid is
/// rotated, or when the extents do not overlap.
pub fn align(grids: &[&Raster<f64>], method: Resampling) -> Result<Vec<Raster<f64>>> {
    let first = grids
        .first()
        .ok_or_else(|| Error::invalid_param("grids", 0, "at least one grid is required"))?;

    for (i, g) in grids.iter().enumerate() {
        if !g.transform().is_north_up() {
            return Err(Error::GridMismatch(format!("input {} is rotated; only north-up grids can be aligned", i)));
        }
        check_crs(first.crs(), g.crs(), i)?;
    }

    let already_aligned = grids
        .iter()
        .all(|g| g.shape() == first.shape() && g.transform().same_lattice(first.transform()));
    if already_aligned {
        return Ok(grids.iter().map(|g| (*g).clone()).collect());
    }

    // Finest grid (smallest cell area, first on ties) defines the lattice.
    let finest = grids
        .iter()
        .min_by(|a, b| a.cell_area().total_cmp(&b.cell_area()))
        .copied()
        .unwrap_or(*first);
    let pw = finest.transform().pixel_width;
    let ph = finest.transform().pixel_height.abs();

    let (mut min_x, mut min_y, mut max_x, mut max_y) = first.bounds();
    for g in grids.iter().skip(1) {
        let (a, b, c, d) = g.bounds();
        min_x = min_x.max(a);
        min_y = min_y.max(b);
        max_x = max_x.min(c);
        max_y = max_y.min(d);
    }

    const SNAP: f64 = 1e-6;
    let fo = finest.transform();
    let col0 = ((min_x - fo.origin_x) / pw - SNAP).ceil();
    let row0 = ((fo.origin_y - max_y) / ph - SNAP).ceil();
    let origin_x = fo.origin_x + col0 * pw;
    let origin_y = fo.origin_y - row0 * ph;
    let cols = ((max_x - origin_x) / pw + SNAP).floor();
    let rows = ((origin_y - min_y) / ph + SNAP).floor();

    if cols < 1.0 || rows < 1.0 {
        return Err(Error::GridMismatch("input extents do not overlap".to_string()));
    }

    let target = GeoTransform::new(origin_x, origin_y, pw, -ph);
    let (rows, cols) = (rows as usize, cols as usize);
    tracing::debug!(rows, cols, cell = pw, "aligning {} grids", grids.len());

    grids
        .iter()
        .map(|g| resample_onto(g, &target, rows, cols, method))
        .collect()
}

/// Resample `grid` onto the lattice of `reference`.
pub fn resample_to<T: RasterElement>(
    grid: &Raster<f64>,
    reference: &Raster<T>,
    method: Resampling,
) -> Result<Raster<f64>> {
    check_crs(reference.crs(), grid.crs(), 1)?;
    if grid.shape() == reference.shape() && grid.transform().same_lattice(reference.transform()) {
        let mut out = grid.clone();
        out.set_crs(reference.crs().cloned());
        return Ok(out);
    }
    let (rows, cols) = reference.shape();
    let mut out = resample_onto(grid, reference.transform(), rows, cols, method)?;
    out.set_crs(reference.crs().cloned());
    Ok(out)
}

/// Sample `grid` at the cell centres of a `rows` x `cols` lattice described
/// by `target`. Target cells outside the source are no-data.
pub fn resample_onto(
    grid: &Raster<f64>,
    target: &GeoTransform,
    rows: usize,
    cols: usize,
    method: Resampling,
) -> Result<Raster<f64>> {
    let (src_rows, src_cols) = grid.shape();

    let sample = |x: f64, y: f64| -> f64 {
        let (fc, fr) = grid.geo_to_pixel(x, y);
        if !(fc >= 0.0 && fr >= 0.0 && fc < src_cols as f64 && fr < src_rows as f64) {
            return f64::NAN;
        }
        let nearest = || {
            let v = unsafe { grid.get_unchecked(fr as usize, fc as usize) };
            if grid.is_nodata(v) {
                f64::NAN
            } else {
                v
            }
        };

        match method {
            Resampling::Nearest => nearest(),
            Resampling::Bilinear => {
                let cx = (fc - 0.5).clamp(0.0, (src_cols - 1) as f64);
                let cy = (fr - 0.5).clamp(0.0, (src_rows - 1) as f64);
                let c0 = cx.floor() as usize;
                let r0 = cy.floor() as usize;
                let c1 = (c0 + 1).min(src_cols - 1);
                let r1 = (r0 + 1).min(src_rows - 1);
                let tx = cx - c0 as f64;
                let ty = cy - r0 as f64;

                let q = unsafe {
                    [
                        grid.get_unchecked(r0, c0),
                        grid.get_unchecked(r0, c1),
                        grid.get_unchecked(r1, c0),
                        grid.get_unchecked(r1, c1),
                    ]
                };
                if q.iter().any(|&v| grid.is_nodata(v)) {
                    return nearest();
                }
                let top = q[0] * (1.0 - tx) + q[1] * tx;
                let bottom = q[2] * (1.0 - tx) + q[3] * tx;
                top * (1.0 - ty) + bottom * ty
            }
        }
    };

    let output: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    let (x, y) = target.pixel_to_geo(col, row);
                    sample(x, y)
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let mut out = Raster::from_array(
        Array2::from_shape_vec((rows, cols), output).map_err(|e| Error::Other(e.to_string()))?,
    );
    out.set_transform(*target);
    out.set_crs(grid.crs().cloned());
    out.set_nodata(Some(f64::NAN));
    Ok(out)
}

fn check_crs(expected: Option<&CRS>, actual: Option<&CRS>, index: usize) -> Result<()> {
    match (expected, actual) {
        (None, None) => Ok(()),
        (Some(a), Some(b)) if a.is_equivalent(b) => Ok(()),
        (a, b) => Err(Error::GridMismatch(format!(
            "input {} has CRS {} but {} is required; reprojection is not supported",
            index,
            b.map_or_else(|| "none".to_string(), CRS::identifier),
            a.map_or_else(|| "none".to_string(), CRS::identifier),
        ))),
    }
}
