//! Rescaling grids into the [0, 1] hazard range

use georisk_core::{Error, Raster, RasterElement, Result};
use serde::{Deserialize, Serialize};

/// How a grid is brought into [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Linear stretch between the valid minimum and maximum
    #[default]
    MinMax,
    /// Standard score clipped to [0, 1]
    ZScore,
    /// Values are assumed to be normalized already; only clamped
    None,
}

/// Linear rescale of `grid` from [lo, hi] to [0, 1], clamping values outside.
pub fn normalize(grid: &Raster<f64>, lo: f64, hi: f64) -> Result<Raster<f64>> {
    if !(lo.is_finite() && hi.is_finite() && hi > lo) {
        return Err(Error::invalid_param("hi", hi, format!("must be finite and greater than lo = {}", lo)));
    }
    let span = hi - lo;
    map_valid(grid, |v| ((v - lo) / span).clamp(0.0, 1.0))
}

/// Min-max normalization over valid cells.
///
/// A constant grid has no span; its values are only clamped into [0, 1], so
/// applying this function twice gives the same grid as applying it once.
pub fn normalize_min_max(grid: &Raster<f64>) -> Result<Raster<f64>> {
    let stats = grid.statistics();
    match (stats.min, stats.max) {
        (Some(lo), Some(hi)) if hi > lo => normalize(grid, lo, hi),
        _ => map_valid(grid, |v| v.clamp(0.0, 1.0)),
    }
}

/// Standard score of each valid cell, clipped to [0, 1].
pub fn normalize_z_score(grid: &Raster<f64>) -> Result<Raster<f64>> {
    let (n, mean, m2) = grid.valid_values().fold((0usize, 0.0f64, 0.0f64), |(n, mean, m2), v| {
        // Welford
        let n = n + 1;
        let delta = v - mean;
        let mean = mean + delta / n as f64;
        (n, mean, m2 + delta * (v - mean))
    });
    let std = if n > 0 { (m2 / n as f64).sqrt() } else { 0.0 };

    if std > 0.0 {
        map_valid(grid, |v| ((v - mean) / std).clamp(0.0, 1.0))
    } else {
        map_valid(grid, |v| v.clamp(0.0, 1.0))
    }
}

/// Dispatch on a [`Normalization`] method
pub fn normalize_with(grid: &Raster<f64>, method: Normalization) -> Result<Raster<f64>> {
    match method {
        Normalization::MinMax => normalize_min_max(grid),
        Normalization::ZScore => normalize_z_score(grid),
        Normalization::None => map_valid(grid, |v| v.clamp(0.0, 1.0)),
    }
}

fn map_valid(grid: &Raster<f64>, f: impl Fn(f64) -> f64) -> Result<Raster<f64>> {
    let nodata = grid.nodata();
    let data = grid.data().mapv(|v| {
        if v.is_nodata(nodata) {
            f64::NAN
        } else {
            f(v)
        }
    });
    grid.derive(data, Some(f64::NAN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> Raster<f64> {
        let mut g = Raster::from_vec(vec![10.0, 20.0, f64::NAN, 30.0, 50.0, -9999.0], 2, 3).unwrap();
        g.set_nodata(Some(-9999.0));
        g
    }

    #[test]
    fn min_max_spans_unit_interval() {
        let n = normalize_min_max(&sample()).unwrap();
        assert_relative_eq!(n.get(0, 0).unwrap(), 0.0);
        assert_relative_eq!(n.get(0, 1).unwrap(), 0.25);
        assert_relative_eq!(n.get(1, 1).unwrap(), 1.0);
        assert!(n.get(0, 2).unwrap().is_nan());
        assert!(n.get(1, 2).unwrap().is_nan(), "sentinel must become no-data");
    }

    #[test]
    fn min_max_is_idempotent() {
        let once = normalize_min_max(&sample()).unwrap();
        let twice = normalize_min_max(&once).unwrap();
        for (a, b) in once.data().iter().zip(twice.data().iter()) {
            assert!((a.is_nan() && b.is_nan()) || (a - b).abs() < 1e-12, "{} vs {}", a, b);
        }

        let constant: Raster<f64> = Raster::filled(3, 3, 0.5);
        let c1 = normalize_min_max(&constant).unwrap();
        let c2 = normalize_min_max(&c1).unwrap();
        assert_eq!(c1.data(), c2.data());
        assert_eq!(c1.get(1, 1).unwrap(), 0.5);
    }

    #[test]
    fn explicit_range_clamps() {
        let n = normalize(&sample(), 20.0, 40.0).unwrap();
        assert_relative_eq!(n.get(0, 0).unwrap(), 0.0);
        assert_relative_eq!(n.get(1, 0).unwrap(), 0.5);
        assert_relative_eq!(n.get(1, 1).unwrap(), 1.0);
        assert!(normalize(&sample(), 1.0, 1.0).is_err());
    }

    #[test]
    fn z_score_is_clipped() {
        let g = Raster::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0], 1, 5).unwrap();
        let z = normalize_z_score(&g).unwrap();
        assert_eq!(z.get(0, 0).unwrap(), 0.0);
        assert_eq!(z.get(0, 2).unwrap(), 0.0);
        assert_relative_eq!(z.get(0, 3).unwrap(), 1.0 / 2f64.sqrt(), epsilon = 1e-12);
        assert_eq!(z.get(0, 4).unwrap(), 1.0);
    }
}
