//! Flood extent from SAR backscatter

use super::otsu::otsu_threshold;
use crate::maybe_rayon::*;
use crate::morphology::{dilate, erode, StructuringElement};
use crate::vectorize::{sieve, Connectivity};
use georisk_core::{Algorithm, CancellationToken, Error, Raster, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Open-water backscatter threshold for Sentinel-1 VV, also the fallback when Otsu cannot
/// separate two classes
pub const DEFAULT_THRESHOLD_DB: f64 = -18.0;

/// How the water/land threshold is chosen
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "db")]
pub enum ThresholdMode {
    /// Otsu over the valid backscatter histogram
    #[default]
    Auto,
    /// Fixed threshold in dB
    Manual(f64),
}

/// Parameters for [`detect_flood`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodParams {
    pub threshold: ThresholdMode,
    /// Used when `Auto` finds no threshold (constant or empty input)
    pub fallback_threshold_db: f64,
    pub element: StructuringElement,
    /// Erosions (then as many dilations) of the opening; 0 disables it
    pub opening_iterations: usize,
    /// Close pinholes after the opening
    pub closing: bool,
    /// Water regions smaller than this area (map units squared) are dropped
    pub min_flood_area: Option<f64>,
    /// Water above this elevation is discarded; needs a DEM
    pub elevation_ceiling: Option<f64>,
    /// Region connectivity used by `min_flood_area`
    pub connectivity: Connectivity,
}

impl Default for FloodParams {
    fn default() -> Self {
        Self {
            threshold: ThresholdMode::Auto,
            fallback_threshold_db: DEFAULT_THRESHOLD_DB,
            element: StructuringElement::default(),
            opening_iterations: 1,
            closing: false,
            min_flood_area: None,
            elevation_ceiling: Some(100.0),
            connectivity: Connectivity::default(),
        }
    }
}

impl FloodParams {
    pub fn validate(&self) -> Result<()> {
        if let ThresholdMode::Manual(db) = self.threshold {
            if !db.is_finite() {
                return Err(Error::invalid_param("threshold", db, "must be finite"));
            }
        }
        if !self.fallback_threshold_db.is_finite() {
            return Err(Error::invalid_param("fallback_threshold_db", self.fallback_threshold_db, "must be finite"));
        }
        self.element.validate()?;
        if let Some(area) = self.min_flood_area {
            if !(area.is_finite() && area >= 0.0) {
                return Err(Error::invalid_param("min_flood_area", area, "must be finite and non-negative"));
            }
        }
        if let Some(h) = self.elevation_ceiling {
            if h.is_nan() {
                return Err(Error::invalid_param("elevation_ceiling", h, "must be a number"));
            }
        }
        Ok(())
    }
}

/// Summary of a flood detection run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloodStatistics {
    /// Threshold applied, in dB
    pub threshold_db: f64,
    pub flood_pixels: usize,
    pub valid_pixels: usize,
    /// Flooded area in map units squared
    pub flood_area: f64,
    pub flood_area_km2: f64,
    /// Share of valid pixels flagged as water, in percent
    pub flood_percentage: f64,
}

impl FloodStatistics {
    pub fn is_empty(&self) -> bool {
        self.flood_pixels == 0
    }
}

/// Binary flood grid (1 water, 0 dry, NaN no-data) with its statistics
#[derive(Debug, Clone)]
pub struct FloodResult {
    pub mask: Raster<f64>,
    pub stats: FloodStatistics,
}

#[derive(Debug, Clone, Default)]
pub struct FloodDetector;

impl Algorithm for FloodDetector {
    type Input = Raster<f64>;
    type Output = FloodResult;
    type Params = FloodParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "FloodDetector"
    }

    fn description(&self) -> &'static str {
        "SAR backscatter thresholding with morphological cleanup"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        detect_flood(&input, None, &params, &CancellationToken::new())
    }
}

/// Detect open water in a SAR backscatter grid (dB).
///
/// Cells below the threshold are water. The provisional mask is cleaned by
/// an opening, an optional closing and an optional area sieve, then water
/// higher than `elevation_ceiling` on `dem` is dropped. `dem` must lie on
/// the SAR grid. No-data in either input is no-data in the output.
///
/// An input with no water gives an all-zero grid, not an error.
pub fn detect_flood(
    sar: &Raster<f64>,
    dem: Option<&Raster<f64>>,
    params: &FloodParams,
    cancel: &CancellationToken,
) -> Result<FloodResult> {
    params.validate()?;
    if let Some(dem) = dem {
        sar.ensure_same_grid(dem, "sar/dem")?;
    }

    let threshold_db = match params.threshold {
        ThresholdMode::Manual(db) => db,
        ThresholdMode::Auto => match otsu_threshold(sar.valid_values()) {
            Some(t) => {
                tracing::debug!(threshold = t, "otsu threshold");
                t
            }
            None => {
                tracing::warn!(
                    fallback = params.fallback_threshold_db,
                    "backscatter histogram has no split, using fallback threshold"
                );
                params.fallback_threshold_db
            }
        },
    };

    let (rows, cols) = sar.shape();
    let valid = |r: usize, c: usize| -> bool {
        let v = unsafe { sar.get_unchecked(r, c) };
        !sar.is_nodata(v) && dem.map_or(true, |d| !d.is_nodata(unsafe { d.get_unchecked(r, c) }))
    };

    let water = Array2::from_shape_fn((rows, cols), |(r, c)| {
        u8::from(valid(r, c) && unsafe { sar.get_unchecked(r, c) } < threshold_db)
    });
    let mut mask: Raster<u8> = sar.derive(water, None)?;
    cancel.check()?;

    if params.opening_iterations > 0 {
        for _ in 0..params.opening_iterations {
            mask = erode(&mask, &params.element)?;
            cancel.check()?;
        }
        for _ in 0..params.opening_iterations {
            mask = dilate(&mask, &params.element)?;
            cancel.check()?;
        }
    }
    if params.closing {
        mask = dilate(&mask, &params.element)?;
        mask = erode(&mask, &params.element)?;
        cancel.check()?;
    }
    if let Some(area) = params.min_flood_area {
        let cell_area = sar.cell_area();
        if area > 0.0 && cell_area > 0.0 {
            let min_cells = (area / cell_area).ceil() as usize;
            mask = sieve(&mask, min_cells, params.connectivity, cancel)?;
        }
    }

    let ceiling = match (dem, params.elevation_ceiling) {
        (Some(dem), Some(h)) => Some((dem, h)),
        (None, Some(_)) => {
            tracing::debug!("no DEM supplied, elevation ceiling skipped");
            None
        }
        _ => None,
    };

    let output: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    if !valid(row, col) {
                        return f64::NAN;
                    }
                    let wet = unsafe { mask.get_unchecked(row, col) } != 0;
                    let too_high = ceiling.map_or(false, |(dem, h)| unsafe { dem.get_unchecked(row, col) } > h);
                    if wet && !too_high {
                        1.0
                    } else {
                        0.0
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let flood_pixels = output.iter().filter(|&&v| v == 1.0).count();
    let valid_pixels = output.iter().filter(|v| !v.is_nan()).count();
    let flood_area = flood_pixels as f64 * sar.cell_area();
    let stats = FloodStatistics {
        threshold_db,
        flood_pixels,
        valid_pixels,
        flood_area,
        flood_area_km2: flood_area / 1.0e6,
        flood_percentage: if valid_pixels > 0 {
            100.0 * flood_pixels as f64 / valid_pixels as f64
        } else {
            0.0
        },
    };
    tracing::info!(
        threshold_db,
        flood_pixels,
        flood_km2 = stats.flood_area_km2,
        "flood detection complete"
    );

    let data = Array2::from_shape_vec((rows, cols), output).map_err(|e| Error::Other(e.to_string()))?;
    Ok(FloodResult {
        mask: sar.derive(data, Some(f64::NAN))?,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use georisk_core::GeoTransform;

    /// Dry land at -5 dB with a 4x4 lake at -25 dB and one noisy pixel
    fn scene() -> Raster<f64> {
        let mut sar = Raster::filled(10, 10, -5.0);
        sar.set_transform(GeoTransform::new(0.0, 100.0, 10.0, -10.0));
        sar.set_nodata(Some(f64::NAN));
        for r in 2..6 {
            for c in 2..6 {
                sar.set(r, c, -25.0).unwrap();
            }
        }
        sar.set(8, 8, -25.0).unwrap();
        sar
    }

    fn manual(db: f64) -> FloodParams {
        FloodParams {
            threshold: ThresholdMode::Manual(db),
            ..Default::default()
        }
    }

    #[test]
    fn opening_removes_speckle() {
        let result = detect_flood(&scene(), None, &manual(-18.0), &CancellationToken::new()).unwrap();
        assert_eq!(result.mask.get(8, 8).unwrap(), 0.0);
        assert_eq!(result.mask.get(3, 3).unwrap(), 1.0);
        // the cross opening rounds off the four lake corners
        assert_eq!(result.stats.flood_pixels, 12);
        assert_eq!(result.stats.valid_pixels, 100);
        assert_eq!(result.stats.flood_area, 1200.0);
        assert!((result.stats.flood_percentage - 12.0).abs() < 1e-12);
    }

    #[test]
    fn auto_threshold_separates_modes() {
        let result = detect_flood(&scene(), None, &FloodParams::default(), &CancellationToken::new()).unwrap();
        assert!(result.stats.threshold_db > -25.0 && result.stats.threshold_db < -5.0);
        assert_eq!(result.stats.flood_pixels, 12);
    }

    #[test]
    fn all_dry_gives_zero_grid() {
        let sar = Raster::filled(6, 6, -5.0);
        let result = detect_flood(&sar, None, &FloodParams::default(), &CancellationToken::new()).unwrap();
        assert!(result.stats.is_empty());
        assert_eq!(result.stats.threshold_db, DEFAULT_THRESHOLD_DB);
        assert!(result.mask.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn elevation_ceiling_and_nodata() {
        let sar = scene();
        let mut dem = sar.like(10.0);
        for r in 2..4 {
            for c in 2..6 {
                dem.set(r, c, 250.0).unwrap();
            }
        }
        dem.set(0, 0, f64::NAN).unwrap();
        let result = detect_flood(&sar, Some(&dem), &manual(-18.0), &CancellationToken::new()).unwrap();
        assert_eq!(result.mask.get(2, 3).unwrap(), 0.0);
        assert_eq!(result.mask.get(4, 3).unwrap(), 1.0);
        assert!(result.mask.get(0, 0).unwrap().is_nan());
        assert_eq!(result.stats.valid_pixels, 99);
    }

    #[test]
    fn sieve_drops_small_regions() {
        let params = FloodParams {
            opening_iterations: 0,
            min_flood_area: Some(200.0),
            ..manual(-18.0)
        };
        let result = detect_flood(&scene(), None, &params, &CancellationToken::new()).unwrap();
        assert_eq!(result.mask.get(8, 8).unwrap(), 0.0);
        assert_eq!(result.stats.flood_pixels, 16);
    }

    #[test]
    fn misregistered_dem_rejected() {
        let dem = Raster::filled(4, 4, 0.0);
        assert!(matches!(
            detect_flood(&scene(), Some(&dem), &FloodParams::default(), &CancellationToken::new()),
            Err(Error::GridMismatch(_))
        ));
    }

    #[test]
    fn cancelled_run_stops() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            detect_flood(&scene(), None, &FloodParams::default(), &cancel),
            Err(Error::Cancelled)
        ));
    }

    #[test]
    fn detector_runs_with_defaults() {
        let result = FloodDetector.execute_default(scene()).unwrap();
        assert!(result.stats.flood_pixels > 0);
        assert_eq!(result.stats.valid_pixels, 100);
    }
}
