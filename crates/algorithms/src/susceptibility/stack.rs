//! Co-registered, ordered set of predictor grids

use georisk_core::{Error, Raster, Result};

/// Named predictor bands sharing one grid.
///
/// Band order is significant: a trained model records the names it was fitted
/// on and prediction refuses a stack whose names differ in content or order.
#[derive(Debug, Clone)]
pub struct FeatureStack {
    names: Vec<String>,
    bands: Vec<Raster<f64>>,
}

impl FeatureStack {
    /// Build a stack, checking that every band shares the first band's grid
    /// and that names are unique.
    pub fn new(bands: Vec<(String, Raster<f64>)>) -> Result<Self> {
        if bands.is_empty() {
            return Err(Error::invalid_param("bands", 0, "a feature stack needs at least one band"));
        }

        let mut names = Vec::with_capacity(bands.len());
        let mut grids: Vec<Raster<f64>> = Vec::with_capacity(bands.len());
        for (name, grid) in bands {
            if names.contains(&name) {
                return Err(Error::invalid_param("bands", &name, "duplicate band name"));
            }
            if let Some(first) = grids.first() {
                first.ensure_same_grid(&grid, &format!("feature '{}' vs '{}'", name, names[0]))?;
            }
            names.push(name);
            grids.push(grid);
        }

        Ok(Self { names, bands: grids })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn n_features(&self) -> usize {
        self.bands.len()
    }

    pub fn band(&self, name: &str) -> Option<&Raster<f64>> {
        self.names.iter().position(|n| n == name).map(|i| &self.bands[i])
    }

    /// Grid every band lies on
    pub fn reference(&self) -> &Raster<f64> {
        &self.bands[0]
    }

    pub fn shape(&self) -> (usize, usize) {
        self.reference().shape()
    }

    /// Feature vector of a cell, `None` when any band is no-data there.
    pub fn values_at(&self, row: usize, col: usize) -> Option<Vec<f64>> {
        let mut out = Vec::with_capacity(self.bands.len());
        self.fill_values(row, col, &mut out).then_some(out)
    }

    /// Refill `buf` with the feature vector at (row, col); false on no-data.
    pub(crate) fn fill_values(&self, row: usize, col: usize, buf: &mut Vec<f64>) -> bool {
        buf.clear();
        let (rows, cols) = self.shape();
        if row >= rows || col >= cols {
            return false;
        }
        for band in &self.bands {
            let v = unsafe { band.get_unchecked(row, col) };
            if band.is_nodata(v) {
                return false;
            }
            buf.push(v);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use georisk_core::{GeoTransform, CRS};

    fn band(value: f64) -> Raster<f64> {
        let mut r = Raster::filled(3, 3, value);
        r.set_transform(GeoTransform::new(0.0, 30.0, 10.0, -10.0));
        r.set_crs(Some(CRS::from_epsg(32633)));
        r.set_nodata(Some(f64::NAN));
        r
    }

    #[test]
    fn values_follow_band_order() {
        let stack = FeatureStack::new(vec![("slope".into(), band(12.0)), ("aspect".into(), band(90.0))]).unwrap();
        assert_eq!(stack.names(), ["slope", "aspect"]);
        assert_eq!(stack.values_at(1, 1), Some(vec![12.0, 90.0]));
        assert_eq!(stack.values_at(5, 5), None);
    }

    #[test]
    fn nodata_in_any_band_hides_cell() {
        let mut b = band(1.0);
        b.set(0, 0, f64::NAN).unwrap();
        let stack = FeatureStack::new(vec![("a".into(), band(2.0)), ("b".into(), b)]).unwrap();
        assert_eq!(stack.values_at(0, 0), None);
        assert!(stack.values_at(0, 1).is_some());
    }

    #[test]
    fn rejects_misregistered_or_duplicate_bands() {
        let mut shifted = band(1.0);
        shifted.set_transform(GeoTransform::new(5.0, 30.0, 10.0, -10.0));
        assert!(matches!(
            FeatureStack::new(vec![("a".into(), band(1.0)), ("b".into(), shifted)]),
            Err(Error::GridMismatch(_))
        ));
        assert!(FeatureStack::new(vec![("a".into(), band(1.0)), ("a".into(), band(2.0))]).is_err());
    }
}
