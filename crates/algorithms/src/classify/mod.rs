//! Breakpoint classification of hazard grids
//!
//! A [`ClassScheme`] of K-1 ascending breakpoints splits [0, 1] into K
//! classes numbered 1..=K; 0 is reserved for no-data.

use crate::maybe_rayon::*;
use georisk_core::{Algorithm, Error, Raster, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Class value written for no-data cells
pub const NODATA_CLASS: u8 = 0;

/// Breakpoints and class labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScheme {
    pub breakpoints: Vec<f64>,
    pub labels: Vec<String>,
}

impl Default for ClassScheme {
    fn default() -> Self {
        Self::five_class()
    }
}

impl ClassScheme {
    pub fn new(breakpoints: Vec<f64>, labels: Vec<String>) -> Result<Self> {
        let scheme = Self { breakpoints, labels };
        scheme.validate()?;
        Ok(scheme)
    }

    /// very_low / low / moderate / high / very_high at 0.2 steps
    pub fn five_class() -> Self {
        Self {
            breakpoints: vec![0.2, 0.4, 0.6, 0.8],
            labels: ["very_low", "low", "moderate", "high", "very_high"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// no_flood / flood split at 0.5
    pub fn flood() -> Self {
        Self {
            breakpoints: vec![0.5],
            labels: vec!["no_flood".to_string(), "flood".to_string()],
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.labels.len() != self.breakpoints.len() + 1 {
            return Err(Error::invalid_param(
                "labels",
                self.labels.len(),
                format!("need one more label than breakpoints ({})", self.breakpoints.len()),
            ));
        }
        if self.labels.len() > u8::MAX as usize {
            return Err(Error::invalid_param("labels", self.labels.len(), "at most 255 classes"));
        }
        if let Some(bad) = self.breakpoints.iter().find(|b| !b.is_finite()) {
            return Err(Error::invalid_param("breakpoints", bad, "must be finite"));
        }
        if self.breakpoints.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::invalid_param(
                "breakpoints",
                format!("{:?}", self.breakpoints),
                "must be strictly ascending",
            ));
        }
        Ok(())
    }

    pub fn n_classes(&self) -> usize {
        self.labels.len()
    }

    /// Class (1-based) of a valid value; a value on a breakpoint belongs to
    /// the class above it.
    pub fn class_of(&self, value: f64) -> u8 {
        (self.breakpoints.partition_point(|&b| b <= value) + 1) as u8
    }

    /// Label of a 1-based class
    pub fn label(&self, class: u8) -> Option<&str> {
        (class as usize).checked_sub(1).and_then(|i| self.labels.get(i)).map(String::as_str)
    }

    /// Class of a label
    pub fn class_named(&self, label: &str) -> Option<u8> {
        self.labels.iter().position(|l| l == label).map(|i| (i + 1) as u8)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Classify;

impl Algorithm for Classify {
    type Input = Raster<f64>;
    type Output = Raster<u8>;
    type Params = ClassScheme;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Classify"
    }

    fn description(&self) -> &'static str {
        "Breakpoint classification of a hazard grid into ordinal classes"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        classify(&input, &params)
    }
}

/// Classify every valid cell of `grid` by `scheme`. No-data becomes
/// [`NODATA_CLASS`].
pub fn classify(grid: &Raster<f64>, scheme: &ClassScheme) -> Result<Raster<u8>> {
    scheme.validate()?;
    let (rows, cols) = grid.shape();

    let output: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    let v = unsafe { grid.get_unchecked(row, col) };
                    if grid.is_nodata(v) {
                        NODATA_CLASS
                    } else {
                        scheme.class_of(v)
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let data = Array2::from_shape_vec((rows, cols), output).map_err(|e| Error::Other(e.to_string()))?;
    grid.derive(data, Some(NODATA_CLASS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakpoint_goes_to_higher_class() {
        let grid = Raster::from_vec(vec![0.0, 0.2, 0.39, 0.4, 0.6, 0.8, 1.0, f64::NAN], 2, 4).unwrap();
        let classes = classify(&grid, &ClassScheme::five_class()).unwrap();
        let got: Vec<u8> = classes.data().iter().copied().collect();
        assert_eq!(got, vec![1, 2, 2, 3, 4, 5, 5, 0]);
        assert_eq!(classes.nodata(), Some(NODATA_CLASS));
    }

    #[test]
    fn flood_scheme() {
        let scheme = ClassScheme::flood();
        assert_eq!(scheme.class_of(0.0), 1);
        assert_eq!(scheme.class_of(0.5), 2);
        assert_eq!(scheme.class_of(1.0), 2);
        assert_eq!(scheme.label(2), Some("flood"));
        assert_eq!(scheme.class_named("flood"), Some(2));
        assert_eq!(scheme.label(0), None);
    }

    #[test]
    fn invalid_schemes_rejected() {
        assert!(ClassScheme::new(vec![0.5, 0.5], vec!["a".into(), "b".into(), "c".into()]).is_err());
        assert!(ClassScheme::new(vec![0.5], vec!["a".into()]).is_err());
        assert!(ClassScheme::new(vec![f64::NAN], vec!["a".into(), "b".into()]).is_err());
        assert!(ClassScheme::new(vec![], vec!["all".into()]).is_ok());
    }

    #[test]
    fn algorithm_matches_free_function() {
        let grid = Raster::from_vec(vec![0.1, 0.5, 0.9, f64::NAN], 2, 2).unwrap();
        let via_trait = Classify.execute_default(grid.clone()).unwrap();
        assert_eq!(Classify.name(), "Classify");
        assert_eq!(via_trait.data(), classify(&grid, &ClassScheme::default()).unwrap().data());
    }
}
