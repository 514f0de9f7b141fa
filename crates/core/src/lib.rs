//! # GeoRisk Core
//!
//! Core types, traits and I/O for the GeoRisk multi-hazard engine.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced grid type
//! - `GeoTransform`: affine transformation for georeferencing
//! - `CRS`: coordinate reference system identity
//! - `CancellationToken`: cooperative cancellation for long stages
//! - GeoTIFF and GeoJSON I/O with atomic publication

pub mod cancel;
pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use cancel::CancellationToken;
pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::cancel::CancellationToken;
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::Algorithm;
}

/// Common shape of the grid algorithms.
///
/// Algorithms are pure functions of their input and parameters.
pub trait Algorithm {
    type Input;
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    type Error: std::error::Error;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
