//! Binary dilation

use super::element::StructuringElement;
use super::erode::binary_filter;
use georisk_core::{Algorithm, Error, Raster, Result};

#[derive(Debug, Clone, Default)]
pub struct DilateParams {
    pub element: StructuringElement,
}

#[derive(Debug, Clone, Default)]
pub struct Dilate;

impl Algorithm for Dilate {
    type Input = Raster<u8>;
    type Output = Raster<u8>;
    type Params = DilateParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Dilate"
    }

    fn description(&self) -> &'static str {
        "Binary dilation: a cell is set if any cell under the element is set"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        dilate(&input, &params.element)
    }
}

/// Binary dilation of a 0/1 mask
pub fn dilate(mask: &Raster<u8>, element: &StructuringElement) -> Result<Raster<u8>> {
    element.validate()?;
    // Reflected element; all supported shapes are symmetric.
    binary_filter(mask, &element.offsets(), false)
}
