//! Binary closing: dilation followed by erosion
//!
//! Fills pinholes and narrow gaps inside regions.

use super::dilate::dilate;
use super::element::StructuringElement;
use super::erode::erode;
use georisk_core::{Algorithm, Error, Raster, Result};

#[derive(Debug, Clone, Default)]
pub struct ClosingParams {
    pub element: StructuringElement,
}

#[derive(Debug, Clone, Default)]
pub struct Closing;

impl Algorithm for Closing {
    type Input = Raster<u8>;
    type Output = Raster<u8>;
    type Params = ClosingParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Closing"
    }

    fn description(&self) -> &'static str {
        "Binary closing (dilation then erosion) to fill small holes"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        closing(&input, &params.element)
    }
}

pub fn closing(mask: &Raster<u8>, element: &StructuringElement) -> Result<Raster<u8>> {
    let dilated = dilate(mask, element)?;
    erode(&dilated, element)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closing_fills_pinhole() {
        let mut mask: Raster<u8> = Raster::filled(5, 5, 1);
        mask.set(2, 2, 0).unwrap();
        let closed = closing(&mask, &StructuringElement::Cross(1)).unwrap();
        assert!(closed.data().iter().all(|&v| v == 1));
    }
}
