//! Binary opening: erosion followed by dilation
//!
//! Removes specks smaller than the element while keeping the outline of
//! larger regions.

use super::dilate::dilate;
use super::element::StructuringElement;
use super::erode::erode;
use georisk_core::{Algorithm, Error, Raster, Result};

#[derive(Debug, Clone, Default)]
pub struct OpeningParams {
    pub element: StructuringElement,
}

#[derive(Debug, Clone, Default)]
pub struct Opening;

impl Algorithm for Opening {
    type Input = Raster<u8>;
    type Output = Raster<u8>;
    type Params = OpeningParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Opening"
    }

    fn description(&self) -> &'static str {
        "Binary opening (erosion then dilation) to remove isolated cells"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        opening(&input, &params.element)
    }
}

pub fn opening(mask: &Raster<u8>, element: &StructuringElement) -> Result<Raster<u8>> {
    let eroded = erode(mask, element)?;
    dilate(&eroded, element)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opening_removes_isolated_cell_keeps_block() {
        let mut mask: Raster<u8> = Raster::new(8, 8);
        mask.set(1, 1, 1).unwrap();
        for r in 4..7 {
            for c in 4..7 {
                mask.set(r, c, 1).unwrap();
            }
        }

        let opened = opening(&mask, &StructuringElement::Square(1)).unwrap();
        assert_eq!(opened.get(1, 1).unwrap(), 0, "speckle should be removed");
        for r in 4..7 {
            for c in 4..7 {
                assert_eq!(opened.get(r, c).unwrap(), 1, "block cell ({}, {})", r, c);
            }
        }
        assert_eq!(opened.data().iter().map(|&v| v as usize).sum::<usize>(), 9);
    }

    #[test]
    fn test_opening_algorithm_uses_default_cross() {
        let mut mask: Raster<u8> = Raster::new(5, 5);
        for r in 1..4 {
            for c in 1..4 {
                mask.set(r, c, 1).unwrap();
            }
        }
        let opened = Opening.execute_default(mask.clone()).unwrap();
        let direct = opening(&mask, &StructuringElement::default()).unwrap();
        assert_eq!(opened.data(), direct.data());
    }
}
