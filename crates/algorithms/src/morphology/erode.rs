//! Binary erosion

use super::element::StructuringElement;
use crate::maybe_rayon::*;
use georisk_core::{Algorithm, Error, Raster, RasterElement, Result};
use ndarray::Array2;

/// Parameters for binary erosion
#[derive(Debug, Clone, Default)]
pub struct ErodeParams {
    pub element: StructuringElement,
}

#[derive(Debug, Clone, Default)]
pub struct Erode;

impl Algorithm for Erode {
    type Input = Raster<u8>;
    type Output = Raster<u8>;
    type Params = ErodeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Erode"
    }

    fn description(&self) -> &'static str {
        "Binary erosion: a cell stays set only if every cell under the element is set"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        erode(&input, &params.element)
    }
}

/// Binary erosion of a 0/1 mask.
///
/// Element cells falling outside the grid are ignored, so regions touching
/// the border are not eaten away by it. No-data cells count as background.
pub fn erode(mask: &Raster<u8>, element: &StructuringElement) -> Result<Raster<u8>> {
    element.validate()?;
    binary_filter(mask, &element.offsets(), true)
}

/// Shared kernel for erosion (`require_all`) and dilation (any).
pub(super) fn binary_filter(
    mask: &Raster<u8>,
    offsets: &[(isize, isize)],
    require_all: bool,
) -> Result<Raster<u8>> {
    let (rows, cols) = mask.shape();
    let nodata = mask.nodata();
    let is_set = |r: usize, c: usize| {
        let v = unsafe { mask.get_unchecked(r, c) };
        v != 0 && !v.is_nodata(nodata)
    };

    let output: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![0u8; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let mut neighbours = offsets.iter().filter_map(|&(dr, dc)| {
                    let r = row as isize + dr;
                    let c = col as isize + dc;
                    (r >= 0 && c >= 0 && (r as usize) < rows && (c as usize) < cols)
                        .then(|| is_set(r as usize, c as usize))
                });
                let hit = if require_all {
                    is_set(row, col) && neighbours.all(|s| s)
                } else {
                    neighbours.any(|s| s)
                };
                *out = u8::from(hit);
            }
            row_data
        })
        .collect();

    let data = Array2::from_shape_vec((rows, cols), output).map_err(|e| Error::Other(e.to_string()))?;
    mask.derive(data, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: &[&str]) -> Raster<u8> {
        let cols = rows[0].len();
        let data = rows
            .iter()
            .flat_map(|r| r.bytes().map(|b| u8::from(b == b'#')))
            .collect();
        Raster::from_vec(data, rows.len(), cols).unwrap()
    }

    #[test]
    fn test_erode_removes_single_cells() {
        let mask = mask_from(&[
            ".....",
            ".#...",
            ".....",
            "...##",
            "...##",
        ]);
        let eroded = erode(&mask, &StructuringElement::Cross(1)).unwrap();
        assert_eq!(eroded.get(1, 1).unwrap(), 0);
        // Corner block keeps only the cell whose in-bounds cross is full.
        assert_eq!(eroded.get(4, 4).unwrap(), 1);
        assert_eq!(eroded.get(3, 3).unwrap(), 0);
    }

    #[test]
    fn test_erode_full_mask_is_unchanged() {
        let mask: Raster<u8> = Raster::filled(4, 4, 1);
        let eroded = erode(&mask, &StructuringElement::Square(1)).unwrap();
        assert!(eroded.data().iter().all(|&v| v == 1));
    }
}
