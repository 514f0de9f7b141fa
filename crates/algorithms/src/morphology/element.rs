//! Structuring elements for binary morphology

use georisk_core::raster::Neighborhood;
use georisk_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Shape of a structuring element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "shape", content = "radius")]
pub enum StructuringElement {
    /// Square of side 2*radius + 1
    Square(usize),
    /// Plus-shaped element with arms of length `radius`
    Cross(usize),
    /// Cells within Euclidean distance `radius`
    Disk(usize),
}

impl Default for StructuringElement {
    /// 3x3 cross, the smallest element that removes single-cell speckle
    fn default() -> Self {
        StructuringElement::Cross(1)
    }
}

impl StructuringElement {
    pub fn validate(&self) -> Result<()> {
        if self.radius() == 0 {
            return Err(Error::invalid_param(
                "radius",
                0,
                "structuring element radius must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn radius(&self) -> usize {
        match self {
            StructuringElement::Square(r) | StructuringElement::Cross(r) | StructuringElement::Disk(r) => *r,
        }
    }

    /// (dr, dc) offsets of the active cells, center included
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        match self {
            StructuringElement::Square(r) => Neighborhood::Square(*r).offsets(),
            StructuringElement::Disk(r) => Neighborhood::Circle(*r).offsets(),
            StructuringElement::Cross(r) => {
                let r = *r as isize;
                let mut offsets = Vec::new();
                for d in -r..=r {
                    offsets.push((d, 0));
                    if d != 0 {
                        offsets.push((0, d));
                    }
                }
                offsets
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets() {
        assert_eq!(StructuringElement::Square(1).offsets().len(), 9);
        assert_eq!(StructuringElement::Disk(2).offsets().len(), 13);

        let cross = StructuringElement::Cross(1).offsets();
        assert_eq!(cross.len(), 5);
        assert!(cross.contains(&(0, 0)));
        assert!(cross.contains(&(-1, 0)));
        assert!(!cross.contains(&(1, 1)));
    }

    #[test]
    fn test_validate_zero_radius() {
        assert!(StructuringElement::Square(0).validate().is_err());
        assert!(StructuringElement::Cross(0).validate().is_err());
        assert!(StructuringElement::default().validate().is_ok());
    }
}
