//! Cell neighbourhoods used by morphology and region labelling

use serde::{Deserialize, Serialize};

/// Neighbourhood pattern around a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Neighborhood {
    /// 3x3 without corners (4 neighbours + center)
    Rook3x3,
    /// 3x3 (8 neighbours + center)
    Queen3x3,
    /// Square window of given radius
    Square(usize),
    /// Disk of given radius (in cells)
    Circle(usize),
}

impl Neighborhood {
    pub fn radius(&self) -> usize {
        match self {
            Neighborhood::Rook3x3 | Neighborhood::Queen3x3 => 1,
            Neighborhood::Square(r) | Neighborhood::Circle(r) => *r,
        }
    }

    /// Whether a relative position lies inside this neighbourhood
    pub fn contains(&self, dr: isize, dc: isize) -> bool {
        match self {
            Neighborhood::Rook3x3 => dr.abs() + dc.abs() <= 1,
            Neighborhood::Queen3x3 => dr.abs() <= 1 && dc.abs() <= 1,
            Neighborhood::Square(r) => {
                let r = *r as isize;
                dr.abs() <= r && dc.abs() <= r
            }
            Neighborhood::Circle(r) => {
                let r = *r as f64;
                ((dr * dr + dc * dc) as f64).sqrt() <= r
            }
        }
    }

    /// Relative positions in row-major order, center included
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        let r = self.radius() as isize;
        let mut offsets = Vec::new();

        for dr in -r..=r {
            for dc in -r..=r {
                if self.contains(dr, dc) {
                    offsets.push((dr, dc));
                }
            }
        }

        offsets
    }

    /// Relative positions excluding the center cell
    pub fn offsets_no_center(&self) -> Vec<(isize, isize)> {
        self.offsets()
            .into_iter()
            .filter(|&(dr, dc)| dr != 0 || dc != 0)
            .collect()
    }

    /// In-bounds neighbours of (row, col) in a `rows` x `cols` grid
    pub fn neighbors(
        &self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> impl Iterator<Item = (usize, usize)> {
        self.offsets_no_center().into_iter().filter_map(move |(dr, dc)| {
            let r = row as isize + dr;
            let c = col as isize + dc;
            (r >= 0 && c >= 0 && (r as usize) < rows && (c as usize) < cols)
                .then_some((r as usize, c as usize))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighborhood_offsets() {
        assert_eq!(Neighborhood::Queen3x3.offsets().len(), 9);
        assert_eq!(Neighborhood::Rook3x3.offsets().len(), 5);
        assert_eq!(Neighborhood::Square(2).offsets().len(), 25);
        assert_eq!(Neighborhood::Circle(1).offsets().len(), 5);
    }

    #[test]
    fn test_neighbors_clip_at_edges() {
        let corner: Vec<_> = Neighborhood::Rook3x3.neighbors(0, 0, 3, 3).collect();
        assert_eq!(corner, vec![(0, 1), (1, 0)]);

        let center = Neighborhood::Queen3x3.neighbors(1, 1, 3, 3).count();
        assert_eq!(center, 8);
    }
}
