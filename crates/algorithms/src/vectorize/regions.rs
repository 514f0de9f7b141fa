//! Connected-component labelling of classified grids

use georisk_core::raster::Neighborhood;
use georisk_core::{CancellationToken, Raster, RasterElement, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Which neighbours join cells into one region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// Edge neighbours only
    #[default]
    Four,
    /// Edge and corner neighbours
    Eight,
}

impl Connectivity {
    pub fn neighborhood(self) -> Neighborhood {
        match self {
            Connectivity::Four => Neighborhood::Rook3x3,
            Connectivity::Eight => Neighborhood::Queen3x3,
        }
    }
}

/// One maximal connected run of equal class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// 1-based label in the [`RegionMap`]
    pub id: u32,
    pub class: u8,
    /// Row-major first cell, which fixes the region order
    pub first_cell: (usize, usize),
    pub cell_count: usize,
}

/// Per-cell region labels (0 = unlabelled) and region summaries
#[derive(Debug, Clone)]
pub struct RegionMap {
    labels: Array2<u32>,
    regions: Vec<Region>,
}

impl RegionMap {
    pub fn labels(&self) -> &Array2<u32> {
        &self.labels
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn label_at(&self, row: usize, col: usize) -> u32 {
        self.labels.get((row, col)).copied().unwrap_or(0)
    }

    pub fn region(&self, id: u32) -> Option<&Region> {
        id.checked_sub(1).and_then(|i| self.regions.get(i as usize))
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Label maximal connected regions of equal, non-zero class.
///
/// Zero and no-data cells are left unlabelled. Regions are numbered in
/// row-major order of their first cell, so labelling is deterministic.
pub fn label_regions(
    grid: &Raster<u8>,
    connectivity: Connectivity,
    cancel: &CancellationToken,
) -> Result<RegionMap> {
    let (rows, cols) = grid.shape();
    let nodata = grid.nodata();
    let class_at = |r: usize, c: usize| -> u8 {
        let v = unsafe { grid.get_unchecked(r, c) };
        if v.is_nodata(nodata) {
            0
        } else {
            v
        }
    };

    let mut labels = Array2::<u32>::zeros((rows, cols));
    let mut regions = Vec::new();
    let offsets = connectivity.neighborhood().offsets_no_center();
    let mut queue = VecDeque::new();

    for row in 0..rows {
        cancel.check()?;
        for col in 0..cols {
            let class = class_at(row, col);
            if class == 0 || labels[(row, col)] != 0 {
                continue;
            }

            let id = regions.len() as u32 + 1;
            let mut count = 0usize;
            labels[(row, col)] = id;
            queue.push_back((row, col));

            while let Some((r, c)) = queue.pop_front() {
                count += 1;
                for &(dr, dc) in &offsets {
                    let nr = r as isize + dr;
                    let nc = c as isize + dc;
                    if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                        continue;
                    }
                    let (nr, nc) = (nr as usize, nc as usize);
                    if labels[(nr, nc)] == 0 && class_at(nr, nc) == class {
                        labels[(nr, nc)] = id;
                        queue.push_back((nr, nc));
                    }
                }
            }

            regions.push(Region {
                id,
                class,
                first_cell: (row, col),
                cell_count: count,
            });
        }
    }

    tracing::debug!(regions = regions.len(), ?connectivity, "labelled regions");
    Ok(RegionMap { labels, regions })
}

/// Clear regions smaller than `min_cells` (set to 0).
pub fn sieve(
    grid: &Raster<u8>,
    min_cells: usize,
    connectivity: Connectivity,
    cancel: &CancellationToken,
) -> Result<Raster<u8>> {
    let map = label_regions(grid, connectivity, cancel)?;
    let keep: Vec<bool> = map.regions().iter().map(|r| r.cell_count >= min_cells).collect();
    let removed = keep.iter().filter(|k| !**k).count();

    let data = ndarray::Zip::from(grid.data())
        .and(map.labels())
        .map_collect(|&v, &id| if id > 0 && !keep[id as usize - 1] { 0 } else { v });
    if removed > 0 {
        tracing::debug!(removed, min_cells, "sieved small regions");
    }
    grid.derive(data, grid.nodata())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[u8]]) -> Raster<u8> {
        let r = rows.len();
        let c = rows[0].len();
        let mut g = Raster::from_vec(rows.concat(), r, c).unwrap();
        g.set_nodata(Some(0));
        g
    }

    #[test]
    fn diagonal_cells_depend_on_connectivity() {
        let g = grid(&[&[1, 0], &[0, 1]]);
        let four = label_regions(&g, Connectivity::Four, &CancellationToken::new()).unwrap();
        let eight = label_regions(&g, Connectivity::Eight, &CancellationToken::new()).unwrap();
        assert_eq!(four.len(), 2);
        assert_eq!(eight.len(), 1);
        assert_eq!(eight.regions()[0].cell_count, 2);
    }

    #[test]
    fn regions_ordered_by_first_cell() {
        let g = grid(&[&[2, 2, 1], &[3, 2, 1], &[3, 3, 0]]);
        let map = label_regions(&g, Connectivity::Four, &CancellationToken::new()).unwrap();
        let summary: Vec<_> = map.regions().iter().map(|r| (r.class, r.first_cell, r.cell_count)).collect();
        assert_eq!(summary, vec![(2, (0, 0), 3), (1, (0, 2), 2), (3, (1, 0), 3)]);
        assert_eq!(map.label_at(2, 2), 0);
        assert_eq!(map.region(3).unwrap().class, 3);
    }

    #[test]
    fn sieve_drops_small_regions() {
        let g = grid(&[&[1, 0, 0, 0], &[0, 0, 1, 1], &[0, 0, 1, 1]]);
        let out = sieve(&g, 2, Connectivity::Four, &CancellationToken::new()).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), 0);
        assert_eq!(out.get(1, 2).unwrap(), 1);
        assert_eq!(out.get(2, 3).unwrap(), 1);
    }
}
