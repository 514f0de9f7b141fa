//! Boundary tracing along cell edges
//!
//! Rings are built on the lattice of cell corners, `(col, row)` with row
//! growing downward. Every boundary edge is directed so that its region lies
//! on the left in map orientation (y up): exterior rings come out
//! counter-clockwise and holes clockwise.

use super::regions::RegionMap;
use georisk_core::{CancellationToken, Error, Result};
use std::collections::HashMap;

/// Corner lattice point `(col, row)`
pub(crate) type Corner = (usize, usize);

/// A closed ring of corners, first point not repeated
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CornerRing {
    pub corners: Vec<Corner>,
}

impl CornerRing {
    /// Shoelace area with y up; positive for exterior rings.
    pub fn signed_area(&self) -> f64 {
        let n = self.corners.len();
        let mut twice = 0.0;
        for i in 0..n {
            let (x0, r0) = self.corners[i];
            let (x1, r1) = self.corners[(i + 1) % n];
            let (y0, y1) = (-(r0 as f64), -(r1 as f64));
            twice += x0 as f64 * y1 - x1 as f64 * y0;
        }
        twice / 2.0
    }

    pub fn is_exterior(&self) -> bool {
        self.signed_area() > 0.0
    }
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    from: Corner,
    to: Corner,
}

impl Edge {
    fn direction(&self) -> (isize, isize) {
        (
            self.to.0 as isize - self.from.0 as isize,
            self.to.1 as isize - self.from.1 as isize,
        )
    }
}

/// Directed boundary edges of every region, indexed by region id - 1.
pub(crate) fn boundary_edges(map: &RegionMap, cancel: &CancellationToken) -> Result<Vec<Vec<(Corner, Corner)>>> {
    let labels = map.labels();
    let (rows, cols) = labels.dim();
    let mut edges: Vec<Vec<(Corner, Corner)>> = vec![Vec::new(); map.len()];

    let other = |r: isize, c: isize, id: u32| -> bool {
        r < 0 || c < 0 || r as usize >= rows || c as usize >= cols || labels[(r as usize, c as usize)] != id
    };

    for r in 0..rows {
        cancel.check()?;
        for c in 0..cols {
            let id = labels[(r, c)];
            if id == 0 {
                continue;
            }
            let out = &mut edges[id as usize - 1];
            let (ri, ci) = (r as isize, c as isize);
            // top, left, bottom, right in map-counter-clockwise sense
            if other(ri - 1, ci, id) {
                out.push(((c + 1, r), (c, r)));
            }
            if other(ri, ci - 1, id) {
                out.push(((c, r), (c, r + 1)));
            }
            if other(ri + 1, ci, id) {
                out.push(((c, r + 1), (c + 1, r + 1)));
            }
            if other(ri, ci + 1, id) {
                out.push(((c + 1, r + 1), (c + 1, r)));
            }
        }
    }

    Ok(edges)
}

/// Link a region's directed edges into closed rings.
///
/// Where two rings meet at a corner (diagonal pinch) the right-hand turn is
/// taken, so each ring follows a single background component.
/// Collinear vertices are removed.
pub(crate) fn link_rings(edges: &[(Corner, Corner)]) -> Result<Vec<CornerRing>> {
    let edges: Vec<Edge> = edges.iter().map(|&(from, to)| Edge { from, to }).collect();

    let mut outgoing: HashMap<Corner, Vec<usize>> = HashMap::with_capacity(edges.len());
    for (i, e) in edges.iter().enumerate() {
        outgoing.entry(e.from).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();

    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let mut corners = vec![edges[start].from];
        let mut current = start;

        loop {
            let edge = edges[current];
            let candidates = outgoing
                .get(&edge.to)
                .ok_or_else(|| Error::Algorithm(format!("open boundary at corner {:?}", edge.to)))?;

            let next = match candidates.as_slice() {
                [only] => *only,
                many => {
                    let (dx, dy) = edge.direction();
                    // right turn in map orientation
                    let wanted = (-dy, dx);
                    *many
                        .iter()
                        .find(|&&k| edges[k].direction() == wanted)
                        .ok_or_else(|| Error::Algorithm(format!("ambiguous boundary at corner {:?}", edge.to)))?
                }
            };

            if next == start {
                break;
            }
            if used[next] {
                return Err(Error::Algorithm(format!("boundary revisits corner {:?}", edge.to)));
            }
            used[next] = true;
            corners.push(edges[next].from);
            current = next;
        }

        rings.push(CornerRing {
            corners: drop_collinear(corners),
        });
    }

    Ok(rings)
}

fn drop_collinear(corners: Vec<Corner>) -> Vec<Corner> {
    let n = corners.len();
    if n < 4 {
        return corners;
    }
    let dir = |a: Corner, b: Corner| {
        (
            (b.0 as isize - a.0 as isize).signum(),
            (b.1 as isize - a.1 as isize).signum(),
        )
    };
    (0..n)
        .filter(|&i| {
            let prev = corners[(i + n - 1) % n];
            let next = corners[(i + 1) % n];
            dir(prev, corners[i]) != dir(corners[i], next)
        })
        .map(|i| corners[i])
        .collect()
}
