//! Raster-to-polygon conversion of classified grids
//!
//! Regions are labelled by flood fill, their boundaries traced along cell
//! edges and assembled into polygons that carry the class of the region.
//! No simplification is applied beyond dropping collinear vertices, so
//! re-rasterizing the zones on the same grid reproduces it exactly.

mod regions;
mod trace;
mod zones;

pub use regions::{label_regions, sieve, Connectivity, Region, RegionMap};
pub use zones::{
    rasterize_zones, vectorize, VectorizeOptions, Zone, ZoneCollection, AREA, CELL_COUNT, CLASS_INDEX, CLASS_LABEL,
};
