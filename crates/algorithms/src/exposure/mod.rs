//! Exposure analysis
//!
//! Vector layers (buildings, population points) are burned onto the hazard
//! grid and combined into a single normalized exposure density. Buildings
//! can also be counted per hazard class.

mod count;
mod density;
mod rasterize;

pub use count::exposed_buildings;
pub use density::{exposure_density, ExposureInputs, ExposureWeights};
pub use rasterize::{rasterize, BurnValue, MergeAlg};

pub(crate) use rasterize::for_each_covered_cell;
