//! Reading and writing grids and feature collections

mod features;
mod geotiff;
mod publish;

pub use features::{parse_features, read_features, to_geojson, write_features};
pub use geotiff::{read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer};
pub use publish::publish_atomically;
