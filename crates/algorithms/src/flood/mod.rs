//! SAR flood detection
//!
//! Open water has low radar backscatter. A threshold (Otsu or fixed) gives a
//! provisional water mask which is cleaned morphologically and masked by
//! elevation.

mod detect;
mod otsu;

pub use detect::{
    detect_flood, FloodDetector, FloodParams, FloodResult, FloodStatistics, ThresholdMode, DEFAULT_THRESHOLD_DB,
};
pub use otsu::{otsu_threshold, OTSU_BINS};
