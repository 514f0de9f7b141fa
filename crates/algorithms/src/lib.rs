//! # GeoRisk Algorithms
//!
//! Hazard analysis algorithms for GeoRisk.
//!
//! ## Algorithm Categories
//!
//! - **grid**: Alignment, resampling, normalization, no-data masking
//! - **terrain**: Slope, aspect, curvature
//! - **morphology**: Binary erosion, dilation, opening, closing
//! - **susceptibility**: Tree-ensemble training and probability prediction
//! - **flood**: SAR thresholding (Otsu or manual) with morphological cleanup
//! - **exposure**: Feature rasterization and exposure density
//! - **integrate**: Weighted multi-hazard fusion
//! - **classify**: Breakpoint classification into ordinal classes
//! - **vectorize**: Connected-region polygons from classified grids

pub(crate) mod maybe_rayon;

pub mod classify;
pub mod exposure;
pub mod flood;
pub mod grid;
pub mod integrate;
pub mod morphology;
pub mod susceptibility;
pub mod terrain;
pub mod vectorize;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classify::{classify, ClassScheme};
    pub use crate::exposure::{
        exposed_buildings, exposure_density, rasterize, BurnValue, ExposureInputs, ExposureWeights, MergeAlg,
    };
    pub use crate::flood::{detect_flood, otsu_threshold, FloodParams, FloodResult, FloodStatistics, ThresholdMode};
    pub use crate::grid::{
        align, apply_mask, normalize, normalize_min_max, normalize_with, resample_to, standardize_nodata,
        Normalization, Resampling,
    };
    pub use crate::integrate::{integrate, HazardWeights};
    pub use crate::morphology::{closing, dilate, erode, opening, StructuringElement};
    pub use crate::susceptibility::{
        predict_susceptibility, sample_training_set, train_classifier, ClassifierKind, ClassifierSettings,
        FeatureStack, ModelStore, SamplingParams, TrainedClassifier, TrainingSet,
    };
    pub use crate::terrain::{aspect, curvature, slope, terrain_features, TerrainFeatures, TerrainParams};
    pub use crate::vectorize::{rasterize_zones, vectorize, Connectivity, VectorizeOptions, Zone, ZoneCollection};
    pub use georisk_core::prelude::*;
}
