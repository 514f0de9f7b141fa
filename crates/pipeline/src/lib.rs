//! # GeoRisk Pipeline
//!
//! The four hazard pipelines of the GeoRisk engine.
//!
//! - `run_landslide`: terrain features + tree-ensemble susceptibility
//! - `run_flood`: SAR water detection
//! - `run_exposure`: structure and population exposure on a hazard grid
//! - `run_multi_hazard`: weighted fusion of the hazard grids
//!
//! Each `run_*` reads its inputs, calls the matching in-memory `assess_*`
//! core and publishes a probability or density grid, a classified grid and
//! a GeoJSON zone file. All of them take one immutable [`HazardConfig`].

pub mod config;
pub mod error;
pub mod exposure;
pub mod flood;
mod io;
pub mod landslide;
pub mod multi_hazard;
pub mod report;
pub mod request;
pub mod run_all;

pub use config::HazardConfig;
pub use error::{PipelineError, Result};
pub use exposure::{assess_exposure, run_exposure, ExposureAssessment};
pub use flood::{assess_flood, run_flood, FloodAssessment};
pub use landslide::{assess_landslide, landslide_feature_stack, run_landslide, LandslideAssessment, LandslideInputs, ModelSource};
pub use multi_hazard::{assess_multi_hazard, run_multi_hazard, MultiHazardAssessment};
pub use report::{PipelineReport, ReportStatus};
pub use request::{
    ExposureOutputs, ExposureRequest, FloodOutputs, FloodRequest, LandslideOutputs, LandslideRequest,
    MultiHazardOutputs, MultiHazardRequest, PipelineOutputs, PipelineWarning,
};
pub use run_all::{run_all, RunAllOutputs};
