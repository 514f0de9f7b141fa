//! Typed pipeline requests and results
//!
//! Every optional path falls back to the matching entry of
//! [`HazardConfig`](crate::HazardConfig). Requests are validated before any
//! grid is read.

use georisk_algorithms::flood::FloodStatistics;
use georisk_algorithms::integrate::HazardWeights;
use georisk_algorithms::susceptibility::ModelMetrics;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Non-fatal conditions worth reporting alongside the outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineWarning {
    /// A run finished but produced no hazard cells or zones
    EmptyResult { pipeline: String, detail: String },
    /// An optional input was not found and was left out
    MissingInput { input: String, path: PathBuf },
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineWarning::EmptyResult { pipeline, detail } => write!(f, "{} produced an empty result: {}", pipeline, detail),
            PipelineWarning::MissingInput { input, path } => {
                write!(f, "optional input {} not found at {}", input, path.display())
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandslideRequest {
    /// Train and publish a new model instead of loading the stored one
    pub train_model: bool,
    pub dem: Option<PathBuf>,
    pub landcover: Option<PathBuf>,
    pub rainfall: Option<PathBuf>,
    pub inventory: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodRequest {
    /// Manual threshold in dB
    pub threshold: Option<f64>,
    pub use_auto_threshold: Option<bool>,
    pub sar: Option<PathBuf>,
    pub dem: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureRequest {
    /// Grid defining the lattice of the exposure outputs
    pub hazard_grid_path: PathBuf,
    pub buildings: Option<PathBuf>,
    pub population: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiHazardRequest {
    pub landslide: PathBuf,
    pub flood: PathBuf,
    pub exposure: Option<PathBuf>,
    /// Replaces the configured weights when set
    pub weights: Option<HazardWeights>,
    pub output_dir: Option<PathBuf>,
}

/// Files written by a pipeline and what happened along the way
pub trait PipelineOutputs {
    /// Output name to path
    fn paths(&self) -> BTreeMap<String, PathBuf>;
    fn warnings(&self) -> &[PipelineWarning];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandslideOutputs {
    pub probability_grid_path: PathBuf,
    pub classified_grid_path: PathBuf,
    pub zones_path: PathBuf,
    /// Hold-out metrics of the model used
    pub metrics: Option<ModelMetrics>,
    pub warnings: Vec<PipelineWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloodOutputs {
    pub flood_grid_path: PathBuf,
    pub zones_path: PathBuf,
    pub stats: FloodStatistics,
    pub warnings: Vec<PipelineWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureOutputs {
    pub density_grid_path: PathBuf,
    pub classified_grid_path: PathBuf,
    pub zones_path: PathBuf,
    /// Buildings touching each hazard class, by class label
    pub exposed_buildings: BTreeMap<String, usize>,
    pub warnings: Vec<PipelineWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiHazardOutputs {
    pub risk_grid_path: PathBuf,
    pub classified_grid_path: PathBuf,
    pub zones_path: PathBuf,
    pub warnings: Vec<PipelineWarning>,
}

fn named(entries: &[(&str, &PathBuf)]) -> BTreeMap<String, PathBuf> {
    entries.iter().map(|(k, p)| (k.to_string(), (*p).clone())).collect()
}

impl PipelineOutputs for LandslideOutputs {
    fn paths(&self) -> BTreeMap<String, PathBuf> {
        named(&[
            ("probability", &self.probability_grid_path),
            ("classified_raster", &self.classified_grid_path),
            ("geojson", &self.zones_path),
        ])
    }

    fn warnings(&self) -> &[PipelineWarning] {
        &self.warnings
    }
}

impl PipelineOutputs for FloodOutputs {
    fn paths(&self) -> BTreeMap<String, PathBuf> {
        named(&[("flood_extent", &self.flood_grid_path), ("geojson", &self.zones_path)])
    }

    fn warnings(&self) -> &[PipelineWarning] {
        &self.warnings
    }
}

impl PipelineOutputs for ExposureOutputs {
    fn paths(&self) -> BTreeMap<String, PathBuf> {
        named(&[
            ("exposure_density", &self.density_grid_path),
            ("classified_raster", &self.classified_grid_path),
            ("geojson", &self.zones_path),
        ])
    }

    fn warnings(&self) -> &[PipelineWarning] {
        &self.warnings
    }
}

impl PipelineOutputs for MultiHazardOutputs {
    fn paths(&self) -> BTreeMap<String, PathBuf> {
        named(&[
            ("risk_raster", &self.risk_grid_path),
            ("classified_raster", &self.classified_grid_path),
            ("geojson", &self.zones_path),
        ])
    }

    fn warnings(&self) -> &[PipelineWarning] {
        &self.warnings
    }
}
