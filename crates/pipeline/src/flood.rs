//! Flood mapping pipeline
//!
//! SAR backscatter → water mask (threshold, morphology, elevation ceiling)
//! → flood / no-flood classes → flood zones.

use crate::config::HazardConfig;
use crate::error::{PipelineError, Result, StageContext};
use crate::io::{empty_zones_warning, output_dir, publish_grid, publish_zones, read_grid, InputSource};
use crate::request::{FloodOutputs, FloodRequest, PipelineWarning};
use georisk_algorithms::classify::classify;
use georisk_algorithms::flood::{detect_flood, FloodParams, FloodResult};
use georisk_algorithms::vectorize::{vectorize, VectorizeOptions, ZoneCollection};
use georisk_core::{CancellationToken, Raster};

const PIPELINE: &str = "flood";

pub const EXTENT_FILE: &str = "flood_extent.tif";
pub const ZONES_FILE: &str = "flood_extent.geojson";

#[derive(Debug, Clone)]
pub struct FloodAssessment {
    /// 0/1 mask with statistics
    pub result: FloodResult,
    pub classified: Raster<u8>,
    /// Zones of the flood class only
    pub zones: ZoneCollection,
    pub warnings: Vec<PipelineWarning>,
}

/// Run flood detection on in-memory grids. `dem` must be co-registered with
/// `sar`.
pub fn assess_flood(
    config: &HazardConfig,
    sar: &Raster<f64>,
    dem: Option<&Raster<f64>>,
    params: &FloodParams,
    cancel: &CancellationToken,
) -> Result<FloodAssessment> {
    let result = detect_flood(sar, dem, params, cancel).stage(PIPELINE, "detect")?;

    let scheme = &config.flood.scheme;
    let classified = classify(&result.mask, scheme).stage(PIPELINE, "classify")?;
    let flood_class = scheme
        .class_named("flood")
        .ok_or_else(|| PipelineError::Config("flood.scheme needs a class labelled \"flood\"".to_string()))?;
    let options = VectorizeOptions {
        connectivity: config.connectivity,
        classes: Some(vec![flood_class]),
    };
    let zones = vectorize(&classified, &scheme.labels, &options, cancel).stage(PIPELINE, "vectorize")?;

    let mut warnings = Vec::new();
    if result.stats.is_empty() {
        tracing::warn!(threshold_db = result.stats.threshold_db, "no flooded cells detected");
        warnings.push(PipelineWarning::EmptyResult {
            pipeline: PIPELINE.to_string(),
            detail: format!("no water below {:.2} dB", result.stats.threshold_db),
        });
    } else {
        warnings.extend(empty_zones_warning(PIPELINE, &zones, "no flood zones"));
    }

    Ok(FloodAssessment {
        result,
        classified,
        zones,
        warnings,
    })
}

/// Flood pipeline over files. An empty flood extent is reported as a
/// warning and still produces an all-zero grid and an empty zone file.
pub fn run_flood(config: &HazardConfig, request: &FloodRequest, cancel: &CancellationToken) -> Result<FloodOutputs> {
    tracing::info!("starting flood mapping pipeline");
    if let Some(t) = request.threshold {
        if !t.is_finite() {
            return Err(PipelineError::InvalidRequest(format!("threshold must be finite, got {}", t)));
        }
    }
    let mut warnings = Vec::new();
    let sar_path = InputSource::pick(request.sar.as_ref(), &config.inputs.sar).resolve_required("sar")?;
    let dem_path = InputSource::pick(request.dem.as_ref(), &config.inputs.dem).resolve_optional("dem", &mut warnings)?;

    let params = config
        .flood
        .params(request.threshold, request.use_auto_threshold, config.connectivity);
    params
        .validate()
        .map_err(|e| PipelineError::InvalidRequest(e.to_string()))?;

    let sar = read_grid(config, &sar_path, PIPELINE, "read sar")?;
    let dem = dem_path
        .map(|p| read_grid(config, &p, PIPELINE, "read dem"))
        .transpose()?;

    let assessment = assess_flood(config, &sar, dem.as_ref(), &params, cancel)?;
    warnings.extend(assessment.warnings);

    let dir = output_dir(config, request.output_dir.as_ref(), PIPELINE)?;
    let flood_grid_path = dir.join(EXTENT_FILE);
    let zones_path = dir.join(ZONES_FILE);
    publish_grid(&assessment.result.mask, &flood_grid_path, cancel, PIPELINE)?;
    publish_zones(&assessment.zones, &zones_path, cancel, PIPELINE)?;

    tracing::info!(output_dir = %dir.display(), "flood mapping pipeline complete");
    Ok(FloodOutputs {
        flood_grid_path,
        zones_path,
        stats: assessment.result.stats,
        warnings,
    })
}
