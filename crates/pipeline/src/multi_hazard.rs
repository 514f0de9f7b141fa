//! Multi-hazard integration pipeline

use crate::config::HazardConfig;
use crate::error::{PipelineError, Result, StageContext};
use crate::io::{empty_zones_warning, output_dir, publish_grid, publish_zones, read_grid, InputSource};
use crate::request::{MultiHazardOutputs, MultiHazardRequest, PipelineWarning};
use georisk_algorithms::classify::classify;
use georisk_algorithms::integrate::{integrate, HazardWeights};
use georisk_algorithms::vectorize::{vectorize, VectorizeOptions, ZoneCollection};
use georisk_core::{CancellationToken, Raster};

const PIPELINE: &str = "multi-hazard";

pub const RISK_FILE: &str = "multi_hazard_risk.tif";
pub const CLASSIFIED_FILE: &str = "multi_hazard_risk_classified.tif";
pub const ZONES_FILE: &str = "multi_hazard_risk.geojson";

#[derive(Debug, Clone)]
pub struct MultiHazardAssessment {
    pub risk: Raster<f64>,
    pub classified: Raster<u8>,
    pub zones: ZoneCollection,
    pub warnings: Vec<PipelineWarning>,
}

/// Fuse co-registered hazard grids and classify the composite.
pub fn assess_multi_hazard(
    config: &HazardConfig,
    landslide: &Raster<f64>,
    flood: &Raster<f64>,
    exposure: Option<&Raster<f64>>,
    weights: &HazardWeights,
    cancel: &CancellationToken,
) -> Result<MultiHazardAssessment> {
    let mut hazards = vec![("landslide", landslide), ("flood", flood)];
    if let Some(exposure) = exposure {
        hazards.push(("exposure", exposure));
    }
    let risk = integrate(&hazards, weights, config.multi_hazard.normalization).stage(PIPELINE, "integrate")?;
    cancel.check().stage(PIPELINE, "integrate")?;

    let scheme = &config.multi_hazard.scheme;
    let classified = classify(&risk, scheme).stage(PIPELINE, "classify")?;
    let options = VectorizeOptions {
        connectivity: config.connectivity,
        classes: None,
    };
    let zones = vectorize(&classified, &scheme.labels, &options, cancel).stage(PIPELINE, "vectorize")?;
    let warnings = empty_zones_warning(PIPELINE, &zones, "composite has no valid cells")
        .into_iter()
        .collect();

    Ok(MultiHazardAssessment {
        risk,
        classified,
        zones,
        warnings,
    })
}

/// Multi-hazard pipeline over files. The landslide and flood grids are
/// required; a missing exposure grid leaves exposure out of the composite.
pub fn run_multi_hazard(
    config: &HazardConfig,
    request: &MultiHazardRequest,
    cancel: &CancellationToken,
) -> Result<MultiHazardOutputs> {
    tracing::info!("starting multi-hazard integration pipeline");
    let weights = request.weights.as_ref().unwrap_or(&config.multi_hazard.weights);
    weights
        .validate()
        .map_err(|e| PipelineError::InvalidRequest(e.to_string()))?;

    let mut warnings = Vec::new();
    let landslide_path = InputSource::Requested(request.landslide.clone()).resolve_required("landslide grid")?;
    let flood_path = InputSource::Requested(request.flood.clone()).resolve_required("flood grid")?;
    let exposure_path = match &request.exposure {
        Some(p) => InputSource::Default(p.clone()).resolve_optional("exposure grid", &mut warnings)?,
        None => None,
    };

    let landslide = read_grid(config, &landslide_path, PIPELINE, "read landslide")?;
    let flood = read_grid(config, &flood_path, PIPELINE, "read flood")?;
    let exposure = exposure_path
        .map(|p| read_grid(config, &p, PIPELINE, "read exposure"))
        .transpose()?;

    let assessment = assess_multi_hazard(config, &landslide, &flood, exposure.as_ref(), weights, cancel)?;
    warnings.extend(assessment.warnings);

    let dir = output_dir(config, request.output_dir.as_ref(), PIPELINE)?;
    let risk_grid_path = dir.join(RISK_FILE);
    let classified_grid_path = dir.join(CLASSIFIED_FILE);
    let zones_path = dir.join(ZONES_FILE);
    publish_grid(&assessment.risk, &risk_grid_path, cancel, PIPELINE)?;
    publish_grid(&assessment.classified, &classified_grid_path, cancel, PIPELINE)?;
    publish_zones(&assessment.zones, &zones_path, cancel, PIPELINE)?;

    tracing::info!(output_dir = %dir.display(), "multi-hazard integration complete");
    Ok(MultiHazardOutputs {
        risk_grid_path,
        classified_grid_path,
        zones_path,
        warnings,
    })
}
