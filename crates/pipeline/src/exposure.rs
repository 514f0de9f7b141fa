//! Exposure pipeline
//!
//! Buildings and population are brought onto the hazard grid and combined
//! into a normalized exposure density, then classified and vectorized.

use crate::config::HazardConfig;
use crate::error::{Result, StageContext};
use crate::io::{empty_zones_warning, output_dir, publish_grid, publish_zones, read_grid, InputSource};
use crate::request::{ExposureOutputs, ExposureRequest, PipelineWarning};
use georisk_algorithms::classify::classify;
use georisk_algorithms::exposure::{exposed_buildings, exposure_density, rasterize, ExposureInputs, MergeAlg};
use georisk_algorithms::grid::{resample_to, Resampling};
use georisk_algorithms::vectorize::{vectorize, VectorizeOptions, ZoneCollection};
use georisk_core::io::read_features;
use georisk_core::vector::FeatureCollection;
use georisk_core::{CancellationToken, Raster};
use std::collections::BTreeMap;

const PIPELINE: &str = "exposure";

pub const DENSITY_FILE: &str = "exposure_density.tif";
pub const CLASSIFIED_FILE: &str = "exposure_classified.tif";
pub const ZONES_FILE: &str = "exposure_zones.geojson";

#[derive(Debug, Clone)]
pub struct ExposureAssessment {
    /// Buildings burned onto the hazard grid
    pub structures: Raster<f64>,
    pub density: Raster<f64>,
    pub classified: Raster<u8>,
    pub zones: ZoneCollection,
    /// Buildings touching each class of the hazard grid, by class label;
    /// empty without buildings
    pub exposed_buildings: BTreeMap<String, usize>,
    pub warnings: Vec<PipelineWarning>,
}

/// Run the exposure analysis on in-memory data.
///
/// Missing buildings give a zero structure grid and a warning; population,
/// when present, is resampled onto the hazard grid.
pub fn assess_exposure(
    config: &HazardConfig,
    hazard: &Raster<f64>,
    buildings: Option<&FeatureCollection>,
    population: Option<&Raster<f64>>,
    cancel: &CancellationToken,
) -> Result<ExposureAssessment> {
    let mut warnings = Vec::new();

    let structures = match buildings {
        Some(fc) => rasterize(fc, hazard, &config.exposure.burn, MergeAlg::Add).stage(PIPELINE, "rasterize buildings")?,
        None => {
            tracing::warn!("no buildings supplied, structure density is zero");
            warnings.push(PipelineWarning::EmptyResult {
                pipeline: PIPELINE.to_string(),
                detail: "no buildings; structure density is zero".to_string(),
            });
            let mut zeros = hazard.like(0.0);
            zeros.set_nodata(Some(f64::NAN));
            zeros
        }
    };
    let exposed = match buildings {
        Some(fc) => {
            let scheme = &config.exposure.hazard_scheme;
            let hazard_classes = classify(hazard, scheme).stage(PIPELINE, "count buildings")?;
            exposed_buildings(fc, &hazard_classes)
                .stage(PIPELINE, "count buildings")?
                .into_iter()
                .map(|(class, n)| (scheme.label(class).unwrap_or("unclassified").to_string(), n))
                .collect()
        }
        None => BTreeMap::new(),
    };
    let population = population
        .map(|p| resample_to(p, hazard, Resampling::Bilinear))
        .transpose()
        .stage(PIPELINE, "align population")?;
    cancel.check().stage(PIPELINE, "rasterize buildings")?;

    let inputs = ExposureInputs {
        reference: hazard,
        structures: Some(&structures),
        population: population.as_ref(),
    };
    let density = exposure_density(&inputs, &config.exposure.weights).stage(PIPELINE, "density")?;

    let scheme = &config.exposure.scheme;
    let classified = classify(&density, scheme).stage(PIPELINE, "classify")?;
    let options = VectorizeOptions {
        connectivity: config.connectivity,
        classes: None,
    };
    let zones = vectorize(&classified, &scheme.labels, &options, cancel).stage(PIPELINE, "vectorize")?;
    warnings.extend(empty_zones_warning(PIPELINE, &zones, "no valid cells to classify"));
    tracing::info!(zones = zones.len(), "exposure assessed");

    Ok(ExposureAssessment {
        structures,
        density,
        classified,
        zones,
        exposed_buildings: exposed,
        warnings,
    })
}

/// Exposure pipeline over files. The hazard grid must exist; buildings and
/// population are optional.
pub fn run_exposure(
    config: &HazardConfig,
    request: &ExposureRequest,
    cancel: &CancellationToken,
) -> Result<ExposureOutputs> {
    tracing::info!("starting exposure pipeline");
    let hazard_path = InputSource::Requested(request.hazard_grid_path.clone()).resolve_required("hazard grid")?;
    let mut warnings = Vec::new();
    let buildings_path =
        InputSource::pick(request.buildings.as_ref(), &config.inputs.buildings).resolve_optional("buildings", &mut warnings)?;
    let population_path = InputSource::pick(request.population.as_ref(), &config.inputs.population)
        .resolve_optional("population", &mut warnings)?;

    let hazard = read_grid(config, &hazard_path, PIPELINE, "read hazard")?;
    let buildings = buildings_path
        .map(|p| read_features(&p).stage(PIPELINE, "read buildings"))
        .transpose()?;
    let population = population_path
        .map(|p| read_grid(config, &p, PIPELINE, "read population"))
        .transpose()?;

    let assessment = assess_exposure(config, &hazard, buildings.as_ref(), population.as_ref(), cancel)?;
    warnings.extend(assessment.warnings);

    let dir = output_dir(config, request.output_dir.as_ref(), PIPELINE)?;
    let density_grid_path = dir.join(DENSITY_FILE);
    let classified_grid_path = dir.join(CLASSIFIED_FILE);
    let zones_path = dir.join(ZONES_FILE);
    publish_grid(&assessment.density, &density_grid_path, cancel, PIPELINE)?;
    publish_grid(&assessment.classified, &classified_grid_path, cancel, PIPELINE)?;
    publish_zones(&assessment.zones, &zones_path, cancel, PIPELINE)?;

    tracing::info!(output_dir = %dir.display(), "exposure pipeline complete");
    Ok(ExposureOutputs {
        density_grid_path,
        classified_grid_path,
        zones_path,
        exposed_buildings: assessment.exposed_buildings,
        warnings,
    })
}
