//! Landslide susceptibility pipeline
//!
//! DEM → slope, aspect, curvature (+ landcover, rainfall when available) →
//! tree-ensemble probability → five susceptibility classes → zones.

use crate::config::HazardConfig;
use crate::error::{PipelineError, Result, StageContext};
use crate::io::{empty_zones_warning, output_dir, publish_grid, publish_zones, read_grid, InputSource};
use crate::request::{LandslideOutputs, LandslideRequest, PipelineWarning};
use georisk_algorithms::classify::classify;
use georisk_algorithms::grid::{resample_to, Resampling};
use georisk_algorithms::susceptibility::{
    predict_susceptibility, sample_training_set, train_classifier, FeatureStack, ModelStore, TrainedClassifier,
};
use georisk_algorithms::terrain::terrain_features;
use georisk_algorithms::vectorize::{vectorize, VectorizeOptions, ZoneCollection};
use georisk_core::io::read_features;
use georisk_core::vector::FeatureCollection;
use georisk_core::{CancellationToken, Raster};
use std::sync::Arc;

const PIPELINE: &str = "landslide";

pub const PROBABILITY_FILE: &str = "landslide_susceptibility_probability.tif";
pub const CLASSIFIED_FILE: &str = "landslide_susceptibility_classified.tif";
pub const ZONES_FILE: &str = "landslide_susceptibility_zones.geojson";

/// Grids feeding the susceptibility model. Optional layers are resampled
/// onto the DEM grid.
#[derive(Debug, Clone)]
pub struct LandslideInputs {
    pub dem: Raster<f64>,
    pub landcover: Option<Raster<f64>>,
    pub rainfall: Option<Raster<f64>>,
}

/// Where the classifier comes from
#[derive(Debug, Clone)]
pub enum ModelSource<'a> {
    /// Fit a new model on an event inventory
    Train(&'a FeatureCollection),
    /// Use an already trained model
    Trained(Arc<TrainedClassifier>),
}

#[derive(Debug, Clone)]
pub struct LandslideAssessment {
    pub probability: Raster<f64>,
    pub classified: Raster<u8>,
    pub zones: ZoneCollection,
    pub classifier: Arc<TrainedClassifier>,
    /// Whether `classifier` was trained in this run
    pub trained: bool,
    pub warnings: Vec<PipelineWarning>,
}

/// Build the named feature stack: slope, aspect, curvature, then landcover
/// and rainfall when supplied.
pub fn landslide_feature_stack(config: &HazardConfig, inputs: &LandslideInputs) -> Result<FeatureStack> {
    let terrain = terrain_features(&inputs.dem, config.landslide.terrain_params()).stage(PIPELINE, "terrain")?;
    let mut bands = vec![
        ("slope".to_string(), terrain.slope),
        ("aspect".to_string(), terrain.aspect),
        ("curvature".to_string(), terrain.curvature),
    ];
    if let Some(landcover) = &inputs.landcover {
        // categorical, so no interpolation
        let grid = resample_to(landcover, &inputs.dem, Resampling::Nearest).stage(PIPELINE, "align landcover")?;
        bands.push(("landcover".to_string(), grid));
    }
    if let Some(rainfall) = &inputs.rainfall {
        let grid = resample_to(rainfall, &inputs.dem, Resampling::Bilinear).stage(PIPELINE, "align rainfall")?;
        bands.push(("rainfall".to_string(), grid));
    }
    FeatureStack::new(bands).stage(PIPELINE, "stack features")
}

/// Run the landslide analysis on in-memory grids.
pub fn assess_landslide(
    config: &HazardConfig,
    inputs: &LandslideInputs,
    model: ModelSource<'_>,
    cancel: &CancellationToken,
) -> Result<LandslideAssessment> {
    let stack = landslide_feature_stack(config, inputs)?;
    cancel.check().stage(PIPELINE, "terrain")?;

    let (classifier, trained) = match model {
        ModelSource::Train(inventory) => {
            let set = sample_training_set(&stack, inventory, &config.landslide.sampling).stage(PIPELINE, "sample")?;
            tracing::info!(
                positives = set.n_positive(),
                negatives = set.n_negative(),
                features = ?stack.names(),
                "training samples drawn"
            );
            let model = train_classifier(
                &set,
                &config.landslide.classifier,
                config.landslide.test_fraction,
                cancel,
            )
            .stage(PIPELINE, "train")?;
            (Arc::new(model), true)
        }
        ModelSource::Trained(model) => (model, false),
    };

    let probability = predict_susceptibility(&stack, &classifier, cancel).stage(PIPELINE, "predict")?;
    let scheme = &config.landslide.scheme;
    let classified = classify(&probability, scheme).stage(PIPELINE, "classify")?;
    let options = VectorizeOptions {
        connectivity: config.connectivity,
        classes: None,
    };
    let zones = vectorize(&classified, &scheme.labels, &options, cancel).stage(PIPELINE, "vectorize")?;

    let warnings = empty_zones_warning(PIPELINE, &zones, "no valid cells to classify")
        .into_iter()
        .collect();
    tracing::info!(zones = zones.len(), trained, "landslide susceptibility assessed");

    Ok(LandslideAssessment {
        probability,
        classified,
        zones,
        classifier,
        trained,
        warnings,
    })
}

/// Landslide pipeline over files.
///
/// Without `train_model` the stored model must exist, otherwise the run
/// fails with `ModelUnavailable` before any grid is read. A trained model is
/// published only after the whole run succeeds.
pub fn run_landslide(
    config: &HazardConfig,
    request: &LandslideRequest,
    cancel: &CancellationToken,
) -> Result<LandslideOutputs> {
    tracing::info!("starting landslide susceptibility pipeline");
    let mut warnings = Vec::new();
    let inputs = &config.inputs;

    let dem_path = InputSource::pick(request.dem.as_ref(), &inputs.dem).resolve_required("dem")?;
    let landcover_path =
        InputSource::pick(request.landcover.as_ref(), &inputs.landcover).resolve_optional("landcover", &mut warnings)?;
    let rainfall_path =
        InputSource::pick(request.rainfall.as_ref(), &inputs.rainfall).resolve_optional("rainfall", &mut warnings)?;

    let store = ModelStore::new(&config.model_path);
    let inventory = if request.train_model {
        let path = InputSource::pick(request.inventory.as_ref(), &inputs.landslide_inventory)
            .resolve_required("landslide inventory")
            .map_err(|e| match e {
                PipelineError::InvalidRequest(reason) => {
                    PipelineError::InvalidRequest(format!("{}; cannot train a model without it", reason))
                }
                other => other,
            })?;
        Some(read_features(&path).stage(PIPELINE, "read inventory")?)
    } else {
        None
    };
    let model = match &inventory {
        Some(inventory) => ModelSource::Train(inventory),
        None => ModelSource::Trained(store.load().stage(PIPELINE, "load model")?),
    };

    let grids = LandslideInputs {
        dem: read_grid(config, &dem_path, PIPELINE, "read dem")?,
        landcover: landcover_path
            .map(|p| read_grid(config, &p, PIPELINE, "read landcover"))
            .transpose()?,
        rainfall: rainfall_path
            .map(|p| read_grid(config, &p, PIPELINE, "read rainfall"))
            .transpose()?,
    };

    let assessment = assess_landslide(config, &grids, model, cancel)?;
    warnings.extend(assessment.warnings);

    let dir = output_dir(config, request.output_dir.as_ref(), PIPELINE)?;
    let probability_grid_path = dir.join(PROBABILITY_FILE);
    let classified_grid_path = dir.join(CLASSIFIED_FILE);
    let zones_path = dir.join(ZONES_FILE);
    publish_grid(&assessment.probability, &probability_grid_path, cancel, PIPELINE)?;
    publish_grid(&assessment.classified, &classified_grid_path, cancel, PIPELINE)?;
    publish_zones(&assessment.zones, &zones_path, cancel, PIPELINE)?;
    if assessment.trained {
        store.publish(&assessment.classifier).stage(PIPELINE, "publish model")?;
    }

    tracing::info!(output_dir = %dir.display(), "landslide susceptibility pipeline complete");
    Ok(LandslideOutputs {
        probability_grid_path,
        classified_grid_path,
        zones_path,
        metrics: assessment.classifier.metrics.clone(),
        warnings,
    })
}
