//! All four pipelines in dependency order

use crate::config::HazardConfig;
use crate::error::Result;
use crate::exposure::run_exposure;
use crate::flood::run_flood;
use crate::landslide::run_landslide;
use crate::multi_hazard::run_multi_hazard;
use crate::request::{
    ExposureOutputs, ExposureRequest, FloodOutputs, FloodRequest, LandslideOutputs, LandslideRequest,
    MultiHazardOutputs, MultiHazardRequest,
};
use georisk_core::CancellationToken;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunAllOutputs {
    pub landslide: LandslideOutputs,
    pub flood: FloodOutputs,
    pub exposure: ExposureOutputs,
    pub multi_hazard: MultiHazardOutputs,
}

/// Run landslide and flood concurrently, then exposure over the landslide
/// probability, then the multi-hazard composite. Inputs come from `config`;
/// all outputs go to `output_dir` (or the configured one).
///
/// Stops at the first failing pipeline; a failure in one of the concurrent
/// pair cancels the other through a run-local child of `cancel`, so the
/// caller's token stays usable.
pub fn run_all(
    config: &HazardConfig,
    train_model: bool,
    output_dir: Option<PathBuf>,
    cancel: &CancellationToken,
) -> Result<RunAllOutputs> {
    let landslide_request = LandslideRequest {
        train_model,
        output_dir: output_dir.clone(),
        ..Default::default()
    };
    let flood_request = FloodRequest {
        output_dir: output_dir.clone(),
        ..Default::default()
    };

    let run = cancel.child();
    let (landslide, flood) = rayon::join(
        || {
            let r = run_landslide(config, &landslide_request, &run);
            if r.is_err() {
                run.cancel();
            }
            r
        },
        || {
            let r = run_flood(config, &flood_request, &run);
            if r.is_err() {
                run.cancel();
            }
            r
        },
    );
    // report the real failure rather than the cancellation it caused
    let (landslide, flood) = match (landslide, flood) {
        (Ok(l), Ok(f)) => (l, f),
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => return Err(e),
        (Err(l), Err(f)) => return Err(if l.is_cancelled() { f } else { l }),
    };

    let exposure = run_exposure(
        config,
        &ExposureRequest {
            hazard_grid_path: landslide.probability_grid_path.clone(),
            output_dir: output_dir.clone(),
            ..Default::default()
        },
        &run,
    )?;

    let multi_hazard = run_multi_hazard(
        config,
        &MultiHazardRequest {
            landslide: landslide.probability_grid_path.clone(),
            flood: flood.flood_grid_path.clone(),
            exposure: Some(exposure.density_grid_path.clone()),
            weights: None,
            output_dir,
        },
        &run,
    )?;

    Ok(RunAllOutputs {
        landslide,
        flood,
        exposure,
        multi_hazard,
    })
}
