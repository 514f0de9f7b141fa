//! Reading inputs and publishing outputs for the file-based pipelines

use crate::config::HazardConfig;
use crate::error::{PipelineError, Result, StageContext};
use crate::request::PipelineWarning;
use georisk_algorithms::grid::standardize_nodata;
use georisk_algorithms::vectorize::ZoneCollection;
use georisk_core::io::{read_geotiff, write_geotiff};
use georisk_core::{CancellationToken, Raster, RasterElement};
use std::path::{Path, PathBuf};

/// Read a grid as `f64` with NaN no-data. Grids without a no-data tag use
/// the configured sentinel.
pub(crate) fn read_grid(
    config: &HazardConfig,
    path: &Path,
    pipeline: &'static str,
    stage: &'static str,
) -> Result<Raster<f64>> {
    let mut grid: Raster<f64> = read_geotiff(path).stage(pipeline, stage)?;
    if grid.nodata().is_none() {
        grid.set_nodata(Some(config.raster_nodata));
    }
    standardize_nodata(&grid).stage(pipeline, stage)
}

/// Where an input comes from
pub(crate) enum InputSource {
    /// Named in the request; must exist
    Requested(PathBuf),
    /// Configured default; may be absent
    Default(PathBuf),
}

impl InputSource {
    pub fn pick(requested: Option<&PathBuf>, default: &Path) -> Self {
        match requested {
            Some(p) => InputSource::Requested(p.clone()),
            None => InputSource::Default(default.to_path_buf()),
        }
    }

    /// Path of an optional input, or `None` with a warning when the default
    /// is absent. A requested path that does not exist is an invalid request.
    pub fn resolve_optional(self, input: &str, warnings: &mut Vec<PipelineWarning>) -> Result<Option<PathBuf>> {
        match self {
            InputSource::Requested(p) if p.exists() => Ok(Some(p)),
            InputSource::Requested(p) => Err(PipelineError::InvalidRequest(format!(
                "{} not found at {}",
                input,
                p.display()
            ))),
            InputSource::Default(p) if p.exists() => Ok(Some(p)),
            InputSource::Default(p) => {
                tracing::warn!(input, path = %p.display(), "optional input not found, continuing without it");
                warnings.push(PipelineWarning::MissingInput {
                    input: input.to_string(),
                    path: p,
                });
                Ok(None)
            }
        }
    }

    /// Path of a required input
    pub fn resolve_required(self, input: &str) -> Result<PathBuf> {
        let p = match self {
            InputSource::Requested(p) | InputSource::Default(p) => p,
        };
        if p.as_os_str().is_empty() || !p.exists() {
            return Err(PipelineError::InvalidRequest(format!(
                "{} not found at {}",
                input,
                p.display()
            )));
        }
        Ok(p)
    }
}

/// Output directory of a request, created if needed
pub(crate) fn output_dir(
    config: &HazardConfig,
    requested: Option<&PathBuf>,
    pipeline: &'static str,
) -> Result<PathBuf> {
    let dir = requested.cloned().unwrap_or_else(|| config.output_dir.clone());
    std::fs::create_dir_all(&dir)
        .map_err(georisk_core::Error::from)
        .stage(pipeline, "prepare output")?;
    Ok(dir)
}

/// Publish a grid atomically, unless the run was cancelled
pub(crate) fn publish_grid<T: RasterElement>(
    grid: &Raster<T>,
    path: &Path,
    cancel: &CancellationToken,
    pipeline: &'static str,
) -> Result<()> {
    cancel.check().stage(pipeline, "publish")?;
    write_geotiff(grid, path).stage(pipeline, "publish")
}

pub(crate) fn publish_zones(
    zones: &ZoneCollection,
    path: &Path,
    cancel: &CancellationToken,
    pipeline: &'static str,
) -> Result<()> {
    cancel.check().stage(pipeline, "publish")?;
    zones.write(path).stage(pipeline, "publish")
}

/// Warning for a run whose zones came out empty
pub(crate) fn empty_zones_warning(pipeline: &str, zones: &ZoneCollection, detail: &str) -> Option<PipelineWarning> {
    zones.is_empty().then(|| {
        tracing::warn!(pipeline, "{}", detail);
        PipelineWarning::EmptyResult {
            pipeline: pipeline.to_string(),
            detail: detail.to_string(),
        }
    })
}
