//! Hazard engine configuration
//!
//! One immutable [`HazardConfig`] is built at startup (defaults, optionally
//! overridden from a JSON file) and passed by reference to every pipeline.

use crate::error::{PipelineError, Result};
use georisk_algorithms::classify::ClassScheme;
use georisk_algorithms::exposure::{BurnValue, ExposureWeights};
use georisk_algorithms::flood::{FloodParams, ThresholdMode, DEFAULT_THRESHOLD_DB};
use georisk_algorithms::grid::Normalization;
use georisk_algorithms::integrate::HazardWeights;
use georisk_algorithms::morphology::StructuringElement;
use georisk_algorithms::susceptibility::{ClassifierSettings, SamplingParams};
use georisk_algorithms::terrain::TerrainParams;
use georisk_algorithms::vectorize::Connectivity;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default location of each input layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputPaths {
    pub dem: PathBuf,
    pub landcover: PathBuf,
    pub rainfall: PathBuf,
    pub sar: PathBuf,
    pub buildings: PathBuf,
    pub population: PathBuf,
    pub landslide_inventory: PathBuf,
}

impl Default for InputPaths {
    fn default() -> Self {
        let raw = Path::new("data/raw");
        Self {
            dem: raw.join("dem.tif"),
            landcover: raw.join("landcover.tif"),
            rainfall: raw.join("rainfall.tif"),
            sar: raw.join("sentinel1_sar.tif"),
            buildings: raw.join("buildings.geojson"),
            population: raw.join("population.tif"),
            landslide_inventory: raw.join("landslide_inventory.geojson"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandslideConfig {
    pub classifier: ClassifierSettings,
    /// Share of samples held out for evaluation
    pub test_fraction: f64,
    pub sampling: SamplingParams,
    pub z_factor: f64,
    pub scheme: ClassScheme,
}

impl Default for LandslideConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierSettings::default(),
            test_fraction: 0.3,
            sampling: SamplingParams::default(),
            z_factor: 1.0,
            scheme: ClassScheme::five_class(),
        }
    }
}

impl LandslideConfig {
    pub fn terrain_params(&self) -> TerrainParams {
        TerrainParams {
            z_factor: self.z_factor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodConfig {
    /// Manual threshold (dB), also the fallback when Otsu finds no split
    pub threshold_db: f64,
    pub auto_threshold: bool,
    /// Metres; water above it is discarded
    pub elevation_ceiling: Option<f64>,
    pub element: StructuringElement,
    pub opening_iterations: usize,
    pub closing: bool,
    /// Map units squared
    pub min_flood_area: Option<f64>,
    pub scheme: ClassScheme,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            threshold_db: DEFAULT_THRESHOLD_DB,
            auto_threshold: true,
            elevation_ceiling: Some(100.0),
            element: StructuringElement::default(),
            opening_iterations: 1,
            closing: false,
            min_flood_area: None,
            scheme: ClassScheme::flood(),
        }
    }
}

impl FloodConfig {
    /// Detector parameters, with per-request threshold overrides
    pub fn params(&self, threshold_db: Option<f64>, auto: Option<bool>, connectivity: Connectivity) -> FloodParams {
        let db = threshold_db.unwrap_or(self.threshold_db);
        FloodParams {
            threshold: if auto.unwrap_or(self.auto_threshold) {
                ThresholdMode::Auto
            } else {
                ThresholdMode::Manual(db)
            },
            fallback_threshold_db: db,
            element: self.element,
            opening_iterations: self.opening_iterations,
            closing: self.closing,
            min_flood_area: self.min_flood_area,
            elevation_ceiling: self.elevation_ceiling,
            connectivity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureConfig {
    pub weights: ExposureWeights,
    /// Value each building burns into the structure grid
    pub burn: BurnValue,
    pub scheme: ClassScheme,
    /// Classes of the hazard grid that buildings are counted against
    pub hazard_scheme: ClassScheme,
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            weights: ExposureWeights::default(),
            burn: BurnValue::default(),
            scheme: ClassScheme::five_class(),
            hazard_scheme: ClassScheme::five_class(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiHazardConfig {
    pub weights: HazardWeights,
    pub normalization: Normalization,
    pub scheme: ClassScheme,
}

impl Default for MultiHazardConfig {
    fn default() -> Self {
        Self {
            weights: HazardWeights::default(),
            normalization: Normalization::MinMax,
            scheme: ClassScheme::five_class(),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardConfig {
    pub inputs: InputPaths,
    pub output_dir: PathBuf,
    pub model_path: PathBuf,
    /// No-data sentinel assumed for input grids that carry none
    pub raster_nodata: f64,
    pub landslide: LandslideConfig,
    pub flood: FloodConfig,
    pub exposure: ExposureConfig,
    pub multi_hazard: MultiHazardConfig,
    pub connectivity: Connectivity,
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            inputs: InputPaths::default(),
            output_dir: PathBuf::from("data/outputs"),
            model_path: PathBuf::from("models/landslide_model.json"),
            raster_nodata: -9999.0,
            landslide: LandslideConfig::default(),
            flood: FloodConfig::default(),
            exposure: ExposureConfig::default(),
            multi_hazard: MultiHazardConfig::default(),
            connectivity: Connectivity::Four,
        }
    }
}

impl HazardConfig {
    /// Load a JSON configuration; absent fields keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text).map_err(|e| match e {
            PipelineError::Config(reason) => PipelineError::Config(format!("{}: {}", path.display(), reason)),
            other => other,
        })
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Check every parameter that would otherwise fail mid-run
    pub fn validate(&self) -> Result<()> {
        let config_err = |e: georisk_core::Error| PipelineError::Config(e.to_string());

        let l = &self.landslide;
        if !(0.0..1.0).contains(&l.test_fraction) {
            return Err(PipelineError::Config(format!(
                "landslide.test_fraction must be in [0, 1), got {}",
                l.test_fraction
            )));
        }
        if l.classifier.n_estimators == 0 || l.classifier.max_depth == 0 {
            return Err(PipelineError::Config(
                "landslide.classifier needs at least one estimator of depth >= 1".to_string(),
            ));
        }
        l.classifier.resolve_kind().map_err(config_err)?;
        l.scheme.validate().map_err(config_err)?;

        self.flood
            .params(None, None, self.connectivity)
            .validate()
            .map_err(config_err)?;
        self.flood.scheme.validate().map_err(config_err)?;
        if self.flood.scheme.class_named("flood").is_none() {
            return Err(PipelineError::Config("flood.scheme needs a class labelled \"flood\"".to_string()));
        }

        self.exposure.weights.validate().map_err(config_err)?;
        self.exposure.scheme.validate().map_err(config_err)?;
        self.exposure.hazard_scheme.validate().map_err(config_err)?;
        self.multi_hazard.weights.validate().map_err(config_err)?;
        self.multi_hazard.scheme.validate().map_err(config_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = HazardConfig::default();
        config.validate().unwrap();
        assert_eq!(config.flood.threshold_db, -18.0);
        assert_eq!(config.landslide.classifier.n_estimators, 100);
        assert_eq!(config.multi_hazard.weights.get("flood"), 0.4);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = HazardConfig::from_json(
            r#"{
                "output_dir": "/tmp/out",
                "flood": { "auto_threshold": false, "threshold_db": -20.0 },
                "multi_hazard": { "weights": { "landslide": 1.0, "flood": 0.0 } }
            }"#,
        )
        .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.flood.elevation_ceiling, Some(100.0));
        let params = config.flood.params(None, None, config.connectivity);
        assert_eq!(params.threshold, ThresholdMode::Manual(-20.0));
        assert_eq!(config.multi_hazard.weights.get("exposure"), 0.0);
        assert_eq!(config.landslide.test_fraction, 0.3);
    }

    #[test]
    fn bad_values_rejected() {
        assert!(matches!(
            HazardConfig::from_json(r#"{ "landslide": { "test_fraction": 1.5 } }"#),
            Err(PipelineError::Config(_))
        ));
        assert!(matches!(
            HazardConfig::from_json(r#"{ "multi_hazard": { "weights": { "flood": -1.0 } } }"#),
            Err(PipelineError::Config(_))
        ));
        assert!(matches!(HazardConfig::from_json("not json"), Err(PipelineError::Config(_))));
    }

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = HazardConfig::default();
        std::fs::write(&path, config.to_json().unwrap()).unwrap();
        assert_eq!(HazardConfig::from_file(&path).unwrap(), config);
        assert!(HazardConfig::from_file(dir.path().join("missing.json")).is_err());
    }
}
