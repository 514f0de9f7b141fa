//! Persisted classifier artifact and the store that publishes it

use super::metrics::{accuracy, roc_auc, stratified_split, ModelMetrics};
use super::model::{ClassifierKind, ClassifierSettings, EnsembleModel};
use super::sampling::TrainingSet;
use georisk_core::io::publish_atomically;
use georisk_core::{CancellationToken, Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Current on-disk format
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// A trained susceptibility classifier with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedClassifier {
    pub format_version: u32,
    pub kind: ClassifierKind,
    /// Band names in the order the model expects them
    pub feature_names: Vec<String>,
    pub model: EnsembleModel,
    /// Hold-out scores; `None` when the test split was empty
    pub metrics: Option<ModelMetrics>,
    pub feature_importances: Vec<f64>,
    pub training_samples: usize,
}

impl TrainedClassifier {
    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        self.model.predict_proba(features)
    }

    /// Importances paired with their feature names
    pub fn importances(&self) -> impl Iterator<Item = (&str, f64)> {
        self.feature_names
            .iter()
            .map(String::as_str)
            .zip(self.feature_importances.iter().copied())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and structurally check an artifact
    pub fn from_json(text: &str) -> Result<Self> {
        let artifact: TrainedClassifier = serde_json::from_str(text)?;
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(Error::Other(format!(
                "unsupported model format version {} (expected {})",
                artifact.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        if artifact.model.n_features() != artifact.feature_names.len() {
            return Err(Error::Other(format!(
                "model expects {} features but lists {} names",
                artifact.model.n_features(),
                artifact.feature_names.len()
            )));
        }
        artifact.model.validate()?;
        Ok(artifact)
    }
}

/// Split, fit and evaluate a classifier on `set`.
///
/// The returned model is the one fitted on the training split; the
/// hold-out split only produces [`ModelMetrics`].
pub fn train_classifier(
    set: &TrainingSet,
    settings: &ClassifierSettings,
    test_fraction: f64,
    cancel: &CancellationToken,
) -> Result<TrainedClassifier> {
    if !(0.0..1.0).contains(&test_fraction) {
        return Err(Error::invalid_param("test_fraction", test_fraction, "must be in [0, 1)"));
    }
    let trainer = settings.trainer()?;
    let (train, test) = stratified_split(set, test_fraction, settings.seed);

    tracing::info!(
        classifier = trainer.name(),
        train = train.len(),
        test = test.len(),
        "training susceptibility classifier"
    );
    let fit = trainer.train(&train, cancel)?;

    let metrics = (!test.is_empty()).then(|| {
        let scores: Vec<f64> = test.samples.iter().map(|s| fit.model.predict_proba(s)).collect();
        ModelMetrics {
            accuracy: accuracy(&scores, &test.labels),
            roc_auc: roc_auc(&scores, &test.labels),
            test_samples: test.len(),
        }
    });
    match &metrics {
        Some(m) => tracing::info!(accuracy = m.accuracy, roc_auc = ?m.roc_auc, "hold-out evaluation"),
        None => tracing::warn!("hold-out split is empty; no metrics recorded"),
    }

    Ok(TrainedClassifier {
        format_version: ARTIFACT_FORMAT_VERSION,
        kind: fit.model.kind(),
        feature_names: set.feature_names.clone(),
        model: fit.model,
        metrics,
        feature_importances: fit.importances,
        training_samples: train.len(),
    })
}

/// File-backed home of the current classifier.
///
/// `load` hands out an immutable snapshot; `publish` replaces the file
/// atomically, so inference holding an older snapshot is unaffected.
#[derive(Debug, Clone)]
pub struct ModelStore {
    path: PathBuf,
}

impl ModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Current artifact, or [`Error::ModelUnavailable`] when none was published
    pub fn load(&self) -> Result<Arc<TrainedClassifier>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ModelUnavailable {
                    path: self.path.clone(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let artifact = TrainedClassifier::from_json(&text)?;
        tracing::debug!(path = %self.path.display(), kind = %artifact.kind, "model loaded");
        Ok(Arc::new(artifact))
    }

    pub fn publish(&self, artifact: &TrainedClassifier) -> Result<()> {
        publish_atomically(&self.path, |file| {
            let mut w = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut w, artifact)?;
            w.flush()?;
            Ok(())
        })?;
        tracing::info!(path = %self.path.display(), "model published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn set() -> TrainingSet {
        let mut set = TrainingSet::new(vec!["slope".into(), "curvature".into()]);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..200 {
            let slope: f64 = rng.gen_range(0.0..45.0);
            let curv: f64 = rng.gen_range(-1.0..1.0);
            set.push(vec![slope, curv], u8::from(slope > 25.0));
        }
        set
    }

    fn small_settings() -> ClassifierSettings {
        ClassifierSettings {
            n_estimators: 10,
            ..Default::default()
        }
    }

    #[test]
    fn training_records_metrics_and_names() {
        let trained = train_classifier(&set(), &small_settings(), 0.3, &CancellationToken::new()).unwrap();
        assert_eq!(trained.feature_names, ["slope", "curvature"]);
        let m = trained.metrics.unwrap();
        assert_eq!(trained.training_samples + m.test_samples, 200);
        assert!((58..=62).contains(&m.test_samples));
        assert!(m.accuracy > 0.9);
        assert!(m.roc_auc.unwrap() > 0.9);
        let top = trained.importances().max_by(|a, b| a.1.total_cmp(&b.1)).unwrap();
        assert_eq!(top.0, "slope");
    }

    #[test]
    fn store_reports_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("model.json"));
        assert!(!store.exists());
        assert!(matches!(store.load(), Err(Error::ModelUnavailable { .. })));
    }

    #[test]
    fn published_model_loads_identically() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("models").join("landslide.json"));
        let trained = train_classifier(&set(), &small_settings(), 0.3, &CancellationToken::new()).unwrap();

        store.publish(&trained).unwrap();
        let snapshot = store.load().unwrap();
        assert_eq!(*snapshot, trained);

        // A newer publish does not disturb the snapshot already handed out.
        let mut retrained = trained.clone();
        retrained.training_samples = 1;
        store.publish(&retrained).unwrap();
        assert_eq!(snapshot.training_samples, trained.training_samples);
        assert_eq!(store.load().unwrap().training_samples, 1);
    }

    #[test]
    fn rejects_foreign_versions() {
        let trained = train_classifier(&set(), &small_settings(), 0.0, &CancellationToken::new()).unwrap();
        assert!(trained.metrics.is_none());
        let mut json: serde_json::Value = serde_json::from_str(&trained.to_json().unwrap()).unwrap();
        json["format_version"] = serde_json::json!(99);
        assert!(TrainedClassifier::from_json(&json.to_string()).is_err());
    }
}
