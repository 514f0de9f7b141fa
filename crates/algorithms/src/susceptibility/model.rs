//! Classifier capability: trainers, fitted ensembles and variant selection

#[cfg(feature = "boosting")]
use super::boosting::{BoostingParams, GradientBoosting, GradientBoostingTrainer};
use super::forest::{ForestParams, RandomForest, RandomForestTrainer};
use super::sampling::TrainingSet;
use georisk_core::{CancellationToken, Error, Result};
use serde::{Deserialize, Serialize};

/// Ensemble variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    #[default]
    RandomForest,
    GradientBoosting,
}

impl ClassifierKind {
    /// Whether this build can train the variant
    pub const fn is_available(self) -> bool {
        match self {
            ClassifierKind::RandomForest => true,
            ClassifierKind::GradientBoosting => cfg!(feature = "boosting"),
        }
    }
}

impl std::fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifierKind::RandomForest => write!(f, "random_forest"),
            ClassifierKind::GradientBoosting => write!(f, "gradient_boosting"),
        }
    }
}

/// A fitted ensemble producing class-1 probabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnsembleModel {
    RandomForest(RandomForest),
    #[cfg(feature = "boosting")]
    GradientBoosting(GradientBoosting),
}

impl EnsembleModel {
    /// Probability in [0, 1] that `features` belongs to class 1
    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        match self {
            EnsembleModel::RandomForest(m) => m.predict_proba(features),
            #[cfg(feature = "boosting")]
            EnsembleModel::GradientBoosting(m) => m.predict_proba(features),
        }
    }

    pub fn kind(&self) -> ClassifierKind {
        match self {
            EnsembleModel::RandomForest(_) => ClassifierKind::RandomForest,
            #[cfg(feature = "boosting")]
            EnsembleModel::GradientBoosting(_) => ClassifierKind::GradientBoosting,
        }
    }

    pub fn n_features(&self) -> usize {
        match self {
            EnsembleModel::RandomForest(m) => m.n_features(),
            #[cfg(feature = "boosting")]
            EnsembleModel::GradientBoosting(m) => m.n_features(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            EnsembleModel::RandomForest(m) => m.validate(),
            #[cfg(feature = "boosting")]
            EnsembleModel::GradientBoosting(m) => m.validate(),
        }
    }
}

/// Model plus normalized impurity-decrease importances (one per feature)
#[derive(Debug, Clone)]
pub struct EnsembleFit {
    pub model: EnsembleModel,
    pub importances: Vec<f64>,
}

/// Something that can fit an [`EnsembleModel`] to labelled samples
pub trait EnsembleTrainer: Send + Sync {
    fn name(&self) -> &'static str;

    fn train(&self, set: &TrainingSet, cancel: &CancellationToken) -> Result<EnsembleFit>;
}

/// Classifier selection and hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub kind: ClassifierKind,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Boosting only
    pub learning_rate: f64,
    pub seed: u64,
    /// Use the random forest when the requested variant is not compiled in
    pub allow_fallback: bool,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            kind: ClassifierKind::RandomForest,
            n_estimators: 100,
            max_depth: 10,
            min_samples_leaf: 1,
            learning_rate: 0.1,
            seed: 42,
            allow_fallback: false,
        }
    }
}

impl ClassifierSettings {
    /// The variant that will actually be trained.
    ///
    /// An unavailable variant is an error unless `allow_fallback` is set, in
    /// which case the switch to the random forest is logged.
    pub fn resolve_kind(&self) -> Result<ClassifierKind> {
        if self.kind.is_available() {
            return Ok(self.kind);
        }
        if self.allow_fallback {
            tracing::warn!(
                requested = %self.kind,
                "classifier not compiled into this build, falling back to random_forest"
            );
            Ok(ClassifierKind::RandomForest)
        } else {
            Err(Error::invalid_param(
                "classifier",
                self.kind,
                "not available in this build (enable the `boosting` feature or set allow_fallback)",
            ))
        }
    }

    /// Build the trainer for the resolved variant
    pub fn trainer(&self) -> Result<Box<dyn EnsembleTrainer>> {
        let forest = || {
            Box::new(RandomForestTrainer::new(ForestParams {
                n_estimators: self.n_estimators,
                max_depth: self.max_depth,
                min_samples_leaf: self.min_samples_leaf,
                seed: self.seed,
                ..Default::default()
            })) as Box<dyn EnsembleTrainer>
        };

        match self.resolve_kind()? {
            ClassifierKind::RandomForest => Ok(forest()),
            #[cfg(feature = "boosting")]
            ClassifierKind::GradientBoosting => Ok(Box::new(GradientBoostingTrainer::new(BoostingParams {
                n_estimators: self.n_estimators,
                learning_rate: self.learning_rate,
                // shallow trees suit boosting; never deeper than configured
                max_depth: self.max_depth.min(BoostingParams::default().max_depth),
                min_samples_leaf: self.min_samples_leaf,
                seed: self.seed,
                ..Default::default()
            }))),
            #[cfg(not(feature = "boosting"))]
            ClassifierKind::GradientBoosting => Ok(forest()),
        }
    }
}

/// Scale importances to sum to one (all zero stays all zero)
pub(crate) fn normalize_importances(mut importances: Vec<f64>) -> Vec<f64> {
    let total: f64 = importances.iter().sum();
    if total > 0.0 {
        importances.iter_mut().for_each(|v| *v /= total);
    }
    importances
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forest_always_resolves() {
        let s = ClassifierSettings::default();
        assert_eq!(s.resolve_kind().unwrap(), ClassifierKind::RandomForest);
        assert_eq!(s.trainer().unwrap().name(), "random_forest");
    }

    #[cfg(feature = "boosting")]
    #[test]
    fn boosting_selected_when_compiled() {
        let s = ClassifierSettings {
            kind: ClassifierKind::GradientBoosting,
            ..Default::default()
        };
        assert_eq!(s.trainer().unwrap().name(), "gradient_boosting");
    }

    #[cfg(not(feature = "boosting"))]
    #[test]
    fn missing_boosting_needs_explicit_fallback() {
        let mut s = ClassifierSettings {
            kind: ClassifierKind::GradientBoosting,
            ..Default::default()
        };
        assert!(matches!(s.resolve_kind(), Err(Error::InvalidParameter { .. })));
        s.allow_fallback = true;
        assert_eq!(s.trainer().unwrap().name(), "random_forest");
    }

    #[test]
    fn importances_sum_to_one() {
        let v = normalize_importances(vec![1.0, 3.0]);
        assert_eq!(v, vec![0.25, 0.75]);
        assert_eq!(normalize_importances(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ClassifierKind::GradientBoosting).unwrap();
        assert_eq!(json, "\"gradient_boosting\"");
    }
}
