//! Susceptibility classification with tree ensembles
//!
//! Training samples come from an event inventory over a [`FeatureStack`];
//! a random forest or gradient-boosted ensemble is fitted, evaluated on a
//! stratified hold-out split and stored as a [`TrainedClassifier`].
//! Prediction turns the stack into a class-1 probability grid.

mod artifact;
#[cfg(feature = "boosting")]
mod boosting;
mod forest;
mod metrics;
mod model;
mod predict;
mod sampling;
mod stack;
mod tree;

pub use artifact::{train_classifier, ModelStore, TrainedClassifier, ARTIFACT_FORMAT_VERSION};
#[cfg(feature = "boosting")]
pub use boosting::{BoostingParams, GradientBoosting, GradientBoostingTrainer};
pub use forest::{ForestParams, RandomForest, RandomForestTrainer};
pub use metrics::{accuracy, roc_auc, stratified_split, ModelMetrics};
pub use model::{ClassifierKind, ClassifierSettings, EnsembleFit, EnsembleModel, EnsembleTrainer};
pub use predict::predict_susceptibility;
pub use sampling::{sample_training_set, SamplingParams, TrainingSet, LABEL_PROPERTY};
pub use stack::FeatureStack;
pub use tree::{DecisionTree, TreeNode};
