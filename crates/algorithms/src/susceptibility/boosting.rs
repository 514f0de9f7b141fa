//! Gradient-boosted trees with log-loss
//!
//! Each round fits a regression tree to the residuals `y - p` and sets leaf
//! values with a single Newton step, `sum(r) / sum(p (1 - p))`. The output
//! is `sigmoid(base_score + learning_rate * sum(tree(x)))`.

use super::model::{normalize_importances, EnsembleFit, EnsembleModel, EnsembleTrainer};
use super::sampling::TrainingSet;
use super::tree::{grow_tree, DecisionTree, TreeParams};
use georisk_core::{CancellationToken, Error, Result};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Parameters for [`GradientBoostingTrainer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Fraction of samples drawn (without replacement) per round
    pub subsample: f64,
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            seed: 42,
        }
    }
}

/// Fitted boosting model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    trees: Vec<DecisionTree>,
    learning_rate: f64,
    /// Initial log-odds
    base_score: f64,
    n_features: usize,
}

impl GradientBoosting {
    pub fn raw_score(&self, features: &[f64]) -> f64 {
        self.base_score + self.learning_rate * self.trees.iter().map(|t| t.predict(features)).sum::<f64>()
    }

    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        sigmoid(self.raw_score(features))
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.base_score.is_finite()) {
            return Err(Error::Algorithm("boosting model has non-finite parameters".into()));
        }
        for tree in &self.trees {
            tree.validate()?;
        }
        Ok(())
    }
}

/// Trains a [`GradientBoosting`] model
#[derive(Debug, Clone, Default)]
pub struct GradientBoostingTrainer {
    pub params: BoostingParams,
}

impl GradientBoostingTrainer {
    pub fn new(params: BoostingParams) -> Self {
        Self { params }
    }
}

impl EnsembleTrainer for GradientBoostingTrainer {
    fn name(&self) -> &'static str {
        "gradient_boosting"
    }

    fn train(&self, set: &TrainingSet, cancel: &CancellationToken) -> Result<EnsembleFit> {
        let p = &self.params;
        if p.n_estimators == 0 {
            return Err(Error::invalid_param("n_estimators", 0, "must be at least 1"));
        }
        if !(p.learning_rate > 0.0 && p.learning_rate <= 1.0) {
            return Err(Error::invalid_param("learning_rate", p.learning_rate, "must be in (0, 1]"));
        }
        if !(p.subsample > 0.0 && p.subsample <= 1.0) {
            return Err(Error::invalid_param("subsample", p.subsample, "must be in (0, 1]"));
        }
        if set.is_empty() {
            return Err(Error::invalid_param("training_set", 0, "no samples"));
        }

        let n = set.len();
        let n_features = set.n_features();
        let y = set.targets();
        let prior = (set.n_positive() as f64 / n as f64).clamp(1e-6, 1.0 - 1e-6);
        let base_score = (prior / (1.0 - prior)).ln();

        let tree_params = TreeParams {
            max_depth: p.max_depth,
            min_samples_split: 2,
            min_samples_leaf: p.min_samples_leaf,
            max_features: None,
        };
        let per_round = ((n as f64 * p.subsample).round() as usize).clamp(1, n);

        let mut rng = ChaCha8Rng::seed_from_u64(p.seed);
        let mut raw = vec![base_score; n];
        let mut trees = Vec::with_capacity(p.n_estimators);
        let mut importances = vec![0.0; n_features];

        for _ in 0..p.n_estimators {
            cancel.check()?;

            let prob: Vec<f64> = raw.iter().map(|&f| sigmoid(f)).collect();
            let residual: Vec<f64> = y.iter().zip(&prob).map(|(y, p)| y - p).collect();

            let rows = if per_round == n {
                (0..n).collect()
            } else {
                let mut rows = index::sample(&mut rng, n, per_round).into_vec();
                rows.sort_unstable();
                rows
            };

            let grown = grow_tree(&set.samples, &residual, rows, &tree_params, &mut rng, |idx: &[usize]| {
                let num: f64 = idx.iter().map(|&i| residual[i]).sum();
                let den: f64 = idx.iter().map(|&i| prob[i] * (1.0 - prob[i])).sum();
                if den.abs() < 1e-12 {
                    0.0
                } else {
                    num / den
                }
            });

            for (f, x) in raw.iter_mut().zip(&set.samples) {
                *f += p.learning_rate * grown.tree.predict(x);
            }
            for (acc, v) in importances.iter_mut().zip(&grown.importances) {
                *acc += v;
            }
            trees.push(grown.tree);
        }

        let loss = log_loss(&y, &raw);
        tracing::debug!(rounds = trees.len(), train_log_loss = loss, "gradient boosting fitted");

        Ok(EnsembleFit {
            model: EnsembleModel::GradientBoosting(GradientBoosting {
                trees,
                learning_rate: p.learning_rate,
                base_score,
                n_features,
            }),
            importances: normalize_importances(importances),
        })
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn log_loss(y: &[f64], raw: &[f64]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    let total: f64 = y
        .iter()
        .zip(raw)
        .map(|(&y, &f)| {
            let p = sigmoid(f).clamp(1e-15, 1.0 - 1e-15);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    total / y.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::susceptibility::metrics::roc_auc;
    use approx::assert_relative_eq;
    use rand::Rng;

    fn bands(n: usize) -> TrainingSet {
        let mut set = TrainingSet::new(vec!["slope".into(), "rain".into()]);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..n {
            let slope: f64 = rng.gen_range(0.0..60.0);
            let rain: f64 = rng.gen_range(0.0..300.0);
            set.push(vec![slope, rain], u8::from(slope > 30.0 && rain > 100.0));
        }
        set
    }

    #[test]
    fn fits_interaction() {
        let set = bands(400);
        let fit = GradientBoostingTrainer::new(BoostingParams {
            n_estimators: 60,
            ..Default::default()
        })
        .train(&set, &CancellationToken::new())
        .unwrap();

        let scores: Vec<f64> = set.samples.iter().map(|s| fit.model.predict_proba(s)).collect();
        assert!(roc_auc(&scores, &set.labels).unwrap() > 0.97);
        assert!(fit.model.predict_proba(&[50.0, 250.0]) > 0.8);
        assert!(fit.model.predict_proba(&[5.0, 20.0]) < 0.2);
    }

    #[test]
    fn zero_rounds_rejected_and_prior_is_base() {
        let set = bands(50);
        assert!(GradientBoostingTrainer::new(BoostingParams {
            n_estimators: 0,
            ..Default::default()
        })
        .train(&set, &CancellationToken::new())
        .is_err());

        let single = GradientBoostingTrainer::new(BoostingParams {
            n_estimators: 1,
            learning_rate: 1e-9,
            ..Default::default()
        })
        .train(&set, &CancellationToken::new())
        .unwrap();
        let prior = set.n_positive() as f64 / set.len() as f64;
        assert_relative_eq!(single.model.predict_proba(&[0.0, 0.0]), prior, epsilon = 1e-6);
    }

    #[test]
    fn log_loss_of_confident_correct_scores_is_small() {
        assert!(log_loss(&[1.0, 0.0], &[10.0, -10.0]) < 1e-3);
        assert!(log_loss(&[1.0, 0.0], &[-10.0, 10.0]) > 5.0);
    }
}
