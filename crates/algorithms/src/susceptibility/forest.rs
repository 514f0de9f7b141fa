//! Random forest: bagged CART trees on 0/1 labels

use super::model::{normalize_importances, EnsembleFit, EnsembleModel, EnsembleTrainer};
use super::sampling::TrainingSet;
use super::tree::{grow_tree, DecisionTree, TreeParams};
use crate::maybe_rayon::*;
use georisk_core::{CancellationToken, Error, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Parameters for [`RandomForestTrainer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features tried per split; `None` uses the square root of the count
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }
}

/// Fitted forest. The class-1 probability is the mean leaf positive fraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.predict(features)).sum::<f64>() / self.trees.len() as f64
    }

    /// Fraction of trees voting for class 1
    pub fn vote_fraction(&self, features: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let votes = self.trees.iter().filter(|t| t.predict(features) >= 0.5).count();
        votes as f64 / self.trees.len() as f64
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for tree in &self.trees {
            tree.validate()?;
            if tree.n_features() != self.n_features {
                return Err(Error::Algorithm("tree feature count differs from forest".into()));
            }
        }
        Ok(())
    }
}

/// Trains a [`RandomForest`]
#[derive(Debug, Clone, Default)]
pub struct RandomForestTrainer {
    pub params: ForestParams,
}

impl RandomForestTrainer {
    pub fn new(params: ForestParams) -> Self {
        Self { params }
    }
}

impl EnsembleTrainer for RandomForestTrainer {
    fn name(&self) -> &'static str {
        "random_forest"
    }

    /// Each tree gets its own ChaCha stream, so the forest is identical
    /// whether trees are grown in parallel or not.
    fn train(&self, set: &TrainingSet, cancel: &CancellationToken) -> Result<EnsembleFit> {
        let p = &self.params;
        if p.n_estimators == 0 {
            return Err(Error::invalid_param("n_estimators", 0, "must be at least 1"));
        }
        if set.is_empty() {
            return Err(Error::invalid_param("training_set", 0, "no samples"));
        }

        let n = set.len();
        let n_features = set.n_features();
        let targets = set.targets();
        let tree_params = TreeParams {
            max_depth: p.max_depth,
            min_samples_split: p.min_samples_split,
            min_samples_leaf: p.min_samples_leaf,
            max_features: Some(
                p.max_features
                    .unwrap_or_else(|| (n_features as f64).sqrt().round() as usize)
                    .clamp(1, n_features.max(1)),
            ),
        };

        let grown: Vec<_> = (0..p.n_estimators)
            .into_par_iter()
            .map(|i| -> Result<_> {
                cancel.check()?;
                let mut rng = ChaCha8Rng::seed_from_u64(p.seed);
                rng.set_stream(i as u64);
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let targets = &targets;
                Ok(grow_tree(&set.samples, targets, bootstrap, &tree_params, &mut rng, |idx: &[usize]| {
                    if idx.is_empty() {
                        0.0
                    } else {
                        idx.iter().map(|&k| targets[k]).sum::<f64>() / idx.len() as f64
                    }
                }))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut importances = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(grown.len());
        for g in grown {
            for (acc, v) in importances.iter_mut().zip(&g.importances) {
                *acc += v;
            }
            trees.push(g.tree);
        }
        tracing::debug!(trees = trees.len(), "random forest grown");

        Ok(EnsembleFit {
            model: EnsembleModel::RandomForest(RandomForest { trees, n_features }),
            importances: normalize_importances(importances),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::susceptibility::metrics::roc_auc;

    /// Uniform samples, positive when x0 + x1 > 1
    fn separable(n: usize) -> TrainingSet {
        let mut set = TrainingSet::new(vec!["x0".into(), "x1".into(), "noise".into()]);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..n {
            let x0: f64 = rng.gen();
            let x1: f64 = rng.gen();
            let noise: f64 = rng.gen();
            set.push(vec![x0, x1, noise], u8::from(x0 + x1 > 1.0));
        }
        set
    }

    #[test]
    fn separates_classes() {
        let set = separable(300);
        let trainer = RandomForestTrainer::new(ForestParams {
            n_estimators: 25,
            ..Default::default()
        });
        let fit = trainer.train(&set, &CancellationToken::new()).unwrap();

        let scores: Vec<f64> = set.samples.iter().map(|s| fit.model.predict_proba(s)).collect();
        assert!(scores.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(roc_auc(&scores, &set.labels).unwrap() > 0.95);
        assert!(fit.model.predict_proba(&[0.95, 0.95, 0.5]) > 0.5);
        assert!(fit.model.predict_proba(&[0.05, 0.05, 0.5]) < 0.5);

        // The noise band carries little of the impurity decrease.
        assert!(fit.importances[2] < fit.importances[0]);
        assert!((fit.importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn same_seed_same_forest() {
        let set = separable(120);
        let trainer = RandomForestTrainer::new(ForestParams {
            n_estimators: 8,
            ..Default::default()
        });
        let a = trainer.train(&set, &CancellationToken::new()).unwrap();
        let b = trainer.train(&set, &CancellationToken::new()).unwrap();
        assert_eq!(a.model, b.model);
    }

    #[test]
    fn cancelled_training() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = RandomForestTrainer::default().train(&separable(50), &cancel);
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
