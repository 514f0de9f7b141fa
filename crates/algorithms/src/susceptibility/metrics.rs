//! Hold-out split and evaluation of binary probability models

use super::sampling::TrainingSet;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Scores on the hold-out split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Fraction correct at a 0.5 probability cut
    pub accuracy: f64,
    /// Area under the ROC curve; `None` when the test split has one class
    pub roc_auc: Option<f64>,
    pub test_samples: usize,
}

/// Stratified split into (train, test).
///
/// Each class contributes `round(n * test_fraction)` samples to the test
/// split, but a class with fewer than two samples stays entirely in train.
pub fn stratified_split(set: &TrainingSet, test_fraction: f64, seed: u64) -> (TrainingSet, TrainingSet) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(set.len());
    let mut test = Vec::new();

    for class in [0u8, 1u8] {
        let mut idx: Vec<usize> = (0..set.len()).filter(|&i| set.labels[i] == class).collect();
        idx.shuffle(&mut rng);
        let n_test = if idx.len() < 2 {
            0
        } else {
            ((idx.len() as f64 * test_fraction).round() as usize).min(idx.len() - 1)
        };
        test.extend_from_slice(&idx[..n_test]);
        train.extend_from_slice(&idx[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    (set.select(&train), set.select(&test))
}

/// Fraction of samples whose thresholded score matches the label
pub fn accuracy(scores: &[f64], labels: &[u8]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let correct = scores
        .iter()
        .zip(labels)
        .filter(|(&s, &l)| u8::from(s >= 0.5) == l)
        .count();
    correct as f64 / scores.len() as f64
}

/// ROC AUC via the rank-sum statistic, with ties sharing their mean rank.
pub fn roc_auc(scores: &[f64], labels: &[u8]) -> Option<f64> {
    let n_pos = labels.iter().filter(|&&l| l == 1).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based
        let mean_rank = (i + j) as f64 / 2.0 + 1.0;
        rank_sum += order[i..=j].iter().filter(|&&k| labels[k] == 1).count() as f64 * mean_rank;
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    Some((rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64))
}
