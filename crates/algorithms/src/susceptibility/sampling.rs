//! Training samples drawn from an event inventory and a feature stack

use super::stack::FeatureStack;
use georisk_core::vector::FeatureCollection;
use georisk_core::{Error, Result};
use geo::Centroid;
use geo_types::{Geometry, Point};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Inventory attribute that marks explicit negatives (`0`)
pub const LABEL_PROPERTY: &str = "label";

/// Parameters for [`sample_training_set`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    /// Negatives per positive, counting explicit inventory negatives
    pub negative_ratio: f64,
    pub min_positive_samples: usize,
    pub seed: u64,
    /// Random draws allowed per requested negative
    pub max_attempts_factor: usize,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            negative_ratio: 1.0,
            min_positive_samples: 10,
            seed: 42,
            max_attempts_factor: 10,
        }
    }
}

/// Labelled feature vectors in stack band order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    pub feature_names: Vec<String>,
    pub samples: Vec<Vec<f64>>,
    /// 1 = event, 0 = non-event
    pub labels: Vec<u8>,
}

impl TrainingSet {
    pub fn new(feature_names: Vec<String>) -> Self {
        Self {
            feature_names,
            ..Default::default()
        }
    }

    pub fn push(&mut self, sample: Vec<f64>, label: u8) {
        self.samples.push(sample);
        self.labels.push(label);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn n_positive(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }

    pub fn n_negative(&self) -> usize {
        self.len() - self.n_positive()
    }

    /// Labels as regression targets
    pub(crate) fn targets(&self) -> Vec<f64> {
        self.labels.iter().map(|&l| f64::from(l)).collect()
    }

    /// Subset by sample index
    pub fn select(&self, indices: &[usize]) -> TrainingSet {
        TrainingSet {
            feature_names: self.feature_names.clone(),
            samples: indices.iter().map(|&i| self.samples[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

/// Sample feature vectors at inventory locations and at random background
/// cells.
///
/// Each inventory geometry contributes the cell under each point (polygons
/// use their centroid). Features with `label = 0` are explicit negatives, all
/// others positives; a cell is used at most once. Locations outside the grid
/// or on no-data are skipped. Random negatives are drawn from valid cells
/// that are not already sampled, until `negative_ratio` x positives
/// negatives exist or the attempt budget runs out.
pub fn sample_training_set(
    stack: &FeatureStack,
    inventory: &FeatureCollection,
    params: &SamplingParams,
) -> Result<TrainingSet> {
    if !(params.negative_ratio.is_finite() && params.negative_ratio >= 0.0) {
        return Err(Error::invalid_param(
            "negative_ratio",
            params.negative_ratio,
            "must be a finite non-negative number",
        ));
    }

    let reference = stack.reference();
    let mut set = TrainingSet::new(stack.names().to_vec());
    let mut used: HashSet<(usize, usize)> = HashSet::new();
    let mut explicit_negatives = 0usize;
    let mut skipped = 0usize;

    for feature in inventory.iter() {
        let label = match feature.get_property(LABEL_PROPERTY).and_then(|v| v.as_f64()) {
            Some(v) if v == 0.0 => 0u8,
            _ => 1u8,
        };
        let Some(geometry) = &feature.geometry else {
            continue;
        };

        for point in sample_points(geometry) {
            let Some(cell) = reference.cell_at(point.x(), point.y()) else {
                skipped += 1;
                continue;
            };
            if used.contains(&cell) {
                continue;
            }
            match stack.values_at(cell.0, cell.1) {
                Some(values) => {
                    used.insert(cell);
                    set.push(values, label);
                    if label == 0 {
                        explicit_negatives += 1;
                    }
                }
                None => skipped += 1,
            }
        }
    }

    let positives = set.n_positive();
    if skipped > 0 {
        tracing::debug!(skipped, "inventory locations outside the grid or on no-data");
    }
    if positives < params.min_positive_samples {
        return Err(Error::InsufficientTrainingData {
            found: positives,
            required: params.min_positive_samples,
        });
    }

    let wanted = (positives as f64 * params.negative_ratio).round() as usize;
    let to_draw = wanted.saturating_sub(explicit_negatives);
    let (rows, cols) = stack.shape();
    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let mut drawn = 0usize;
    let mut buf = Vec::with_capacity(stack.n_features());

    let budget = to_draw.saturating_mul(params.max_attempts_factor.max(1));
    for _ in 0..budget {
        if drawn == to_draw {
            break;
        }
        let cell = (rng.gen_range(0..rows), rng.gen_range(0..cols));
        if used.contains(&cell) || !stack.fill_values(cell.0, cell.1, &mut buf) {
            continue;
        }
        used.insert(cell);
        set.push(buf.clone(), 0);
        drawn += 1;
    }

    if drawn < to_draw {
        tracing::warn!(drawn, requested = to_draw, "could not draw all requested negative samples");
    }
    tracing::info!(
        positives,
        explicit_negatives,
        random_negatives = drawn,
        "training samples collected"
    );

    Ok(set)
}

fn sample_points(geometry: &Geometry<f64>) -> Vec<Point<f64>> {
    match geometry {
        Geometry::Point(p) => vec![*p],
        Geometry::MultiPoint(mp) => mp.0.clone(),
        Geometry::Polygon(poly) => poly.centroid().into_iter().collect(),
        Geometry::MultiPolygon(mp) => mp.0.iter().filter_map(|p| p.centroid()).collect(),
        Geometry::GeometryCollection(gc) => gc.0.iter().flat_map(sample_points).collect(),
        _ => Vec::new(),
    }
}
