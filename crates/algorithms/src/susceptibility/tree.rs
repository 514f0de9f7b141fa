//! Array-based regression tree shared by both ensembles
//!
//! Nodes live in a flat vector; children are always stored after their
//! parent. Samples with `value <= threshold` go left.

use georisk_core::{Error, Result};
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One node of a fitted tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Split feature index, `-1` for leaves
    pub feature: i32,
    pub threshold: f64,
    pub left: u32,
    pub right: u32,
    /// Leaf output (positive fraction or boosting step)
    pub value: f64,
}

impl TreeNode {
    pub const fn is_leaf(&self) -> bool {
        self.feature < 0
    }

    fn leaf(value: f64) -> Self {
        Self {
            feature: -1,
            threshold: 0.0,
            left: 0,
            right: 0,
            value,
        }
    }
}

/// A fitted binary regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
    n_features: usize,
}

impl DecisionTree {
    /// Leaf value reached by `features`
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            let node = &self.nodes[idx];
            if node.is_leaf() {
                return node.value;
            }
            let v = features.get(node.feature as usize).copied().unwrap_or(f64::NAN);
            idx = if v <= node.threshold { node.left } else { node.right } as usize;
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            let node = &nodes[idx];
            if node.is_leaf() {
                0
            } else {
                1 + walk(nodes, node.left as usize).max(walk(nodes, node.right as usize))
            }
        }
        walk(&self.nodes, 0)
    }

    /// Structural check for trees read from disk: every child index points
    /// forward inside the node array, so traversal always terminates.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::Algorithm("tree has no nodes".into()));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                continue;
            }
            let ok = (node.feature as usize) < self.n_features
                && (node.left as usize) > i
                && (node.right as usize) > i
                && (node.left as usize) < self.nodes.len()
                && (node.right as usize) < self.nodes.len();
            if !ok {
                return Err(Error::Algorithm(format!("tree node {} is malformed", i)));
            }
        }
        Ok(())
    }
}

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split; `None` means all
    pub max_features: Option<usize>,
}

/// A tree plus the squared-error decrease credited to each feature
pub(crate) struct GrownTree {
    pub tree: DecisionTree,
    pub importances: Vec<f64>,
}

/// Grow a tree on `targets` by squared-error reduction.
///
/// On 0/1 targets this is the Gini criterion. `leaf_value` turns the sample
/// indices that reach a leaf into its output.
pub(crate) fn grow_tree<R, L>(
    x: &[Vec<f64>],
    targets: &[f64],
    indices: Vec<usize>,
    params: &TreeParams,
    rng: &mut R,
    leaf_value: L,
) -> GrownTree
where
    R: Rng,
    L: Fn(&[usize]) -> f64,
{
    let n_features = x.first().map_or(0, Vec::len);
    let mut grower = Grower {
        x,
        targets,
        params,
        n_features,
        nodes: Vec::new(),
        importances: vec![0.0; n_features],
        leaf_value,
    };
    grower.grow(indices, 0, rng);

    GrownTree {
        tree: DecisionTree {
            nodes: grower.nodes,
            n_features,
        },
        importances: grower.importances,
    }
}

struct Grower<'a, L> {
    x: &'a [Vec<f64>],
    targets: &'a [f64],
    params: &'a TreeParams,
    n_features: usize,
    nodes: Vec<TreeNode>,
    importances: Vec<f64>,
    leaf_value: L,
}

struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl<L: Fn(&[usize]) -> f64> Grower<'_, L> {
    fn grow<R: Rng>(&mut self, indices: Vec<usize>, depth: usize, rng: &mut R) -> u32 {
        let id = self.nodes.len() as u32;
        self.nodes.push(TreeNode::leaf((self.leaf_value)(&indices)));

        let splittable = depth < self.params.max_depth
            && indices.len() >= self.params.min_samples_split.max(2)
            && indices.len() >= 2 * self.params.min_samples_leaf.max(1);
        if !splittable {
            return id;
        }

        let Some(split) = self.best_split(&indices, rng) else {
            return id;
        };
        self.importances[split.feature] += split.gain;

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[i][split.feature] <= split.threshold);

        let left_id = self.grow(left, depth + 1, rng);
        let right_id = self.grow(right, depth + 1, rng);

        let node = &mut self.nodes[id as usize];
        node.feature = split.feature as i32;
        node.threshold = split.threshold;
        node.left = left_id;
        node.right = right_id;
        id
    }

    fn best_split<R: Rng>(&self, indices: &[usize], rng: &mut R) -> Option<Split> {
        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf.max(1);

        let (sum, sum_sq) = indices.iter().fold((0.0, 0.0), |(s, q), &i| {
            let y = self.targets[i];
            (s + y, q + y * y)
        });
        let parent_sse = sum_sq - sum * sum / n as f64;
        if parent_sse <= 1e-12 {
            return None;
        }

        let candidates: Vec<usize> = match self.params.max_features {
            Some(k) if k < self.n_features => index::sample(rng, self.n_features, k.max(1)).into_vec(),
            _ => (0..self.n_features).collect(),
        };

        let mut best: Option<Split> = None;
        let mut column: Vec<(f64, f64)> = Vec::with_capacity(n);

        for feature in candidates {
            column.clear();
            column.extend(indices.iter().map(|&i| (self.x[i][feature], self.targets[i])));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for k in 1..n {
                let (v_prev, y_prev) = column[k - 1];
                left_sum += y_prev;
                left_sq += y_prev * y_prev;

                let v_next = column[k].0;
                if k < min_leaf || n - k < min_leaf || v_prev >= v_next {
                    continue;
                }

                let right_sum = sum - left_sum;
                let right_sq = sum_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / k as f64)
                    + (right_sq - right_sum * right_sum / (n - k) as f64);
                let gain = parent_sse - sse;

                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    let mid = v_prev + (v_next - v_prev) / 2.0;
                    let threshold = if mid < v_next { mid } else { v_prev };
                    best = Some(Split {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn params(max_depth: usize) -> TreeParams {
        TreeParams {
            max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }

    fn mean_leaf(targets: &[f64]) -> impl Fn(&[usize]) -> f64 + '_ {
        move |idx: &[usize]| idx.iter().map(|&i| targets[i]).sum::<f64>() / idx.len().max(1) as f64
    }

    #[test]
    fn learns_single_threshold() {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, 0.0]).collect();
        let y: Vec<f64> = (0..20).map(|i| if i >= 12 { 1.0 } else { 0.0 }).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let grown = grow_tree(&x, &y, (0..20).collect(), &params(4), &mut rng, mean_leaf(&y));
        let tree = grown.tree;

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict(&[3.0, 0.0]), 0.0);
        assert_eq!(tree.predict(&[11.4, 0.0]), 0.0);
        assert_eq!(tree.predict(&[11.6, 0.0]), 1.0);
        assert!(grown.importances[0] > 0.0);
        assert_eq!(grown.importances[1], 0.0);
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn respects_max_depth_and_pure_nodes() {
        let x: Vec<Vec<f64>> = (0..16).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..16).map(|i| (i % 2) as f64).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let tree = grow_tree(&x, &y, (0..16).collect(), &params(2), &mut rng, mean_leaf(&y)).tree;
        assert!(tree.depth() <= 2);

        let constant = vec![1.0; 16];
        let stump = grow_tree(&x, &constant, (0..16).collect(), &params(5), &mut rng, mean_leaf(&constant)).tree;
        assert_eq!(stump.n_nodes(), 1);
    }

    #[test]
    fn validate_rejects_backward_links() {
        let tree = DecisionTree {
            nodes: vec![TreeNode {
                feature: 0,
                threshold: 0.5,
                left: 0,
                right: 0,
                value: 0.0,
            }],
            n_features: 1,
        };
        assert!(tree.validate().is_err());
    }
}
