//! Decision tree implementation
//!
//! Binary splits on `x <= threshold`. Classification trees use Gini impurity
//! on 0/1 labels and store the positive fraction in each leaf; regression
//! trees use squared error and store the mean target.

use crate::error::{MlopsError, Result};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

impl TreeNode {
    fn predict_row(&self, row: ndarray::ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    /// Route `indices` down the tree and reset every reached leaf to `f(rows)`
    fn relabel<F>(&mut self, x: &Array2<f64>, indices: &[usize], f: &F)
    where
        F: Fn(&[usize]) -> f64,
    {
        match self {
            TreeNode::Leaf { value, .. } => {
                if !indices.is_empty() {
                    *value = f(indices);
                }
            }
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                let (l, r): (Vec<usize>, Vec<usize>) =
                    indices.iter().partition(|&&i| x[[i, *feature_idx]] <= *threshold);
                left.relabel(x, &l, f);
                right.relabel(x, &r, f);
            }
        }
    }
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Gini impurity on 0/1 labels
    Gini,
    /// Mean squared error
    MSE,
}

/// Sufficient statistics of a node: `count`, `sum(y)` and `sum(y^2)`
#[derive(Debug, Clone, Copy, Default)]
struct NodeStats {
    count: f64,
    sum: f64,
    sq_sum: f64,
}

impl NodeStats {
    fn push(&mut self, y: f64) {
        self.count += 1.0;
        self.sum += y;
        self.sq_sum += y * y;
    }

    fn minus(&self, other: &NodeStats) -> NodeStats {
        NodeStats {
            count: self.count - other.count,
            sum: self.sum - other.sum,
            sq_sum: self.sq_sum - other.sq_sum,
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.count == 0.0 {
            return 0.0;
        }
        let mean = self.sum / self.count;
        match criterion {
            Criterion::Gini => 2.0 * mean * (1.0 - mean),
            Criterion::MSE => (self.sq_sum / self.count - mean * mean).max(0.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn at random for each split; `None` tries all of them
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    /// Seed for the per-split feature draw
    pub random_state: Option<u64>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    pub fn new_classifier() -> Self {
        Self::with_criterion(Criterion::Gini)
    }

    pub fn new_regressor() -> Self {
        Self::with_criterion(Criterion::MSE)
    }

    fn with_criterion(criterion: Criterion) -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion,
            random_state: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(MlopsError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 || n_features == 0 {
            return Err(MlopsError::Validation("cannot fit a tree on empty data".to_string()));
        }

        self.n_features = n_features;
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(0));
        let mut importances = vec![0.0; n_features];

        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(x, y, &indices, 0, &mut importances, &mut rng);
        self.root = Some(root);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn stats_of(y: &Array1<f64>, indices: &[usize]) -> NodeStats {
        let mut stats = NodeStats::default();
        for &i in indices {
            stats.push(y[i]);
        }
        stats
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let stats = Self::stats_of(y, indices);
        let impurity = stats.impurity(self.criterion);
        let leaf = || TreeNode::Leaf {
            value: if n_samples > 0 { stats.sum / stats.count } else { 0.0 },
            n_samples,
        };

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12;
        if should_stop {
            return leaf();
        }

        let features = self.draw_features(rng);
        let Some((feature, threshold, gain)) = self.find_best_split(x, y, indices, &features) else {
            return leaf();
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| x[[i, feature]] <= threshold);

        importances[feature] += n_samples as f64 * gain;

        let left = Box::new(self.build_tree(x, y, &left_idx, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, y, &right_idx, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: feature,
            threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    fn draw_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let mut features: Vec<usize> = (0..self.n_features).collect();
        match self.max_features {
            Some(k) if k < self.n_features => {
                features.shuffle(rng);
                features.truncate(k.max(1));
                features.sort_unstable();
                features
            }
            _ => features,
        }
    }

    /// Best `(feature, threshold, gain)` over `features`, scanning each
    /// feature's sorted values once
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
    ) -> Option<(usize, f64, f64)> {
        let parent = Self::stats_of(y, indices);
        let parent_impurity = parent.impurity(self.criterion);
        let n = parent.count;
        let min_leaf = self.min_samples_leaf as f64;

        let candidates: Vec<Option<(usize, f64, f64)>> = features
            .par_iter()
            .map(|&feature| {
                let mut sorted: Vec<usize> = indices.to_vec();
                sorted.sort_by(|&a, &b| {
                    x[[a, feature]]
                        .partial_cmp(&x[[b, feature]])
                        .unwrap_or(std::cmp::Ordering::Equal)
                });

                let mut left = NodeStats::default();
                let mut best: Option<(f64, f64)> = None;

                for w in 0..sorted.len() - 1 {
                    left.push(y[sorted[w]]);
                    let here = x[[sorted[w], feature]];
                    let next = x[[sorted[w + 1], feature]];
                    if next <= here {
                        continue;
                    }
                    let right = parent.minus(&left);
                    if left.count < min_leaf || right.count < min_leaf {
                        continue;
                    }

                    let weighted = (left.count * left.impurity(self.criterion)
                        + right.count * right.impurity(self.criterion))
                        / n;
                    let gain = parent_impurity - weighted;
                    if gain > 1e-12 && best.map_or(true, |(g, _)| gain > g) {
                        best = Some((gain, (here + next) / 2.0));
                    }
                }

                best.map(|(gain, threshold)| (feature, threshold, gain))
            })
            .collect();

        // first feature wins ties so the result does not depend on scheduling
        candidates
            .into_iter()
            .flatten()
            .fold(None, |acc: Option<(usize, f64, f64)>, c| match acc {
                Some(a) if a.2 >= c.2 => Some(a),
                _ => Some(c),
            })
    }

    /// Leaf value per row (positive fraction for classifiers)
    pub fn predict_value(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(MlopsError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(MlopsError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.outer_iter().map(|row| root.predict_row(row)).collect())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let values = self.predict_value(x)?;
        Ok(match self.criterion {
            Criterion::Gini => values.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }),
            Criterion::MSE => values,
        })
    }

    /// Recompute leaf values from the training rows that reach each leaf
    pub fn relabel_leaves<F>(&mut self, x: &Array2<f64>, f: F) -> Result<()>
    where
        F: Fn(&[usize]) -> f64,
    {
        let root = self.root.as_mut().ok_or(MlopsError::ModelNotFitted)?;
        let indices: Vec<usize> = (0..x.nrows()).collect();
        root.relabel(x, &indices, &f);
        Ok(())
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, |r| r.depth())
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }
}
