//! Gradient boosted trees for binary classification
//!
//! Log-loss boosting in the XGBoost manner: each round fits a regression tree
//! to the negative gradient, then replaces its leaf values with the Newton
//! step `sum(-g) / (sum(h) + reg_lambda)`. Positive samples are weighted by
//! `scale_pos_weight`.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use crate::error::{MlopsError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Row subsample ratio per tree
    pub subsample: f64,
    /// Column subsample ratio per tree
    pub colsample_bytree: f64,
    /// L2 regularization on leaf values
    pub reg_lambda: f64,
    /// Weight of positive samples relative to negatives
    pub scale_pos_weight: f64,
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 6,
            min_samples_leaf: 1,
            subsample: 1.0,
            colsample_bytree: 1.0,
            reg_lambda: 1.0,
            scale_pos_weight: 1.0,
            random_state: Some(42),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    col_indices_per_tree: Vec<Vec<usize>>,
    initial_log_odds: f64,
    feature_importances: Vec<f64>,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            col_indices_per_tree: Vec::new(),
            initial_log_odds: 0.0,
            feature_importances: Vec::new(),
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
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
        if n_samples == 0 {
            return Err(MlopsError::training("GradientBoosting", "no training samples"));
        }

        let spw = self.config.scale_pos_weight;
        let weights: Array1<f64> = y.mapv(|v| if v >= 0.5 { spw } else { 1.0 });

        let p = (weights.iter().zip(y.iter()).map(|(w, v)| w * v).sum::<f64>() / weights.sum())
            .clamp(1e-6, 1.0 - 1e-6);
        self.initial_log_odds = (p / (1.0 - p)).ln();

        let mut log_odds = Array1::from_elem(n_samples, self.initial_log_odds);
        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.trees.clear();
        self.col_indices_per_tree.clear();
        self.feature_importances = vec![0.0; n_features];

        for _ in 0..self.config.n_estimators {
            let probs = log_odds.mapv(sigmoid);
            let neg_grad: Array1<f64> = (y - &probs) * &weights;
            let hess: Array1<f64> = (&probs * &(1.0 - &probs)) * &weights;

            let sample_indices = Self::sample(n_samples, self.config.subsample, &mut rng);
            let col_indices = Self::sample(n_features, self.config.colsample_bytree, &mut rng);

            let x_sub = x.select(Axis(0), &sample_indices).select(Axis(1), &col_indices);
            let g_sub: Array1<f64> = sample_indices.iter().map(|&i| neg_grad[i]).collect();
            let h_sub: Array1<f64> = sample_indices.iter().map(|&i| hess[i]).collect();

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(Some(self.config.max_depth))
                .with_min_samples_leaf(self.config.min_samples_leaf);
            tree.fit(&x_sub, &g_sub)?;

            let lambda = self.config.reg_lambda;
            tree.relabel_leaves(&x_sub, |rows| {
                let g: f64 = rows.iter().map(|&r| g_sub[r]).sum();
                let h: f64 = rows.iter().map(|&r| h_sub[r]).sum();
                g / (h + lambda)
            })?;

            let x_cols = x.select(Axis(1), &col_indices);
            let update = tree.predict_value(&x_cols)?;
            log_odds.scaled_add(self.config.learning_rate, &update);

            if let Some(importance) = tree.feature_importances() {
                for (j, &col) in col_indices.iter().enumerate() {
                    self.feature_importances[col] += importance[j];
                }
            }

            self.trees.push(tree);
            self.col_indices_per_tree.push(col_indices);
        }

        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }

        Ok(self)
    }

    /// Sorted random subset of `0..n` of size `ceil(n * ratio)`; all of it when ratio >= 1
    fn sample(n: usize, ratio: f64, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..n).collect();
        if ratio >= 1.0 {
            return indices;
        }
        let size = ((n as f64) * ratio).ceil().max(1.0) as usize;
        indices.shuffle(rng);
        indices.truncate(size);
        indices.sort_unstable();
        indices
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() && self.config.n_estimators > 0 {
            return Err(MlopsError::ModelNotFitted);
        }

        let mut log_odds = Array1::from_elem(x.nrows(), self.initial_log_odds);
        for (tree, cols) in self.trees.iter().zip(self.col_indices_per_tree.iter()) {
            let x_sub = x.select(Axis(1), cols);
            log_odds.scaled_add(self.config.learning_rate, &tree.predict_value(&x_sub)?);
        }
        Ok(log_odds.mapv(sigmoid))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [1.0, 0.0], [2.0, 1.0], [3.0, 0.0], [4.0, 1.0],
            [6.0, 0.0], [7.0, 1.0], [8.0, 0.0], [9.0, 1.0]
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_boosting_learns_threshold() {
        let (x, y) = data();
        let config = GradientBoostingConfig {
            n_estimators: 20,
            max_depth: 2,
            ..Default::default()
        };
        let mut model = GradientBoostingClassifier::new(config);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.n_trees(), 20);
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_more_rounds_increase_confidence() {
        let (x, y) = data();
        let mut few = GradientBoostingClassifier::new(GradientBoostingConfig {
            n_estimators: 2,
            max_depth: 2,
            ..Default::default()
        });
        let mut many = GradientBoostingClassifier::new(GradientBoostingConfig {
            n_estimators: 30,
            max_depth: 2,
            ..Default::default()
        });
        few.fit(&x, &y).unwrap();
        many.fit(&x, &y).unwrap();

        let probe = array![[9.0, 1.0]];
        assert!(many.predict_proba(&probe).unwrap()[0] > few.predict_proba(&probe).unwrap()[0]);
    }

    #[test]
    fn test_subsampling_is_seeded() {
        let (x, y) = data();
        let config = GradientBoostingConfig {
            n_estimators: 5,
            subsample: 0.75,
            colsample_bytree: 0.5,
            random_state: Some(3),
            ..Default::default()
        };
        let mut a = GradientBoostingClassifier::new(config.clone());
        let mut b = GradientBoostingClassifier::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }
}
