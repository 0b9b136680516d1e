//! Evaluation metrics and the classifier wrapper used by the selector

use crate::error::{MlopsError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::config::{param_f64, param_opt_usize, param_usize, ModelFamily, ParamSet};
use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use super::linear_models::{LogisticRegression, Solver};
use super::random_forest::RandomForest;

/// Binary classification metrics, positive class = 1
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub n_samples: usize,
}

impl ModelMetrics {
    pub fn compute_classification(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let n = y_true.len();
        if n == 0 {
            return Self::default();
        }

        let (tp, fp, tn, fn_) = Self::confusion_counts(y_true, y_pred);
        let precision = if tp + fp > 0 { tp as f64 / (tp + fp) as f64 } else { 0.0 };
        let recall = if tp + fn_ > 0 { tp as f64 / (tp + fn_) as f64 } else { 0.0 };
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            accuracy: (tp + tn) as f64 / n as f64,
            precision,
            recall,
            f1_score,
            n_samples: n,
        }
    }

    fn confusion_counts(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> (usize, usize, usize, usize) {
        let mut tp = 0;
        let mut fp = 0;
        let mut tn = 0;
        let mut fn_ = 0;

        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            match (*t > 0.5, *p > 0.5) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (false, false) => tn += 1,
                (true, false) => fn_ += 1,
            }
        }

        (tp, fp, tn, fn_)
    }
}

/// Fraction of correct predictions
pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (**t > 0.5) == (**p > 0.5))
        .count();
    correct as f64 / y_true.len() as f64
}

/// Accuracy of always predicting the positive class
pub fn baseline_accuracy(y_true: &Array1<f64>) -> f64 {
    accuracy(y_true, &Array1::ones(y_true.len()))
}

/// A configured or fitted classifier of one of the supported families.
/// All families compensate for class imbalance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family", content = "model")]
pub enum Classifier {
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingClassifier),
}

impl Classifier {
    /// Build an unfitted classifier from a hyperparameter combination.
    /// Names outside the family's allow-list are rejected.
    pub fn from_params(family: ModelFamily, params: &ParamSet, random_state: u64) -> Result<Self> {
        let allowed = family.allowed_params();
        if let Some(unknown) = params.keys().find(|k| !allowed.contains(&k.as_str())) {
            return Err(MlopsError::UnknownParameter {
                family: family.name().to_string(),
                name: unknown.clone(),
            });
        }

        Ok(match family {
            ModelFamily::LogisticRegression => {
                let solver = match params.get("solver") {
                    Some(v) => v
                        .as_str()
                        .ok_or_else(|| MlopsError::InvalidParameter {
                            name: "solver".to_string(),
                            value: v.to_string(),
                            reason: "expected a solver name".to_string(),
                        })?
                        .parse::<Solver>()?,
                    None => Solver::Lbfgs,
                };
                Classifier::LogisticRegression(
                    LogisticRegression::new()
                        .with_c(param_f64(params, "C", 1.0)?)
                        .with_solver(solver)
                        .with_max_iter(param_usize(params, "max_iter", 100)?)
                        .with_balanced_weights(true),
                )
            }
            ModelFamily::RandomForest => Classifier::RandomForest(
                RandomForest::new(param_usize(params, "n_estimators", 100)?)
                    .with_max_depth(param_opt_usize(params, "max_depth", None)?)
                    .with_min_samples_split(param_usize(params, "min_samples_split", 2)?)
                    .with_balanced_bootstrap(true)
                    .with_random_state(random_state),
            ),
            ModelFamily::GradientBoosting => {
                let config = GradientBoostingConfig {
                    n_estimators: param_usize(params, "n_estimators", 100)?,
                    max_depth: param_usize(params, "max_depth", 6)?,
                    learning_rate: param_f64(params, "learning_rate", 0.1)?,
                    scale_pos_weight: 1.0,
                    random_state: Some(random_state),
                    ..Default::default()
                };
                Classifier::GradientBoosting(GradientBoostingClassifier::new(config))
            }
        })
    }

    pub fn family(&self) -> ModelFamily {
        match self {
            Classifier::LogisticRegression(_) => ModelFamily::LogisticRegression,
            Classifier::RandomForest(_) => ModelFamily::RandomForest,
            Classifier::GradientBoosting(_) => ModelFamily::GradientBoosting,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let family = self.family().name();
        let result = match self {
            Classifier::LogisticRegression(m) => m.fit(x, y).map(|_| ()),
            Classifier::RandomForest(m) => m.fit(x, y).map(|_| ()),
            Classifier::GradientBoosting(m) => m.fit(x, y).map(|_| ()),
        };
        result.map_err(|e| match e {
            MlopsError::Training { .. } => e,
            other => MlopsError::training(family, other.to_string()),
        })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Classifier::LogisticRegression(m) => m.predict(x),
            Classifier::RandomForest(m) => m.predict(x),
            Classifier::GradientBoosting(m) => m.predict(x),
        }
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Classifier::LogisticRegression(m) => m.predict_proba(x),
            Classifier::RandomForest(m) => m.predict_proba(x),
            Classifier::GradientBoosting(m) => m.predict_proba(x),
        }
    }
}
