//! Exhaustive cross-validated grid search
//!
//! The feature pipeline is refitted on each fold's training rows, so no fold
//! statistics leak into its validation rows. All (combination, fold) pairs
//! are scored on the rayon pool; the result does not depend on scheduling.

use std::time::Instant;

use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::config::{ModelFamily, ParamGrid, ParamSet};
use super::cross_validation::CrossValidator;
use super::models::{accuracy, Classifier};
use crate::error::{MlopsError, Result};
use crate::preprocessing::FeaturePipeline;
use crate::utils::take_rows;

/// CV score of one combination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: ParamSet,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
}

/// Outcome of a search: the winning combination refitted on all rows
#[derive(Debug, Clone)]
pub struct GridSearchResult {
    pub best_params: ParamSet,
    /// Mean CV accuracy of the winning combination
    pub best_score: f64,
    pub candidates: Vec<CandidateScore>,
    pub pipeline: FeaturePipeline,
    pub classifier: Classifier,
}

struct PreparedFold {
    x_train: Array2<f64>,
    y_train: Array1<f64>,
    x_valid: Array2<f64>,
    y_valid: Array1<f64>,
}

pub struct GridSearchCV {
    family: ModelFamily,
    grid: ParamGrid,
    cv: CrossValidator,
    random_state: u64,
}

impl GridSearchCV {
    pub fn new(family: ModelFamily, grid: ParamGrid, n_splits: usize) -> Self {
        Self {
            family,
            grid,
            cv: CrossValidator::stratified(n_splits),
            random_state: 42,
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Search over `df`/`y` starting from an unfitted `pipeline`
    pub fn fit(&self, pipeline: &FeaturePipeline, df: &DataFrame, y: &Array1<f64>) -> Result<GridSearchResult> {
        let family = self.family.name();
        if df.height() != y.len() {
            return Err(MlopsError::ShapeError {
                expected: format!("{} labels", df.height()),
                actual: format!("{} labels", y.len()),
            });
        }

        let combos = self.grid.combinations();
        if combos.is_empty() {
            return Err(MlopsError::training(family, "empty hyperparameter grid"));
        }

        // Reject bad names or values before any fitting
        let prototypes: Vec<Classifier> = combos
            .iter()
            .map(|params| Classifier::from_params(self.family, params, self.random_state))
            .collect::<Result<_>>()?;

        let start = Instant::now();
        let splits = self.cv.split(y)?;
        let folds: Vec<PreparedFold> = splits
            .par_iter()
            .map(|split| {
                let mut fold_pipeline = pipeline.clone();
                let train_df = take_rows(df, &split.train_indices)?;
                let valid_df = take_rows(df, &split.test_indices)?;
                Ok(PreparedFold {
                    x_train: fold_pipeline.fit_transform(&train_df)?,
                    y_train: y.select(Axis(0), &split.train_indices),
                    x_valid: fold_pipeline.transform(&valid_df)?,
                    y_valid: y.select(Axis(0), &split.test_indices),
                })
            })
            .collect::<Result<_>>()?;

        let n_folds = folds.len();
        let tasks: Vec<(usize, usize)> = (0..combos.len())
            .flat_map(|c| (0..n_folds).map(move |f| (c, f)))
            .collect();

        let scores: Vec<f64> = tasks
            .par_iter()
            .map(|&(c, f)| {
                let fold = &folds[f];
                let mut model = prototypes[c].clone();
                model.fit(&fold.x_train, &fold.y_train)?;
                let pred = model.predict(&fold.x_valid)?;
                Ok(accuracy(&fold.y_valid, &pred))
            })
            .collect::<Result<_>>()?;

        let candidates: Vec<CandidateScore> = combos
            .into_iter()
            .enumerate()
            .map(|(c, params)| {
                let fold_scores = scores[c * n_folds..(c + 1) * n_folds].to_vec();
                let mean_score = fold_scores.iter().sum::<f64>() / n_folds as f64;
                CandidateScore {
                    params,
                    fold_scores,
                    mean_score,
                }
            })
            .collect();

        // strictly greater replaces, so the earliest combination wins ties
        let mut best_idx = 0;
        for (i, cand) in candidates.iter().enumerate() {
            if cand.mean_score > candidates[best_idx].mean_score {
                best_idx = i;
            }
        }

        debug!(
            family,
            combinations = candidates.len(),
            folds = n_folds,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Cross-validation finished"
        );

        let mut refit_pipeline = pipeline.clone();
        let x_all = refit_pipeline.fit_transform(df)?;
        let mut classifier = prototypes[best_idx].clone();
        classifier.fit(&x_all, y)?;

        let best = &candidates[best_idx];
        info!(
            family,
            cv_accuracy = best.mean_score,
            params = %format_params(&best.params),
            "Grid search selected combination"
        );

        Ok(GridSearchResult {
            best_params: best.params.clone(),
            best_score: best.mean_score,
            pipeline: refit_pipeline,
            classifier,
            candidates,
        })
    }
}

/// `a=1, b=x` rendering for logs
pub fn format_params(params: &ParamSet) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (DataFrame, Array1<f64>) {
        let ages: Vec<i64> = (0..30).map(|i| 20 + i * 2).collect();
        let obesity: Vec<&str> = (0..30).map(|i| if i % 3 == 0 { "Yes" } else { "No" }).collect();
        let y: Vec<f64> = (0..30).map(|i| if i >= 15 { 1.0 } else { 0.0 }).collect();
        let df = df!("Age" => ages, "Obesity" => obesity).unwrap();
        (df, Array1::from_vec(y))
    }

    fn pipeline() -> FeaturePipeline {
        FeaturePipeline::builder()
            .with_numeric(&["Age"])
            .with_categorical(&["Obesity"])
            .build()
            .unwrap()
    }

    #[test]
    fn test_grid_search_scores_every_combination() {
        let (df, y) = data();
        let grid = ParamGrid::new()
            .with_param("C", vec![0.1, 10.0])
            .with_param("solver", vec!["lbfgs"]);

        let result = GridSearchCV::new(ModelFamily::LogisticRegression, grid, 3)
            .fit(&pipeline(), &df, &y)
            .unwrap();

        assert_eq!(result.candidates.len(), 2);
        assert!(result.candidates.iter().all(|c| c.fold_scores.len() == 3));
        assert!(result.best_score > 0.6);
        assert!(result.pipeline.is_fitted());
    }

    #[test]
    fn test_ties_keep_first_combination() {
        let (df, y) = data();
        // identical combinations score identically
        let grid = ParamGrid::new().with_param("max_iter", vec![100i64, 100]);
        let result = GridSearchCV::new(ModelFamily::LogisticRegression, grid, 3)
            .fit(&pipeline(), &df, &y)
            .unwrap();
        assert_eq!(result.candidates[0].mean_score, result.candidates[1].mean_score);
        assert_eq!(result.best_params, result.candidates[0].params);
    }

    #[test]
    fn test_unknown_parameter_fails_search() {
        let (df, y) = data();
        let grid = ParamGrid::new().with_param("gamma", vec![1.0]);
        let err = GridSearchCV::new(ModelFamily::GradientBoosting, grid, 3)
            .fit(&pipeline(), &df, &y)
            .unwrap_err();
        assert!(matches!(err, MlopsError::UnknownParameter { .. }));
    }

    #[test]
    fn test_search_is_reproducible() {
        let (df, y) = data();
        let grid = ParamGrid::new()
            .with_param("n_estimators", vec![5i64, 10])
            .with_param("max_depth", vec![2i64, 4]);
        let run = || {
            GridSearchCV::new(ModelFamily::RandomForest, grid.clone(), 3)
                .with_random_state(42)
                .fit(&pipeline(), &df, &y)
                .unwrap()
        };
        let a = run();
        let b = run();
        assert_eq!(a.best_params, b.best_params);
        assert_eq!(a.best_score, b.best_score);
    }
}
