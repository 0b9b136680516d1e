//! Model selection across classifier families
//!
//! Families are tried one after another. Each trial grid-searches its family on
//! the training split, is scored on the held-out split and is logged to the
//! experiment tracker. The best trial is picked afterwards by [`select_best`].

use std::collections::BTreeMap;
use std::time::Instant;

use ndarray::{Array1, Axis};
use polars::prelude::*;
use serde::Serialize;
use tracing::{error, info, warn};

use super::config::{BaselinePolicy, FamilyConfig, ModelFamily, ParamSet};
use super::cross_validation::train_test_split;
use super::grid_search::{format_params, GridSearchCV};
use super::models::{baseline_accuracy, Classifier, ModelMetrics};
use crate::config::AppConfig;
use crate::error::{MlopsError, Result};
use crate::preprocessing::{encode_labels, FeaturePipeline, PipelineValidator};
use crate::schema::LABEL_COLUMN;
use crate::tracking::{ExperimentTracker, RunStatus};
use crate::utils::take_rows;

/// Outcome of one family's fit/evaluate/log cycle
#[derive(Debug, Clone)]
pub struct TrialResult {
    pub model_name: String,
    pub family: ModelFamily,
    pub best_params: ParamSet,
    /// Mean CV accuracy of the chosen combination
    pub cv_score: f64,
    /// Held-out metrics
    pub metrics: ModelMetrics,
    pub baseline_accuracy: f64,
    pub warnings: Vec<String>,
    /// Set when the baseline policy rejects the trial
    pub disqualified: bool,
    pub pipeline: FeaturePipeline,
    pub classifier: Classifier,
}

impl TrialResult {
    pub fn f1_score(&self) -> f64 {
        self.metrics.f1_score
    }

    pub fn accuracy(&self) -> f64 {
        self.metrics.accuracy
    }

    /// Whether the trial may be retained at all
    pub fn is_eligible(&self) -> bool {
        !self.disqualified && self.f1_score() > 0.0
    }
}

/// Highest F1 among eligible trials; on ties the earlier trial wins
pub fn select_best(trials: &[TrialResult]) -> Option<&TrialResult> {
    best_index(trials).map(|i| &trials[i])
}

fn best_index(trials: &[TrialResult]) -> Option<usize> {
    trials
        .iter()
        .enumerate()
        .filter(|(_, t)| t.is_eligible())
        .fold(None, |best: Option<(usize, f64)>, (i, trial)| match best {
            Some((_, f1)) if trial.f1_score() <= f1 => best,
            _ => Some((i, trial.f1_score())),
        })
        .map(|(i, _)| i)
}

/// A family that did not produce a trial
#[derive(Debug, Clone)]
pub struct FamilyFailure {
    pub family: ModelFamily,
    pub reason: String,
}

/// Everything a selection run produced
#[derive(Debug)]
pub struct SelectionOutcome {
    pub trials: Vec<TrialResult>,
    pub failures: Vec<FamilyFailure>,
}

impl SelectionOutcome {
    pub fn best(&self) -> Option<&TrialResult> {
        select_best(&self.trials)
    }

    /// Consume the outcome, keeping only the selected trial
    pub fn into_best(mut self) -> Result<TrialResult> {
        let idx = best_index(&self.trials).ok_or(MlopsError::NoModelFound)?;
        Ok(self.trials.swap_remove(idx))
    }
}

struct HoldOut {
    train: DataFrame,
    test: DataFrame,
    y_train: Array1<f64>,
    y_test: Array1<f64>,
}

/// Fitted pipeline and classifier as logged to the tracker
#[derive(Serialize)]
struct TrialArtifact<'a> {
    model_name: &'a str,
    params: &'a ParamSet,
    pipeline: &'a FeaturePipeline,
    classifier: &'a Classifier,
}

pub struct ModelSelector<'a> {
    config: &'a AppConfig,
}

impl<'a> ModelSelector<'a> {
    pub fn new(config: &'a AppConfig) -> Self {
        Self { config }
    }

    /// Run every configured family on `df` (features plus the label column).
    ///
    /// Pipeline construction and the post-fit pipeline check abort the run;
    /// a failing family is recorded and skipped.
    pub fn run(&self, df: &DataFrame, tracker: &mut dyn ExperimentTracker) -> Result<SelectionOutcome> {
        let config = self.config;
        let y = encode_labels(df, LABEL_COLUMN)?;

        let (train_idx, test_idx) = train_test_split(df.height(), config.test_size, config.random_state)?;
        let split = HoldOut {
            train: take_rows(df, &train_idx)?,
            test: take_rows(df, &test_idx)?,
            y_train: y.select(Axis(0), &train_idx),
            y_test: y.select(Axis(0), &test_idx),
        };
        info!(train_rows = split.train.height(), test_rows = split.test.height(), "Hold-out split");

        let pipeline = FeaturePipeline::builder()
            .with_numeric(config.numeric_features.as_slice())
            .with_categorical(config.categorical_features.as_slice())
            .build()?;

        let mut probe = pipeline.clone();
        probe.fit(&split.train)?;
        PipelineValidator::check(&probe, &split.train)?;

        let mut trials = Vec::new();
        let mut failures = Vec::new();

        for family_config in &config.families {
            let name = family_config.family.name();
            info!(family = name, combinations = family_config.grid.len(), "Training family");

            let run_open = report(tracker.start_run(name), tracker.backend(), "start run").is_some();

            match self.run_family(family_config, &pipeline, &split) {
                Ok(trial) => {
                    if run_open {
                        log_trial(tracker, &trial);
                        report(tracker.end_run(RunStatus::Finished), tracker.backend(), "end run");
                    }
                    trials.push(trial);
                }
                Err(e) => {
                    error!(family = name, error = %e, "Family failed, skipping");
                    if run_open {
                        report(tracker.end_run(RunStatus::Failed), tracker.backend(), "end run");
                    }
                    failures.push(FamilyFailure {
                        family: family_config.family,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let outcome = SelectionOutcome { trials, failures };
        match outcome.best() {
            Some(best) => info!(
                family = %best.model_name,
                f1 = best.f1_score(),
                params = %format_params(&best.best_params),
                "Best model selected"
            ),
            None => warn!("No model qualified for selection"),
        }
        Ok(outcome)
    }

    fn run_family(&self, family_config: &FamilyConfig, pipeline: &FeaturePipeline, split: &HoldOut) -> Result<TrialResult> {
        let family = family_config.family;
        let name = family.name();
        let start = Instant::now();
        let mut warnings = Vec::new();

        let allowed = family.allowed_params();
        if let Some(unknown) = family_config.grid.names().find(|n| !allowed.contains(n)) {
            return Err(MlopsError::UnknownParameter {
                family: name.to_string(),
                name: unknown.to_string(),
            });
        }

        for (param, value) in &family_config.known_good {
            if !family_config.grid.contains(param, value) {
                let msg = format!("known-good value {}={} is not in the grid", param, value);
                warn!(family = name, "{}", msg);
                warnings.push(msg);
            }
        }

        let search = GridSearchCV::new(family, family_config.grid.clone(), self.config.cv_folds)
            .with_random_state(self.config.random_state)
            .fit(pipeline, &split.train, &split.y_train)?;

        let x_test = search.pipeline.transform(&split.test)?;
        let y_pred = search.classifier.predict(&x_test)?;
        let metrics = ModelMetrics::compute_classification(&split.y_test, &y_pred);
        let baseline = baseline_accuracy(&split.y_test);

        let mut disqualified = false;
        if metrics.accuracy <= baseline {
            let msg = format!(
                "accuracy {:.4} does not beat the all-positive baseline {:.4}",
                metrics.accuracy, baseline
            );
            warn!(family = name, policy = ?self.config.baseline_policy, "{}", msg);
            disqualified = self.config.baseline_policy == BaselinePolicy::Reject;
            warnings.push(msg);
        }

        if !family_config.known_good.is_empty() {
            let selected_known_good = family_config.known_good.iter().all(|(param, value)| {
                search
                    .best_params
                    .get(param)
                    .map_or(false, |chosen| chosen.matches(value))
            });
            info!(family = name, selected_known_good, "Known-good comparison");
        }

        info!(
            family = name,
            accuracy = metrics.accuracy,
            f1 = metrics.f1_score,
            cv_accuracy = search.best_score,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Trial finished"
        );

        Ok(TrialResult {
            model_name: name.to_string(),
            family,
            best_params: search.best_params,
            cv_score: search.best_score,
            metrics,
            baseline_accuracy: baseline,
            warnings,
            disqualified,
            pipeline: search.pipeline,
            classifier: search.classifier,
        })
    }
}

fn log_trial(tracker: &mut dyn ExperimentTracker, trial: &TrialResult) {
    let backend = tracker.backend();
    let params: BTreeMap<String, String> = trial
        .best_params
        .iter()
        .map(|(k, v)| (k.clone(), v.to_string()))
        .collect();
    let metrics: BTreeMap<String, f64> = [
        ("accuracy", trial.accuracy()),
        ("f1_score", trial.f1_score()),
        ("cv_accuracy", trial.cv_score),
        ("baseline_accuracy", trial.baseline_accuracy),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    report(tracker.log_params(&params), backend, "log params");
    report(tracker.log_metrics(&metrics), backend, "log metrics");

    let artifact = TrialArtifact {
        model_name: &trial.model_name,
        params: &trial.best_params,
        pipeline: &trial.pipeline,
        classifier: &trial.classifier,
    };
    match serde_json::to_vec(&artifact) {
        Ok(bytes) => {
            report(tracker.log_artifact("model.json", &bytes), backend, "log artifact");
        }
        Err(e) => warn!(error = %e, "Could not serialize trial artifact"),
    }
}

/// Tracker failures never abort training
fn report<T>(result: Result<T>, backend: &str, action: &str) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(backend, action, error = %e, "Experiment tracking failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::config::ParamGrid;
    use crate::training::linear_models::LogisticRegression;

    fn trial(name: &str, f1: f64, disqualified: bool) -> TrialResult {
        TrialResult {
            model_name: name.to_string(),
            family: ModelFamily::LogisticRegression,
            best_params: ParamSet::new(),
            cv_score: 0.0,
            metrics: ModelMetrics {
                f1_score: f1,
                ..Default::default()
            },
            baseline_accuracy: 0.5,
            warnings: Vec::new(),
            disqualified,
            pipeline: FeaturePipeline::builder().with_numeric(&["Age"]).build().unwrap(),
            classifier: Classifier::LogisticRegression(LogisticRegression::new()),
        }
    }

    #[test]
    fn test_select_best_takes_max_f1() {
        let trials = vec![trial("a", 0.7, false), trial("b", 0.9, false), trial("c", 0.8, false)];
        assert_eq!(select_best(&trials).unwrap().model_name, "b");
    }

    #[test]
    fn test_select_best_ties_keep_earlier() {
        let trials = vec![trial("a", 0.9, false), trial("b", 0.9, false)];
        assert_eq!(select_best(&trials).unwrap().model_name, "a");
    }

    #[test]
    fn test_select_best_skips_ineligible() {
        let trials = vec![trial("zero", 0.0, false), trial("rejected", 0.95, true), trial("ok", 0.6, false)];
        assert_eq!(select_best(&trials).unwrap().model_name, "ok");

        let none = vec![trial("zero", 0.0, false)];
        assert!(select_best(&none).is_none());
        assert!(select_best(&[]).is_none());
    }

    #[test]
    fn test_into_best_without_trials() {
        let outcome = SelectionOutcome {
            trials: vec![trial("zero", 0.0, false)],
            failures: Vec::new(),
        };
        assert!(matches!(outcome.into_best(), Err(MlopsError::NoModelFound)));
    }

    #[test]
    fn test_unknown_grid_name_fails_family_only() {
        let config = AppConfig::default()
            .with_cv_folds(2)
            .with_families(vec![
                FamilyConfig::new(
                    ModelFamily::GradientBoosting,
                    ParamGrid::new().with_param("gamma", vec![0.1]),
                ),
                FamilyConfig::new(
                    ModelFamily::LogisticRegression,
                    ParamGrid::new().with_param("C", vec![1.0]),
                ),
            ]);

        let df = sample_frame(40);
        let mut tracker = crate::tracking::NoopTracker;
        let outcome = ModelSelector::new(&config).run(&df, &mut tracker).unwrap();

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].family, ModelFamily::GradientBoosting);
        assert_eq!(outcome.trials.len(), 1);
        assert_eq!(outcome.trials[0].family, ModelFamily::LogisticRegression);
    }

    #[test]
    fn test_missing_known_good_value_is_a_warning() {
        let config = AppConfig::default().with_cv_folds(2).with_families(vec![FamilyConfig::new(
            ModelFamily::LogisticRegression,
            ParamGrid::new().with_param("C", vec![10.0]),
        )
        .with_known_good("C", 1.0)]);

        let df = sample_frame(40);
        let outcome = ModelSelector::new(&config)
            .run(&df, &mut crate::tracking::NoopTracker)
            .unwrap();

        assert_eq!(outcome.trials.len(), 1);
        assert!(outcome.trials[0].warnings.iter().any(|w| w.contains("known-good")));
    }

    /// Rows where Polyuria drives the label; every schema column present
    fn sample_frame(n: usize) -> DataFrame {
        let schema = crate::schema::Schema::diabetes();
        let positive: Vec<bool> = (0..n).map(|i| i % 5 < 3).collect();
        let mut columns: Vec<Column> = Vec::new();

        let ages: Vec<i64> = (0..n).map(|i| 25 + (i as i64 * 7) % 50).collect();
        columns.push(Column::new("Age".into(), ages));
        for name in schema.categorical_columns() {
            let values: Vec<&str> = match name.as_str() {
                "Gender" => (0..n).map(|i| if i % 2 == 0 { "Male" } else { "Female" }).collect(),
                "Polyuria" => positive.iter().map(|&p| if p { "Yes" } else { "No" }).collect(),
                _ => (0..n).map(|i| if i % 3 == 0 { "Yes" } else { "No" }).collect(),
            };
            columns.push(Column::new(name.as_str().into(), values));
        }
        let labels: Vec<&str> = positive
            .iter()
            .map(|&p| if p { "Positive" } else { "Negative" })
            .collect();
        columns.push(Column::new(LABEL_COLUMN.into(), labels));
        DataFrame::new(columns).unwrap()
    }
}
