//! Integration test: grid search and model selection

mod common;

use common::{skewed_frame, small_families, survey_frame, test_config};
use diabetes_mlops::preprocessing::{encode_labels, FeaturePipeline};
use diabetes_mlops::schema::LABEL_COLUMN;
use diabetes_mlops::tracking::{load_experiments, LocalTracker, NoopTracker, RunStatus};
use diabetes_mlops::training::{
    BaselinePolicy, FamilyConfig, GridSearchCV, ModelFamily, ModelSelector, ParamGrid,
};
use diabetes_mlops::MlopsError;
use tempfile::tempdir;

#[test]
fn test_grid_search_scores_every_combination() {
    let df = survey_frame(90);
    let y = encode_labels(&df, LABEL_COLUMN).unwrap();
    let pipeline = FeaturePipeline::builder()
        .with_numeric(&["Age"])
        .with_categorical(&["Gender", "Polyuria", "Polydipsia"])
        .build()
        .unwrap();

    let grid = ParamGrid::new()
        .with_param("C", vec![0.1, 1.0, 10.0])
        .with_param("solver", vec!["liblinear", "lbfgs"]);
    let result = GridSearchCV::new(ModelFamily::LogisticRegression, grid, 3)
        .fit(&pipeline, &df, &y)
        .unwrap();

    assert_eq!(result.candidates.len(), 6);
    assert!(result.candidates.iter().all(|c| c.fold_scores.len() == 3));
    assert!(result.best_score > 0.7, "cv accuracy {}", result.best_score);
    assert!(result.pipeline.is_fitted());
}

#[test]
fn test_selector_returns_one_trial_per_family() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let df = survey_frame(120);

    let outcome = ModelSelector::new(&config).run(&df, &mut NoopTracker).unwrap();
    assert_eq!(outcome.trials.len(), 3);
    assert!(outcome.failures.is_empty());

    let best = outcome.best().unwrap();
    let max_f1 = outcome
        .trials
        .iter()
        .map(|t| t.f1_score())
        .fold(0.0, f64::max);
    assert_eq!(best.f1_score(), max_f1);
    assert!(best.f1_score() > 0.0);
}

#[test]
fn test_selection_is_deterministic() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let df = survey_frame(100);

    let a = ModelSelector::new(&config).run(&df, &mut NoopTracker).unwrap();
    let b = ModelSelector::new(&config).run(&df, &mut NoopTracker).unwrap();

    let scores = |o: &diabetes_mlops::training::SelectionOutcome| -> Vec<(String, f64, f64)> {
        o.trials
            .iter()
            .map(|t| (t.model_name.clone(), t.cv_score, t.f1_score()))
            .collect()
    };
    assert_eq!(scores(&a), scores(&b));
}

#[test]
fn test_local_tracker_records_each_family() {
    let dir = tempdir().unwrap();
    let tracking_dir = dir.path().join("mlruns");
    let config = test_config(dir.path());
    let df = survey_frame(100);

    let mut tracker = LocalTracker::open(&tracking_dir, &config.experiment_name).unwrap();
    ModelSelector::new(&config).run(&df, &mut tracker).unwrap();

    let experiments = load_experiments(&tracking_dir).unwrap();
    assert_eq!(experiments.len(), 1);
    let runs = &experiments[0].runs;
    assert_eq!(runs.len(), 3);
    for run in runs {
        assert_eq!(run.status, RunStatus::Finished);
        assert!(run.metrics.contains_key("accuracy"));
        assert!(run.metrics.contains_key("f1_score"));
        assert!(!run.params.is_empty());
    }
}

#[test]
fn test_bad_family_is_skipped_not_fatal() {
    let dir = tempdir().unwrap();
    let mut families = small_families();
    families.insert(
        0,
        FamilyConfig::new(
            ModelFamily::RandomForest,
            ParamGrid::new().with_param("n_trees", vec![10i64]),
        ),
    );
    let config = test_config(dir.path()).with_families(families);

    let outcome = ModelSelector::new(&config)
        .run(&survey_frame(100), &mut NoopTracker)
        .unwrap();

    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].family, ModelFamily::RandomForest);
    assert_eq!(outcome.trials.len(), 3);
}

#[test]
fn test_no_model_when_every_family_fails() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path()).with_families(vec![FamilyConfig::new(
        ModelFamily::LogisticRegression,
        ParamGrid::new().with_param("alpha", vec![1.0]),
    )]);

    let outcome = ModelSelector::new(&config)
        .run(&survey_frame(60), &mut NoopTracker)
        .unwrap();
    assert!(outcome.trials.is_empty());
    assert!(matches!(outcome.into_best(), Err(MlopsError::NoModelFound)));
}

#[test]
fn test_warn_policy_keeps_trials_that_miss_the_baseline() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path()).with_baseline_policy(BaselinePolicy::Warn);

    let outcome = ModelSelector::new(&config)
        .run(&skewed_frame(200), &mut NoopTracker)
        .unwrap();
    assert_eq!(outcome.trials.len(), 3);
    for trial in &outcome.trials {
        assert!(trial.accuracy() <= trial.baseline_accuracy, "{} beat the baseline", trial.model_name);
        assert!(!trial.disqualified);
        assert!(trial.warnings.iter().any(|w| w.contains("baseline")));
    }
    assert!(outcome.best().is_some());
}

#[test]
fn test_reject_policy_disqualifies_trials_that_miss_the_baseline() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path()).with_baseline_policy(BaselinePolicy::Reject);

    let outcome = ModelSelector::new(&config)
        .run(&skewed_frame(200), &mut NoopTracker)
        .unwrap();
    assert_eq!(outcome.trials.len(), 3);
    assert!(outcome.trials.iter().all(|t| t.disqualified));
    assert!(outcome.best().is_none());
    assert!(matches!(outcome.into_best(), Err(MlopsError::NoModelFound)));
}
