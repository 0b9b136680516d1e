//! Integration test: validate -> train -> persist -> predict

mod common;

use common::{survey_frame, test_config, write_csv};
use diabetes_mlops::cli::{cmd_predict, cmd_train, cmd_validate};
use diabetes_mlops::export::PersistedModel;
use diabetes_mlops::inference::{Predictor, PREDICTION_COLUMN};
use diabetes_mlops::tracking::load_experiments;
use diabetes_mlops::training::{FamilyConfig, ModelFamily, ParamGrid};
use diabetes_mlops::utils::DataLoader;
use diabetes_mlops::MlopsError;
use polars::prelude::*;
use tempfile::tempdir;

#[test]
fn test_end_to_end_workflow() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    write_csv(&survey_frame(120), &config.data_path);

    cmd_validate(&config).unwrap();
    cmd_train(&config).unwrap();
    assert!(config.model_path.exists());

    let model = PersistedModel::load(&config.model_path).unwrap();
    assert!(model.metadata.metrics.f1_score > 0.0);
    assert_eq!(model.metadata.feature_columns.len(), 16);
    assert!(model.verify_checksum().unwrap());

    cmd_predict(&config).unwrap();
    let predictions = DataLoader::new().load_csv(&config.predictions_path).unwrap();
    assert_eq!(predictions.height(), 120);
    assert_eq!(predictions.width(), 1);
    assert_eq!(
        predictions.column(PREDICTION_COLUMN).unwrap().dtype(),
        &DataType::Boolean
    );
}

#[test]
fn test_training_with_local_tracking_store() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("mlruns");
    let config = test_config(dir.path()).with_tracking_uri(store.display().to_string());
    write_csv(&survey_frame(100), &config.data_path);

    cmd_train(&config).unwrap();

    let experiments = load_experiments(&store).unwrap();
    assert_eq!(experiments.len(), 1);
    assert_eq!(experiments[0].name, config.experiment_name);
    assert_eq!(experiments[0].runs.len(), 3);
    let best = experiments[0].best_run("f1_score", true).unwrap();

    let model = PersistedModel::load(&config.model_path).unwrap();
    assert_eq!(best.metrics["f1_score"], model.metadata.metrics.f1_score);
}

#[test]
fn test_no_qualifying_model_writes_nothing() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path()).with_families(vec![FamilyConfig::new(
        ModelFamily::GradientBoosting,
        ParamGrid::new().with_param("gamma", vec![0.5]),
    )]);
    write_csv(&survey_frame(60), &config.data_path);

    let err = cmd_train(&config).unwrap_err();
    assert!(matches!(err.downcast_ref::<MlopsError>(), Some(MlopsError::NoModelFound)));
    assert!(!config.model_path.exists());
}

#[test]
fn test_schema_violation_halts_training() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let mut df = survey_frame(100);
    let ages: Vec<i64> = (0..100).map(|i| if i == 0 { 120 } else { 40 }).collect();
    df.with_column(Series::new("Age".into(), ages)).unwrap();
    write_csv(&df, &config.data_path);

    let err = cmd_train(&config).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MlopsError>(),
        Some(MlopsError::SchemaViolation { type_errors: 0, content_errors: 1 })
    ));
    assert!(!config.model_path.exists());
}

#[test]
fn test_retraining_overwrites_model() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    write_csv(&survey_frame(100), &config.data_path);

    cmd_train(&config).unwrap();
    let first = PersistedModel::load(&config.model_path).unwrap();

    let config = config.with_families(vec![common::small_families().remove(0)]);
    cmd_train(&config).unwrap();
    let second = PersistedModel::load(&config.model_path).unwrap();

    assert_eq!(second.metadata.family, ModelFamily::LogisticRegression);
    assert!(second.metadata.trained_at >= first.metadata.trained_at);
}

#[test]
fn test_prediction_needs_every_feature() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    write_csv(&survey_frame(80), &config.data_path);
    cmd_train(&config).unwrap();

    let predictor = Predictor::load(&config.model_path).unwrap();
    let df = survey_frame(5).drop("Obesity").unwrap();
    assert!(matches!(
        predictor.predict_frame(&df),
        Err(MlopsError::MissingColumns(cols)) if cols == vec!["Obesity".to_string()]
    ));
}
