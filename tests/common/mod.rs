//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use diabetes_mlops::config::AppConfig;
use diabetes_mlops::export::PersistedModel;
use diabetes_mlops::schema::{api_field_name, Schema, LABEL_COLUMN};
use diabetes_mlops::tracking::NoopTracker;
use diabetes_mlops::training::{FamilyConfig, ModelFamily, ModelSelector, ParamGrid, ParamValue};
use diabetes_mlops::utils::DataSaver;
use polars::prelude::*;

/// Deterministic survey table shaped like the reference dataset.
/// The label follows Polyuria except for every eleventh row.
pub fn survey_frame(n: usize) -> DataFrame {
    let schema = Schema::diabetes();
    let polyuria: Vec<bool> = (0..n).map(|i| i % 5 < 3).collect();
    let positive: Vec<bool> = polyuria
        .iter()
        .enumerate()
        .map(|(i, &p)| if i % 11 == 0 { !p } else { p })
        .collect();

    let mut columns: Vec<Column> = Vec::new();
    let ages: Vec<i64> = (0..n).map(|i| 20 + (i as i64 * 7) % 60).collect();
    columns.push(Column::new("Age".into(), ages));

    for name in schema.categorical_columns() {
        let values: Vec<&str> = match name.as_str() {
            "Gender" => (0..n).map(|i| if i % 2 == 0 { "Male" } else { "Female" }).collect(),
            "Polyuria" => polyuria.iter().map(|&p| if p { "Yes" } else { "No" }).collect(),
            "Polydipsia" => positive
                .iter()
                .enumerate()
                .map(|(i, &p)| if p && i % 4 != 0 { "Yes" } else { "No" })
                .collect(),
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

/// 90% Positive table whose features carry no signal: every block of ten
/// rows shares one Age and holds a single Negative, all other columns are
/// constant. No classifier can beat always predicting Positive on it.
pub fn skewed_frame(n: usize) -> DataFrame {
    let schema = Schema::diabetes();
    let mut columns: Vec<Column> = Vec::new();
    let ages: Vec<i64> = (0..n).map(|i| 20 + ((i / 10) % 50) as i64).collect();
    columns.push(Column::new("Age".into(), ages));

    for name in schema.categorical_columns() {
        let value = if name == "Gender" { "Male" } else { "No" };
        columns.push(Column::new(name.as_str().into(), vec![value; n]));
    }

    let labels: Vec<&str> = (0..n)
        .map(|i| if i % 10 == 0 { "Negative" } else { "Positive" })
        .collect();
    columns.push(Column::new(LABEL_COLUMN.into(), labels));
    DataFrame::new(columns).unwrap()
}

pub fn write_csv(df: &DataFrame, path: &Path) -> PathBuf {
    let mut df = df.clone();
    DataSaver::save_csv(&mut df, path).unwrap();
    path.to_path_buf()
}

/// One tiny grid per family so the end-to-end tests stay fast
pub fn small_families() -> Vec<FamilyConfig> {
    vec![
        FamilyConfig::new(
            ModelFamily::LogisticRegression,
            ParamGrid::new()
                .with_param("C", vec![0.1, 1.0])
                .with_param("solver", vec!["lbfgs"])
                .with_param("max_iter", vec![100i64]),
        )
        .with_known_good("C", 1.0),
        FamilyConfig::new(
            ModelFamily::RandomForest,
            ParamGrid::new()
                .with_param("n_estimators", vec![10i64])
                .with_values("max_depth", vec![ParamValue::Int(5), ParamValue::None])
                .with_param("min_samples_split", vec![2i64]),
        ),
        FamilyConfig::new(
            ModelFamily::GradientBoosting,
            ParamGrid::new()
                .with_param("n_estimators", vec![10i64])
                .with_param("max_depth", vec![3i64])
                .with_param("learning_rate", vec![0.1]),
        )
        .with_known_good("learning_rate", 0.1),
    ]
}

/// Config rooted in `dir` with tracking off and small grids
pub fn test_config(dir: &Path) -> AppConfig {
    AppConfig::default()
        .with_data_path(dir.join("raw").join("diabetes.csv"))
        .with_processed_path(dir.join("processed").join("diabetes.csv"))
        .with_model_path(dir.join("models").join("trained_model.json"))
        .with_predictions_path(dir.join("predictions").join("predictions.csv"))
        .with_tracking_uri("none")
        .with_cv_folds(3)
        .with_families(small_families())
}

/// Best model of a quick selection run over `survey_frame(n)`
pub fn fitted_model(n: usize) -> PersistedModel {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path()).with_families(small_families().into_iter().take(1).collect());
    let outcome = ModelSelector::new(&config)
        .run(&survey_frame(n), &mut NoopTracker)
        .unwrap();
    PersistedModel::from_trial(outcome.into_best().unwrap()).unwrap()
}

/// One request body in API field naming, built from row `i` of `survey_frame`
pub fn api_record(df: &DataFrame, i: usize) -> serde_json::Map<String, serde_json::Value> {
    let mut record = serde_json::Map::new();
    for name in Schema::diabetes().feature_columns() {
        let column = df.column(&name).unwrap();
        let value = match column.get(i).unwrap() {
            AnyValue::Int64(v) => serde_json::Value::from(v),
            AnyValue::String(s) => serde_json::Value::from(s),
            other => panic!("unexpected value {:?}", other),
        };
        record.insert(api_field_name(&name), value);
    }
    record
}
