//! Prediction over a persisted model
//!
//! Inputs are checked for every required feature column before any transform
//! runs; an incomplete feature vector is never scored.

use std::path::Path;
use std::time::Instant;

use ndarray::Array1;
use polars::prelude::*;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{MlopsError, Result};
use crate::export::PersistedModel;
use crate::schema::api_field_name;
use crate::utils::DataSaver;

/// Name of the column written by batch prediction
pub const PREDICTION_COLUMN: &str = "Prediction";

/// Loaded model, shared read-only between callers
#[derive(Debug, Clone)]
pub struct Predictor {
    model: PersistedModel,
}

impl Predictor {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let model = PersistedModel::load(path)?;
        info!(
            model = %model.metadata.model_name,
            features = model.metadata.feature_columns.len(),
            "Predictor ready"
        );
        Ok(Self::from_model(model))
    }

    pub fn from_model(model: PersistedModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &PersistedModel {
        &self.model
    }

    pub fn model_name(&self) -> &str {
        &self.model.metadata.model_name
    }

    /// Raw input columns the model needs
    pub fn feature_columns(&self) -> Vec<String> {
        self.model.pipeline.input_columns()
    }

    /// The same columns under their prediction API names
    pub fn api_fields(&self) -> Vec<String> {
        self.feature_columns().iter().map(|c| api_field_name(c)).collect()
    }

    /// Positive-class probabilities for every row of `df`
    pub fn predict_proba_frame(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let missing = self.model.pipeline.missing_columns(df);
        if !missing.is_empty() {
            return Err(MlopsError::MissingColumns(missing));
        }
        let x = self.model.pipeline.transform(df)?;
        self.model.classifier.predict_proba(&x)
    }

    /// 0/1 labels for every row of `df`. Extra columns are ignored.
    pub fn predict_frame(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let start = Instant::now();
        let missing = self.model.pipeline.missing_columns(df);
        if !missing.is_empty() {
            return Err(MlopsError::MissingColumns(missing));
        }

        let x = self.model.pipeline.transform(df)?;
        let predictions = self.model.classifier.predict(&x)?;
        debug!(
            rows = df.height(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Batch predicted"
        );
        Ok(predictions)
    }

    /// Predict one record keyed by API field names (or raw column names).
    /// Numeric features must be JSON integers, categorical ones strings.
    pub fn predict_record(&self, record: &Map<String, Value>) -> Result<f64> {
        let df = self.record_to_frame(record)?;
        let predictions = self.predict_frame(&df)?;
        predictions
            .first()
            .copied()
            .ok_or_else(|| MlopsError::Data("empty prediction".to_string()))
    }

    /// Predict `df` and write a one-column `Prediction` CSV to `path`.
    /// Returns the number of rows written.
    pub fn predict_batch_to_csv(&self, df: &DataFrame, path: impl AsRef<Path>) -> Result<usize> {
        let predictions = self.predict_frame(df)?;
        let flags: Vec<bool> = predictions.iter().map(|&p| p >= 0.5).collect();
        let n = flags.len();

        let mut out = DataFrame::new(vec![Column::new(PREDICTION_COLUMN.into(), flags)])?;
        DataSaver::save_csv(&mut out, path.as_ref())?;
        info!(rows = n, path = %path.as_ref().display(), "Predictions written");
        Ok(n)
    }

    fn record_to_frame(&self, record: &Map<String, Value>) -> Result<DataFrame> {
        let pipeline = &self.model.pipeline;
        let lookup = |column: &str| {
            record
                .get(&api_field_name(column))
                .or_else(|| record.get(column))
                .filter(|v| !v.is_null())
        };

        let missing: Vec<String> = pipeline
            .input_columns()
            .iter()
            .filter(|c| lookup(c.as_str()).is_none())
            .map(|c| api_field_name(c))
            .collect();
        if !missing.is_empty() {
            return Err(MlopsError::MissingColumns(missing));
        }

        let mut columns = Vec::with_capacity(pipeline.input_columns().len());
        // numeric features are integer-stored, so JSON floats are rejected
        for name in pipeline.numeric_columns() {
            let value = lookup(name.as_str())
                .and_then(Value::as_i64)
                .ok_or_else(|| invalid_field(name, "an integer"))?;
            columns.push(Column::new(name.as_str().into(), vec![value]));
        }
        for name in pipeline.categorical_columns() {
            let value = lookup(name.as_str())
                .and_then(Value::as_str)
                .ok_or_else(|| invalid_field(name, "a string"))?;
            columns.push(Column::new(name.as_str().into(), vec![value]));
        }

        Ok(DataFrame::new(columns)?)
    }
}

fn invalid_field(column: &str, expected: &str) -> MlopsError {
    MlopsError::Validation(format!(
        "field '{}' must be {}",
        api_field_name(column),
        expected
    ))
}
