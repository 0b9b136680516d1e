//! Feature pipeline: standard scaling of numeric columns plus binary
//! encoding of categorical columns, producing a dense `Array2<f64>`.

use std::time::Instant;

use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::encoder::BinaryEncoder;
use super::scaler::StandardScaler;
use crate::error::{MlopsError, Result};

/// Which transformer produced an output column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputKind {
    Scaled,
    Encoded,
}

/// One column of the transformed matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputColumn {
    pub name: String,
    /// Input column it was derived from
    pub source: String,
    pub kind: OutputKind,
}

/// Declares numeric and categorical inputs, then builds an unfitted pipeline
#[derive(Debug, Clone, Default)]
pub struct FeaturePipelineBuilder {
    numeric: Vec<String>,
    categorical: Vec<String>,
}

impl FeaturePipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_numeric<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.numeric = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    pub fn with_categorical<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.categorical = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    pub fn build(&self) -> Result<FeaturePipeline> {
        if self.numeric.is_empty() && self.categorical.is_empty() {
            return Err(MlopsError::PipelineConstruction(
                "no feature columns declared".to_string(),
            ));
        }

        let overlap: Vec<String> = self
            .numeric
            .iter()
            .filter(|c| self.categorical.contains(c))
            .cloned()
            .collect();
        if !overlap.is_empty() {
            return Err(MlopsError::PipelineConstruction(format!(
                "columns declared both numeric and categorical: {}",
                overlap.join(", ")
            )));
        }

        Ok(FeaturePipeline {
            scaler: StandardScaler::new(self.numeric.clone()),
            encoder: BinaryEncoder::new(self.categorical.clone()),
            is_fitted: false,
        })
    }
}

/// Composed transformer. Statistics come only from the rows passed to `fit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePipeline {
    scaler: StandardScaler,
    encoder: BinaryEncoder,
    is_fitted: bool,
}

impl FeaturePipeline {
    pub fn builder() -> FeaturePipelineBuilder {
        FeaturePipelineBuilder::new()
    }

    pub fn numeric_columns(&self) -> &[String] {
        self.scaler.columns()
    }

    pub fn categorical_columns(&self) -> &[String] {
        self.encoder.columns()
    }

    /// Input columns the pipeline reads, numeric first
    pub fn input_columns(&self) -> Vec<String> {
        self.numeric_columns()
            .iter()
            .chain(self.categorical_columns().iter())
            .cloned()
            .collect()
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn encoder(&self) -> &BinaryEncoder {
        &self.encoder
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Input columns absent from `df`
    pub fn missing_columns(&self, df: &DataFrame) -> Vec<String> {
        let present: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        self.input_columns()
            .into_iter()
            .filter(|c| !present.contains(&c.as_str()))
            .collect()
    }

    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let missing = self.missing_columns(df);
        if !missing.is_empty() {
            return Err(MlopsError::MissingColumns(missing));
        }

        let start = Instant::now();
        self.scaler.fit(df)?;
        self.encoder.fit(df)?;
        self.is_fitted = true;

        debug!(
            rows = df.height(),
            outputs = self.output_columns().len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Feature pipeline fitted"
        );
        Ok(self)
    }

    /// Output layout: scaled columns, then encoded bit columns
    pub fn output_columns(&self) -> Vec<OutputColumn> {
        let scaled = self.scaler.columns().iter().map(|c| OutputColumn {
            name: c.clone(),
            source: c.clone(),
            kind: OutputKind::Scaled,
        });
        let encoded = self.encoder.mappings().iter().flat_map(|m| {
            m.output_names().into_iter().map(move |name| OutputColumn {
                name,
                source: m.column.clone(),
                kind: OutputKind::Encoded,
            })
        });
        scaled.chain(encoded).collect()
    }

    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(MlopsError::ModelNotFitted);
        }
        let missing = self.missing_columns(df);
        if !missing.is_empty() {
            return Err(MlopsError::MissingColumns(missing));
        }

        let mut columns = self.scaler.transform(df)?;
        columns.extend(self.encoder.transform(df)?);

        let n_rows = df.height();
        let n_cols = columns.len();
        Ok(Array2::from_shape_fn((n_rows, n_cols), |(i, j)| columns[j][i]))
    }

    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<Array2<f64>> {
        self.fit(df)?;
        self.transform(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df!(
            "Age" => &[30i64, 40, 50, 60],
            "Gender" => &["Male", "Female", "Female", "Male"],
            "Obesity" => &["No", "Yes", "No", "No"]
        )
        .unwrap()
    }

    fn builder() -> FeaturePipelineBuilder {
        FeaturePipeline::builder()
            .with_numeric(&["Age"])
            .with_categorical(&["Gender", "Obesity"])
    }

    #[test]
    fn test_builds_identical_pipelines() {
        assert_eq!(builder().build().unwrap(), builder().build().unwrap());
    }

    #[test]
    fn test_overlap_is_construction_error() {
        let result = FeaturePipeline::builder()
            .with_numeric(&["Age"])
            .with_categorical(&["Age", "Gender"])
            .build();
        assert!(matches!(result, Err(MlopsError::PipelineConstruction(_))));
    }

    #[test]
    fn test_empty_is_construction_error() {
        let result = FeaturePipeline::builder().build();
        assert!(matches!(result, Err(MlopsError::PipelineConstruction(_))));
    }

    #[test]
    fn test_transform_layout() {
        let mut pipeline = builder().build().unwrap();
        let x = pipeline.fit_transform(&frame()).unwrap();

        let names: Vec<String> = pipeline.output_columns().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Age", "Gender_0", "Gender_1", "Obesity_0", "Obesity_1"]);
        assert_eq!(x.dim(), (4, 5));
        // first row: Male (ordinal 1) and No (ordinal 1)
        assert_eq!(x[[0, 1]], 0.0);
        assert_eq!(x[[0, 2]], 1.0);
    }

    #[test]
    fn test_missing_input_columns_are_reported() {
        let mut pipeline = builder().build().unwrap();
        pipeline.fit(&frame()).unwrap();

        let partial = df!("Age" => &[30i64]).unwrap();
        match pipeline.transform(&partial) {
            Err(MlopsError::MissingColumns(cols)) => {
                assert_eq!(cols, vec!["Gender".to_string(), "Obesity".to_string()])
            }
            other => panic!("expected MissingColumns, got {:?}", other),
        }
    }
}
