//! Standard scaling of numeric columns

use crate::error::{MlopsError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Fitted statistics of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub column: String,
    pub mean: f64,
    /// Population standard deviation, replaced by 1.0 when zero
    pub scale: f64,
}

/// Z-score scaler: `(x - mean) / std` with the population std (ddof = 0)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl StandardScaler {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            params: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn params(&self) -> &[ScalerParams] {
        &self.params
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let mut params = Vec::with_capacity(self.columns.len());

        for name in &self.columns {
            let values = numeric_values(df, name)?;
            if values.is_empty() {
                return Err(MlopsError::Data(format!("column '{}' is empty", name)));
            }

            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();

            params.push(ScalerParams {
                column: name.clone(),
                mean,
                scale: if std == 0.0 { 1.0 } else { std },
            });
        }

        self.params = params;
        self.is_fitted = true;
        Ok(self)
    }

    /// Scaled values per fitted column, in column order
    pub fn transform(&self, df: &DataFrame) -> Result<Vec<Vec<f64>>> {
        if !self.is_fitted {
            return Err(MlopsError::ModelNotFitted);
        }

        self.params
            .iter()
            .map(|p| {
                let values = numeric_values(df, &p.column)?;
                Ok(values.into_iter().map(|v| (v - p.mean) / p.scale).collect())
            })
            .collect()
    }
}

/// Read a column as non-null f64 values
pub(crate) fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| MlopsError::MissingColumns(vec![name.to_string()]))?;
    let series = column.as_materialized_series().cast(&DataType::Float64)?;

    series
        .f64()?
        .into_iter()
        .map(|v| v.ok_or_else(|| MlopsError::Data(format!("column '{}' has missing or non-numeric values", name))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_scaler_unit_variance() {
        let df = df!("Age" => &[20i64, 30, 40, 50, 60]).unwrap();

        let mut scaler = StandardScaler::new(vec!["Age".to_string()]);
        scaler.fit(&df).unwrap();
        let scaled = scaler.transform(&df).unwrap();

        let col = &scaled[0];
        let mean: f64 = col.iter().sum::<f64>() / col.len() as f64;
        let var: f64 = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / col.len() as f64;
        assert!(mean.abs() < 1e-10);
        assert!((var.sqrt() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_constant_column_keeps_unit_scale() {
        let df = df!("Age" => &[33i64, 33, 33]).unwrap();
        let mut scaler = StandardScaler::new(vec!["Age".to_string()]);
        scaler.fit(&df).unwrap();
        assert_eq!(scaler.params()[0].scale, 1.0);
        assert_eq!(scaler.transform(&df).unwrap()[0], vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_transform_before_fit() {
        let df = df!("Age" => &[1i64]).unwrap();
        let scaler = StandardScaler::new(vec!["Age".to_string()]);
        assert!(matches!(scaler.transform(&df), Err(MlopsError::ModelNotFitted)));
    }

    #[test]
    fn test_uses_training_statistics() {
        let train = df!("Age" => &[10i64, 20, 30]).unwrap();
        let other = df!("Age" => &[20i64]).unwrap();

        let mut scaler = StandardScaler::new(vec!["Age".to_string()]);
        scaler.fit(&train).unwrap();
        assert!(scaler.transform(&other).unwrap()[0][0].abs() < 1e-12);
    }
}
