//! Binary encoding of categorical columns
//!
//! Each category gets an ordinal starting at 1 in first-seen order of the
//! fitted data. The ordinal is written as bits, most significant first, one
//! output column per bit named `{column}_{bit}`. Categories never seen during
//! fit (and nulls) encode as all zeros.

use crate::error::{MlopsError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Learned ordinals of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub column: String,
    /// Categories in first-seen order; ordinal = index + 1
    pub categories: Vec<String>,
    pub n_bits: usize,
}

impl ColumnMapping {
    fn new(column: String, categories: Vec<String>) -> Self {
        let n_bits = bit_width(categories.len());
        Self {
            column,
            categories,
            n_bits,
        }
    }

    pub fn ordinal(&self, category: &str) -> Option<usize> {
        self.categories
            .iter()
            .position(|c| c == category)
            .map(|i| i + 1)
    }

    pub fn output_names(&self) -> Vec<String> {
        (0..self.n_bits).map(|bit| format!("{}_{}", self.column, bit)).collect()
    }

    /// Bits of a category's ordinal, most significant first
    pub fn encode(&self, category: Option<&str>) -> Vec<f64> {
        let ordinal = category.and_then(|c| self.ordinal(c)).unwrap_or(0);
        (0..self.n_bits)
            .map(|bit| {
                let shift = self.n_bits - 1 - bit;
                ((ordinal >> shift) & 1) as f64
            })
            .collect()
    }
}

/// Number of bits needed to write the largest ordinal
fn bit_width(n_categories: usize) -> usize {
    if n_categories == 0 {
        1
    } else {
        (usize::BITS - n_categories.leading_zeros()) as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryEncoder {
    columns: Vec<String>,
    mappings: Vec<ColumnMapping>,
    is_fitted: bool,
}

impl BinaryEncoder {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            mappings: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn mappings(&self) -> &[ColumnMapping] {
        &self.mappings
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let mut mappings = Vec::with_capacity(self.columns.len());

        for name in &self.columns {
            let values = string_values(df, name)?;
            let mut categories: Vec<String> = Vec::new();
            for value in values.iter().flatten() {
                if !categories.iter().any(|c| c == value) {
                    categories.push(value.clone());
                }
            }
            mappings.push(ColumnMapping::new(name.clone(), categories));
        }

        self.mappings = mappings;
        self.is_fitted = true;
        Ok(self)
    }

    /// Output column names in transform order
    pub fn output_names(&self) -> Vec<String> {
        self.mappings.iter().flat_map(|m| m.output_names()).collect()
    }

    /// Encoded bit columns, in [`Self::output_names`] order
    pub fn transform(&self, df: &DataFrame) -> Result<Vec<Vec<f64>>> {
        if !self.is_fitted {
            return Err(MlopsError::ModelNotFitted);
        }

        let mut out = Vec::new();
        for mapping in &self.mappings {
            let values = string_values(df, &mapping.column)?;
            let mut bits = vec![Vec::with_capacity(values.len()); mapping.n_bits];
            for value in &values {
                for (bit, v) in mapping.encode(value.as_deref()).into_iter().enumerate() {
                    bits[bit].push(v);
                }
            }
            out.extend(bits);
        }
        Ok(out)
    }
}

fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| MlopsError::MissingColumns(vec![name.to_string()]))?;
    let series = column.as_materialized_series().cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}
