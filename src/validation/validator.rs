//! Type and content checks of a loaded table.
//!
//! Only columns present in both the table and the schema are checked; extra
//! table columns are ignored. The type pass always visits every such column.
//! The content pass either stops at the first failing column
//! ([`ValidationMode::FailFast`]) or records every failure
//! ([`ValidationMode::Accumulate`]).

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{MlopsError, Result};
use crate::schema::{ColumnSpec, Schema, StorageType, ValueRule};

/// How the content pass reacts to a failing column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Abort the content pass at the first failing column
    #[default]
    FailFast,
    /// Check every column and record each failure
    Accumulate,
}

impl std::str::FromStr for ValidationMode {
    type Err = MlopsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "fail-fast" | "failfast" => Ok(ValidationMode::FailFast),
            "accumulate" => Ok(ValidationMode::Accumulate),
            other => Err(MlopsError::Config(format!("unknown validation mode '{}'", other))),
        }
    }
}

/// One recorded schema violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub column: String,
    pub reason: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.column, self.reason)
    }
}

/// Outcome of validating one table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub type_errors: Vec<Violation>,
    pub content_errors: Vec<Violation>,
}

impl ValidationReport {
    pub fn type_error_count(&self) -> usize {
        self.type_errors.len()
    }

    pub fn content_error_count(&self) -> usize {
        self.content_errors.len()
    }

    pub fn error_count(&self) -> usize {
        self.type_errors.len() + self.content_errors.len()
    }

    pub fn is_valid(&self) -> bool {
        self.error_count() == 0
    }

    /// Convert a failed report into [`MlopsError::SchemaViolation`]
    pub fn into_result(self) -> Result<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(MlopsError::SchemaViolation {
                type_errors: self.type_error_count(),
                content_errors: self.content_error_count(),
            })
        }
    }
}

/// Schema-driven table validator
#[derive(Debug, Clone)]
pub struct DataValidator {
    schema: Schema,
    mode: ValidationMode,
}

impl DataValidator {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            mode: ValidationMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Run the type pass and the content pass
    pub fn validate(&self, df: &DataFrame) -> Result<ValidationReport> {
        let checked: Vec<(&Column, &ColumnSpec)> = df
            .get_columns()
            .iter()
            .filter_map(|col| self.schema.get(col.name().as_str()).map(|spec| (col, spec)))
            .collect();

        let mut report = ValidationReport::default();

        for (col, spec) in &checked {
            if let Some(violation) = Self::check_type(col, spec) {
                warn!(column = %violation.column, reason = %violation.reason, "Type check failed");
                report.type_errors.push(violation);
            }
        }

        for (col, spec) in &checked {
            if let Some(violation) = Self::check_content(col, spec)? {
                warn!(column = %violation.column, reason = %violation.reason, "Content check failed");
                report.content_errors.push(violation);
                if self.mode == ValidationMode::FailFast {
                    break;
                }
            }
        }

        if report.is_valid() {
            info!(columns = checked.len(), rows = df.height(), "Validation passed");
        } else {
            warn!(
                type_errors = report.type_error_count(),
                content_errors = report.content_error_count(),
                "Validation failed"
            );
        }

        Ok(report)
    }

    fn check_type(col: &Column, spec: &ColumnSpec) -> Option<Violation> {
        match StorageType::of(col.dtype()) {
            Some(actual) if actual == spec.storage_type => None,
            _ => Some(Violation {
                column: spec.name.clone(),
                reason: format!("expected {} storage, found {}", spec.storage_type, col.dtype()),
            }),
        }
    }

    fn check_content(col: &Column, spec: &ColumnSpec) -> Result<Option<Violation>> {
        let series = col.as_materialized_series();
        let violation = |reason: String| {
            Some(Violation {
                column: spec.name.clone(),
                reason,
            })
        };

        match &spec.rule {
            ValueRule::Range { min, max } => {
                let values = series.cast(&DataType::Float64)?;
                for value in values.f64()?.into_iter() {
                    match value {
                        None => return Ok(violation("contains missing or non-numeric values".to_string())),
                        Some(v) if !spec.rule.admits_number(v) => {
                            return Ok(violation(format!("value {} outside [{}, {}]", v, min, max)));
                        }
                        Some(_) => {}
                    }
                }
            }
            ValueRule::OneOf(allowed) => {
                let values = series.cast(&DataType::String)?;
                for value in values.str()?.into_iter() {
                    match value {
                        None => return Ok(violation("contains missing values".to_string())),
                        Some(v) if !spec.rule.admits_str(v) => {
                            return Ok(violation(format!(
                                "value '{}' not in {{{}}}",
                                v,
                                allowed.join(", ")
                            )));
                        }
                        Some(_) => {}
                    }
                }
            }
        }

        Ok(None)
    }
}
