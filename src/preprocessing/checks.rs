//! Post-fit sanity checks of a feature pipeline

use ndarray::Axis;
use polars::prelude::*;
use tracing::debug;

use super::pipeline::{FeaturePipeline, OutputKind};
use super::scaler::numeric_values;
use crate::error::{MlopsError, Result};

/// Allowed distance of a scaled column's population std from 1.0
pub const STD_TOLERANCE: f64 = 0.01;

/// Verifies that scaling produced unit variance and encoding produced 0/1 output
pub struct PipelineValidator;

impl PipelineValidator {
    /// Check a fitted pipeline against the rows it was fitted on
    pub fn check(pipeline: &FeaturePipeline, train: &DataFrame) -> Result<()> {
        let transformed = pipeline.transform(train)?;

        for (j, output) in pipeline.output_columns().iter().enumerate() {
            let column = transformed.index_axis(Axis(1), j);
            let fail = |reason: String| MlopsError::PipelineCheck {
                column: output.name.clone(),
                reason,
            };

            match output.kind {
                OutputKind::Scaled => {
                    let raw = numeric_values(train, &output.source)?;
                    let pre_mean = raw.iter().sum::<f64>() / raw.len() as f64;
                    let post_mean = column.mean().unwrap_or(0.0);
                    let post_std = column.std(0.0);

                    if post_mean >= pre_mean {
                        return Err(fail(format!(
                            "mean did not decrease ({:.4} -> {:.4})",
                            pre_mean, post_mean
                        )));
                    }
                    if (post_std - 1.0).abs() > STD_TOLERANCE {
                        return Err(fail(format!("std {:.4} is not within {} of 1", post_std, STD_TOLERANCE)));
                    }
                }
                OutputKind::Encoded => {
                    if let Some(v) = column.iter().find(|v| **v != 0.0 && **v != 1.0) {
                        return Err(fail(format!("non-binary value {}", v)));
                    }
                }
            }
        }

        debug!(outputs = transformed.ncols(), "Pipeline checks passed");
        Ok(())
    }
}
