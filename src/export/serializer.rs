//! Persisted model format
//!
//! A single JSON document holding the fitted pipeline, the classifier and
//! metadata about the run that produced them. The payload carries a SHA-256
//! checksum that is verified on load.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{MlopsError, Result};
use crate::preprocessing::FeaturePipeline;
use crate::training::{Classifier, ModelFamily, ModelMetrics, ParamSet, TrialResult};

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 1;

/// Model metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_name: String,
    pub family: ModelFamily,
    /// Hyperparameters chosen by the grid search
    pub params: ParamSet,
    /// Held-out metrics
    pub metrics: ModelMetrics,
    /// Mean CV accuracy of the chosen combination
    pub cv_score: f64,
    /// Raw input columns, in pipeline order
    pub feature_columns: Vec<String>,
    /// Version of this crate that wrote the file
    pub crate_version: String,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedModel {
    pub format_version: u32,
    pub metadata: ModelMetadata,
    pub pipeline: FeaturePipeline,
    pub classifier: Classifier,
    /// Hex SHA-256 of the serialized pipeline and classifier
    pub checksum: String,
}

impl PersistedModel {
    pub fn new(metadata: ModelMetadata, pipeline: FeaturePipeline, classifier: Classifier) -> Result<Self> {
        if !pipeline.is_fitted() {
            return Err(MlopsError::ModelNotFitted);
        }
        let checksum = payload_checksum(&pipeline, &classifier)?;
        Ok(Self {
            format_version: FORMAT_VERSION,
            metadata,
            pipeline,
            classifier,
            checksum,
        })
    }

    /// Package the selected trial
    pub fn from_trial(trial: TrialResult) -> Result<Self> {
        let metadata = ModelMetadata {
            model_name: trial.model_name,
            family: trial.family,
            params: trial.best_params,
            metrics: trial.metrics,
            cv_score: trial.cv_score,
            feature_columns: trial.pipeline.input_columns(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            trained_at: Utc::now(),
        };
        Self::new(metadata, trial.pipeline, trial.classifier)
    }

    pub fn verify_checksum(&self) -> Result<bool> {
        Ok(payload_checksum(&self.pipeline, &self.classifier)? == self.checksum)
    }

    /// Write to `path`, creating parent directories and replacing any previous file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;

        info!(
            path = %path.display(),
            model = %self.metadata.model_name,
            f1 = self.metadata.metrics.f1_score,
            "Model saved"
        );
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            MlopsError::Serialization(format!("cannot open model {}: {}", path.display(), e))
        })?;
        let model: PersistedModel = serde_json::from_reader(BufReader::new(file))?;

        if model.format_version != FORMAT_VERSION {
            return Err(MlopsError::Serialization(format!(
                "unsupported model format version {} (expected {})",
                model.format_version, FORMAT_VERSION
            )));
        }
        if !model.verify_checksum()? {
            return Err(MlopsError::Serialization(format!(
                "checksum mismatch in {}",
                path.display()
            )));
        }

        debug!(path = %path.display(), model = %model.metadata.model_name, "Model loaded");
        Ok(model)
    }
}

fn payload_checksum(pipeline: &FeaturePipeline, classifier: &Classifier) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(pipeline)?);
    hasher.update(serde_json::to_vec(classifier)?);
    Ok(format!("{:x}", hasher.finalize()))
}
