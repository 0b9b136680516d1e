//! Application configuration
//!
//! One immutable [`AppConfig`] is built at process start (defaults, then
//! environment overrides, then CLI flags) and passed by reference to every
//! stage.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MlopsError, Result};
use crate::schema::Schema;
use crate::training::{BaselinePolicy, FamilyConfig};
use crate::validation::ValidationMode;

pub const ENV_DATA_PATH: &str = "MLOPS_DATA_PATH";
pub const ENV_PROCESSED_PATH: &str = "MLOPS_PROCESSED_PATH";
pub const ENV_MODEL_PATH: &str = "MLOPS_MODEL_PATH";
pub const ENV_PREDICTIONS_PATH: &str = "MLOPS_PREDICTIONS_PATH";
pub const ENV_TRACKING_URI: &str = "MLFLOW_TRACKING_URI";
pub const ENV_EXPERIMENT: &str = "MLOPS_EXPERIMENT";
pub const ENV_API_HOST: &str = "API_HOST";
pub const ENV_API_PORT: &str = "API_PORT";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Raw input CSV
    pub data_path: PathBuf,
    /// Copy of the validated raw table, consumed by batch prediction
    pub processed_path: PathBuf,
    /// Persisted best model
    pub model_path: PathBuf,
    /// Batch prediction output
    pub predictions_path: PathBuf,

    pub random_state: u64,
    /// Fraction of rows held out for the final evaluation
    pub test_size: f64,
    pub cv_folds: usize,

    pub schema: Schema,
    pub numeric_features: Vec<String>,
    pub categorical_features: Vec<String>,
    /// Model families tried in order, each with its grid and known-good values
    pub families: Vec<FamilyConfig>,
    pub baseline_policy: BaselinePolicy,
    pub validation_mode: ValidationMode,

    /// `http(s)://...` for an MLflow server, a directory for the local store,
    /// or `none` to disable tracking
    pub tracking_uri: String,
    pub experiment_name: String,

    pub host: String,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        let schema = Schema::diabetes();
        Self {
            data_path: PathBuf::from("data/raw/diabetes_data_upload.csv"),
            processed_path: PathBuf::from("data/processed/diabetes_data_upload.csv"),
            model_path: PathBuf::from("models/trained_model.json"),
            predictions_path: PathBuf::from("data/predictions/predictions.csv"),
            random_state: 42,
            test_size: 0.2,
            cv_folds: 5,
            numeric_features: schema.numeric_columns(),
            categorical_features: schema.categorical_columns(),
            schema,
            families: FamilyConfig::reference(),
            baseline_policy: BaselinePolicy::default(),
            validation_mode: ValidationMode::default(),
            tracking_uri: "http://127.0.0.1:5000".to_string(),
            experiment_name: "Diabetes Prediction".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl AppConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_DATA_PATH) {
            self.data_path = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_PROCESSED_PATH) {
            self.processed_path = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_MODEL_PATH) {
            self.model_path = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_PREDICTIONS_PATH) {
            self.predictions_path = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_TRACKING_URI) {
            self.tracking_uri = v;
        }
        if let Some(v) = lookup(ENV_EXPERIMENT) {
            self.experiment_name = v;
        }
        if let Some(v) = lookup(ENV_API_HOST) {
            self.host = v;
        }
        if let Some(v) = lookup(ENV_API_PORT) {
            self.port = v.parse().map_err(|_| {
                MlopsError::Config(format!("{} must be a port number, got '{}'", ENV_API_PORT, v))
            })?;
        }

        debug!(data = %self.data_path.display(), model = %self.model_path.display(), "Configuration resolved");
        Ok(self)
    }

    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }

    pub fn with_processed_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.processed_path = path.into();
        self
    }

    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    pub fn with_predictions_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.predictions_path = path.into();
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_families(mut self, families: Vec<FamilyConfig>) -> Self {
        self.families = families;
        self
    }

    pub fn with_baseline_policy(mut self, policy: BaselinePolicy) -> Self {
        self.baseline_policy = policy;
        self
    }

    pub fn with_validation_mode(mut self, mode: ValidationMode) -> Self {
        self.validation_mode = mode;
        self
    }

    pub fn with_tracking_uri(mut self, uri: impl Into<String>) -> Self {
        self.tracking_uri = uri.into();
        self
    }

    pub fn with_experiment_name(mut self, name: impl Into<String>) -> Self {
        self.experiment_name = name.into();
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Feature columns in model input order: numeric first, then categorical
    pub fn feature_columns(&self) -> Vec<String> {
        self.numeric_features
            .iter()
            .chain(self.categorical_features.iter())
            .cloned()
            .collect()
    }

    /// Reject settings that would make training meaningless
    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(MlopsError::Config(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.cv_folds < 2 {
            return Err(MlopsError::Config(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if self.families.is_empty() {
            return Err(MlopsError::Config("no model families configured".to_string()));
        }
        for name in self.feature_columns() {
            if !self.schema.contains(&name) {
                return Err(MlopsError::Config(format!(
                    "feature column '{}' is not in the schema",
                    name
                )));
            }
        }
        Ok(())
    }
}
