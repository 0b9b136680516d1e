//! Diabetes MLOps - schema-validated training and serving of a diabetes-risk classifier
//!
//! The crate covers the full lifecycle of one tabular dataset:
//! - Schema validation of the raw survey table
//! - A fitted feature pipeline (scaling + binary encoding)
//! - Grid search over several classifier families with experiment tracking
//! - Persistence of the best pipeline and batch / online prediction
//!
//! # Modules
//!
//! ## Data
//! - [`schema`] - Column names, storage types and admissible values
//! - [`validation`] - Type and content checks of a loaded table
//! - [`preprocessing`] - Scaler, binary encoder, label encoding, pipeline checks
//!
//! ## Models
//! - [`training`] - Classifier families, cross-validation, grid search, selection
//! - [`tracking`] - Experiment tracking (MLflow, local JSON store, none)
//! - [`export`] - Persisted model format
//! - [`inference`] - Prediction from frames and JSON records
//!
//! ## Services
//! - [`server`] - HTTP prediction API
//! - [`cli`] - Command-line interface

pub mod error;
pub mod config;

pub mod schema;
pub mod validation;
pub mod preprocessing;

pub mod training;
pub mod tracking;
pub mod export;
pub mod inference;

pub mod utils;

pub mod server;
pub mod cli;

pub use error::{MlopsError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::AppConfig;
    pub use crate::error::{MlopsError, Result};

    pub use crate::schema::{ColumnSpec, Schema, LABEL_COLUMN};
    pub use crate::validation::{DataValidator, ValidationMode, ValidationReport};

    pub use crate::preprocessing::{FeaturePipeline, PipelineValidator};

    pub use crate::training::{
        BaselinePolicy, Classifier, FamilyConfig, GridSearchCV, ModelFamily, ModelMetrics, ModelSelector,
        ParamGrid, SelectionOutcome, TrialResult,
    };

    pub use crate::tracking::{tracker_from_uri, ExperimentTracker, LocalTracker, NoopTracker};

    pub use crate::export::{ModelMetadata, PersistedModel};
    pub use crate::inference::Predictor;

    pub use crate::utils::{DataLoader, DataSaver};
}
