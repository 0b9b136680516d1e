//! Experiment tracking
//!
//! Backends: MLflow REST, a local JSON store and a disabled tracker.

pub mod mlflow;
pub mod storage;
pub mod tracker;

pub use mlflow::MlflowTracker;
pub use storage::{load_experiments, LocalTracker};
pub use tracker::{tracker_from_uri, Experiment, ExperimentTracker, NoopTracker, Run, RunStatus};
