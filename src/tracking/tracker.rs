//! Experiment tracker abstraction
//!
//! Track runs, parameters, metrics and artifacts. Every backend is blocking;
//! callers treat failures as non-fatal.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::mlflow::MlflowTracker;
use super::storage::LocalTracker;
use crate::error::Result;

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Run is currently running
    Running,
    /// Run completed successfully
    Finished,
    /// Run failed
    Failed,
    /// Run was killed/stopped
    Killed,
}

impl RunStatus {
    /// Status name as used by MLflow
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Finished => "FINISHED",
            RunStatus::Failed => "FAILED",
            RunStatus::Killed => "KILLED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run within an experiment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub run_name: String,
    pub start_time: DateTime<Utc>,
    /// `None` while the run is still open
    pub end_time: Option<DateTime<Utc>>,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    /// Artifact paths relative to the run directory
    pub artifacts: Vec<String>,
    pub status: RunStatus,
}

impl Run {
    pub fn new(run_name: impl Into<String>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().simple().to_string(),
            run_name: run_name.into(),
            start_time: Utc::now(),
            end_time: None,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            artifacts: Vec::new(),
            status: RunStatus::Running,
        }
    }

    /// Run duration in seconds; open runs are measured up to now
    pub fn duration_secs(&self) -> f64 {
        let end = self.end_time.unwrap_or_else(Utc::now);
        (end - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}

/// An experiment containing multiple runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub runs: Vec<Run>,
}

impl Experiment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            experiment_id: uuid::Uuid::new_v4().simple().to_string(),
            name: name.into(),
            created_at: Utc::now(),
            runs: Vec::new(),
        }
    }

    /// Best run by a metric (higher is better when `maximize`)
    pub fn best_run(&self, metric_name: &str, maximize: bool) -> Option<&Run> {
        self.runs
            .iter()
            .filter_map(|r| r.metrics.get(metric_name).map(|v| (r, *v)))
            .max_by(|(_, a), (_, b)| {
                let ord = a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal);
                if maximize {
                    ord
                } else {
                    ord.reverse()
                }
            })
            .map(|(r, _)| r)
    }
}

/// Destination for per-trial parameters, metrics and artifacts.
///
/// At most one run is open at a time. Calls outside an open run are errors.
pub trait ExperimentTracker: Send {
    /// Short backend name for logs
    fn backend(&self) -> &'static str;

    /// Open a run and return its id
    fn start_run(&mut self, run_name: &str) -> Result<String>;

    fn log_params(&mut self, params: &BTreeMap<String, String>) -> Result<()>;

    fn log_metrics(&mut self, metrics: &BTreeMap<String, f64>) -> Result<()>;

    /// Store `content` under `name` in the open run
    fn log_artifact(&mut self, name: &str, content: &[u8]) -> Result<()>;

    /// Close the open run
    fn end_run(&mut self, status: RunStatus) -> Result<()>;
}

/// Tracker that accepts and discards everything
#[derive(Debug, Default)]
pub struct NoopTracker;

impl ExperimentTracker for NoopTracker {
    fn backend(&self) -> &'static str {
        "none"
    }

    fn start_run(&mut self, _run_name: &str) -> Result<String> {
        Ok(String::new())
    }

    fn log_params(&mut self, _params: &BTreeMap<String, String>) -> Result<()> {
        Ok(())
    }

    fn log_metrics(&mut self, _metrics: &BTreeMap<String, f64>) -> Result<()> {
        Ok(())
    }

    fn log_artifact(&mut self, _name: &str, _content: &[u8]) -> Result<()> {
        Ok(())
    }

    fn end_run(&mut self, _status: RunStatus) -> Result<()> {
        Ok(())
    }
}

/// Pick a backend from a tracking URI:
/// `http(s)://` → MLflow REST, `none` or empty → disabled,
/// anything else (optionally `file://`) → local JSON store in that directory.
pub fn tracker_from_uri(uri: &str, experiment_name: &str) -> Result<Box<dyn ExperimentTracker>> {
    let uri = uri.trim();
    let tracker: Box<dyn ExperimentTracker> = if uri.is_empty() || uri.eq_ignore_ascii_case("none") {
        Box::new(NoopTracker)
    } else if uri.starts_with("http://") || uri.starts_with("https://") {
        Box::new(MlflowTracker::new(uri, experiment_name)?)
    } else {
        let dir = uri.strip_prefix("file://").unwrap_or(uri);
        Box::new(LocalTracker::open(dir, experiment_name)?)
    };

    debug!(backend = tracker.backend(), uri, "Experiment tracker ready");
    Ok(tracker)
}
