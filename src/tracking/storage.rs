//! Local file-system tracking backend
//!
//! All experiments live in `<base_dir>/experiments.json`; artifacts are
//! written under `<base_dir>/<experiment_id>/<run_id>/artifacts/`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use super::tracker::{Experiment, ExperimentTracker, Run, RunStatus};
use crate::error::{MlopsError, Result};

const EXPERIMENTS_FILE: &str = "experiments.json";

pub struct LocalTracker {
    base_dir: PathBuf,
    experiment: Experiment,
    current_run: Option<Run>,
}

impl LocalTracker {
    /// Open the store at `base_dir`, reusing the experiment called `experiment_name`
    /// if it already exists
    pub fn open(base_dir: impl Into<PathBuf>, experiment_name: &str) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;

        let experiment = load_experiments(&base_dir)?
            .into_iter()
            .find(|e| e.name == experiment_name)
            .unwrap_or_else(|| Experiment::new(experiment_name));

        Ok(Self {
            base_dir,
            experiment,
            current_run: None,
        })
    }

    pub fn experiment(&self) -> &Experiment {
        &self.experiment
    }

    fn run_mut(&mut self) -> Result<&mut Run> {
        self.current_run
            .as_mut()
            .ok_or_else(|| MlopsError::Tracking("no active run".to_string()))
    }

    fn artifact_dir(&self, run_id: &str) -> PathBuf {
        self.base_dir
            .join(&self.experiment.experiment_id)
            .join(run_id)
            .join("artifacts")
    }

    /// Merge this experiment into the file, leaving other experiments untouched
    fn persist(&self) -> Result<()> {
        let mut experiments = load_experiments(&self.base_dir)?;
        match experiments
            .iter_mut()
            .find(|e| e.experiment_id == self.experiment.experiment_id)
        {
            Some(existing) => *existing = self.experiment.clone(),
            None => experiments.push(self.experiment.clone()),
        }

        let json = serde_json::to_string_pretty(&experiments)?;
        fs::write(self.base_dir.join(EXPERIMENTS_FILE), json)?;
        Ok(())
    }
}

impl ExperimentTracker for LocalTracker {
    fn backend(&self) -> &'static str {
        "local"
    }

    fn start_run(&mut self, run_name: &str) -> Result<String> {
        if let Some(open) = &self.current_run {
            return Err(MlopsError::Tracking(format!(
                "run '{}' is still active",
                open.run_name
            )));
        }
        let run = Run::new(run_name);
        let run_id = run.run_id.clone();
        self.current_run = Some(run);
        Ok(run_id)
    }

    fn log_params(&mut self, params: &BTreeMap<String, String>) -> Result<()> {
        let run = self.run_mut()?;
        run.params
            .extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    fn log_metrics(&mut self, metrics: &BTreeMap<String, f64>) -> Result<()> {
        let run = self.run_mut()?;
        run.metrics.extend(metrics.iter().map(|(k, v)| (k.clone(), *v)));
        Ok(())
    }

    fn log_artifact(&mut self, name: &str, content: &[u8]) -> Result<()> {
        let run_id = self.run_mut()?.run_id.clone();
        let dir = self.artifact_dir(&run_id);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(name), content)?;

        self.run_mut()?.artifacts.push(name.to_string());
        debug!(run_id = %run_id, artifact = name, bytes = content.len(), "Artifact stored");
        Ok(())
    }

    fn end_run(&mut self, status: RunStatus) -> Result<()> {
        let mut run = self
            .current_run
            .take()
            .ok_or_else(|| MlopsError::Tracking("no active run".to_string()))?;
        run.status = status;
        run.end_time = Some(Utc::now());
        self.experiment.runs.push(run);
        self.persist()
    }
}

/// Every experiment recorded under `base_dir`; a missing file is an empty store
pub fn load_experiments(base_dir: &Path) -> Result<Vec<Experiment>> {
    let path = base_dir.join(EXPERIMENTS_FILE);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&contents)?)
}
