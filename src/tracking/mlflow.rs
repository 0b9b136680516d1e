//! MLflow REST backend
//!
//! Speaks the MLflow 2.x tracking API over blocking HTTP. Artifacts go
//! through the tracking server's artifact proxy (`--serve-artifacts`).

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::tracker::{ExperimentTracker, RunStatus};
use crate::error::{MlopsError, Result};

const API_PREFIX: &str = "api/2.0/mlflow";
const ARTIFACT_PREFIX: &str = "api/2.0/mlflow-artifacts/artifacts";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct ExperimentEnvelope {
    experiment: ExperimentInfo,
}

#[derive(Deserialize)]
struct ExperimentInfo {
    experiment_id: String,
}

#[derive(Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[derive(Deserialize)]
struct CreateRunResponse {
    run: RunEnvelope,
}

#[derive(Deserialize)]
struct RunEnvelope {
    info: RunInfo,
}

#[derive(Deserialize)]
struct RunInfo {
    run_id: String,
}

pub struct MlflowTracker {
    client: Client,
    base_url: String,
    experiment_name: String,
    /// Resolved on the first run so construction never touches the network
    experiment_id: Option<String>,
    run_id: Option<String>,
}

impl MlflowTracker {
    pub fn new(base_url: &str, experiment_name: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MlopsError::Tracking(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            experiment_name: experiment_name.to_string(),
            experiment_id: None,
            run_id: None,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, API_PREFIX, path)
    }

    fn artifact_url(&self, experiment_id: &str, run_id: &str, name: &str) -> String {
        format!(
            "{}/{}/{}/{}/artifacts/{}",
            self.base_url, ARTIFACT_PREFIX, experiment_id, run_id, name
        )
    }

    fn post(&self, path: &str, body: &Value) -> Result<Response> {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .map_err(|e| MlopsError::Tracking(format!("{} request failed: {}", path, e)))?;
        check_status(path, response)
    }

    fn active_run(&self) -> Result<&str> {
        self.run_id
            .as_deref()
            .ok_or_else(|| MlopsError::Tracking("no active run".to_string()))
    }

    /// Look the experiment up by name, creating it when absent
    fn ensure_experiment(&mut self) -> Result<String> {
        if let Some(id) = &self.experiment_id {
            return Ok(id.clone());
        }

        let response = self
            .client
            .get(self.endpoint("experiments/get-by-name"))
            .query(&[("experiment_name", self.experiment_name.as_str())])
            .send()
            .map_err(|e| MlopsError::Tracking(format!("experiment lookup failed: {}", e)))?;

        let id = if response.status() == reqwest::StatusCode::NOT_FOUND {
            let created: CreateExperimentResponse = self
                .post("experiments/create", &json!({ "name": self.experiment_name }))?
                .json()
                .map_err(decode_error)?;
            debug!(experiment = %self.experiment_name, id = %created.experiment_id, "Created MLflow experiment");
            created.experiment_id
        } else {
            let found: ExperimentEnvelope = check_status("experiments/get-by-name", response)?
                .json()
                .map_err(decode_error)?;
            found.experiment.experiment_id
        };

        self.experiment_id = Some(id.clone());
        Ok(id)
    }
}

impl ExperimentTracker for MlflowTracker {
    fn backend(&self) -> &'static str {
        "mlflow"
    }

    fn start_run(&mut self, run_name: &str) -> Result<String> {
        if self.run_id.is_some() {
            return Err(MlopsError::Tracking("a run is already active".to_string()));
        }
        let experiment_id = self.ensure_experiment()?;
        let body = json!({
            "experiment_id": experiment_id,
            "run_name": run_name,
            "start_time": Utc::now().timestamp_millis(),
            "tags": [{ "key": "mlflow.runName", "value": run_name }],
        });
        let created: CreateRunResponse = self.post("runs/create", &body)?.json().map_err(decode_error)?;
        let run_id = created.run.info.run_id;
        self.run_id = Some(run_id.clone());
        Ok(run_id)
    }

    fn log_params(&mut self, params: &BTreeMap<String, String>) -> Result<()> {
        let body = json!({
            "run_id": self.active_run()?,
            "params": params
                .iter()
                .map(|(k, v)| json!({ "key": k, "value": v }))
                .collect::<Vec<_>>(),
        });
        self.post("runs/log-batch", &body).map(|_| ())
    }

    fn log_metrics(&mut self, metrics: &BTreeMap<String, f64>) -> Result<()> {
        let timestamp = Utc::now().timestamp_millis();
        let body = json!({
            "run_id": self.active_run()?,
            "metrics": metrics
                .iter()
                .map(|(k, v)| json!({ "key": k, "value": v, "timestamp": timestamp, "step": 0 }))
                .collect::<Vec<_>>(),
        });
        self.post("runs/log-batch", &body).map(|_| ())
    }

    fn log_artifact(&mut self, name: &str, content: &[u8]) -> Result<()> {
        let run_id = self.active_run()?.to_string();
        let experiment_id = self.ensure_experiment()?;
        let url = self.artifact_url(&experiment_id, &run_id, name);
        let response = self
            .client
            .put(url)
            .body(content.to_vec())
            .send()
            .map_err(|e| MlopsError::Tracking(format!("artifact upload failed: {}", e)))?;
        check_status("artifact upload", response).map(|_| ())
    }

    fn end_run(&mut self, status: RunStatus) -> Result<()> {
        let run_id = self
            .run_id
            .take()
            .ok_or_else(|| MlopsError::Tracking("no active run".to_string()))?;
        let body = json!({
            "run_id": run_id,
            "status": status.as_str(),
            "end_time": Utc::now().timestamp_millis(),
        });
        self.post("runs/update", &body).map(|_| ())
    }
}

fn check_status(what: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(MlopsError::Tracking(format!("{} returned {}: {}", what, status, body)))
}

fn decode_error(e: reqwest::Error) -> MlopsError {
    MlopsError::Tracking(format!("unexpected response body: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        let tracker = MlflowTracker::new("http://127.0.0.1:5000/", "Diabetes Prediction").unwrap();
        assert_eq!(
            tracker.endpoint("runs/create"),
            "http://127.0.0.1:5000/api/2.0/mlflow/runs/create"
        );
        assert_eq!(
            tracker.artifact_url("1", "abc", "model.json"),
            "http://127.0.0.1:5000/api/2.0/mlflow-artifacts/artifacts/1/abc/artifacts/model.json"
        );
    }

    #[test]
    fn test_logging_requires_active_run() {
        let mut tracker = MlflowTracker::new("http://127.0.0.1:5000", "exp").unwrap();
        assert!(matches!(
            tracker.log_metrics(&BTreeMap::new()),
            Err(MlopsError::Tracking(_))
        ));
        assert!(tracker.end_run(RunStatus::Finished).is_err());
    }

    #[test]
    fn test_response_shapes_decode() {
        let run: CreateRunResponse =
            serde_json::from_str(r#"{"run": {"info": {"run_id": "r1", "status": "RUNNING"}, "data": {}}}"#).unwrap();
        assert_eq!(run.run.info.run_id, "r1");

        let exp: ExperimentEnvelope =
            serde_json::from_str(r#"{"experiment": {"experiment_id": "7", "name": "x"}}"#).unwrap();
        assert_eq!(exp.experiment.experiment_id, "7");
    }
}
