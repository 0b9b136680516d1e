//! Application state management

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::inference::Predictor;

/// Application state shared across handlers. The predictor is read-only.
pub struct AppState {
    pub predictor: Arc<Predictor>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(predictor: Predictor) -> Self {
        Self {
            predictor: Arc::new(predictor),
            started_at: Utc::now(),
        }
    }

    pub fn uptime_secs(&self) -> i64 {
        Utc::now().signed_duration_since(self.started_at).num_seconds()
    }
}
