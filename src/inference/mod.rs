//! Inference module
//!
//! Loads the persisted model and predicts single records or whole tables.

mod engine;

pub use engine::{Predictor, PREDICTION_COLUMN};
