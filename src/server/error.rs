//! Error types for the server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::MlopsError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Missing fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Unprocessable request: {0}")]
    Unprocessable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<MlopsError> for ServerError {
    fn from(err: MlopsError) -> Self {
        match err {
            MlopsError::MissingColumns(fields) => ServerError::MissingFields(fields),
            MlopsError::Validation(msg) => ServerError::Unprocessable(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": true, "message": msg })),
            ServerError::MissingFields(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": true,
                    "message": self.to_string(),
                    "missing": fields,
                }),
            ),
            ServerError::Unprocessable(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, json!({ "error": true, "message": msg }))
            }
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": true, "message": msg })),
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": true, "message": "An internal error occurred" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (ServerError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ServerError::MissingFields(vec!["Age".into()]), StatusCode::UNPROCESSABLE_ENTITY),
            (ServerError::Unprocessable("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (ServerError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ServerError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_from_pipeline_error() {
        let err: ServerError = MlopsError::MissingColumns(vec!["Polyuria".into()]).into();
        assert!(matches!(err, ServerError::MissingFields(f) if f == vec!["Polyuria".to_string()]));

        let err: ServerError = MlopsError::ModelNotFitted.into();
        assert!(matches!(err, ServerError::Internal(_)));
    }
}
