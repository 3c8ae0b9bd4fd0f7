#![forbid(unsafe_code)]

//! Failure taxonomy shared by every service and HTTP handler.
//!
//! Each component converts whatever went wrong at its own boundary into one of
//! these kinds. The HTTP layer maps them to a status code and a JSON body that
//! carries the raw upstream message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Caller supplied a missing or malformed identifier (400).
    #[error("{0}")]
    InvalidInput(String),

    /// A referenced video or entity does not exist (404).
    #[error("{0}")]
    NotFound(String),

    /// The external video id is already stored (409).
    #[error("{message}")]
    Conflict { message: String, existing_id: i64 },

    /// Admin password wrong, or the admin session is missing or expired (401).
    #[error("{0}")]
    Unauthorized(String),

    /// Required configuration for an external service is absent (503).
    #[error("{0}")]
    ServiceUnavailable(String),

    /// Video platform or another upstream API failed or answered with an
    /// unexpected shape (500).
    #[error("{0}")]
    UpstreamFailure(String),

    /// The generative-text call failed or returned no text (500).
    #[error("{0}")]
    GenerationFailed(String),

    /// The object store rejected an upload (500).
    #[error("{0}")]
    UploadFailed(String),

    /// A store write or read failed (500).
    #[error("{0}")]
    PersistenceFailure(String),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::UpstreamFailure(_)
            | Self::GenerationFailed(_)
            | Self::UploadFailed(_)
            | Self::PersistenceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable label placed in the `error` field of JSON responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "InvalidInput",
            Self::NotFound(_) => "NotFound",
            Self::Conflict { .. } => "Conflict",
            Self::Unauthorized(_) => "Unauthorized",
            Self::ServiceUnavailable(_) => "ServiceUnavailable",
            Self::UpstreamFailure(_) => "UpstreamFailure",
            Self::GenerationFailed(_) => "GenerationFailed",
            Self::UploadFailed(_) => "UploadFailed",
            Self::PersistenceFailure(_) => "PersistenceFailure",
        }
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        Self::PersistenceFailure(format!("{err:#}"))
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.kind(), error = %self, "request failed");
        }
        let body = match &self {
            Self::Conflict {
                message,
                existing_id,
            } => json!({
                "error": self.kind(),
                "message": message,
                "existing_id": existing_id,
            }),
            other => json!({
                "error": other.kind(),
                "message": other.to_string(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    #[test]
    fn status_mapping_follows_taxonomy() {
        assert_eq!(
            ServiceError::InvalidInput("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::Conflict {
                message: "dup".into(),
                existing_id: 3
            }
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::ServiceUnavailable("x".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ServiceError::GenerationFailed("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn conflict_body_carries_existing_id() {
        let response = ServiceError::Conflict {
            message: "video already stored".into(),
            existing_id: 42,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Conflict");
        assert_eq!(body["existing_id"], 42);
    }

    #[tokio::test]
    async fn unauthorized_maps_to_401_with_json_body() {
        let response = ServiceError::Unauthorized("wrong password".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Unauthorized");
        assert_eq!(body["message"], "wrong password");
    }

    #[test]
    fn anyhow_errors_become_persistence_failures() {
        let err: ServiceError = anyhow::anyhow!("disk on fire").into();
        assert_eq!(err.kind(), "PersistenceFailure");
        assert!(err.to_string().contains("disk on fire"));
    }
}
