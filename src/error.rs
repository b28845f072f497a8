use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Error taxonomy for the API. Every failure a handler or the auth gate can
/// produce is mapped here and rendered by the single `IntoResponse` boundary.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or malformed input (400).
    #[error("{0}")]
    Validation(String),

    /// Bad credentials or bad/expired token (401).
    #[error("{0}")]
    Authentication(String),

    /// Authenticated but lacking a required permission (401).
    #[error("{0}")]
    Authorization(String),

    /// Resource does not exist (404).
    #[error("{0}")]
    NotFound(String),

    /// Unique-constraint style conflicts (409).
    #[error("{0}")]
    Conflict(String),

    /// Email, storage or other collaborator failure surfaced to the caller (500).
    #[error("{0}")]
    Integration(String),

    /// A route was wired without its required permission or similar (500).
    #[error("{0}")]
    Configuration(String),

    /// Anything unexpected. Detail is logged, never exposed.
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Authentication(_) | ApiError::Authorization(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Integration(_) | ApiError::Configuration(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Operational errors carry messages safe to show the caller. `Internal`
    /// wraps programmer or infrastructure errors whose detail must not leak.
    pub fn is_operational(&self) -> bool {
        !matches!(self, ApiError::Internal(_))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if self.is_operational() {
            self.to_string()
        } else {
            error!(error = ?self, "unexpected error");
            "Internal server error".to_string()
        };

        let body = Json(json!({
            "status": if status.is_server_error() { "error" } else { "fail" },
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Authentication("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Authorization("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Integration("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_detail_is_not_operational() {
        let err = ApiError::from(anyhow::anyhow!("db password leaked in message"));
        assert!(!err.is_operational());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn operational_errors_expose_their_message() {
        let err = ApiError::Authentication("Incorrect email or password".into());
        assert!(err.is_operational());
        assert_eq!(err.to_string(), "Incorrect email or password");
    }
}
