//! API error types

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tactical_core::CoreError;
use tactical_link::LinkError;
use thiserror::Error;

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_type = match &self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Conflict(_) => "conflict",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
            ApiError::Internal(_) => "internal_error",
        };
        let message = match &self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::ServiceUnavailable(msg)
            | ApiError::Internal(msg) => msg.clone(),
        };

        let body = Json(ErrorResponse {
            error: error_type.into(),
            message,
        });

        (self.status(), body).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::InvalidCoordinate { .. } | CoreError::Configuration(_) => {
                ApiError::BadRequest(message)
            }
            CoreError::FeatureNotFound(_) => ApiError::NotFound(message),
            CoreError::DuplicateRouteId(_) => ApiError::Conflict(message),
            CoreError::PermissionDenied
            | CoreError::SourceDisabled
            | CoreError::StartupTimeout(_)
            | CoreError::NotConnected
            | CoreError::InvalidStateTransition { .. } => ApiError::ServiceUnavailable(message),
            CoreError::Serialization(_) | CoreError::Internal(_) => ApiError::Internal(message),
        }
    }
}

impl From<LinkError> for ApiError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::ConversionUnavailable { .. } | LinkError::InvalidState(_) => {
                ApiError::ServiceUnavailable(err.to_string())
            }
            other => CoreError::from(other).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_status_mapping() {
        let cases = [
            (CoreError::invalid_coordinate(91.0, 0.0), StatusCode::BAD_REQUEST),
            (CoreError::feature_not_found("op-9"), StatusCode::NOT_FOUND),
            (CoreError::duplicate_route("r1"), StatusCode::CONFLICT),
            (CoreError::NotConnected, StatusCode::SERVICE_UNAVAILABLE),
            (
                CoreError::invalid_transition("STOPPED", "OPERATIONAL"),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (CoreError::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_link_error_mapping() {
        assert_eq!(
            ApiError::from(LinkError::NotConnected).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
