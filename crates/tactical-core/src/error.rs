//! Error types for the tactical engine

use thiserror::Error;

/// Core error type shared by every tactical service
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid coordinate: latitude={lat}, longitude={lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("Route already exists: {0}")]
    DuplicateRouteId(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location source disabled")]
    SourceDisabled,

    #[error("Services not ready within {0} seconds")]
    StartupTimeout(u64),

    #[error("Tactical link not connected")]
    NotConnected,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn invalid_coordinate(lat: f64, lon: f64) -> Self {
        Self::InvalidCoordinate { lat, lon }
    }

    pub fn duplicate_route(id: impl Into<String>) -> Self {
        Self::DuplicateRouteId(id.into())
    }

    pub fn feature_not_found(id: impl Into<String>) -> Self {
        Self::FeatureNotFound(id.into())
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
