//! Link error types

use tactical_core::CoreError;
use thiserror::Error;

/// Tactical link errors
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Tactical link not connected")]
    NotConnected,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("{system} conversion unavailable")]
    ConversionUnavailable { system: String },

    #[error("Invalid link state: {0}")]
    InvalidState(String),
}

impl LinkError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn serialization(msg: impl ToString) -> Self {
        Self::Serialization(msg.to_string())
    }

    pub fn conversion_unavailable(system: impl Into<String>) -> Self {
        Self::ConversionUnavailable {
            system: system.into(),
        }
    }
}

impl From<LinkError> for CoreError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::NotConnected => CoreError::NotConnected,
            other => CoreError::Internal(other.to_string()),
        }
    }
}

pub type LinkResult<T> = Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_conversion() {
        assert!(matches!(
            CoreError::from(LinkError::NotConnected),
            CoreError::NotConnected
        ));
        assert!(matches!(
            CoreError::from(LinkError::transport("radio offline")),
            CoreError::Internal(_)
        ));
    }
}
