//! Transport Error Types

use thiserror::Error;

/// Failures reported by a [`Transport`](super::Transport)
///
/// The node service passes these through unchanged; nothing is retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The backend rejected or failed a request
    #[error("Request {type_name}.{method_name} failed: {message}")]
    RequestFailed {
        type_name: String,
        method_name: String,
        message: String,
    },

    /// The request could not be sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    pub fn request_failed(
        type_name: impl Into<String>,
        method_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::RequestFailed {
            type_name: type_name.into(),
            method_name: method_name.into(),
            message: message.into(),
        }
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest(reason.into())
    }
}
