//! Typed failures for backend round trips.

use thiserror::Error;

/// Failure modes for a backend call.
///
/// Every variant resolves to the same terminal conversation message; the
/// split exists so the pipeline can log transport, framing, and server
/// failures under separate targets.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a usable response (DNS, refused, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The response arrived but was not shaped as promised.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server answered with a non-success status and a structured message.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
}

impl ApiError {
    pub fn network(message: impl Into<String>) -> Self {
        ApiError::Network(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        ApiError::Protocol(message.into())
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        ApiError::Server {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Protocol(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}
