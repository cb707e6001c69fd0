//! Error types for the remote model clients

use reqwest::StatusCode;

/// Longest response body, in characters, carried inside a [`ModelError::ServiceError`].
pub const MAX_ERROR_BODY_CHARS: usize = 512;

/// Result type for model service operations.
///
/// This is a convenience type alias that uses [`ModelError`] as the error type.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Error type for every call made to the embedding and generation services.
///
/// The variants separate failures an operator fixes in different ways:
///
/// - **UnreachableService**: nothing answered at the configured address
///   (service down, wrong host or port, request timed out).
/// - **ServiceError**: the service answered with a non-success status; the
///   status and the start of the response body are kept for diagnosis.
/// - **MalformedResponse**: the service answered successfully but the payload
///   could not be used (not JSON, no vector / no completion in it, or
///   a vector holding values outside the `f32` range).
/// - **InvalidConfig**: the client was configured with unusable settings.
///
/// Every service variant names the endpoint that was called, so the message
/// alone is enough to diagnose a failure without re-running with more logging.
/// None of these errors are retried by the clients.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Network-level failure to reach the service
    #[error("Model service unreachable at {endpoint}: {source}")]
    UnreachableService {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// Reachable service replied with a non-success status
    #[error("Model service at {endpoint} returned {status}: {body}")]
    ServiceError {
        endpoint: String,
        status: StatusCode,
        body: String,
    },

    /// Success status but the payload is unusable
    #[error("Malformed response from {endpoint}: {message}")]
    MalformedResponse { endpoint: String, message: String },

    /// Error when client configuration is invalid
    #[error("Invalid model client configuration: {message}")]
    InvalidConfig { message: String },
}

impl ModelError {
    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a malformed response error for `endpoint`.
    pub fn malformed<E: Into<String>, M: Into<String>>(endpoint: E, message: M) -> Self {
        Self::MalformedResponse {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// The endpoint involved in the failure, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::UnreachableService { endpoint, .. }
            | Self::ServiceError { endpoint, .. }
            | Self::MalformedResponse { endpoint, .. } => Some(endpoint),
            Self::InvalidConfig { .. } => None,
        }
    }
}

/// Cuts `body` down to at most `max_chars` characters, marking the cut.
pub(crate) fn truncate_body(body: &str, max_chars: usize) -> String {
    let body = body.trim();
    match body.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}... [truncated]", &body[..cut]),
        None => body.to_string(),
    }
}
