//! Error types for backend calls.

use thiserror::Error;

/// Errors returned by [`ApiClient`](super::ApiClient) calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection-level failure (DNS, refused connection, TLS, reset stream).
    #[error("network error calling {endpoint}: {source}")]
    Network {
        /// The endpoint path that failed.
        endpoint: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The request or a streamed read timed out.
    #[error("timeout calling {endpoint}")]
    Timeout {
        /// The endpoint path that timed out.
        endpoint: String,
    },

    /// The backend rejected the credential.
    #[error(
        "[AUTH] not authorized calling {endpoint}\n  Suggestion: Run `audiobook-dl login` and export AUDIOBOOK_TOKEN"
    )]
    Unauthorized {
        /// The endpoint path that returned 401.
        endpoint: String,
    },

    /// Non-success HTTP status with the server's message.
    #[error("{message} (HTTP {status} from {endpoint})")]
    Status {
        /// The endpoint path.
        endpoint: String,
        /// The HTTP status code.
        status: u16,
        /// Server-provided message, or the endpoint's fallback text.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("unexpected response from {endpoint}: {message}")]
    Decode {
        /// The endpoint path.
        endpoint: String,
        /// Parser error text.
        message: String,
    },

    /// A URL could not be built from the configuration.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The offending URL text.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// The call requires a token and none is configured.
    #[error(
        "no access token configured\n  Suggestion: Run `audiobook-dl login` and set AUDIOBOOK_TOKEN or pass --token"
    )]
    MissingToken,
}

impl ApiError {
    /// Creates a network error, mapping reqwest timeouts to [`ApiError::Timeout`].
    pub fn network(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        let endpoint = endpoint.into();
        if source.is_timeout() {
            Self::Timeout { endpoint }
        } else {
            Self::Network { endpoint, source }
        }
    }

    /// Creates a timeout error.
    pub fn timeout(endpoint: impl Into<String>) -> Self {
        Self::Timeout {
            endpoint: endpoint.into(),
        }
    }

    /// Creates an unauthorized error.
    pub fn unauthorized(endpoint: impl Into<String>) -> Self {
        Self::Unauthorized {
            endpoint: endpoint.into(),
        }
    }

    /// Creates an HTTP status error.
    pub fn status(endpoint: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            endpoint: endpoint.into(),
            status,
            message: message.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(endpoint: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Decode {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// HTTP status code, when the server answered.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Unauthorized { .. } => Some(401),
            _ => None,
        }
    }

    /// Short text for user notices: the server's own message when there is one.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Status { message, .. } => message.clone(),
            Self::Unauthorized { .. } => "Unauthorized".to_string(),
            other => other.to_string(),
        }
    }
}

/// Picks the human-readable message out of an error response body.
///
/// Tries JSON `detail`, `message` and `error` string fields in that order,
/// then any non-blank body text, then `fallback`.
#[must_use]
pub fn error_message_from_body(body: &str, fallback: &str) -> String {
    if let Ok(serde_json::Value::Object(fields)) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "message", "error"] {
            if let Some(serde_json::Value::String(message)) = fields.get(key)
                && !message.trim().is_empty()
            {
                return message.clone();
            }
        }
        return fallback.to_string();
    }
    let text = body.trim();
    if text.is_empty() {
        fallback.to_string()
    } else {
        text.to_string()
    }
}
