use labelforge_core::error::CoreError;

/// Errors from talking to the annotation backend.
///
/// Wraps [`CoreError`] for domain validation failures and adds transport,
/// HTTP-status and configuration variants.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A domain-level error from `labelforge_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The HTTP request itself failed (network, DNS, TLS, timeout, decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Backend API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A required setting is missing or malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias for client results.
pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// HTTP status of an API error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the backend itself failed (5xx). Such save failures are
    /// surfaced to the user; others are only logged.
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| (500..600).contains(&s))
    }

    /// Whether the failure is transient and the data is still held locally:
    /// transport errors and 5xx responses.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Request(_)) || self.is_server_error()
    }
}
