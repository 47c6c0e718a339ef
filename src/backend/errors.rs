use thiserror::Error;

/// Failures of the send/verify/commit calls. HTTP statuses are passed through
/// from the API layer untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("request cancelled")]
    Cancelled,
}

impl BackendError {
    /// Text suitable for the session's inline error message.
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Http { message, .. } if !message.is_empty() => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            BackendError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            BackendError::Network(err.to_string())
        }
    }
}
