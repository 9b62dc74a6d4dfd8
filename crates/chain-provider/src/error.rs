use thiserror::Error;

/// Chain-state and fee-source failures.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Whether a single retry may succeed. Malformed data is never retried.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ProviderError::Malformed(_))
    }
}

impl ProviderError {
    /// Classify an HTTP client error. `timeout` is the limit the client was built with.
    pub(crate) fn from_reqwest(e: reqwest::Error, timeout: std::time::Duration) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout(timeout)
        } else if e.is_decode() {
            ProviderError::Malformed(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

/// Relay failures when submitting a signed transaction.
#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("relay unreachable: {0}")]
    Unreachable(String),

    /// `message` is the relay's response body, unmodified.
    #[error("relay rejected transaction (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
}
