use thiserror::Error;

/// Failure taxonomy for every remote call. The client never swallows a
/// failure; each call resolves to exactly one of these.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiClientError {
    /// The request never completed (connection refused, DNS, reset).
    #[error("network error: {0}")]
    Network(String),
    /// The server answered with a non-success status code.
    #[error("server rejected the request with status {code}")]
    Status { code: u16 },
    /// The response body did not match the expected shape.
    #[error("failed to decode response body: {0}")]
    Decode(String),
}

impl ApiClientError {
    /// Classify a transport-level reqwest failure. Status handling happens
    /// before decoding, so a `reqwest::Error` seen here is never a status
    /// error.
    pub(crate) fn transport(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiClientError::Decode(err.to_string())
        } else {
            ApiClientError::Network(err.to_string())
        }
    }

    pub(crate) fn unavailable() -> Self {
        ApiClientError::Network("back-office API is unavailable".to_string())
    }

    pub(crate) fn invalid_id(id: &str) -> Self {
        ApiClientError::Network(format!("id {id:?} cannot appear in a request path"))
    }
}
