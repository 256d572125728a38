//! Error types for the API client.

/// Errors that can occur when talking to the Dados Abertos API.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The request could not be sent or the response body could not be read
    /// (network error, timeout, connection reset).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API returned a non-success status with a body snippet.
    #[error("request failed with status {status}")]
    Status { status: u16, body: String },

    /// The request URL could not be constructed.
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    /// The response body was not the JSON shape we expected.
    #[error("malformed response body: {0}")]
    Body(#[from] serde_json::Error),

    /// The response parsed as JSON but did not carry the `dados` payload
    /// list every list endpoint wraps its results in.
    #[error("response envelope missing the 'dados' list")]
    Envelope,

    /// A transient failure survived every retry attempt.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: usize, last: String },
}

impl Error {
    /// Transient failures are retried by the client; everything else is
    /// fatal for the call.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Whether the upstream answered 404 for this call. Enrichment
    /// accessors map this to an empty payload.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Status { status: 404, .. })
    }
}
