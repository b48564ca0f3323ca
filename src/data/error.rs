use thiserror::Error;

/// Failures talking to the ArzWatch backend. None of these are surfaced to
/// users individually; they all end in the generic error reply.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("no data returned")]
    Empty,

    #[error("malformed timestamp: {0:?}")]
    Timestamp(String),
}
