//! Error taxonomy for upstream fetches
//!
//! Every upstream failure is recovered locally (cached value retained,
//! field omitted, or "unavailable" rendered); nothing here is fatal.

use thiserror::Error;

/// Failure of an outbound call or of decoding its body
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request failed, timed out, or returned a non-success status
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// The response body was not valid structured data
    #[error("unparseable response: {0}")]
    Parse(String),
}

impl FetchError {
    pub fn unavailable(detail: impl std::fmt::Display) -> Self {
        FetchError::Unavailable(detail.to_string())
    }

    pub fn parse(detail: impl std::fmt::Display) -> Self {
        FetchError::Parse(detail.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Parse(err.to_string())
        } else {
            FetchError::Unavailable(err.to_string())
        }
    }
}
