//! Error types for the API client.

use thiserror::Error;

/// Errors that can occur when talking to the Parcel Desk API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed or the body could not be decoded.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// The server's `error` message, or the raw body.
        message: String,
    },

    /// Base URL could not be parsed or joined.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ClientError {
    /// HTTP status of an API error, if the server answered at all.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(_) | Self::InvalidUrl(_) => None,
        }
    }
}
