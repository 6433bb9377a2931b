//! Alpaca-specific error types.

use thiserror::Error;

use crate::application::ports::BrokerError;

/// Errors from the Alpaca adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlpacaError {
    /// Credentials missing or refused.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The request never produced a response.
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete within the client timeout.
    #[error("Request timed out")]
    Timeout,

    /// Rate limited.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Alpaca answered with a server-side failure.
    #[error("Server error {status}: {message}")]
    Server {
        /// HTTP status.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Order was rejected.
    #[error("{0}")]
    OrderRejected(String),

    /// API returned another client error.
    #[error("API error {code}: {message}")]
    Api {
        /// Error code from the API.
        code: String,
        /// Error message from the API.
        message: String,
    },

    /// A success response could not be decoded.
    #[error("JSON parsing error: {0}")]
    JsonParse(String),

    /// Order failed the adapter's own checks.
    #[error("{0}")]
    InvalidOrder(String),
}

impl From<reqwest::Error> for AlpacaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<AlpacaError> for BrokerError {
    fn from(err: AlpacaError) -> Self {
        match err {
            AlpacaError::InvalidOrder(message) => Self::Validation { message },
            AlpacaError::OrderRejected(message) => Self::Rejected { message },
            AlpacaError::AuthenticationFailed(_) | AlpacaError::Api { .. } => Self::Rejected {
                message: err.to_string(),
            },
            AlpacaError::Network(_)
            | AlpacaError::Timeout
            | AlpacaError::RateLimited(_)
            | AlpacaError::Server { .. }
            | AlpacaError::JsonParse(_) => Self::Transient {
                message: err.to_string(),
            },
        }
    }
}
