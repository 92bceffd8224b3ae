//! Error types for portal access and funding lookups
//!
//! Portal errors are classified by recoverability:
//! - Retryable: transport failures, timeouts, 408/429/5xx
//! - NonRetryable: auth rejection, other 4xx, undecodable bodies
//!
//! None of these reach the application for the normal miss/stale/ambiguous
//! cases; the façade converts them to `None` or an `Unknown` status.
//! `LookupError` is the only error the façade returns.

use thiserror::Error;

/// Failure talking to the training portal.
#[derive(Debug, Error)]
pub enum PortalError {
    // Retryable errors
    #[error("Portal transport error: {0}")]
    Transport(String),

    #[error("Portal call timed out after {0} seconds")]
    Timeout(u64),

    #[error("Portal returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    // Non-retryable errors
    #[error("Portal session is not authenticated")]
    NotAuthenticated,

    #[error("Invalid portal URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to decode portal response: {0}")]
    Decode(String),
}

impl PortalError {
    /// Returns true if the same request may succeed on a second attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            PortalError::Transport(_) | PortalError::Timeout(_) => true,
            PortalError::Status { status, .. } => {
                *status == 408 || *status == 429 || (500..600).contains(status)
            }
            PortalError::NotAuthenticated
            | PortalError::InvalidUrl(_)
            | PortalError::Decode(_) => false,
        }
    }

    /// Map an HTTP status to an error, or `None` for 2xx.
    pub fn from_status(status: u16, body: &str) -> Option<Self> {
        match status {
            200..=299 => None,
            401 | 403 => Some(PortalError::NotAuthenticated),
            _ => Some(PortalError::Status {
                status,
                message: body.chars().take(200).collect(),
            }),
        }
    }
}

impl From<reqwest::Error> for PortalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PortalError::Timeout(0)
        } else if let Some(status) = err.status() {
            PortalError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            PortalError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for PortalError {
    fn from(err: serde_json::Error) -> Self {
        PortalError::Decode(err.to_string())
    }
}

/// Caller mistakes rejected by `FundingLookupService`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("A participant name is required for a funding lookup")]
    MissingName,
}
