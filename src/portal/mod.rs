//! Training portal access.
//!
//! The portal has no public API: this crate talks to the JSON/HTML endpoints
//! its own single-page app uses. Authentication and cookies belong to the
//! `PortalSession` implementation; everything else here is wire parsing.
//!
//! Modules:
//! - http: reqwest-backed session
//! - retry: bounded retry for transient failures
//! - roster: assignee roster rows → `DirectoryEntry`
//! - search: attendee-search candidates

pub mod http;
pub mod retry;
pub mod roster;
pub mod search;

#[cfg(test)]
pub(crate) mod test_support;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::PortalError;

/// Full roster of assignees (training clients) visible to the logged-in staff user.
pub const ROSTER_PATH: &str = "/action/Assignees/members";

/// Targeted name/email/phone lookup used by the calendar attendee picker.
pub const SEARCH_PATH: &str = "/action/UserSuggest/attendee-search";

/// Per-account billing endpoint.
pub fn billing_path(account_id: &str) -> String {
    format!("/api/billing/member/{}/billing_status", account_id)
}

/// Raw HTTP response from the portal, before any status interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
    /// Parsed `Retry-After` header, in seconds.
    pub retry_after_secs: Option<u64>,
}

impl RawResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            retry_after_secs: None,
        }
    }

    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after_secs: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Convert a non-2xx response into the matching `PortalError`.
    pub fn into_success(self) -> Result<Self, PortalError> {
        match PortalError::from_status(self.status, &self.body) {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Authenticated access to the training portal. Supplied by the host
/// application; test doubles implement it directly.
#[async_trait]
pub trait PortalSession: Send + Sync {
    /// GET `path` (relative to the portal base URL) with query `params`.
    /// Non-2xx statuses are returned as `Ok`; transport failures as `Err`.
    async fn fetch(&self, path: &str, params: &[(&str, &str)]) -> Result<RawResponse, PortalError>;

    /// Whether the session is still logged in.
    async fn is_alive(&self) -> bool;
}

/// Fetch with a hard deadline. A timed-out call is reported as
/// `PortalError::Timeout` and handled exactly like any other failure.
pub async fn fetch_bounded(
    session: &dyn PortalSession,
    path: &str,
    params: &[(&str, &str)],
    timeout: Duration,
) -> Result<RawResponse, PortalError> {
    match tokio::time::timeout(timeout, session.fetch(path, params)).await {
        Ok(result) => result,
        Err(_) => Err(PortalError::Timeout(timeout.as_secs())),
    }
}

/// Liveness probe with a hard deadline. A probe that times out counts as dead.
pub async fn alive_bounded(session: &dyn PortalSession, timeout: Duration) -> bool {
    tokio::time::timeout(timeout, session.is_alive())
        .await
        .unwrap_or(false)
}

/// `fetch_bounded` plus status check.
pub async fn fetch_success(
    session: &dyn PortalSession,
    path: &str,
    params: &[(&str, &str)],
    timeout: Duration,
) -> Result<RawResponse, PortalError> {
    fetch_bounded(session, path, params, timeout)
        .await?
        .into_success()
}
