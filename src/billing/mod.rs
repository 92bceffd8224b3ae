//! Billing snapshots: portal fetch, boundary normalization, classification.

pub mod classify;
pub mod snapshot;

use std::sync::Arc;
use std::time::Duration;

use crate::error::PortalError;
use crate::portal::retry::{fetch_with_retry, RetryPolicy};
use crate::portal::{billing_path, PortalSession};

pub use classify::{classify, Classification};
pub use snapshot::BillingSnapshot;

/// Fetches the raw billing payload for one account. Holds no cache: every
/// call goes to the portal.
pub struct BillingSnapshotFetcher {
    portal: Arc<dyn PortalSession>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl BillingSnapshotFetcher {
    pub fn new(portal: Arc<dyn PortalSession>, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            portal,
            timeout,
            retry,
        }
    }

    /// Fetch and normalize billing for `account_id`. Transient failures are
    /// retried per the policy; the last error propagates.
    pub async fn fetch(&self, account_id: &str) -> Result<BillingSnapshot, PortalError> {
        let path = billing_path(account_id);
        let resp = fetch_with_retry(self.portal.as_ref(), &path, &[], self.timeout, &self.retry).await?;
        let snapshot = BillingSnapshot::from_body(&resp.body);
        if let BillingSnapshot::Unrecognized { reason } = &snapshot {
            log::warn!("Billing for account {} unrecognized: {}", account_id, reason);
        }
        Ok(snapshot)
    }
}
