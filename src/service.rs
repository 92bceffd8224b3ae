//! Funding lookup façade.
//!
//! Composes resolution, billing fetch, classification, and the cache. Portal
//! and storage failures stay below this layer: callers get `None` ("No Data")
//! or a status, and only a missing participant name is an error.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::billing::{classify, BillingSnapshotFetcher};
use crate::cache::{format_timestamp, FundingCache};
use crate::error::{LookupError, PortalError};
use crate::portal::{alive_bounded, PortalSession};
use crate::resolver::IdentityResolver;
use crate::types::{FundingStatus, Participant, StatusSource};

/// Outcome of a bulk refresh sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub success_count: usize,
    pub error_count: usize,
}

pub struct FundingLookupService {
    resolver: IdentityResolver,
    fetcher: BillingSnapshotFetcher,
    cache: FundingCache,
    portal: Arc<dyn PortalSession>,
    timeout: Duration,
}

impl FundingLookupService {
    pub fn new(
        resolver: IdentityResolver,
        fetcher: BillingSnapshotFetcher,
        cache: FundingCache,
        portal: Arc<dyn PortalSession>,
        timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            cache,
            portal,
            timeout,
        }
    }

    pub fn cache(&self) -> &FundingCache {
        &self.cache
    }

    /// Look up the funding status for a participant.
    ///
    /// With `force_live` unset, an unresolved participant falls back to the
    /// newest cached row whose name matches (stale rows included, annotated
    /// as such), and a failed fetch falls back to the resolved account's own
    /// fresh cached row. A failed fetch never returns another account's row.
    pub async fn lookup_funding(
        &self,
        name: &str,
        email: Option<&str>,
        phone: Option<&str>,
        force_live: bool,
    ) -> Result<Option<FundingStatus>, LookupError> {
        if name.trim().is_empty() {
            return Err(LookupError::MissingName);
        }
        let participant = Participant::new(name, email, phone);

        let Some(identity) = self.resolver.resolve(&participant).await else {
            if force_live {
                return Ok(None);
            }
            let cached = self.cache.get(&participant, None);
            if let Some(status) = &cached {
                log::info!(
                    "Serving cached funding for unresolved '{}' (account {})",
                    participant.display_name,
                    status.account_id
                );
            }
            return Ok(cached);
        };

        let account_id = identity.account_id;
        match self.fetch_live(&account_id, &participant.display_name).await {
            Ok(status) => {
                self.write_through(&status);
                Ok(Some(status))
            }
            Err(e) => {
                log::warn!(
                    "Live funding fetch failed for '{}' (account {}): {}",
                    participant.display_name,
                    account_id,
                    e
                );
                if force_live {
                    return Ok(None);
                }
                let fallback = self
                    .cache
                    .get(&participant, Some(&account_id))
                    .filter(|s| s.account_id == account_id && !self.cache.is_stale(s));
                if fallback.is_some() {
                    log::info!("Serving cached funding for account {}", account_id);
                }
                Ok(fallback)
            }
        }
    }

    /// Re-fetch and re-cache each account. Blank ids are skipped.
    pub async fn refresh_all_cached(&self, account_ids: &[String]) -> RefreshSummary {
        let ids: Vec<&str> = account_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .collect();
        let mut summary = RefreshSummary::default();

        if !alive_bounded(self.portal.as_ref(), self.timeout).await {
            log::warn!("Portal session is not alive; skipping refresh of {} accounts", ids.len());
            summary.error_count = ids.len();
            return summary;
        }

        for account_id in ids {
            let member_name = self
                .cache
                .cached_member_name(account_id)
                .unwrap_or_else(|| account_id.to_string());
            match self.fetch_live(account_id, &member_name).await {
                Ok(status) => match self.cache.put(&status) {
                    Ok(_) => summary.success_count += 1,
                    Err(e) => {
                        log::warn!("Failed to cache funding for account {}: {}", account_id, e);
                        summary.error_count += 1;
                    }
                },
                Err(e) => {
                    log::warn!("Refresh failed for account {}: {}", account_id, e);
                    summary.error_count += 1;
                }
            }
        }

        log::info!(
            "Funding refresh complete: {} updated, {} failed",
            summary.success_count,
            summary.error_count
        );
        summary
    }

    /// `refresh_all_cached` over every account currently in the cache.
    pub async fn refresh_cached(&self) -> RefreshSummary {
        match self.cache.account_ids() {
            Ok(ids) => self.refresh_all_cached(&ids).await,
            Err(e) => {
                log::warn!("Could not list cached accounts: {}", e);
                RefreshSummary::default()
            }
        }
    }

    async fn fetch_live(&self, account_id: &str, member_name: &str) -> Result<FundingStatus, PortalError> {
        if !alive_bounded(self.portal.as_ref(), self.timeout).await {
            return Err(PortalError::NotAuthenticated);
        }
        let snapshot = self.fetcher.fetch(account_id).await?;
        let c = classify(&snapshot);
        Ok(FundingStatus {
            member_name: member_name.to_string(),
            account_id: account_id.to_string(),
            amount_owed: c.amount_owed,
            category: c.category,
            display_text: c.display_text,
            display_class: c.display_class,
            display_icon: c.display_icon,
            source: StatusSource::LiveApi,
            last_updated: format_timestamp(Utc::now()),
            contributing_invoices: c.contributing_invoices,
        })
    }

    fn write_through(&self, status: &FundingStatus) {
        match self.cache.put(status) {
            Ok(true) => {}
            Ok(false) => log::debug!("Newer cached funding already stored for {}", status.account_id),
            Err(e) => log::warn!("Failed to cache funding for account {}: {}", status.account_id, e),
        }
    }
}
