//! Assignee directory: an in-memory index of the portal roster.
//!
//! The index is an immutable snapshot behind an `Arc`. A rebuild constructs a
//! complete new snapshot and swaps the pointer, so readers always see email,
//! phone, and name maps from the same generation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::error::PortalError;
use crate::portal::roster::parse_roster;
use crate::portal::{fetch_success, PortalSession, ROSTER_PATH};
use crate::types::DirectoryEntry;

/// How long a failed first load suppresses further non-forced loads.
const FIRST_LOAD_BACKOFF: Duration = Duration::from_secs(30);

/// One generation of the roster, keyed three ways.
#[derive(Debug, Default)]
pub struct DirectoryIndex {
    pub by_email: HashMap<String, DirectoryEntry>,
    pub by_phone: HashMap<String, DirectoryEntry>,
    pub by_name: HashMap<String, DirectoryEntry>,
    pub built_at: Option<DateTime<Utc>>,
}

impl DirectoryIndex {
    /// Single pass over roster rows. Later rows overwrite earlier ones on
    /// key collision; empty keys are not indexed.
    pub fn build(entries: Vec<DirectoryEntry>) -> Self {
        let mut index = DirectoryIndex {
            built_at: Some(Utc::now()),
            ..Default::default()
        };
        for entry in entries {
            if let Some(email) = entry.email.clone() {
                index.by_email.insert(email, entry.clone());
            }
            if let Some(phone) = entry.normalized_phone.clone() {
                index.by_phone.insert(phone, entry.clone());
            }
            if !entry.normalized_name.is_empty() {
                index.by_name.insert(entry.normalized_name.clone(), entry);
            }
        }
        index
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_email.is_empty() && self.by_phone.is_empty() && self.by_name.is_empty()
    }
}

pub struct AssigneeDirectory {
    portal: Arc<dyn PortalSession>,
    timeout: Duration,
    current: RwLock<Option<Arc<DirectoryIndex>>>,
    /// Serializes rebuilds so a burst of forced refreshes costs one roster
    /// fetch at a time.
    rebuild: tokio::sync::Mutex<()>,
    last_error: Mutex<Option<String>>,
    /// When the last load with no index to fall back on failed.
    failed_at: Mutex<Option<Instant>>,
    backoff: Duration,
}

impl AssigneeDirectory {
    pub fn new(portal: Arc<dyn PortalSession>, timeout: Duration) -> Self {
        Self {
            portal,
            timeout,
            current: RwLock::new(None),
            rebuild: tokio::sync::Mutex::new(()),
            last_error: Mutex::new(None),
            failed_at: Mutex::new(None),
            backoff: FIRST_LOAD_BACKOFF,
        }
    }

    pub fn with_failure_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Current index, rebuilding first when `force_refresh` is set or no
    /// index exists yet. A failed or empty rebuild keeps the previous index,
    /// so the result is `None` only before the first successful load.
    ///
    /// After a failed first load, non-forced calls return `None` without I/O
    /// until the backoff elapses. Forced refreshes always hit the portal.
    pub async fn get_index(&self, force_refresh: bool) -> Option<Arc<DirectoryIndex>> {
        let existing = self.snapshot();
        if !force_refresh {
            if existing.is_some() {
                return existing;
            }
            if self.in_backoff() {
                log::debug!("Assignee roster load failed recently; not retrying yet");
                return None;
            }
        }

        let _guard = self.rebuild.lock().await;
        // A concurrent caller may have loaded or failed while we waited.
        if !force_refresh {
            if let Some(index) = self.snapshot() {
                return Some(index);
            }
            if self.in_backoff() {
                return None;
            }
        }
        match self.load().await {
            Ok(entries) if entries.is_empty() => {
                log::warn!("Assignee roster returned no rows; keeping previous index");
            }
            Ok(entries) => {
                let index = Arc::new(DirectoryIndex::build(entries));
                log::info!("Assignee directory rebuilt with {} names", index.len());
                *self.current.write() = Some(index);
                *self.last_error.lock() = None;
                *self.failed_at.lock() = None;
            }
            Err(e) => {
                log::warn!("Assignee roster refresh failed; keeping previous index: {}", e);
                *self.last_error.lock() = Some(e.to_string());
            }
        }
        let current = self.snapshot();
        if current.is_none() {
            *self.failed_at.lock() = Some(Instant::now());
        }
        current
    }

    fn in_backoff(&self) -> bool {
        self.failed_at
            .lock()
            .is_some_and(|at| at.elapsed() < self.backoff)
    }

    /// Index currently held, without any I/O.
    pub fn snapshot(&self) -> Option<Arc<DirectoryIndex>> {
        self.current.read().clone()
    }

    /// Message of the most recent failed rebuild, cleared on success.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    async fn load(&self) -> Result<Vec<DirectoryEntry>, PortalError> {
        let resp = fetch_success(self.portal.as_ref(), ROSTER_PATH, &[], self.timeout).await?;
        parse_roster(&resp.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::test_support::ScriptedPortal;
    use crate::portal::RawResponse;
    use serde_json::json;

    fn directory(portal: &Arc<ScriptedPortal>) -> AssigneeDirectory {
        AssigneeDirectory::new(portal.clone(), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_cached_index_does_no_io() {
        let portal = Arc::new(ScriptedPortal::new());
        portal.respond_json(ROSTER_PATH, json!([{"id": 1, "name": "Dennis Rost"}]));
        let dir = directory(&portal);

        let first = dir.get_index(false).await.expect("index");
        let second = dir.get_index(false).await.expect("index");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(portal.calls(ROSTER_PATH), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_swaps_index() {
        let portal = Arc::new(ScriptedPortal::new());
        portal.respond_json(ROSTER_PATH, json!([{"id": 1, "name": "Dennis Rost"}]));
        portal.respond_json(
            ROSTER_PATH,
            json!([{"id": 1, "name": "Dennis Rost"}, {"id": 2, "name": "Katie Jones"}]),
        );
        let dir = directory(&portal);

        assert_eq!(dir.get_index(false).await.expect("index").len(), 1);
        let refreshed = dir.get_index(true).await.expect("index");
        assert_eq!(refreshed.len(), 2);
        assert!(refreshed.by_name.contains_key("katie jones"));
        assert_eq!(portal.calls(ROSTER_PATH), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_index() {
        let portal = Arc::new(ScriptedPortal::new());
        portal.respond_json(ROSTER_PATH, json!([{"id": 1, "name": "Dennis Rost"}]));
        portal.fail(ROSTER_PATH, "connection refused");
        let dir = directory(&portal);

        let before = dir.get_index(false).await.expect("index");
        let after = dir.get_index(true).await.expect("previous index retained");
        assert!(Arc::ptr_eq(&before, &after));
        assert!(dir.last_error().is_some());
    }

    #[tokio::test]
    async fn test_empty_roster_keeps_previous_index() {
        let portal = Arc::new(ScriptedPortal::new());
        portal.respond_json(ROSTER_PATH, json!([{"id": 1, "name": "Dennis Rost"}]));
        portal.respond_json(ROSTER_PATH, json!([]));
        let dir = directory(&portal);

        dir.get_index(false).await.expect("index");
        let after = dir.get_index(true).await.expect("index");
        assert_eq!(after.len(), 1);
    }

    #[tokio::test]
    async fn test_first_load_failure_yields_none() {
        let portal = Arc::new(ScriptedPortal::new());
        portal.respond(ROSTER_PATH, RawResponse::with_status(500, "oops"));
        let dir = directory(&portal);

        assert!(dir.get_index(false).await.is_none());
        assert!(dir.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_failed_first_load_backs_off_until_forced() {
        let portal = Arc::new(ScriptedPortal::new());
        portal.fail(ROSTER_PATH, "connection refused");
        portal.respond_json(ROSTER_PATH, json!([{"id": 1, "name": "Dennis Rost"}]));
        let dir = directory(&portal);

        assert!(dir.get_index(false).await.is_none());
        assert!(dir.get_index(false).await.is_none());
        assert_eq!(portal.calls(ROSTER_PATH), 1);

        let forced = dir.get_index(true).await.expect("forced load");
        assert_eq!(forced.len(), 1);
        assert_eq!(portal.calls(ROSTER_PATH), 2);
    }

    #[tokio::test]
    async fn test_backoff_expires() {
        let portal = Arc::new(ScriptedPortal::new());
        portal.fail(ROSTER_PATH, "connection refused");
        portal.respond_json(ROSTER_PATH, json!([{"id": 1, "name": "Dennis Rost"}]));
        let dir = directory(&portal).with_failure_backoff(Duration::from_millis(20));

        assert!(dir.get_index(false).await.is_none());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(dir.get_index(false).await.is_some());
        assert_eq!(portal.calls(ROSTER_PATH), 2);
    }

    #[test]
    fn test_build_last_write_wins_and_skips_empty_keys() {
        let index = DirectoryIndex::build(vec![
            DirectoryEntry::new("1", "Jon Smith", Some("jon@example.com"), None),
            DirectoryEntry::new("2", "Jon Smith", Some("JON@example.com"), Some("555-123-4567")),
            DirectoryEntry::new("3", "!!!", None, Some("12")),
        ]);
        assert_eq!(index.by_name["jon smith"].account_id, "2");
        assert_eq!(index.by_email["jon@example.com"].account_id, "2");
        assert_eq!(index.by_phone["5551234567"].account_id, "2");
        assert!(!index.by_name.contains_key(""));
        assert_eq!(index.by_phone.len(), 1);
        assert!(index.built_at.is_some());
    }
}
