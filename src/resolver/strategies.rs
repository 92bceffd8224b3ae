//! The individual resolution strategies, in chain order.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{ResolutionStrategy, StrategyError};
use crate::db::SharedDb;
use crate::directory::{AssigneeDirectory, DirectoryIndex};
use crate::normalize::{normalize_email_for_lookup, normalize_name, normalize_phone};
use crate::portal::search::{parse_candidates, SearchCandidate};
use crate::portal::{alive_bounded, fetch_success, PortalSession, SEARCH_PATH};
use crate::types::{Confidence, MatchMethod, Participant, ResolvedIdentity};

/// Source tag for mappings discovered by live search.
pub const LIVE_SEARCH_SOURCE: &str = "live_search";

// =============================================================================
// Local mappings
// =============================================================================

/// Name-to-account pairs persisted by earlier live searches.
pub struct LocalExactStrategy {
    db: SharedDb,
}

impl LocalExactStrategy {
    pub fn new(db: SharedDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ResolutionStrategy for LocalExactStrategy {
    fn name(&self) -> &'static str {
        "local mapping"
    }

    async fn try_resolve(
        &self,
        participant: &Participant,
    ) -> Result<Option<ResolvedIdentity>, StrategyError> {
        let normalized = participant.normalized_name();
        if normalized.is_empty() {
            return Ok(None);
        }
        let mappings = self.db.lock().identities_for_name(&normalized)?;
        let ids: BTreeSet<String> = mappings.into_iter().map(|m| m.account_id).collect();
        if ids.len() > 1 {
            // Two people share this written name; only the directory or a
            // contact detail can tell them apart.
            log::warn!(
                "'{}' maps to {} accounts locally; skipping local match",
                participant.display_name,
                ids.len()
            );
            return Ok(None);
        }
        Ok(ids.into_iter().next().map(|account_id| ResolvedIdentity {
            account_id,
            match_method: MatchMethod::LocalExact,
            confidence: Confidence::High,
        }))
    }
}

// =============================================================================
// Assignee directory
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryKey {
    Email,
    Phone,
    Name,
}

impl DirectoryKey {
    const ALL: [DirectoryKey; 3] = [DirectoryKey::Email, DirectoryKey::Phone, DirectoryKey::Name];

    /// Lookup key for this participant, if it has one.
    fn key_for(self, participant: &Participant) -> Option<String> {
        match self {
            DirectoryKey::Email => participant
                .email
                .as_deref()
                .and_then(normalize_email_for_lookup),
            DirectoryKey::Phone => participant.phone.as_deref().and_then(normalize_phone),
            DirectoryKey::Name => Some(participant.normalized_name()).filter(|n| !n.is_empty()),
        }
    }

    fn lookup(self, index: &DirectoryIndex, participant: &Participant) -> Option<ResolvedIdentity> {
        let key = self.key_for(participant)?;
        let map = match self {
            DirectoryKey::Email => &index.by_email,
            DirectoryKey::Phone => &index.by_phone,
            DirectoryKey::Name => &index.by_name,
        };
        let entry = map.get(&key)?;
        let (match_method, confidence) = match self {
            DirectoryKey::Email => (MatchMethod::DirectoryEmail, Confidence::High),
            DirectoryKey::Phone => (MatchMethod::DirectoryPhone, Confidence::High),
            DirectoryKey::Name => (MatchMethod::DirectoryName, Confidence::Medium),
        };
        Some(ResolvedIdentity {
            account_id: entry.account_id.clone(),
            match_method,
            confidence,
        })
    }
}

/// Exact lookup on one directory index, loading the roster on first use.
pub struct DirectoryLookupStrategy {
    directory: Arc<AssigneeDirectory>,
    key: DirectoryKey,
}

impl DirectoryLookupStrategy {
    pub fn new(directory: Arc<AssigneeDirectory>, key: DirectoryKey) -> Self {
        Self { directory, key }
    }
}

#[async_trait]
impl ResolutionStrategy for DirectoryLookupStrategy {
    fn name(&self) -> &'static str {
        match self.key {
            DirectoryKey::Email => "directory email",
            DirectoryKey::Phone => "directory phone",
            DirectoryKey::Name => "directory name",
        }
    }

    async fn try_resolve(
        &self,
        participant: &Participant,
    ) -> Result<Option<ResolvedIdentity>, StrategyError> {
        if self.key.key_for(participant).is_none() {
            return Ok(None);
        }
        let Some(index) = self.directory.get_index(false).await else {
            return Ok(None);
        };
        Ok(self.key.lookup(&index, participant))
    }
}

/// Force one roster rebuild, then retry email, phone, and name against it.
pub struct DirectoryRefreshStrategy {
    directory: Arc<AssigneeDirectory>,
}

impl DirectoryRefreshStrategy {
    pub fn new(directory: Arc<AssigneeDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl ResolutionStrategy for DirectoryRefreshStrategy {
    fn name(&self) -> &'static str {
        "directory refresh"
    }

    async fn try_resolve(
        &self,
        participant: &Participant,
    ) -> Result<Option<ResolvedIdentity>, StrategyError> {
        let Some(index) = self.directory.get_index(true).await else {
            return Ok(None);
        };
        Ok(DirectoryKey::ALL
            .iter()
            .find_map(|key| key.lookup(&index, participant)))
    }
}

// =============================================================================
// Live portal search
// =============================================================================

/// Targeted portal search scored by name similarity.
pub struct LivePortalSearchStrategy {
    portal: Arc<dyn PortalSession>,
    db: SharedDb,
    timeout: Duration,
    threshold: f64,
}

/// A search candidate with its score against the participant.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub candidate: SearchCandidate,
    /// Normalized-Levenshtein similarity of normalized names, in [0, 1].
    pub score: f64,
    /// Candidate's email or phone equals the participant's.
    pub contact_match: bool,
}

impl LivePortalSearchStrategy {
    pub fn new(portal: Arc<dyn PortalSession>, db: SharedDb, timeout: Duration, threshold: f64) -> Self {
        Self {
            portal,
            db,
            timeout,
            threshold,
        }
    }

    /// Search terms in order: display name, then email, then phone.
    fn keywords(participant: &Participant) -> Vec<String> {
        let mut out = vec![participant.display_name.clone()];
        out.extend(participant.email.clone());
        out.extend(participant.phone.clone());
        out
    }

    /// Record the candidate under its own portal name. The participant's
    /// spelling is never stored: a fuzzy hit must not shadow a later exact
    /// directory match for that spelling.
    fn persist(&self, candidate: &SearchCandidate) {
        let normalized = normalize_name(&candidate.name);
        if normalized.is_empty() {
            return;
        }
        if let Err(e) = self.db.lock().record_identity(
            &candidate.account_id,
            &candidate.name,
            &normalized,
            LIVE_SEARCH_SOURCE,
        ) {
            log::warn!("Failed to persist identity mapping for '{}': {}", candidate.name, e);
        }
    }
}

#[async_trait]
impl ResolutionStrategy for LivePortalSearchStrategy {
    fn name(&self) -> &'static str {
        "live portal search"
    }

    async fn try_resolve(
        &self,
        participant: &Participant,
    ) -> Result<Option<ResolvedIdentity>, StrategyError> {
        if !alive_bounded(self.portal.as_ref(), self.timeout).await {
            log::warn!("Portal session is not alive; skipping live search");
            return Ok(None);
        }

        let mut last_error = None;
        for keyword in Self::keywords(participant) {
            let resp = match fetch_success(
                self.portal.as_ref(),
                SEARCH_PATH,
                &[("keyword", keyword.as_str())],
                self.timeout,
            )
            .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    log::warn!("Live search for keyword '{}' failed: {}", keyword, e);
                    last_error = Some(e);
                    continue;
                }
            };
            let candidates = parse_candidates(&resp.body);
            if candidates.is_empty() {
                continue;
            }

            let Some(best) = pick_candidate(participant, candidates, self.threshold) else {
                continue;
            };
            self.persist(&best.candidate);
            return Ok(Some(ResolvedIdentity {
                account_id: best.candidate.account_id,
                match_method: MatchMethod::LivePortalSearch,
                confidence: Confidence::Low,
            }));
        }
        match last_error {
            Some(e) => Err(e.into()),
            None => Ok(None),
        }
    }
}

/// Score candidates and pick the single best one at or above `threshold`.
///
/// Candidates are deduplicated by account id. Among candidates tied on the
/// top score, a unique contact-detail match wins; any other tie between
/// distinct accounts is ambiguous and yields `None`.
pub fn pick_candidate(
    participant: &Participant,
    candidates: Vec<SearchCandidate>,
    threshold: f64,
) -> Option<ScoredCandidate> {
    let target = participant.normalized_name();
    if target.is_empty() {
        return None;
    }
    let email = participant.normalized_email();
    let phone = participant.normalized_phone();

    let mut seen = BTreeSet::new();
    let scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .filter(|c| seen.insert(c.account_id.clone()))
        .filter_map(|candidate| {
            let name = normalize_name(&candidate.name);
            if name.is_empty() {
                return None;
            }
            let email_match = email.is_some()
                && candidate.email.as_deref().and_then(normalize_email_for_lookup) == email;
            let phone_match =
                phone.is_some() && candidate.phone.as_deref().and_then(normalize_phone) == phone;
            let contact_match = email_match || phone_match;
            Some(ScoredCandidate {
                score: strsim::normalized_levenshtein(&target, &name),
                candidate,
                contact_match,
            })
        })
        .collect();

    let top = scored.iter().map(|s| s.score).fold(f64::NEG_INFINITY, f64::max);
    if top < threshold {
        log::info!(
            "Live search for '{}': best similarity {:.2} below {:.2}",
            participant.display_name,
            top.max(0.0),
            threshold
        );
        return None;
    }

    let mut tied: Vec<ScoredCandidate> = scored.into_iter().filter(|s| s.score == top).collect();
    if tied.len() > 1 {
        let contact: Vec<usize> = tied
            .iter()
            .enumerate()
            .filter(|(_, s)| s.contact_match)
            .map(|(i, _)| i)
            .collect();
        if contact.len() != 1 {
            log::warn!(
                "Live search for '{}' is ambiguous: {} accounts tie at {:.2}",
                participant.display_name,
                tied.len(),
                top
            );
            return None;
        }
        return Some(tied.swap_remove(contact[0]));
    }
    tied.pop()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, name: &str, email: Option<&str>) -> SearchCandidate {
        SearchCandidate {
            account_id: id.to_string(),
            name: name.to_string(),
            email: email.map(String::from),
            phone: None,
        }
    }

    #[test]
    fn test_similar_name_accepted() {
        let p = Participant::new("John Smith", None, None);
        let best = pick_candidate(&p, vec![candidate("1", "Jon Smith", None)], 0.6).expect("match");
        assert_eq!(best.candidate.account_id, "1");
        assert!(best.score >= 0.6);
    }

    #[test]
    fn test_dissimilar_name_rejected() {
        let p = Participant::new("Katie Jones", None, None);
        assert!(pick_candidate(&p, vec![candidate("1", "Jon Smith", None)], 0.6).is_none());
    }

    #[test]
    fn test_best_of_many() {
        let p = Participant::new("Dennis Rost", None, None);
        let best = pick_candidate(
            &p,
            vec![
                candidate("1", "Dennis Ross", None),
                candidate("2", "Dennis Rost", None),
                candidate("3", "Denise Frost", None),
            ],
            0.6,
        )
        .expect("match");
        assert_eq!(best.candidate.account_id, "2");
        assert_eq!(best.score, 1.0);
    }

    #[test]
    fn test_tie_between_accounts_is_ambiguous() {
        let p = Participant::new("Jon Smith", None, None);
        let picked = pick_candidate(
            &p,
            vec![candidate("1", "Jon Smith", None), candidate("2", "jon smith", None)],
            0.6,
        );
        assert!(picked.is_none());
    }

    #[test]
    fn test_tie_broken_by_contact_match() {
        let p = Participant::new("Jon Smith", Some("jon@example.com"), None);
        let best = pick_candidate(
            &p,
            vec![
                candidate("1", "Jon Smith", Some("other@example.com")),
                candidate("2", "Jon Smith", Some("JON@example.com")),
            ],
            0.6,
        )
        .expect("match");
        assert_eq!(best.candidate.account_id, "2");
        assert!(best.contact_match);
    }

    #[test]
    fn test_duplicate_rows_for_same_account_are_not_a_tie() {
        let p = Participant::new("Jon Smith", None, None);
        let best = pick_candidate(
            &p,
            vec![candidate("1", "Jon Smith", None), candidate("1", "Jon Smith", None)],
            0.6,
        )
        .expect("match");
        assert_eq!(best.candidate.account_id, "1");
    }

    #[test]
    fn test_empty_inputs() {
        assert!(pick_candidate(&Participant::new("Jon", None, None), vec![], 0.6).is_none());
        assert!(pick_candidate(
            &Participant::new("!!!", None, None),
            vec![candidate("1", "", None)],
            0.0
        )
        .is_none());
    }
}
