//! Funding cache: latest `FundingStatus` per account, with TTL staleness.
//!
//! Rows are keyed by account id and only ever written after a live fetch, so
//! every row carries an id that was actually resolved. Reads return the row
//! annotated as cached: `(Cached)` when fresh, `(Cached - <age> old)` with a
//! warning class when stale.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::db::{DbError, DbFundingRow, FundingCacheStats, SharedDb};
use crate::types::{DisplayClass, FundingCategory, FundingStatus, Participant, StatusSource};

pub const ICON_CACHED: &str = "fas fa-database";
pub const ICON_STALE: &str = "fas fa-clock";

/// RFC 3339 in UTC with fixed millisecond precision, so stored timestamps
/// also sort correctly as text.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Human-readable age: "Just now", "5 minutes", "1 hour", "3 days".
pub fn cache_age_label(age: Duration) -> String {
    fn plural(n: i64, unit: &str) -> String {
        if n == 1 {
            format!("1 {}", unit)
        } else {
            format!("{} {}s", n, unit)
        }
    }
    if age.num_days() >= 1 {
        plural(age.num_days(), "day")
    } else if age.num_hours() >= 1 {
        plural(age.num_hours(), "hour")
    } else if age.num_minutes() >= 1 {
        plural(age.num_minutes(), "minute")
    } else {
        "Just now".to_string()
    }
}

pub struct FundingCache {
    db: SharedDb,
    ttl: Duration,
}

impl FundingCache {
    pub fn new(db: SharedDb, ttl_hours: i64) -> Self {
        Self {
            db,
            ttl: Duration::hours(ttl_hours.max(0)),
        }
    }

    /// Cached status for a participant. With an `account_id`, the row for
    /// that account is preferred and a name match is accepted only if it
    /// belongs to the same account. Without one, the newest row whose name
    /// contains the participant's normalized name is returned.
    ///
    /// Staleness is not filtered here; callers decide with `is_stale`.
    pub fn get(&self, participant: &Participant, account_id: Option<&str>) -> Option<FundingStatus> {
        let normalized = participant.normalized_name();
        let row = {
            let db = self.db.lock();
            let lookup = match account_id {
                Some(id) => db.get_funding(id).and_then(|hit| match hit {
                    Some(row) => Ok(Some(row)),
                    None => db
                        .find_funding_by_name(&normalized)
                        .map(|row| row.filter(|r| r.account_id == id)),
                }),
                None => db.find_funding_by_name(&normalized),
            };
            match lookup {
                Ok(row) => row,
                Err(e) => {
                    log::warn!("Funding cache read failed for {}: {}", participant.display_name, e);
                    None
                }
            }
        }?;
        Some(self.annotate(status_from_row(row), Utc::now()))
    }

    /// True if `status` is older than the TTL at `now`, or its timestamp is
    /// missing or unparseable.
    pub fn is_stale_at(&self, status: &FundingStatus, now: DateTime<Utc>) -> bool {
        self.timestamp_is_stale(&status.last_updated, now)
    }

    pub fn is_stale(&self, status: &FundingStatus) -> bool {
        self.is_stale_at(status, Utc::now())
    }

    /// Upsert by account id. Returns false when a newer row already exists.
    pub fn put(&self, status: &FundingStatus) -> Result<bool, DbError> {
        let row = row_from_status(status);
        self.db.lock().upsert_funding(&row)
    }

    /// Delete every stale row. Returns the number deleted.
    pub fn purge_stale(&self) -> Result<usize, DbError> {
        let now = Utc::now();
        let db = self.db.lock();
        let stale: Vec<String> = db
            .list_funding_timestamps()?
            .into_iter()
            .filter(|(_, ts)| self.timestamp_is_stale(ts, now))
            .map(|(id, _)| id)
            .collect();
        let deleted = db.delete_funding(&stale)?;
        if deleted > 0 {
            log::info!("Purged {} stale funding cache rows", deleted);
        }
        Ok(deleted)
    }

    pub fn stats(&self) -> Result<FundingCacheStats, DbError> {
        let now = Utc::now();
        let rows = self.db.lock().list_funding_timestamps()?;
        let stale = rows
            .iter()
            .filter(|(_, ts)| self.timestamp_is_stale(ts, now))
            .count();
        let most_recent = rows
            .iter()
            .filter_map(|(_, ts)| parse_timestamp(ts))
            .max()
            .map(format_timestamp);
        Ok(FundingCacheStats {
            total: rows.len(),
            fresh: rows.len() - stale,
            stale,
            most_recent,
        })
    }

    /// Member name stored for an account, if cached.
    pub fn cached_member_name(&self, account_id: &str) -> Option<String> {
        match self.db.lock().get_funding(account_id) {
            Ok(row) => row.map(|r| r.member_name),
            Err(e) => {
                log::warn!("Funding cache read failed for account {}: {}", account_id, e);
                None
            }
        }
    }

    /// Every account id currently cached.
    pub fn account_ids(&self) -> Result<Vec<String>, DbError> {
        Ok(self
            .db
            .lock()
            .list_funding_timestamps()?
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }

    fn timestamp_is_stale(&self, ts: &str, now: DateTime<Utc>) -> bool {
        parse_timestamp(ts).is_none_or(|updated| now.signed_duration_since(updated) > self.ttl)
    }

    fn annotate(&self, mut status: FundingStatus, now: DateTime<Utc>) -> FundingStatus {
        status.source = StatusSource::Cache;
        if self.is_stale_at(&status, now) {
            let age = parse_timestamp(&status.last_updated)
                .map(|updated| cache_age_label(now.signed_duration_since(updated)));
            status.display_text = match age {
                Some(age) => format!("{} (Cached - {} old)", status.display_text, age),
                None => format!("{} (Cached - age unknown)", status.display_text),
            };
            status.display_class = DisplayClass::Warning;
            status.display_icon = ICON_STALE.to_string();
        } else {
            status.display_text = format!("{} (Cached)", status.display_text);
            status.display_icon = ICON_CACHED.to_string();
        }
        status
    }
}

fn row_from_status(status: &FundingStatus) -> DbFundingRow {
    DbFundingRow {
        account_id: status.account_id.clone(),
        member_name: status.member_name.clone(),
        normalized_name: crate::normalize::normalize_name(&status.member_name),
        amount_owed: status.amount_owed,
        category: status.category.as_str().to_string(),
        display_text: status.display_text.clone(),
        display_class: status.display_class.as_str().to_string(),
        display_icon: status.display_icon.clone(),
        contributing_invoices: serde_json::to_string(&status.contributing_invoices)
            .unwrap_or_else(|_| "[]".to_string()),
        last_updated: status.last_updated.clone(),
    }
}

fn status_from_row(row: DbFundingRow) -> FundingStatus {
    FundingStatus {
        member_name: row.member_name,
        account_id: row.account_id,
        amount_owed: row.amount_owed.max(0.0),
        category: FundingCategory::from_str_lossy(&row.category),
        display_text: row.display_text,
        display_class: DisplayClass::from_str_lossy(&row.display_class),
        display_icon: row.display_icon,
        source: StatusSource::LiveApi,
        last_updated: row.last_updated,
        contributing_invoices: serde_json::from_str(&row.contributing_invoices).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;

    fn cache() -> FundingCache {
        FundingCache::new(test_db().into_shared(), 24)
    }

    fn status(account_id: &str, name: &str, last_updated: DateTime<Utc>) -> FundingStatus {
        FundingStatus {
            member_name: name.to_string(),
            account_id: account_id.to_string(),
            amount_owed: 40.0,
            category: FundingCategory::Unfunded,
            display_text: "Past Due - $40.00".to_string(),
            display_class: DisplayClass::Danger,
            display_icon: "fas fa-exclamation-triangle".to_string(),
            source: StatusSource::LiveApi,
            last_updated: format_timestamp(last_updated),
            contributing_invoices: vec!["a".to_string()],
        }
    }

    #[test]
    fn test_staleness_boundary() {
        let c = cache();
        let now = Utc::now();
        let old = status("1", "A", now - Duration::hours(24) - Duration::seconds(1));
        let recent = status("1", "A", now - Duration::hours(23) - Duration::minutes(59));
        assert!(c.is_stale_at(&old, now));
        assert!(!c.is_stale_at(&recent, now));
    }

    #[test]
    fn test_unparseable_or_missing_timestamp_is_stale() {
        let c = cache();
        let mut s = status("1", "A", Utc::now());
        s.last_updated = "yesterday-ish".to_string();
        assert!(c.is_stale(&s));
        s.last_updated = String::new();
        assert!(c.is_stale(&s));
    }

    #[test]
    fn test_put_then_get_by_account_is_annotated() {
        let c = cache();
        c.put(&status("96530079", "Dennis Rost", Utc::now())).expect("put");

        let p = Participant::new("Someone Else", None, None);
        let hit = c.get(&p, Some("96530079")).expect("cached");
        assert_eq!(hit.account_id, "96530079");
        assert_eq!(hit.source, StatusSource::Cache);
        assert_eq!(hit.display_text, "Past Due - $40.00 (Cached)");
        assert_eq!(hit.display_class, DisplayClass::Danger);
        assert_eq!(hit.display_icon, ICON_CACHED);
        assert_eq!(hit.contributing_invoices, vec!["a".to_string()]);
    }

    #[test]
    fn test_put_upserts_by_account() {
        let c = cache();
        let now = Utc::now();
        c.put(&status("7", "Jon Smith", now - Duration::minutes(5))).expect("put");
        let mut newer = status("7", "Jon Smith", now);
        newer.category = FundingCategory::Funded;
        newer.amount_owed = 0.0;
        c.put(&newer).expect("put");

        let stats = c.stats().expect("stats");
        assert_eq!(stats.total, 1);
        let hit = c.get(&Participant::new("Jon Smith", None, None), Some("7")).expect("hit");
        assert_eq!(hit.category, FundingCategory::Funded);
    }

    #[test]
    fn test_get_by_fuzzy_name() {
        let c = cache();
        c.put(&status("7", "Jonathan Smith-Jones", Utc::now())).expect("put");

        let hit = c.get(&Participant::new("smith jones", None, None), None);
        assert_eq!(hit.map(|s| s.account_id), Some("7".to_string()));
        assert!(c.get(&Participant::new("Katie", None, None), None).is_none());
    }

    #[test]
    fn test_name_fallback_never_returns_other_account() {
        let c = cache();
        c.put(&status("B", "Jon Smith", Utc::now())).expect("put");

        let p = Participant::new("Jon Smith", None, None);
        assert!(c.get(&p, Some("A")).is_none());
        assert!(c.get(&p, Some("B")).is_some());
    }

    #[test]
    fn test_stale_entry_annotation() {
        let c = cache();
        c.put(&status("7", "Jon Smith", Utc::now() - Duration::hours(50))).expect("put");

        let hit = c.get(&Participant::new("Jon Smith", None, None), None).expect("hit");
        assert!(c.is_stale(&hit));
        assert_eq!(hit.display_text, "Past Due - $40.00 (Cached - 2 days old)");
        assert_eq!(hit.display_class, DisplayClass::Warning);
        assert_eq!(hit.display_icon, ICON_STALE);
    }

    #[test]
    fn test_purge_and_stats() {
        let c = cache();
        let now = Utc::now();
        c.put(&status("1", "A", now)).expect("put");
        c.put(&status("2", "B", now - Duration::hours(30))).expect("put");

        let stats = c.stats().expect("stats");
        assert_eq!((stats.total, stats.fresh, stats.stale), (2, 1, 1));
        assert_eq!(stats.most_recent, Some(format_timestamp(now)));

        assert_eq!(c.purge_stale().expect("purge"), 1);
        assert_eq!(c.account_ids().expect("ids"), vec!["1".to_string()]);
    }

    #[test]
    fn test_cache_age_label() {
        assert_eq!(cache_age_label(Duration::seconds(30)), "Just now");
        assert_eq!(cache_age_label(Duration::minutes(1)), "1 minute");
        assert_eq!(cache_age_label(Duration::minutes(45)), "45 minutes");
        assert_eq!(cache_age_label(Duration::hours(1)), "1 hour");
        assert_eq!(cache_age_label(Duration::hours(23)), "23 hours");
        assert_eq!(cache_age_label(Duration::days(3)), "3 days");
    }
}
