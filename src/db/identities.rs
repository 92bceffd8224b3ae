use chrono::Utc;
use rusqlite::params;

use super::*;

impl FundingDb {
    // =========================================================================
    // Identity mappings
    // =========================================================================

    /// Record a discovered `(account_id, name)` pair. Re-recording an existing
    /// pair is a no-op. Returns true if a new row was inserted.
    pub fn record_identity(
        &self,
        account_id: &str,
        name: &str,
        normalized_name: &str,
        source: &str,
    ) -> Result<bool, DbError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO identity_mappings
                (account_id, name, normalized_name, source, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                account_id,
                name,
                normalized_name,
                source,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(inserted > 0)
    }

    /// All mappings recorded for an exact normalized name, oldest first.
    pub fn identities_for_name(
        &self,
        normalized_name: &str,
    ) -> Result<Vec<DbIdentityMapping>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT account_id, name, normalized_name, source, created_at
             FROM identity_mappings
             WHERE normalized_name = ?1
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![normalized_name], |row| {
            Ok(DbIdentityMapping {
                account_id: row.get(0)?,
                name: row.get(1)?,
                normalized_name: row.get(2)?,
                source: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_utils::test_db;

    #[test]
    fn test_record_identity_is_idempotent() {
        let db = test_db();
        assert!(db
            .record_identity("96530079", "Dennis Rost", "dennis rost", "live_search")
            .expect("insert"));
        assert!(!db
            .record_identity("96530079", "Dennis Rost", "dennis rost", "live_search")
            .expect("re-insert"));
        assert_eq!(db.count_rows("identity_mappings").expect("count"), 1);
    }

    #[test]
    fn test_identities_for_name_exact_only() {
        let db = test_db();
        db.record_identity("1", "Jon Smith", "jon smith", "live_search")
            .expect("insert");
        db.record_identity("2", "Jon Smithers", "jon smithers", "live_search")
            .expect("insert");

        let hits = db.identities_for_name("jon smith").expect("query");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].account_id, "1");
        assert!(db.identities_for_name("jon").expect("query").is_empty());
    }
}
