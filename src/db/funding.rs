use rusqlite::{params, OptionalExtension, Row};

use super::*;

const FUNDING_COLUMNS: &str = "account_id, member_name, normalized_name, amount_owed, category,
     display_text, display_class, display_icon, contributing_invoices, last_updated";

fn map_funding_row(row: &Row<'_>) -> rusqlite::Result<DbFundingRow> {
    Ok(DbFundingRow {
        account_id: row.get(0)?,
        member_name: row.get(1)?,
        normalized_name: row.get(2)?,
        amount_owed: row.get(3)?,
        category: row.get(4)?,
        display_text: row.get(5)?,
        display_class: row.get(6)?,
        display_icon: row.get(7)?,
        contributing_invoices: row.get(8)?,
        last_updated: row.get(9)?,
    })
}

impl FundingDb {
    // =========================================================================
    // Funding status cache
    // =========================================================================

    /// Upsert the latest snapshot for an account. A row whose stored
    /// `last_updated` is newer than the incoming one is left alone; rows with
    /// an unparseable timestamp are always replaced. Returns whether the row
    /// was written.
    pub fn upsert_funding(&self, row: &DbFundingRow) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "INSERT INTO funding_status_cache (
                account_id, member_name, normalized_name, amount_owed, category,
                display_text, display_class, display_icon, contributing_invoices, last_updated
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(account_id) DO UPDATE SET
                member_name = excluded.member_name,
                normalized_name = excluded.normalized_name,
                amount_owed = excluded.amount_owed,
                category = excluded.category,
                display_text = excluded.display_text,
                display_class = excluded.display_class,
                display_icon = excluded.display_icon,
                contributing_invoices = excluded.contributing_invoices,
                last_updated = excluded.last_updated
             WHERE julianday(funding_status_cache.last_updated) IS NULL
                OR julianday(excluded.last_updated) >= julianday(funding_status_cache.last_updated)",
            params![
                row.account_id,
                row.member_name,
                row.normalized_name,
                row.amount_owed,
                row.category,
                row.display_text,
                row.display_class,
                row.display_icon,
                row.contributing_invoices,
                row.last_updated,
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn get_funding(&self, account_id: &str) -> Result<Option<DbFundingRow>, DbError> {
        let sql = format!(
            "SELECT {} FROM funding_status_cache WHERE account_id = ?1",
            FUNDING_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, params![account_id], map_funding_row)
            .optional()?)
    }

    /// Most recently updated row whose normalized member name contains
    /// `normalized_name`. Empty input matches nothing.
    pub fn find_funding_by_name(
        &self,
        normalized_name: &str,
    ) -> Result<Option<DbFundingRow>, DbError> {
        if normalized_name.is_empty() {
            return Ok(None);
        }
        let sql = format!(
            "SELECT {} FROM funding_status_cache
             WHERE instr(normalized_name, ?1) > 0
             ORDER BY last_updated DESC
             LIMIT 1",
            FUNDING_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, params![normalized_name], map_funding_row)
            .optional()?)
    }

    /// `(account_id, last_updated)` for every cached account.
    pub fn list_funding_timestamps(&self) -> Result<Vec<(String, String)>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT account_id, last_updated FROM funding_status_cache ORDER BY account_id",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn delete_funding(&self, account_ids: &[String]) -> Result<usize, DbError> {
        let mut deleted = 0;
        let mut stmt = self
            .conn
            .prepare("DELETE FROM funding_status_cache WHERE account_id = ?1")?;
        for id in account_ids {
            deleted += stmt.execute(params![id])?;
        }
        Ok(deleted)
    }
}
