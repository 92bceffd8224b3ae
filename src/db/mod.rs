//! SQLite store for funding snapshots and discovered identity mappings.
//!
//! The database lives at `~/.gymbot/funding.db` unless configured otherwise.
//! It is a working cache of portal data: losing it costs a round of live
//! lookups, nothing more.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection};

pub mod funding;
pub mod identities;
pub mod types;
pub use types::*;

/// Connection handle shared by the funding cache and the resolver.
pub type SharedDb = Arc<Mutex<FundingDb>>;

pub struct FundingDb {
    conn: Connection,
}

impl FundingDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Open (or create) the database at the default path and apply the schema.
    pub fn open() -> Result<Self, DbError> {
        Self::open_at(Self::db_path()?)
    }

    /// Open a database at an explicit path.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        log::debug!("Opened funding database at {}", path.display());
        Ok(Self { conn })
    }

    /// Default database path: `~/.gymbot/funding.db`.
    pub fn db_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".gymbot").join("funding.db"))
    }

    pub fn into_shared(self) -> SharedDb {
        Arc::new(Mutex::new(self))
    }

    /// Number of rows in a table. Test and diagnostics helper.
    pub fn count_rows(&self, table: &str) -> Result<i64, DbError> {
        let sql = match table {
            "funding_status_cache" => "SELECT COUNT(*) FROM funding_status_cache",
            "identity_mappings" => "SELECT COUNT(*) FROM identity_mappings",
            _ => return Ok(0),
        };
        Ok(self.conn.query_row(sql, params![], |row| row.get(0))?)
    }
}

// =============================================================================
// Shared test utilities
// =============================================================================
