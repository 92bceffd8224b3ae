//! Shared type definitions for the database layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),
}

/// A row from the `funding_status_cache` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbFundingRow {
    pub account_id: String,
    pub member_name: String,
    pub normalized_name: String,
    pub amount_owed: f64,
    pub category: String,
    pub display_text: String,
    pub display_class: String,
    pub display_icon: String,
    /// JSON array of invoice ids.
    pub contributing_invoices: String,
    pub last_updated: String,
}

/// A row from the `identity_mappings` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbIdentityMapping {
    pub account_id: String,
    pub name: String,
    pub normalized_name: String,
    pub source: String,
    pub created_at: String,
}

/// Aggregate counts over the funding cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingCacheStats {
    pub total: usize,
    pub fresh: usize,
    pub stale: usize,
    pub most_recent: Option<String>,
}
