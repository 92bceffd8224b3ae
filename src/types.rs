use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::normalize::{normalize_email_for_lookup, normalize_name, normalize_phone};

/// Configuration stored in ~/.gymbot/config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub portal: PortalConfig,
    #[serde(default)]
    pub funding: FundingConfig,
}

/// Training portal connection settings. Credentials come from the external
/// login flow; this crate only forwards them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalConfig {
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Attempts per billing fetch (2 = one retry).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_timeout_secs() -> u64 {
    12
}

fn default_max_attempts() -> u32 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingConfig {
    #[serde(default = "default_cache_ttl_hours")]
    pub cache_ttl_hours: i64,
    /// Minimum similarity for accepting a live-search candidate.
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

fn default_cache_ttl_hours() -> i64 {
    24
}

fn default_match_threshold() -> f64 {
    0.6
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            cache_ttl_hours: default_cache_ttl_hours(),
            match_threshold: default_match_threshold(),
            database_path: None,
        }
    }
}

// =============================================================================
// Identity
// =============================================================================

/// A person to resolve, built per lookup call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub display_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Participant {
    pub fn new(display_name: &str, email: Option<&str>, phone: Option<&str>) -> Self {
        let clean = |v: Option<&str>| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        Self {
            display_name: display_name.trim().to_string(),
            email: clean(email),
            phone: clean(phone),
        }
    }

    pub fn normalized_name(&self) -> String {
        normalize_name(&self.display_name)
    }

    pub fn normalized_email(&self) -> Option<String> {
        self.email.as_deref().and_then(normalize_email_for_lookup)
    }

    pub fn normalized_phone(&self) -> Option<String> {
        self.phone.as_deref().and_then(normalize_phone)
    }
}

/// Which resolution step produced the account id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMethod {
    LocalExact,
    DirectoryEmail,
    DirectoryPhone,
    DirectoryName,
    LivePortalSearch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedIdentity {
    pub account_id: String,
    pub match_method: MatchMethod,
    pub confidence: Confidence,
}

/// One roster row, keyed three ways inside the assignee directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub account_id: String,
    pub name: String,
    pub normalized_name: String,
    pub email: Option<String>,
    pub normalized_phone: Option<String>,
}

impl DirectoryEntry {
    pub fn new(account_id: &str, name: &str, email: Option<&str>, phone: Option<&str>) -> Self {
        Self {
            account_id: account_id.trim().to_string(),
            name: name.trim().to_string(),
            normalized_name: normalize_name(name),
            email: email.and_then(normalize_email_for_lookup),
            normalized_phone: phone.and_then(normalize_phone),
        }
    }
}

// =============================================================================
// Funding
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundingCategory {
    Funded,
    Unfunded,
    Partial,
    Unknown,
}

impl FundingCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FundingCategory::Funded => "Funded",
            FundingCategory::Unfunded => "Unfunded",
            FundingCategory::Partial => "Partial",
            FundingCategory::Unknown => "Unknown",
        }
    }

    pub fn from_str_lossy(value: &str) -> Self {
        match value {
            "Funded" => FundingCategory::Funded,
            "Unfunded" => FundingCategory::Unfunded,
            "Partial" => FundingCategory::Partial,
            _ => FundingCategory::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayClass {
    Success,
    Danger,
    Warning,
    Secondary,
}

impl DisplayClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayClass::Success => "success",
            DisplayClass::Danger => "danger",
            DisplayClass::Warning => "warning",
            DisplayClass::Secondary => "secondary",
        }
    }

    pub fn from_str_lossy(value: &str) -> Self {
        match value {
            "success" => DisplayClass::Success,
            "danger" => DisplayClass::Danger,
            "warning" => DisplayClass::Warning,
            _ => DisplayClass::Secondary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusSource {
    LiveApi,
    Cache,
}

/// Normalized, cacheable funding result for one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingStatus {
    pub member_name: String,
    pub account_id: String,
    pub amount_owed: f64,
    pub category: FundingCategory,
    pub display_text: String,
    pub display_class: DisplayClass,
    pub display_icon: String,
    pub source: StatusSource,
    /// RFC 3339. Unparseable values make the row stale.
    pub last_updated: String,
    /// Ids of the invoices that contributed to `amount_owed`.
    #[serde(default)]
    pub contributing_invoices: Vec<String>,
}
