//! Configuration loading and service wiring.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::billing::BillingSnapshotFetcher;
use crate::cache::FundingCache;
use crate::db::{FundingDb, SharedDb};
use crate::directory::AssigneeDirectory;
use crate::portal::http::HttpPortalSession;
use crate::portal::retry::RetryPolicy;
use crate::portal::PortalSession;
use crate::resolver::IdentityResolver;
use crate::service::FundingLookupService;
use crate::types::Config;

/// `~/.gymbot`
pub fn get_state_dir() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".gymbot"))
}

/// Load configuration from `~/.gymbot/config.json`.
pub fn load_config() -> Result<Config, String> {
    load_config_from(&get_state_dir()?.join("config.json"))
}

pub fn load_config_from(path: &Path) -> Result<Config, String> {
    if !path.exists() {
        return Err(format!(
            "Config file not found at {}. Create it with: {{ \"portal\": {{ \"baseUrl\": \"https://portal.example.com\" }} }}",
            path.display()
        ));
    }

    let content = fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;
    let config: Config =
        serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))?;

    if config.portal.base_url.trim().is_empty() {
        return Err("portal.baseUrl must not be empty".to_string());
    }
    if !(0.0..=1.0).contains(&config.funding.match_threshold) {
        return Err(format!(
            "funding.matchThreshold must be within 0..1, got {}",
            config.funding.match_threshold
        ));
    }

    Ok(config)
}

/// Open the configured database, or the default one.
pub fn open_db(config: &Config) -> Result<SharedDb, String> {
    let db = match &config.funding.database_path {
        Some(path) => FundingDb::open_at(path.clone()),
        None => FundingDb::open(),
    }
    .map_err(|e| format!("Failed to open funding database: {}", e))?;
    Ok(db.into_shared())
}

/// Wire a lookup service around an existing session and database.
pub fn build_service(
    config: &Config,
    portal: Arc<dyn PortalSession>,
    db: SharedDb,
) -> FundingLookupService {
    let timeout = Duration::from_secs(config.portal.timeout_secs.max(1));
    let directory = Arc::new(AssigneeDirectory::new(portal.clone(), timeout));
    let resolver = IdentityResolver::standard(
        db.clone(),
        directory,
        portal.clone(),
        timeout,
        config.funding.match_threshold,
    );
    let fetcher = BillingSnapshotFetcher::new(
        portal.clone(),
        timeout,
        RetryPolicy::with_attempts(config.portal.max_attempts),
    );
    let cache = FundingCache::new(db, config.funding.cache_ttl_hours);
    FundingLookupService::new(resolver, fetcher, cache, portal, timeout)
}

/// Full production wiring: HTTP session plus the configured database.
pub fn build_default_service(config: &Config) -> Result<FundingLookupService, String> {
    let portal = HttpPortalSession::new(&config.portal)
        .map_err(|e| format!("Failed to create portal session: {}", e))?;
    let db = open_db(config)?;
    Ok(build_service(config, Arc::new(portal), db))
}
