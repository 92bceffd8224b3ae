//! Identity resolution: participant name/email/phone to a portal account id.
//!
//! Resolution is an ordered chain of strategies, cheapest and most
//! authoritative first. The first strategy that produces an identity wins.
//! A strategy that errors is logged and treated as a miss; the chain always
//! runs to completion or to the first hit, and never guesses an id.

pub mod strategies;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::{DbError, SharedDb};
use crate::directory::AssigneeDirectory;
use crate::error::PortalError;
use crate::portal::PortalSession;
use crate::types::{Participant, ResolvedIdentity};

pub use strategies::{
    DirectoryKey, DirectoryLookupStrategy, DirectoryRefreshStrategy, LivePortalSearchStrategy,
    LocalExactStrategy,
};

/// Failure inside one strategy. Never escapes the resolver.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error(transparent)]
    Portal(#[from] PortalError),
    #[error(transparent)]
    Db(#[from] DbError),
}

#[async_trait]
pub trait ResolutionStrategy: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &'static str;

    async fn try_resolve(
        &self,
        participant: &Participant,
    ) -> Result<Option<ResolvedIdentity>, StrategyError>;
}

pub struct IdentityResolver {
    strategies: Vec<Box<dyn ResolutionStrategy>>,
}

impl IdentityResolver {
    pub fn new(strategies: Vec<Box<dyn ResolutionStrategy>>) -> Self {
        Self { strategies }
    }

    /// The standard chain: local mappings, directory by email, phone, and
    /// name, one forced directory refresh, then live portal search.
    pub fn standard(
        db: SharedDb,
        directory: Arc<AssigneeDirectory>,
        portal: Arc<dyn PortalSession>,
        timeout: Duration,
        match_threshold: f64,
    ) -> Self {
        Self::new(vec![
            Box::new(LocalExactStrategy::new(db.clone())),
            Box::new(DirectoryLookupStrategy::new(directory.clone(), DirectoryKey::Email)),
            Box::new(DirectoryLookupStrategy::new(directory.clone(), DirectoryKey::Phone)),
            Box::new(DirectoryLookupStrategy::new(directory.clone(), DirectoryKey::Name)),
            Box::new(DirectoryRefreshStrategy::new(directory)),
            Box::new(LivePortalSearchStrategy::new(portal, db, timeout, match_threshold)),
        ])
    }

    pub async fn resolve(&self, participant: &Participant) -> Option<ResolvedIdentity> {
        for strategy in &self.strategies {
            match strategy.try_resolve(participant).await {
                Ok(Some(identity)) => {
                    log::info!(
                        "Resolved '{}' to account {} via {} ({:?} confidence)",
                        participant.display_name,
                        identity.account_id,
                        strategy.name(),
                        identity.confidence
                    );
                    return Some(identity);
                }
                Ok(None) => {
                    log::debug!("{} missed for '{}'", strategy.name(), participant.display_name);
                }
                Err(e) => {
                    log::warn!(
                        "{} failed for '{}', continuing: {}",
                        strategy.name(),
                        participant.display_name,
                        e
                    );
                }
            }
        }
        log::info!("No account resolved for '{}'", participant.display_name);
        None
    }
}
