//! Member identity resolution and funding-status cache.
//!
//! Turns a participant name (with optional email/phone) into a training-portal
//! account id, fetches and classifies that account's billing state, and
//! caches the result with TTL staleness. The entry point is
//! [`service::FundingLookupService`]; [`state::build_default_service`] wires
//! one up from `~/.gymbot/config.json`.

pub mod billing;
pub mod cache;
pub mod db;
pub mod directory;
pub mod error;
mod migrations;
pub mod normalize;
pub mod portal;
pub mod resolver;
pub mod service;
pub mod state;
pub mod types;

pub use error::{LookupError, PortalError};
pub use service::{FundingLookupService, RefreshSummary};
pub use types::{FundingStatus, Participant};
