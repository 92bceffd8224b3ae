//! Scheduled bulk refresh of cached funding statuses.
//!
//! Re-fetches every account currently in the funding cache and rewrites its
//! row. Intended to run from cron or a systemd timer.
//!
//! Usage: `refresh_funding [--config PATH] [--purge-stale] [--stats]`

use std::path::PathBuf;

use clap::Parser;
use gymbot_funding::state::{build_default_service, load_config, load_config_from};

#[derive(Parser, Debug)]
#[command(name = "refresh_funding")]
#[command(about = "Re-fetch and rewrite every cached funding status")]
struct Cli {
    /// Config file (defaults to ~/.gymbot/config.json)
    #[arg(short, long, env = "GYMBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Delete stale rows after refreshing
    #[arg(long)]
    purge_stale: bool,

    /// Print cache stats without refreshing
    #[arg(long = "stats")]
    stats_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Cli::parse();
    let config = match &args.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?;

    let service = build_default_service(&config).map_err(|e| anyhow::anyhow!(e))?;

    if !args.stats_only {
        let summary = service.refresh_cached().await;
        println!(
            "Refreshed {} accounts ({} failed)",
            summary.success_count, summary.error_count
        );
    }

    if args.purge_stale {
        let purged = service.cache().purge_stale()?;
        println!("Purged {purged} stale rows");
    }

    let stats = service.cache().stats()?;
    println!(
        "Cache: {} total, {} fresh, {} stale, last update {}",
        stats.total,
        stats.fresh,
        stats.stale,
        stats.most_recent.as_deref().unwrap_or("never")
    );

    Ok(())
}
