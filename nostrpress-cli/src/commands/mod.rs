//! Subcommand implementations and the flags they share.

pub mod add_site;
pub mod batch;
pub mod config;
pub mod list;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use nostrpress_core::config as core_config;
use nostrpress_nostr::{RelayPool, RelayTransport};
use nostrpress_sync::{RunOptions, Scope};

/// Flags accepted by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Site to operate on (defaults to the configured default site).
    #[arg(long, global = true, conflicts_with = "all")]
    pub site: Option<String>,

    /// Operate on every configured site in turn.
    #[arg(long, global = true)]
    pub all: bool,

    /// Show what would happen without sending or writing anything.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Skip confirmation prompts.
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    /// Milliseconds to wait between posts that hit the network.
    #[arg(long, global = true, value_name = "MS", default_value_t = 3000)]
    pub delay: u64,

    /// Debug output.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Warnings and errors only.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

impl GlobalArgs {
    pub fn scope(&self) -> Scope {
        if self.all {
            Scope::All
        } else {
            Scope::Site(self.site.clone())
        }
    }

    pub fn options(&self) -> RunOptions {
        RunOptions {
            dry_run: self.dry_run,
            delay: Duration::from_millis(self.delay),
            ..RunOptions::default()
        }
    }
}

pub fn home() -> Result<PathBuf> {
    Ok(core_config::home()?)
}

/// A fresh WebSocket pool per site.
pub fn relay_pool() -> Arc<dyn RelayTransport> {
    Arc::new(RelayPool::default())
}
