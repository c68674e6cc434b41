//! nostrpress — publish a static-site posts directory to Nostr relays.
//!
//! # Usage
//!
//! ```text
//! nostrpress publish     [--site <name> | --all] [--dry-run] [--delay <ms>]
//! nostrpress delete      [--site <name> | --all] [--yes]
//! nostrpress delete-all  [--site <name> | --all] [--yes]
//! nostrpress update      [--site <name> | --all]
//! nostrpress sync        [--site <name> | --all]
//! nostrpress list        [--site <name> | --all] [--json]
//! nostrpress config      [--site <name> | --all]
//! nostrpress add-site <name> --posts-dir <dir> [--relay <url>]... [--default]
//! ```
//!
//! Exit codes: 0 success, 1 partial failure, 2 total failure, 3 fatal error.

mod commands;
mod prompt;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use commands::{add_site::AddSiteArgs, list::ListArgs, GlobalArgs};
use nostrpress_sync::{ExitSignal, Operation, Sweep};

/// Exit code for configuration and unexpected errors.
const EXIT_FATAL: u8 = 3;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "nostrpress",
    version,
    about = "Publish, delete and sync blog posts as Nostr long-form articles",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Publish every post that has no nostr_id yet.
    Publish,

    /// Send deletions for posts marked `delete: true`, then remove the files.
    Delete,

    /// Send deletions for every published post and clear their nostr_id.
    DeleteAll,

    /// Rewrite nostr_id relay hints to match the configured relays.
    Update,

    /// Create local posts for own articles found on relays.
    Sync,

    /// List own articles found on relays.
    List(ListArgs),

    /// Show the resolved site configuration.
    Config,

    /// Add or replace a site in the config file.
    AddSite(AddSiteArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose, cli.global.quiet);

    match run(cli).await {
        Ok(signal) => ExitCode::from(signal.code()),
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitSignal> {
    let global = cli.global;
    match cli.command {
        Commands::Publish => commands::batch::run(&global, Operation::Publish).await,
        Commands::Delete => commands::batch::run(&global, Operation::Delete(Sweep::Marked)).await,
        Commands::DeleteAll => commands::batch::run(&global, Operation::Delete(Sweep::All)).await,
        Commands::Update => commands::batch::run(&global, Operation::Resync).await,
        Commands::Sync => commands::batch::run(&global, Operation::Pull).await,
        Commands::List(args) => args.run(&global).await,
        Commands::Config => commands::config::run(&global),
        Commands::AddSite(args) => args.run(),
    }
}

/// `RUST_LOG` wins; otherwise `-v` → debug, `-q` → warn, default info.
fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let fallback = match (verbose, quiet) {
        (true, _) => "debug",
        (false, true) => "warn",
        (false, false) => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
