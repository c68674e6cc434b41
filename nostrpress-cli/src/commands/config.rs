//! `nostrpress config`: the resolved settings for one or all sites, plus the
//! public key. The secret key is never printed.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use nostrpress_core::config::{self, Env};
use nostrpress_core::{ConfigError, SiteConfig};
use nostrpress_sync::pipeline::load_keys_at;
use nostrpress_sync::{ExitSignal, Scope};

use super::{home, GlobalArgs};

pub fn run(global: &GlobalArgs) -> Result<ExitSignal> {
    let home = home()?;
    let env = Env::from_process();

    let sites = match global.scope() {
        Scope::All => config::resolve_all_sites_at(&home, &env),
        Scope::Site(name) => config::resolve_site_at(&home, name.as_deref(), &env).map(|s| vec![s]),
    }
    .context("could not resolve site configuration")?;

    let config_path = config::config_path_at(&home);
    let source = if config_path.exists() {
        config_path.display().to_string()
    } else {
        "none (using environment)".to_owned()
    };
    println!("{:<16} {source}", "config file:");
    println!("{:<16} {}", "public key:", public_key(&home, &env));

    for site in &sites {
        println!();
        print_site(site);
    }
    Ok(ExitSignal::Success)
}

fn public_key(home: &Path, env: &Env) -> String {
    match load_keys_at(home, env) {
        Ok(keys) => keys.npub(),
        Err(ConfigError::MissingPrivateKey { secrets }) => format!(
            "{} (set NOSTR_PRIVATE_KEY or write {})",
            "not configured".yellow(),
            secrets.display()
        ),
        Err(e) => format!("{} ({e})", "invalid".red()),
    }
}

fn print_site(site: &SiteConfig) {
    let unset = || "-".bright_black().to_string();
    let posts_dir = if site.posts_dir.is_dir() {
        site.posts_dir.display().to_string()
    } else {
        format!("{} {}", site.posts_dir.display(), "(missing)".red())
    };

    println!("{}", format!("site '{}'", site.name).bold());
    println!("  {:<16} {posts_dir}", "posts_dir:");
    println!(
        "  {:<16} {}",
        "blog_url:",
        site.blog_url.clone().unwrap_or_else(unset)
    );
    println!(
        "  {:<16} {}",
        "author_id:",
        site.author_id.clone().unwrap_or_else(unset)
    );
    println!(
        "  {:<16} {}",
        "published_index:",
        site.published_index
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(unset)
    );
    if site.relays.is_empty() {
        println!("  {:<16} {}", "relays:", "none".red());
    } else {
        println!("  {:<16}", "relays:");
        for relay in &site.relays {
            println!("    - {relay}");
        }
    }
}
