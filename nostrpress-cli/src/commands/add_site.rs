//! `nostrpress add-site <name>`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use nostrpress_core::config::{self, SiteEntry};
use nostrpress_sync::ExitSignal;

use super::home;

#[derive(Args, Debug)]
pub struct AddSiteArgs {
    /// Site name used with `--site`.
    pub name: String,

    /// Directory holding the posts (`~/` is expanded).
    #[arg(long, value_name = "DIR")]
    pub posts_dir: PathBuf,

    /// Public base URL of the blog, used for canonical and image URLs.
    #[arg(long)]
    pub blog_url: Option<String>,

    /// Value of the `author` tag.
    #[arg(long)]
    pub author_id: Option<String>,

    /// Relay URL for this site; repeat for several. Omit to use the global list.
    #[arg(long = "relay", value_name = "URL")]
    pub relays: Vec<String>,

    /// Path of a JSON index of published posts to maintain.
    #[arg(long, value_name = "FILE")]
    pub published_index: Option<PathBuf>,

    /// Make this the default site.
    #[arg(long)]
    pub default: bool,
}

impl AddSiteArgs {
    pub fn run(self) -> Result<ExitSignal> {
        let home = home()?;
        let entry = SiteEntry {
            posts_dir: self.posts_dir,
            blog_url: self.blog_url,
            author_id: self.author_id,
            relays: (!self.relays.is_empty()).then_some(self.relays),
            published_index: self.published_index,
        };

        let config = config::add_site_at(&home, &self.name, entry, self.default)
            .with_context(|| format!("failed to add site '{}'", self.name))?;

        println!(
            "✓ Saved site '{}' to {}",
            self.name,
            config::config_path_at(&home).display()
        );
        if config.default_site.as_deref() == Some(self.name.as_str()) {
            println!("  '{}' is the default site", self.name);
        }
        Ok(ExitSignal::Success)
    }
}
