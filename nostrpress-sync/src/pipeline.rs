//! Shared pipeline entrypoint used by every CLI command.
//!
//! Resolves sites and keys up front (configuration errors abort before any
//! document is touched), then runs one operation per site in order. Each site
//! gets its own transport from `make_transport`; it is closed when the site's
//! batch ends, whether the batch succeeded or not.

use std::path::Path;
use std::sync::Arc;

use nostrpress_core::config::{self, Env};
use nostrpress_core::{ConfigError, SiteConfig};
use nostrpress_nostr::{Keys, RelayTransport, RemoteEvent};

use crate::context::{RunContext, RunOptions};
use crate::delete::{delete_site, Confirm, DeleteStatus, Sweep};
use crate::error::SyncError;
use crate::publish::{publish_site, PublishStatus};
use crate::pull::{fetch_own_articles, pull_site, PullStatus};
use crate::published_index;
use crate::resync::{resync_site, ResyncStatus};
use crate::summary::{ExitSignal, Report, Summary};

/// Which configured sites a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// The named site, or the default one.
    Site(Option<String>),
    /// Every configured site, in name order.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Publish,
    Delete(Sweep),
    /// Rewrite `nostr_id` relay hints (`update`).
    Resync,
    /// Materialize remote articles locally (`sync`).
    Pull,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::Publish => "publish",
            Operation::Delete(Sweep::Marked) => "delete",
            Operation::Delete(Sweep::All) => "delete-all",
            Operation::Resync => "update",
            Operation::Pull => "sync",
        }
    }

    fn needs_keys(self) -> bool {
        !matches!(self, Operation::Resync)
    }

    fn writes_index(self) -> bool {
        !matches!(self, Operation::Pull)
    }
}

/// One site's report, whatever the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteReport {
    Publish(Report<PublishStatus>),
    Delete(Report<DeleteStatus>),
    Resync(Report<ResyncStatus>),
    Pull(Report<PullStatus>),
}

impl SiteReport {
    pub fn site(&self) -> &str {
        match self {
            SiteReport::Publish(r) => &r.site,
            SiteReport::Delete(r) => &r.site,
            SiteReport::Resync(r) => &r.site,
            SiteReport::Pull(r) => &r.site,
        }
    }

    pub fn summary(&self) -> Summary {
        match self {
            SiteReport::Publish(r) => r.summary(),
            SiteReport::Delete(r) => r.summary(),
            SiteReport::Resync(r) => r.summary(),
            SiteReport::Pull(r) => r.summary(),
        }
    }

    pub fn exit_signal(&self) -> ExitSignal {
        let s = self.summary();
        ExitSignal::from_counts(s.succeeded, s.failed)
    }

    pub fn cancelled(&self) -> bool {
        matches!(self, SiteReport::Delete(r) if r.cancelled)
    }
}

/// Worst exit signal across sites.
pub fn exit_signal(reports: &[SiteReport]) -> ExitSignal {
    reports
        .iter()
        .map(SiteReport::exit_signal)
        .fold(ExitSignal::Success, ExitSignal::worst)
}

// ---------------------------------------------------------------------------
// Preparation
// ---------------------------------------------------------------------------

/// Sites in scope, each checked for a posts directory and relays.
pub fn resolve_sites_at(home: &Path, env: &Env, scope: &Scope) -> Result<Vec<SiteConfig>, ConfigError> {
    let sites = match scope {
        Scope::All => config::resolve_all_sites_at(home, env)?,
        Scope::Site(name) => vec![config::resolve_site_at(home, name.as_deref(), env)?],
    };
    for site in &sites {
        site.require_posts_dir()?;
        site.require_relays()?;
    }
    Ok(sites)
}

/// Load and decode the signing key.
pub fn load_keys_at(home: &Path, env: &Env) -> Result<Keys, ConfigError> {
    let secret = config::load_private_key_at(home, env)?;
    Keys::parse(&secret).map_err(|e| ConfigError::InvalidPrivateKey(e.to_string()))
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Run `operation` over every site in `scope`.
///
/// `DRY_RUN` in `env` turns on dry-run even when `options` did not.
pub async fn run_at<F>(
    home: &Path,
    env: &Env,
    scope: &Scope,
    operation: Operation,
    mut options: RunOptions,
    confirm: &dyn Confirm,
    make_transport: F,
) -> Result<Vec<SiteReport>, SyncError>
where
    F: Fn() -> Arc<dyn RelayTransport>,
{
    options.dry_run |= env.dry_run();
    let sites = resolve_sites_at(home, env, scope)?;
    let keys = if operation.needs_keys() {
        Some(load_keys_at(home, env)?)
    } else {
        None
    };

    let mut reports = Vec::with_capacity(sites.len());
    for site in sites {
        tracing::info!("{} → site '{}'", operation.name(), site.name);
        let ctx = RunContext::new(site, keys.clone(), make_transport(), options);
        let result = run_site(&ctx, operation, confirm).await;
        ctx.transport.close().await;
        let report = result?;

        if operation.writes_index() && !options.dry_run && !report.cancelled() {
            if let Err(e) = published_index::refresh(&ctx.site) {
                tracing::warn!("{}: could not refresh published index: {e}", ctx.site.name);
            }
        }
        reports.push(report);
    }
    Ok(reports)
}

async fn run_site(
    ctx: &RunContext,
    operation: Operation,
    confirm: &dyn Confirm,
) -> Result<SiteReport, SyncError> {
    Ok(match operation {
        Operation::Publish => SiteReport::Publish(publish_site(ctx).await?),
        Operation::Delete(sweep) => SiteReport::Delete(delete_site(ctx, sweep, confirm).await?),
        Operation::Resync => SiteReport::Resync(resync_site(ctx)?),
        Operation::Pull => SiteReport::Pull(pull_site(ctx).await?),
    })
}

/// Own remote articles per site (`list`).
pub async fn list_at<F>(
    home: &Path,
    env: &Env,
    scope: &Scope,
    make_transport: F,
) -> Result<Vec<(String, Vec<RemoteEvent>)>, SyncError>
where
    F: Fn() -> Arc<dyn RelayTransport>,
{
    let sites = match scope {
        Scope::All => config::resolve_all_sites_at(home, env)?,
        Scope::Site(name) => vec![config::resolve_site_at(home, name.as_deref(), env)?],
    };
    for site in &sites {
        site.require_relays()?;
    }
    let keys = load_keys_at(home, env)?;

    let mut listings = Vec::with_capacity(sites.len());
    for site in sites {
        let ctx = RunContext::new(site, Some(keys.clone()), make_transport(), RunOptions::default());
        let result = fetch_own_articles(&ctx).await;
        ctx.transport.close().await;
        let mut articles = result?;
        articles.sort_by(|a, b| b.event.created_at.cmp(&a.event.created_at));
        listings.push((ctx.site.name.clone(), articles));
    }
    Ok(listings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delete::AssumeYes;
    use nostrpress_nostr::testing::ScriptedTransport;
    use tempfile::TempDir;

    fn env(posts: &Path) -> Env {
        Env::from_pairs([
            ("POSTS_DIR", posts.display().to_string()),
            ("RELAY_LIST", "wss://a.example,wss://b.example".to_string()),
        ])
    }

    #[tokio::test]
    async fn missing_key_is_fatal_before_any_network() {
        let home = TempDir::new().unwrap();
        let posts = home.path().join("posts");
        std::fs::create_dir_all(&posts).unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        let t = transport.clone();

        let err = run_at(
            home.path(),
            &env(&posts),
            &Scope::Site(None),
            Operation::Publish,
            RunOptions::default(),
            &AssumeYes,
            move || t.clone() as Arc<dyn RelayTransport>,
        )
        .await
        .unwrap_err();

        assert!(err.is_config());
        assert_eq!(transport.send_count(), 0);
        assert_eq!(transport.close_count(), 0);
    }

    #[tokio::test]
    async fn missing_posts_dir_is_fatal() {
        let home = TempDir::new().unwrap();
        let err = run_at(
            home.path(),
            &env(&home.path().join("nope")),
            &Scope::Site(None),
            Operation::Resync,
            RunOptions::default(),
            &AssumeYes,
            || Arc::new(ScriptedTransport::new()) as Arc<dyn RelayTransport>,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Config(ConfigError::PostsDirNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn transport_is_closed_after_each_site() {
        let home = TempDir::new().unwrap();
        let posts = home.path().join("posts");
        std::fs::create_dir_all(&posts).unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        let t = transport.clone();

        let reports = run_at(
            home.path(),
            &env(&posts),
            &Scope::Site(None),
            Operation::Resync,
            RunOptions::default(),
            &AssumeYes,
            move || t.clone() as Arc<dyn RelayTransport>,
        )
        .await
        .unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].site(), "default");
        assert_eq!(transport.close_count(), 1);
        assert_eq!(exit_signal(&reports), ExitSignal::Success);
    }

    #[test]
    fn operation_names_match_commands() {
        assert_eq!(Operation::Delete(Sweep::All).name(), "delete-all");
        assert_eq!(Operation::Resync.name(), "update");
        assert_eq!(Operation::Pull.name(), "sync");
    }
}
