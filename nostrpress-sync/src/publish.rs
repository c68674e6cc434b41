//! Reconciliation engine, publish path.
//!
//! Per document: draft → skip; valid `nostr_id` → skip (unless dry-run);
//! otherwise build, sign, fan out, and on at least one acceptance record the
//! reference (with only the accepting relays) and write the file back before
//! moving on.

use std::fmt;

use chrono::Local;

use nostrpress_core::types::KEY_NOSTR_ID;
use nostrpress_core::{document, Document};
use nostrpress_nostr::{fanout, nip19, Event, Keys};

use crate::builder::build_article;
use crate::context::{Pacer, RunContext};
use crate::error::SyncError;
use crate::summary::{Report, Tally, Tallied};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishStatus {
    /// Accepted by `relays`; `nostr_id` now written to the document.
    Published { nostr_id: String, relays: Vec<String> },
    /// Dry run: built and signed, nothing sent or written.
    WouldPublish { event_id: String },
    SkippedDraft,
    SkippedPublished,
    Failed { reason: String },
}

impl Tallied for PublishStatus {
    fn tally(&self) -> Tally {
        match self {
            PublishStatus::Published { .. } | PublishStatus::WouldPublish { .. } => Tally::Succeeded,
            PublishStatus::SkippedDraft => Tally::Draft,
            PublishStatus::SkippedPublished => Tally::Skipped,
            PublishStatus::Failed { .. } => Tally::Failed,
        }
    }
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishStatus::Published { relays, .. } => {
                write!(f, "published to {} relay(s)", relays.len())
            }
            PublishStatus::WouldPublish { event_id } => write!(f, "would publish {event_id}"),
            PublishStatus::SkippedDraft => f.write_str("draft"),
            PublishStatus::SkippedPublished => f.write_str("already published"),
            PublishStatus::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Publish every eligible document of the site, one at a time.
pub async fn publish_site(ctx: &RunContext) -> Result<Report<PublishStatus>, SyncError> {
    let keys = ctx.keys("publish")?;
    let mut report = Report::new(ctx.site.name.clone(), ctx.dry_run());
    let mut pacer = Pacer::new(ctx.options.delay);

    let loaded = document::load_all(&ctx.site.posts_dir)?;
    tracing::info!("{}: {} document(s)", ctx.site.name, loaded.len());

    for entry in loaded {
        let mut doc = match entry {
            Ok(doc) => doc,
            Err(e) => {
                tracing::error!("{e}");
                let path = e.path().to_path_buf();
                let name = display_name(&path);
                report.push(path, name, PublishStatus::Failed { reason: e.to_string() });
                continue;
            }
        };
        let title = doc.title().unwrap_or_else(|| doc.file_name());
        let status = publish_document(ctx, keys, &mut doc, &mut pacer).await;
        match &status {
            PublishStatus::Failed { reason } => tracing::error!("\"{title}\": {reason}"),
            other => tracing::info!("\"{title}\": {other}"),
        }
        report.push(doc.path.clone(), title, status);
    }

    Ok(report)
}

async fn publish_document(
    ctx: &RunContext,
    keys: &Keys,
    doc: &mut Document,
    pacer: &mut Pacer,
) -> PublishStatus {
    if doc.is_draft() {
        return PublishStatus::SkippedDraft;
    }

    if let Some(existing) = doc.nostr_id() {
        match nip19::decode_article(&existing) {
            Ok(_) if !ctx.dry_run() => return PublishStatus::SkippedPublished,
            Ok(_) => {}
            Err(e) => tracing::warn!(
                "{}: ignoring malformed nostr_id ({e}), treating as unpublished",
                doc.file_name()
            ),
        }
    }

    let unsigned = build_article(doc, &ctx.site, Local::now());
    let event = match keys.sign(unsigned) {
        Ok(event) => event,
        Err(e) => return PublishStatus::Failed { reason: e.to_string() },
    };

    if ctx.dry_run() {
        log_dry_run(&event);
        return PublishStatus::WouldPublish { event_id: event.id };
    }

    pacer.wait().await;
    let fanout = fanout::publish(
        ctx.transport.clone(),
        &event,
        ctx.relays(),
        ctx.options.retry,
    )
    .await;

    if !fanout.is_success() {
        return PublishStatus::Failed {
            reason: format!("no relay accepted: {}", fanout.failure_summary()),
        };
    }

    let nostr_id = match nip19::encode_article(&event.id, &fanout.accepted) {
        Ok(id) => id,
        Err(e) => return PublishStatus::Failed { reason: e.to_string() },
    };
    doc.set_str(KEY_NOSTR_ID, nostr_id.clone());
    if let Err(e) = document::save(doc) {
        // The event is out; only the local record is missing.
        return PublishStatus::Failed {
            reason: format!("published as {} but could not record it: {e}", event.id),
        };
    }

    PublishStatus::Published {
        nostr_id,
        relays: fanout.accepted,
    }
}

fn log_dry_run(event: &Event) {
    match serde_json::to_string_pretty(event) {
        Ok(json) => tracing::debug!("dry-run event:\n{json}"),
        Err(e) => tracing::debug!("dry-run event {} (unprintable: {e})", event.id),
    }
}

pub(crate) fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
