//! Resync-identifier path: rewrite each `nostr_id` so its relay hints match
//! the configured relay list.
//!
//! Offline. A document is only written when the re-encoded string differs,
//! so a second run with the same relays touches nothing.

use std::fmt;

use nostrpress_core::types::KEY_NOSTR_ID;
use nostrpress_core::{document, Document};
use nostrpress_nostr::nip19::{self, EventPointer};
use nostrpress_nostr::DecodeError;

use crate::context::RunContext;
use crate::error::SyncError;
use crate::publish::display_name;
use crate::summary::{Report, Tally, Tallied};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResyncStatus {
    Updated { nostr_id: String },
    WouldUpdate { nostr_id: String },
    Unchanged,
    NoReference,
    /// `nostr_id` is not an article reference; left alone.
    InvalidReference { reason: String },
    Failed { reason: String },
}

impl Tallied for ResyncStatus {
    fn tally(&self) -> Tally {
        match self {
            ResyncStatus::Updated { .. } | ResyncStatus::WouldUpdate { .. } => Tally::Succeeded,
            ResyncStatus::Unchanged
            | ResyncStatus::NoReference
            | ResyncStatus::InvalidReference { .. } => Tally::Skipped,
            ResyncStatus::Failed { .. } => Tally::Failed,
        }
    }
}

impl fmt::Display for ResyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResyncStatus::Updated { .. } => f.write_str("updated"),
            ResyncStatus::WouldUpdate { .. } => f.write_str("would update"),
            ResyncStatus::Unchanged => f.write_str("up to date"),
            ResyncStatus::NoReference => f.write_str("no nostr_id"),
            ResyncStatus::InvalidReference { reason } => write!(f, "not an article reference: {reason}"),
            ResyncStatus::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// The reference `stored` would have under `relays`.
///
/// Only id and kind survive; relay hints and author are replaced.
pub fn reencode(stored: &str, relays: &[String]) -> Result<String, DecodeError> {
    let pointer = nip19::decode_article(stored)?;
    nip19::encode_event(&EventPointer::article(pointer.id, relays))
}

pub fn resync_site(ctx: &RunContext) -> Result<Report<ResyncStatus>, SyncError> {
    let relays = ctx.relays();
    let mut report = Report::new(ctx.site.name.clone(), ctx.dry_run());

    for entry in document::load_all(&ctx.site.posts_dir)? {
        let mut doc = match entry {
            Ok(doc) => doc,
            Err(e) => {
                tracing::error!("{e}");
                let path = e.path().to_path_buf();
                let name = display_name(&path);
                report.push(path, name, ResyncStatus::Failed { reason: e.to_string() });
                continue;
            }
        };
        let title = doc.title().unwrap_or_else(|| doc.file_name());
        let status = resync_document(&mut doc, relays, ctx.dry_run());
        match &status {
            ResyncStatus::Updated { .. } | ResyncStatus::WouldUpdate { .. } => {
                tracing::info!("\"{title}\": {status}")
            }
            ResyncStatus::Failed { .. } => tracing::error!("\"{title}\": {status}"),
            _ => tracing::debug!("\"{title}\": {status}"),
        }
        report.push(doc.path.clone(), title, status);
    }

    Ok(report)
}

fn resync_document(doc: &mut Document, relays: &[String], dry_run: bool) -> ResyncStatus {
    let Some(stored) = doc.nostr_id() else {
        return ResyncStatus::NoReference;
    };
    let fresh = match reencode(&stored, relays) {
        Ok(fresh) => fresh,
        Err(e) => return ResyncStatus::InvalidReference { reason: e.to_string() },
    };
    if fresh == stored {
        return ResyncStatus::Unchanged;
    }
    if dry_run {
        return ResyncStatus::WouldUpdate { nostr_id: fresh };
    }
    doc.set_str(KEY_NOSTR_ID, fresh.clone());
    match document::save(doc) {
        Ok(()) => ResyncStatus::Updated { nostr_id: fresh },
        Err(e) => ResyncStatus::Failed { reason: e.to_string() },
    }
}
