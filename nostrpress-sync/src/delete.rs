//! Deletion engine: turn local intent to delete into kind-5 tombstones.
//!
//! Two sweeps share the same mechanics and differ only in selection and in
//! what happens locally after a relay accepts:
//!
//! | Sweep    | Selects                                  | After acceptance      |
//! |----------|------------------------------------------|-----------------------|
//! | `Marked` | `delete: true` with a `nostr_id`         | file removed          |
//! | `All`    | every decodable `nostr_id`               | `nostr_id` key removed |
//!
//! Zero acceptances leave the document exactly as it was.

use std::fmt;

use chrono::Local;

use nostrpress_core::types::KEY_NOSTR_ID;
use nostrpress_core::{document, Document};
use nostrpress_nostr::{fanout, nip19, Keys, Tag, UnsignedEvent, KIND_DELETION};

use crate::context::{Pacer, RunContext};
use crate::error::SyncError;
use crate::summary::{Report, Tally, Tallied};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    /// Documents with `delete: true`.
    Marked,
    /// Every published document.
    All,
}

/// Asks the user before a destructive sweep.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Answers yes without asking (`--yes`, tests).
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteStatus {
    /// Tombstone accepted; file removed.
    Deleted { relays: Vec<String> },
    /// Tombstone accepted; `nostr_id` cleared.
    Cleared { relays: Vec<String> },
    WouldDelete { event_id: String },
    Failed { reason: String },
}

impl Tallied for DeleteStatus {
    fn tally(&self) -> Tally {
        match self {
            DeleteStatus::Deleted { .. }
            | DeleteStatus::Cleared { .. }
            | DeleteStatus::WouldDelete { .. } => Tally::Succeeded,
            DeleteStatus::Failed { .. } => Tally::Failed,
        }
    }
}

impl fmt::Display for DeleteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteStatus::Deleted { relays } => write!(f, "deleted ({} relay(s))", relays.len()),
            DeleteStatus::Cleared { relays } => {
                write!(f, "deleted, nostr_id cleared ({} relay(s))", relays.len())
            }
            DeleteStatus::WouldDelete { event_id } => write!(f, "would delete {event_id}"),
            DeleteStatus::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Kind-5 deletion addressing the single event `target_id`. Carries no `a`
/// coordinate, which would also cover a re-publish of the same slug.
pub fn build_tombstone(target_id: &str, created_at: u64) -> UnsignedEvent {
    UnsignedEvent {
        kind: KIND_DELETION,
        created_at,
        tags: vec![Tag::new("e", target_id)],
        content: String::new(),
    }
}

fn selected(doc: &Document, sweep: Sweep) -> bool {
    let Some(id) = doc.nostr_id() else {
        return false;
    };
    match sweep {
        Sweep::Marked => doc.is_marked_for_delete(),
        Sweep::All => nip19::decode_article(&id).is_ok(),
    }
}

/// Run `sweep` over the site. Nothing is sent unless `confirm` agrees
/// (dry runs never ask).
pub async fn delete_site(
    ctx: &RunContext,
    sweep: Sweep,
    confirm: &dyn Confirm,
) -> Result<Report<DeleteStatus>, SyncError> {
    let keys = ctx.keys("delete")?;
    let mut report = Report::new(ctx.site.name.clone(), ctx.dry_run());

    let mut targets = Vec::new();
    for entry in document::load_all(&ctx.site.posts_dir)? {
        match entry {
            Ok(doc) if selected(&doc, sweep) => targets.push(doc),
            Ok(_) => {}
            Err(e) => tracing::warn!("{e}"),
        }
    }

    if targets.is_empty() {
        tracing::info!("{}: nothing to delete", ctx.site.name);
        return Ok(report);
    }
    tracing::info!("{}: {} document(s) selected for deletion", ctx.site.name, targets.len());

    if !ctx.dry_run() {
        let prompt = format!(
            "Delete {} post(s) of site '{}' from Nostr?",
            targets.len(),
            ctx.site.name
        );
        if !confirm.confirm(&prompt) {
            tracing::info!("cancelled");
            report.cancelled = true;
            return Ok(report);
        }
    }

    let mut pacer = Pacer::new(ctx.options.delay);
    let total = targets.len();
    for (i, mut doc) in targets.into_iter().enumerate() {
        let title = doc.title().unwrap_or_else(|| doc.file_name());
        let status = delete_document(ctx, keys, &mut doc, sweep, &mut pacer).await;
        match &status {
            DeleteStatus::Failed { .. } => tracing::error!("[{}/{total}] \"{title}\": {status}", i + 1),
            _ => tracing::info!("[{}/{total}] \"{title}\": {status}", i + 1),
        }
        report.push(doc.path.clone(), title, status);
    }

    Ok(report)
}

async fn delete_document(
    ctx: &RunContext,
    keys: &Keys,
    doc: &mut Document,
    sweep: Sweep,
    pacer: &mut Pacer,
) -> DeleteStatus {
    let Some(stored) = doc.nostr_id() else {
        return DeleteStatus::Failed {
            reason: "no nostr_id".to_owned(),
        };
    };
    let pointer = match nip19::decode_article(&stored) {
        Ok(pointer) => pointer,
        Err(e) => return DeleteStatus::Failed {
            reason: format!("invalid nostr_id: {e}"),
        },
    };

    let now = u64::try_from(Local::now().timestamp()).unwrap_or(0);
    let unsigned = build_tombstone(&pointer.id, now);
    let tombstone = match keys.sign(unsigned) {
        Ok(event) => event,
        Err(e) => return DeleteStatus::Failed { reason: e.to_string() },
    };

    if ctx.dry_run() {
        return DeleteStatus::WouldDelete { event_id: pointer.id };
    }

    pacer.wait().await;
    let fanout = fanout::publish(
        ctx.transport.clone(),
        &tombstone,
        ctx.relays(),
        ctx.options.retry,
    )
    .await;
    if !fanout.is_success() {
        return DeleteStatus::Failed {
            reason: format!("no relay accepted the deletion: {}", fanout.failure_summary()),
        };
    }

    let local = match sweep {
        Sweep::Marked => document::remove(&doc.path),
        Sweep::All => {
            doc.remove(KEY_NOSTR_ID);
            document::save(doc)
        }
    };
    match (local, sweep) {
        (Ok(()), Sweep::Marked) => DeleteStatus::Deleted { relays: fanout.accepted },
        (Ok(()), Sweep::All) => DeleteStatus::Cleared { relays: fanout.accepted },
        (Err(e), _) => DeleteStatus::Failed {
            reason: format!("deletion accepted but local update failed: {e}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tombstone_shape() {
        let event = build_tombstone("abc", 42);
        assert_eq!(event.kind, 5);
        assert_eq!(event.created_at, 42);
        assert_eq!(event.tags, vec![Tag::new("e", "abc")]);
        assert!(event.content.is_empty());
    }
}
