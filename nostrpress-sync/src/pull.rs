//! Reconciliation engine, pull path: materialize own remote articles that
//! have no local counterpart.
//!
//! Local and remote references are both normalized to the configured relay
//! list before comparing, so a document published under an older relay set
//! still matches its remote record.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{Local, SecondsFormat, TimeZone};
use serde_json::Value;

use nostrpress_core::types::KEY_NOSTR_ID;
use nostrpress_core::{document, Document, Format, Metadata};
use nostrpress_nostr::{nip19, Event, Filter, RemoteEvent, KIND_ARTICLE};

use crate::builder::DEFAULT_TITLE;
use crate::context::RunContext;
use crate::error::SyncError;
use crate::resync::reencode;
use crate::summary::{Report, Tally, Tallied};

/// How far back own articles are queried.
pub const LOOKBACK_SECS: u64 = 5 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullStatus {
    Created,
    WouldCreate,
    AlreadyPresent,
    /// A different file already sits at the target path; nothing written.
    Conflict { path: PathBuf },
    /// An older revision of an article returned in the same query.
    Superseded,
    Failed { reason: String },
}

impl Tallied for PullStatus {
    fn tally(&self) -> Tally {
        match self {
            PullStatus::Created | PullStatus::WouldCreate => Tally::Succeeded,
            PullStatus::AlreadyPresent | PullStatus::Superseded => Tally::Skipped,
            PullStatus::Conflict { .. } | PullStatus::Failed { .. } => Tally::Failed,
        }
    }
}

impl fmt::Display for PullStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PullStatus::Created => f.write_str("created"),
            PullStatus::WouldCreate => f.write_str("would create"),
            PullStatus::AlreadyPresent => f.write_str("already present"),
            PullStatus::Conflict { path } => write!(f, "conflict: {} exists", path.display()),
            PullStatus::Superseded => f.write_str("superseded by a newer revision"),
            PullStatus::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Remote side
// ---------------------------------------------------------------------------

/// Own long-form articles from the configured relays, signature-checked.
///
/// Events failing verification are dropped with a warning.
pub async fn fetch_own_articles(ctx: &RunContext) -> Result<Vec<RemoteEvent>, SyncError> {
    let keys = ctx.keys("pull")?;
    let now = u64::try_from(Local::now().timestamp()).unwrap_or(0);
    let filter = Filter::new()
        .kind(KIND_ARTICLE)
        .author(keys.public_key_hex())
        .since(now.saturating_sub(LOOKBACK_SECS));

    let fetched = ctx.transport.query(ctx.relays(), &filter).await?;
    tracing::info!("fetched {} event(s) from relays", fetched.len());

    Ok(fetched
        .into_iter()
        .filter(|remote| match remote.event.verify() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("dropping event: {e}");
                false
            }
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Pull
// ---------------------------------------------------------------------------

pub async fn pull_site(ctx: &RunContext) -> Result<Report<PullStatus>, SyncError> {
    ctx.keys("pull")?;
    let mut report = Report::new(ctx.site.name.clone(), ctx.dry_run());
    let posts_dir = ctx.site.posts_dir.clone();

    let known = local_references(&posts_dir, ctx.relays())?;
    tracing::info!("{} local nostr_id(s)", known.len());

    let articles = match fetch_own_articles(ctx).await {
        Ok(articles) => articles,
        Err(e) if e.is_config() => return Err(e),
        Err(e) => {
            tracing::error!("{e}");
            report.batch_errors.push(e.to_string());
            return Ok(report);
        }
    };

    let newest = newest_by_identifier(&articles);

    for remote in &articles {
        let event = &remote.event;
        let title = event.tag_value("title").unwrap_or(DEFAULT_TITLE).to_owned();
        let path = posts_dir.join(format!("{}.md", slug_for(event)));

        let status = if newest.get(identifier(event).as_str()) != Some(&event.id.as_str()) {
            PullStatus::Superseded
        } else {
            materialize(remote, &path, &known, ctx)
        };
        match &status {
            PullStatus::Created | PullStatus::WouldCreate => tracing::info!("\"{title}\": {status}"),
            PullStatus::Conflict { .. } | PullStatus::Failed { .. } => {
                tracing::error!("\"{title}\": {status}")
            }
            _ => tracing::debug!("\"{title}\": {status}"),
        }
        report.push(path, title, status);
    }

    Ok(report)
}

fn materialize(
    remote: &RemoteEvent,
    path: &Path,
    known: &HashSet<String>,
    ctx: &RunContext,
) -> PullStatus {
    let event = &remote.event;
    let reference = match nip19::encode_article(&event.id, ctx.relays()) {
        Ok(reference) => reference,
        Err(e) => return PullStatus::Failed { reason: e.to_string() },
    };
    if known.contains(&reference) {
        return PullStatus::AlreadyPresent;
    }
    if path.exists() {
        return PullStatus::Conflict {
            path: path.to_path_buf(),
        };
    }
    if ctx.dry_run() {
        return PullStatus::WouldCreate;
    }

    let doc = Document::new(path, metadata_for(remote, reference), event.content.clone(), Format::Yaml);
    match document::create(&doc) {
        Ok(()) => PullStatus::Created,
        Err(nostrpress_core::CoreError::Io { source, .. })
            if source.kind() == std::io::ErrorKind::AlreadyExists =>
        {
            PullStatus::Conflict {
                path: path.to_path_buf(),
            }
        }
        Err(e) => PullStatus::Failed { reason: e.to_string() },
    }
}

/// Every local `nostr_id`, re-encoded with `relays`.
fn local_references(posts_dir: &Path, relays: &[String]) -> Result<HashSet<String>, SyncError> {
    let mut known = HashSet::new();
    for entry in document::load_all(posts_dir)? {
        let doc = match entry {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!("{e}");
                continue;
            }
        };
        let Some(stored) = doc.nostr_id() else {
            continue;
        };
        match reencode(&stored, relays) {
            Ok(reference) => {
                known.insert(reference);
            }
            Err(e) => tracing::warn!("{}: ignoring nostr_id ({e})", doc.file_name()),
        }
    }
    Ok(known)
}

/// `d` tag, or the event id for articles without one.
fn identifier(event: &Event) -> String {
    event
        .tag_value("d")
        .map(str::to_owned)
        .unwrap_or_else(|| event.id.clone())
}

/// Per identifier, the id of the newest revision (ties go to the first seen).
fn newest_by_identifier(remote: &[RemoteEvent]) -> HashMap<String, &str> {
    let mut newest: HashMap<String, (u64, &str)> = HashMap::new();
    for r in remote {
        let entry = newest
            .entry(identifier(&r.event))
            .or_insert((r.event.created_at, r.event.id.as_str()));
        if r.event.created_at > entry.0 {
            *entry = (r.event.created_at, r.event.id.as_str());
        }
    }
    newest.into_iter().map(|(k, (_, id))| (k, id)).collect()
}

// ---------------------------------------------------------------------------
// Local document shape
// ---------------------------------------------------------------------------

/// Target file stem: the `d` tag when it is a safe file name, else the
/// slugified title, else `nostr-<first 8 of id>`.
pub fn slug_for(event: &Event) -> String {
    if let Some(d) = event.tag_value("d") {
        if is_safe_stem(d) {
            return d.to_owned();
        }
        let slug = slugify(d);
        if !slug.is_empty() {
            return slug;
        }
    }
    if let Some(slug) = event.tag_value("title").map(slugify).filter(|s| !s.is_empty()) {
        return slug;
    }
    format!("nostr-{}", event.id.chars().take(8).collect::<String>())
}

/// Lowercase, whitespace to `-`, drop everything but `[a-z0-9_-]`, collapse `--`.
pub fn slugify(text: &str) -> String {
    let mut out = String::new();
    for c in text.trim().to_lowercase().chars() {
        let c = if c.is_whitespace() { '-' } else { c };
        if !(c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            continue;
        }
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out
}

fn is_safe_stem(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('.')
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn metadata_for(remote: &RemoteEvent, reference: String) -> Metadata {
    let event = &remote.event;
    let mut meta = Metadata::new();
    meta.insert(
        "title".into(),
        Value::String(event.tag_value("title").unwrap_or(DEFAULT_TITLE).to_owned()),
    );
    if let Some(summary) = event.tag_value("summary").filter(|s| !s.trim().is_empty()) {
        meta.insert("description".into(), Value::String(summary.to_owned()));
    }
    let published = event
        .tag_value("published_at")
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or_else(|| i64::try_from(event.created_at).unwrap_or(0));
    if let Some(date) = Local.timestamp_opt(published, 0).single() {
        meta.insert(
            "date".into(),
            Value::String(date.to_rfc3339_opts(SecondsFormat::Secs, false)),
        );
    }
    let topics: Vec<Value> = event
        .tag_values("t")
        .map(|t| Value::String(t.to_owned()))
        .collect();
    meta.insert("tags".into(), Value::Array(topics));
    if let Some(image) = event.tag_value("image").filter(|s| !s.trim().is_empty()) {
        meta.insert("hero_image".into(), Value::String(image.to_owned()));
    }
    meta.insert(KEY_NOSTR_ID.into(), Value::String(reference));
    meta
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostrpress_nostr::{Keys, Tag, UnsignedEvent};
    use rstest::rstest;

    fn article(tags: Vec<Tag>, created_at: u64) -> Event {
        Keys::from_secret_bytes(&[9u8; 32])
            .unwrap()
            .sign(UnsignedEvent {
                kind: KIND_ARTICLE,
                created_at,
                tags,
                content: "body".into(),
            })
            .unwrap()
    }

    #[rstest]
    #[case("Hello World", "hello-world")]
    #[case("  Rust & Nostr!  ", "rust-nostr")]
    #[case("a  --  b", "a-b")]
    #[case("Çé", "")]
    fn slugifies(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(slugify(input), expected);
    }

    #[test]
    fn slug_prefers_d_tag_then_title_then_id() {
        let with_d = article(vec![Tag::new("d", "my-post"), Tag::new("title", "Other")], 1);
        assert_eq!(slug_for(&with_d), "my-post");

        let with_title = article(vec![Tag::new("title", "Big News")], 1);
        assert_eq!(slug_for(&with_title), "big-news");

        let bare = article(vec![], 1);
        assert_eq!(slug_for(&bare), format!("nostr-{}", &bare.id[..8]));
    }

    #[test]
    fn path_like_d_tag_is_slugified() {
        let event = article(vec![Tag::new("d", "../../etc/passwd")], 1);
        assert_eq!(slug_for(&event), "etcpasswd");
    }

    #[test]
    fn newest_revision_wins() {
        let old = article(vec![Tag::new("d", "post")], 100);
        let new = article(vec![Tag::new("d", "post"), Tag::new("title", "v2")], 200);
        let remote = vec![
            RemoteEvent { event: old.clone(), seen_on: vec![] },
            RemoteEvent { event: new.clone(), seen_on: vec![] },
        ];
        let newest = newest_by_identifier(&remote);
        assert_eq!(newest.get("post"), Some(&new.id.as_str()));
    }

    #[test]
    fn metadata_uses_published_at_and_image() {
        let event = article(
            vec![
                Tag::new("d", "post"),
                Tag::new("title", "Post"),
                Tag::new("summary", "About it"),
                Tag::new("image", "https://cdn.example/p.png"),
                Tag::new("published_at", "1700000000"),
                Tag::new("t", "rust"),
                Tag::new("t", "nostr"),
            ],
            1_800_000_000,
        );
        let remote = RemoteEvent { event, seen_on: vec![] };
        let meta = metadata_for(&remote, "nevent1x".into());

        let keys: Vec<_> = meta.keys().cloned().collect();
        assert_eq!(keys, vec!["title", "description", "date", "tags", "hero_image", "nostr_id"]);

        let date = meta["date"].as_str().unwrap();
        let parsed = chrono::DateTime::parse_from_rfc3339(date).unwrap();
        assert_eq!(parsed.timestamp(), 1_700_000_000);
        assert_eq!(meta["tags"], serde_json::json!(["rust", "nostr"]));
        assert_eq!(meta["hero_image"], "https://cdn.example/p.png");
    }
}
