//! Published index: a JSON listing of every published post, derived from
//! front matter.
//!
//! Front-matter `nostr_id` is the only source of truth. The index is rebuilt
//! from it after each publish, update and delete batch for sites that set
//! `published_index`, and is never read back to make a decision.
//!
//! ```json
//! { "posts": [ { "id": "…", "title": "…", "relays": ["wss://…"] } ] }
//! ```
//!
//! Writes use the same atomic `.tmp` + rename pattern as documents.

use std::path::Path;

use serde::{Deserialize, Serialize};

use nostrpress_core::{document, SiteConfig};
use nostrpress_nostr::nip19;

use crate::builder::DEFAULT_TITLE;
use crate::error::{io_err, SyncError};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishedIndex {
    pub posts: Vec<IndexEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexEntry {
    /// Event id, hex.
    pub id: String,
    pub title: String,
    pub relays: Vec<String>,
}

/// Collect every decodable `nostr_id` under `posts_dir`, in file order.
pub fn rebuild(posts_dir: &Path) -> Result<PublishedIndex, SyncError> {
    let mut index = PublishedIndex::default();
    for entry in document::load_all(posts_dir)? {
        let Ok(doc) = entry else { continue };
        let Some(stored) = doc.nostr_id() else { continue };
        match nip19::decode_article(&stored) {
            Ok(pointer) => index.posts.push(IndexEntry {
                id: pointer.id,
                title: doc.title().unwrap_or_else(|| DEFAULT_TITLE.to_owned()),
                relays: pointer.relays,
            }),
            Err(e) => tracing::debug!("{}: not indexed ({e})", doc.file_name()),
        }
    }
    Ok(index)
}

/// Save atomically: write `<path>.tmp`, then rename over `<path>`.
pub fn save(path: &Path, index: &PublishedIndex) -> Result<(), SyncError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }

    let json = serde_json::to_string_pretty(index)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

/// Rebuild and save the site's index, if it has one configured.
///
/// Returns `true` when an index was written.
pub fn refresh(site: &SiteConfig) -> Result<bool, SyncError> {
    let Some(path) = &site.published_index else {
        return Ok(false);
    };
    let index = rebuild(&site.posts_dir)?;
    save(path, &index)?;
    tracing::debug!("published index: {} post(s) → {}", index.posts.len(), path.display());
    Ok(true)
}
