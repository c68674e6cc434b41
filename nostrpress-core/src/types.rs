//! Domain types for nostrpress documents.
//!
//! Document metadata is an open mapping: every key found in the front matter
//! is carried through untouched on write, whether or not this crate knows it.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Open front-matter mapping. Key order is preserved across round-trips.
pub type Metadata = serde_json::Map<String, Value>;

/// Key paths into [`Metadata`] (outermost key first, array positions as their
/// index) whose values were TOML datetimes when read.
pub type DatetimePaths = BTreeSet<Vec<String>>;

// ---------------------------------------------------------------------------
// Format
// ---------------------------------------------------------------------------

/// The front-matter dialect a document was read in, and will be written back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// `---` delimited YAML.
    Yaml,
    /// `+++` delimited TOML.
    Toml,
    /// No front matter at all.
    Plain,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Format::Yaml => "yaml",
            Format::Toml => "toml",
            Format::Plain => "plain",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Well-known metadata keys
// ---------------------------------------------------------------------------

pub const KEY_TITLE: &str = "title";
pub const KEY_DATE: &str = "date";
pub const KEY_SLUG: &str = "slug";
pub const KEY_DRAFT: &str = "draft";
pub const KEY_DELETE: &str = "delete";
pub const KEY_NOSTR_ID: &str = "nostr_id";
pub const KEY_NOSTR_IMAGE: &str = "nostr_image";

/// Image keys consulted in order when no `nostr_image` is cached.
pub const IMAGE_KEYS: [&str; 3] = ["hero_image", "image", "featured_image"];

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A file-backed article: front matter, body and the dialect it came in.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: PathBuf,
    pub metadata: Metadata,
    pub body: String,
    pub format: Format,
    pub datetimes: DatetimePaths,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>, metadata: Metadata, body: String, format: Format) -> Self {
        Self {
            path: path.into(),
            metadata,
            body,
            format,
            datetimes: DatetimePaths::new(),
        }
    }

    /// Non-empty string value for `key`, trimmed. Numbers are rendered as text.
    pub fn str_value(&self, key: &str) -> Option<String> {
        match self.metadata.get(key)? {
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_owned())
            }
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// `true` only when `key` holds the boolean `true`. Strings such as
    /// `"true"` do not count.
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.metadata.get(key), Some(Value::Bool(true)))
    }

    pub fn title(&self) -> Option<String> {
        self.str_value(KEY_TITLE)
    }

    pub fn is_draft(&self) -> bool {
        self.flag(KEY_DRAFT)
    }

    pub fn is_marked_for_delete(&self) -> bool {
        self.flag(KEY_DELETE)
    }

    pub fn nostr_id(&self) -> Option<String> {
        self.str_value(KEY_NOSTR_ID)
    }

    /// `metadata.slug`, else the file stem.
    pub fn slug(&self) -> String {
        self.str_value(KEY_SLUG)
            .unwrap_or_else(|| file_stem(&self.path))
    }

    pub fn set_str(&mut self, key: &str, value: impl Into<String>) {
        self.metadata
            .insert(key.to_owned(), Value::String(value.into()));
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.metadata.remove(key)
    }

    /// The file name for display (`hello.md`).
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
