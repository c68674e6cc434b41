//! Error types for nostrpress-sync.
//!
//! Only batch-level problems surface as [`SyncError`]. Per-document failures
//! (parse errors, relay rejections, bad references) become statuses inside
//! a [`Report`](crate::summary::Report) and never abort a batch.

use std::path::PathBuf;

use thiserror::Error;

use nostrpress_core::{ConfigError, CoreError};
use nostrpress_nostr::{DecodeError, NostrError};

#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or invalid configuration. Raised before any document is touched.
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Nostr(#[from] NostrError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The operation signs or queries by author but no key was loaded.
    #[error("{operation} needs a private key")]
    KeysRequired { operation: &'static str },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (published index).
    #[error("published index JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Configuration problems abort the run before any batch work.
    pub fn is_config(&self) -> bool {
        matches!(self, SyncError::Config(_) | SyncError::KeysRequired { .. })
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
