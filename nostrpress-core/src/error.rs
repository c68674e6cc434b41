//! Error types for nostrpress-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading or writing content documents.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The front matter of a document could not be parsed.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: FrontMatterError,
    },

    /// Metadata could not be serialized back into its front-matter dialect.
    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: FrontMatterError,
    },
}

impl CoreError {
    /// The file the error is about.
    pub fn path(&self) -> &std::path::Path {
        match self {
            CoreError::Io { path, .. }
            | CoreError::Parse { path, .. }
            | CoreError::Serialize { path, .. } => path,
        }
    }
}

/// Front-matter level failures, independent of any file.
#[derive(Debug, Error)]
pub enum FrontMatterError {
    #[error("front matter opened with `{delimiter}` is never closed")]
    Unterminated { delimiter: &'static str },

    #[error("invalid YAML front matter: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid TOML front matter: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Front matter parsed, but to something other than a key/value mapping.
    #[error("front matter is not a mapping")]
    NotAMapping,
}

/// Errors raised while resolving site configuration and credentials.
///
/// Every variant is fatal: it aborts a run before any document is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (config directory, secrets file, …).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, with the file path.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The requested site is not present in the config file.
    #[error("site \"{name}\" not found; available sites: {available}")]
    UnknownSite { name: String, available: String },

    /// `--all` was requested but the config file lists no sites.
    #[error("no sites configured; add one with `nostrpress add-site`")]
    NoSites,

    /// No private key in the environment or the secrets file.
    #[error("no private key found; set NOSTR_PRIVATE_KEY or write it to {secrets}")]
    MissingPrivateKey { secrets: PathBuf },

    /// The private key is present but cannot be decoded.
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// A network operation was requested with no relays configured.
    #[error("no relays configured for site \"{site}\"")]
    NoRelays { site: String },

    /// The posts directory does not exist.
    #[error("posts directory not found: {path}")]
    PostsDirNotFound { path: PathBuf },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn config_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
