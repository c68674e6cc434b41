//! nostrpress core library — document model, front matter, configuration, errors.
//!
//! - [`types`] — [`Document`], [`Format`], the open [`Metadata`] mapping
//! - [`frontmatter`] — YAML / TOML / plain parse and serialize
//! - [`document`] — discovery, load, atomic save of article files
//! - [`config`] — multi-site configuration, environment fallback, secrets
//! - [`error`] — [`CoreError`], [`ConfigError`], [`FrontMatterError`]

pub mod config;
pub mod document;
pub mod error;
pub mod frontmatter;
pub mod types;

pub use config::{Env, SiteConfig, SiteEntry};
pub use error::{ConfigError, CoreError, FrontMatterError};
pub use types::{DatetimePaths, Document, Format, Metadata};
