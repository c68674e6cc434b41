//! # nostrpress-sync
//!
//! Reconciliation between a posts directory and Nostr relays.
//!
//! Call [`pipeline::run_at`] with an [`Operation`] and a [`Scope`] to
//! publish, delete, resync or pull every document of one or all configured
//! sites. Each engine can also be driven directly with a [`RunContext`].

pub mod builder;
pub mod context;
pub mod delete;
pub mod error;
pub mod pipeline;
pub mod publish;
pub mod published_index;
pub mod pull;
pub mod resync;
pub mod summary;

pub use builder::build_article;
pub use context::{RunContext, RunOptions};
pub use delete::{AssumeYes, Confirm, DeleteStatus, Sweep};
pub use error::SyncError;
pub use pipeline::{Operation, Scope, SiteReport};
pub use publish::PublishStatus;
pub use pull::PullStatus;
pub use resync::ResyncStatus;
pub use summary::{ExitSignal, Outcome, Report, Summary, Tally, Tallied};
