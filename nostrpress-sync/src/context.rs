//! Per-site run context: resolved configuration, signing keys, the relay
//! transport and the knobs a batch runs with.
//!
//! One [`RunContext`] is built per site and passed by reference to every
//! engine; nothing below reads process-wide state.

use std::sync::Arc;
use std::time::Duration;

use nostrpress_core::SiteConfig;
use nostrpress_nostr::{Keys, RelayTransport, RetryPolicy};

use crate::error::SyncError;

/// Pause between documents that hit the network.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub dry_run: bool,
    pub delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            delay: DEFAULT_DELAY,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct RunContext {
    pub site: SiteConfig,
    pub keys: Option<Keys>,
    pub transport: Arc<dyn RelayTransport>,
    pub options: RunOptions,
}

impl RunContext {
    pub fn new(
        site: SiteConfig,
        keys: Option<Keys>,
        transport: Arc<dyn RelayTransport>,
        options: RunOptions,
    ) -> Self {
        Self {
            site,
            keys,
            transport,
            options,
        }
    }

    pub fn relays(&self) -> &[String] {
        &self.site.relays
    }

    /// Signing keys, or [`SyncError::KeysRequired`] naming `operation`.
    pub fn keys(&self, operation: &'static str) -> Result<&Keys, SyncError> {
        self.keys
            .as_ref()
            .ok_or(SyncError::KeysRequired { operation })
    }

    pub fn dry_run(&self) -> bool {
        self.options.dry_run
    }
}

/// Spaces out network attempts within a batch.
///
/// The first call returns immediately; each later call sleeps for the
/// configured delay first, so nothing waits after the last document.
#[derive(Debug)]
pub(crate) struct Pacer {
    delay: Duration,
    started: bool,
}

impl Pacer {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: false,
        }
    }

    pub(crate) async fn wait(&mut self) {
        if self.started && !self.delay.is_zero() {
            tracing::debug!("waiting {}ms before next relay call", self.delay.as_millis());
            tokio::time::sleep(self.delay).await;
        }
        self.started = true;
    }
}
