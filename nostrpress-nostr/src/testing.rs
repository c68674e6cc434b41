//! In-memory relay transport for tests.
//!
//! Each relay gets a script of replies consumed one per `send`; once the
//! script runs out the relay's fallback reply (default: accept) is used.
//! Every call is recorded so tests can assert on what was sent where.
//!
//! ```ignore
//! let transport = ScriptedTransport::new()
//!     .script("wss://a", [Reply::rate_limited(), Reply::Accept])
//!     .always("wss://b", Reply::reject("blocked"));
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{NostrError, RelayError};
use crate::event::Event;
use crate::filter::Filter;
use crate::transport::{merge_by_id, RelayTransport, RemoteEvent};

/// What a scripted relay answers to one `send`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Accept,
    Reject(String),
    Unreachable(String),
}

impl Reply {
    pub fn reject(reason: &str) -> Self {
        Reply::Reject(reason.to_owned())
    }

    pub fn rate_limited() -> Self {
        Reply::Reject("rate-limited: slow down".to_owned())
    }
}

#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    fallback: Mutex<HashMap<String, Reply>>,
    stored: Mutex<Vec<(String, Vec<Event>)>>,
    sent: Mutex<Vec<(String, Event)>>,
    query_calls: AtomicU32,
    close_calls: AtomicU32,
    fail_queries: bool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replies `relay` gives to its next sends, in order.
    pub fn script(self, relay: &str, replies: impl IntoIterator<Item = Reply>) -> Self {
        lock(&self.scripts)
            .entry(relay.to_owned())
            .or_default()
            .extend(replies);
        self
    }

    /// Reply `relay` gives once its script is exhausted.
    pub fn always(self, relay: &str, reply: Reply) -> Self {
        lock(&self.fallback).insert(relay.to_owned(), reply);
        self
    }

    /// Events `relay` returns to queries.
    pub fn stored(self, relay: &str, events: Vec<Event>) -> Self {
        lock(&self.stored).push((relay.to_owned(), events));
        self
    }

    /// Every query fails as if no relay answered.
    pub fn failing_queries(mut self) -> Self {
        self.fail_queries = true;
        self
    }

    pub fn sent(&self) -> Vec<(String, Event)> {
        lock(&self.sent).clone()
    }

    pub fn send_count(&self) -> usize {
        lock(&self.sent).len()
    }

    pub fn send_count_to(&self, relay: &str) -> usize {
        lock(&self.sent).iter().filter(|(r, _)| r == relay).count()
    }

    pub fn query_count(&self) -> u32 {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> u32 {
        self.close_calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self, relay: &str) -> Reply {
        if let Some(reply) = lock(&self.scripts)
            .get_mut(relay)
            .and_then(VecDeque::pop_front)
        {
            return reply;
        }
        lock(&self.fallback)
            .get(relay)
            .cloned()
            .unwrap_or(Reply::Accept)
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl RelayTransport for ScriptedTransport {
    async fn send(&self, relay: &str, event: &Event) -> Result<(), RelayError> {
        lock(&self.sent).push((relay.to_owned(), event.clone()));
        match self.next_reply(relay) {
            Reply::Accept => Ok(()),
            Reply::Reject(reason) => Err(RelayError::Rejected {
                relay: relay.to_owned(),
                reason,
            }),
            Reply::Unreachable(reason) => Err(RelayError::Unreachable {
                relay: relay.to_owned(),
                reason,
            }),
        }
    }

    async fn query(
        &self,
        relays: &[String],
        filter: &Filter,
    ) -> Result<Vec<RemoteEvent>, NostrError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries {
            return Err(NostrError::QueryFailed("scripted failure".to_owned()));
        }
        let matching = lock(&self.stored)
            .iter()
            .filter(|(relay, _)| relays.contains(relay))
            .map(|(relay, events)| {
                let events = events
                    .iter()
                    .filter(|e| filter.kinds.is_empty() || filter.kinds.contains(&e.kind))
                    .filter(|e| filter.authors.is_empty() || filter.authors.contains(&e.pubkey))
                    .cloned()
                    .collect();
                (relay.clone(), events)
            })
            .collect();
        Ok(merge_by_id(matching))
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}
