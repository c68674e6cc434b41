//! Relay transport abstraction.
//!
//! The engine only ever talks to relays through [`RelayTransport`]. The
//! WebSocket [`RelayPool`](crate::ws::RelayPool) is the production
//! implementation; tests drive the engine with the scripted in-memory one in
//! [`testing`](crate::testing).

use async_trait::async_trait;

use crate::error::{NostrError, RelayError};
use crate::event::Event;
use crate::filter::Filter;

/// An event returned by a query, with every relay that served it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEvent {
    pub event: Event,
    pub seen_on: Vec<String>,
}

#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Deliver `event` to one relay and wait for its `OK`.
    async fn send(&self, relay: &str, event: &Event) -> Result<(), RelayError>;

    /// Collect stored events matching `filter` from `relays`, merged by id.
    ///
    /// Succeeds when at least one relay answered.
    async fn query(&self, relays: &[String], filter: &Filter)
        -> Result<Vec<RemoteEvent>, NostrError>;

    /// Release every open connection. Safe to call more than once.
    async fn close(&self);
}

/// Merge per-relay results into one list ordered by first sighting,
/// recording every relay an event id was seen on.
pub fn merge_by_id(results: Vec<(String, Vec<Event>)>) -> Vec<RemoteEvent> {
    let mut merged: Vec<RemoteEvent> = Vec::new();
    for (relay, events) in results {
        for event in events {
            match merged.iter_mut().find(|r| r.event.id == event.id) {
                Some(existing) => {
                    if !existing.seen_on.contains(&relay) {
                        existing.seen_on.push(relay.clone());
                    }
                }
                None => merged.push(RemoteEvent {
                    event,
                    seen_on: vec![relay.clone()],
                }),
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(id: &str) -> Event {
        Event {
            id: id.into(),
            pubkey: String::new(),
            kind: 30023,
            created_at: 0,
            tags: vec![],
            content: String::new(),
            sig: String::new(),
        }
    }

    #[test]
    fn merge_records_every_relay() {
        let merged = merge_by_id(vec![
            ("wss://a".into(), vec![ev("1"), ev("2")]),
            ("wss://b".into(), vec![ev("2"), ev("3")]),
        ]);
        let ids: Vec<_> = merged.iter().map(|r| r.event.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(merged[1].seen_on, vec!["wss://a", "wss://b"]);
    }
}
