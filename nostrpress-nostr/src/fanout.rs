//! Multi-relay fan-out with bounded retry.
//!
//! One task per relay, all joined before [`publish`] returns. Each task owns
//! its retry loop: a rejection whose reason mentions "rate" is retried after
//! `attempt × backoff_unit`, up to `max_attempts`; anything else is final for
//! that relay. The only shared result is the per-relay outcome list, filled
//! after the join.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::error::RelayError;
use crate::event::Event;
use crate::transport::RelayTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_unit * attempt
    }
}

/// A relay that did not accept the event, with the last error it gave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayFailure {
    pub relay: String,
    pub error: RelayError,
    pub attempts: u32,
}

/// Per-relay outcome of one fan-out, both lists in configured relay order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub accepted: Vec<String>,
    pub failures: Vec<RelayFailure>,
}

impl FanoutReport {
    /// At least one relay accepted.
    pub fn is_success(&self) -> bool {
        !self.accepted.is_empty()
    }

    /// One-line description of why nothing was accepted.
    pub fn failure_summary(&self) -> String {
        if self.failures.is_empty() {
            return "no relays".to_owned();
        }
        self.failures
            .iter()
            .map(|f| f.error.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Deliver `event` to every relay concurrently and wait for all of them.
pub async fn publish(
    transport: Arc<dyn RelayTransport>,
    event: &Event,
    relays: &[String],
    policy: RetryPolicy,
) -> FanoutReport {
    let event = Arc::new(event.clone());
    let mut tasks = JoinSet::new();

    for (index, relay) in relays.iter().enumerate() {
        let transport = Arc::clone(&transport);
        let event = Arc::clone(&event);
        let relay = relay.clone();
        tasks.spawn(async move {
            let outcome = deliver(transport.as_ref(), &relay, &event, policy).await;
            (index, outcome)
        });
    }

    let mut outcomes: Vec<Option<Result<u32, (RelayError, u32)>>> = vec![None; relays.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => outcomes[index] = Some(outcome),
            Err(e) => tracing::error!("relay task failed: {e}"),
        }
    }

    let mut report = FanoutReport::default();
    for (relay, outcome) in relays.iter().zip(outcomes) {
        match outcome {
            Some(Ok(attempts)) => {
                tracing::debug!("{relay} accepted {} after {attempts} attempt(s)", event.id);
                report.accepted.push(relay.clone());
            }
            Some(Err((error, attempts))) => {
                tracing::warn!("{error}");
                report.failures.push(RelayFailure {
                    relay: relay.clone(),
                    error,
                    attempts,
                });
            }
            None => report.failures.push(RelayFailure {
                relay: relay.clone(),
                error: RelayError::Unreachable {
                    relay: relay.clone(),
                    reason: "delivery task aborted".to_owned(),
                },
                attempts: 0,
            }),
        }
    }
    report
}

async fn deliver(
    transport: &dyn RelayTransport,
    relay: &str,
    event: &Event,
    policy: RetryPolicy,
) -> Result<u32, (RelayError, u32)> {
    let max = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match transport.send(relay, event).await {
            Ok(()) => return Ok(attempt),
            Err(e) if e.is_rate_limited() && attempt < max => {
                let wait = policy.backoff(attempt);
                tracing::info!(
                    "{relay} rate-limited, retrying in {}s (attempt {attempt}/{max})",
                    wait.as_secs()
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(e) => return Err((e, attempt)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Tag, UnsignedEvent, KIND_ARTICLE};
    use crate::keys::Keys;
    use crate::testing::{Reply, ScriptedTransport};
    use tokio::time::Instant;

    fn signed() -> Event {
        Keys::from_secret_bytes(&[7u8; 32])
            .unwrap()
            .sign(UnsignedEvent {
                kind: KIND_ARTICLE,
                created_at: 1_700_000_000,
                tags: vec![Tag::new("d", "hello"), Tag::new("title", "Hello")],
                content: "body".into(),
            })
            .unwrap()
    }

    fn relays(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn partial_acceptance_returns_only_accepting_relays() {
        let transport = Arc::new(ScriptedTransport::new().always("wss://b", Reply::reject("blocked: spam")));
        let report = publish(
            transport.clone(),
            &signed(),
            &relays(&["wss://a", "wss://b"]),
            RetryPolicy::default(),
        )
        .await;

        assert_eq!(report.accepted, vec!["wss://a"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].relay, "wss://b");
        assert_eq!(report.failures[0].attempts, 1);
        assert_eq!(transport.send_count_to("wss://b"), 1);
        assert!(report.is_success());
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn rate_limited_twice_then_accepted() {
        let transport = Arc::new(ScriptedTransport::new().script(
            "wss://slow",
            [Reply::rate_limited(), Reply::rate_limited(), Reply::Accept],
        ));
        let start = Instant::now();
        let report = publish(
            transport.clone(),
            &signed(),
            &relays(&["wss://slow"]),
            RetryPolicy::default(),
        )
        .await;

        assert_eq!(report.accepted, vec!["wss://slow"]);
        assert_eq!(transport.send_count_to("wss://slow"), 3);
        // 1 × 5s + 2 × 5s of backoff.
        assert!(start.elapsed() >= Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn rate_limit_retries_stop_at_max_attempts() {
        let transport =
            Arc::new(ScriptedTransport::new().always("wss://busy", Reply::reject("Rate limit exceeded")));
        let report = publish(
            transport.clone(),
            &signed(),
            &relays(&["wss://busy"]),
            RetryPolicy::default(),
        )
        .await;

        assert!(!report.is_success());
        assert_eq!(transport.send_count_to("wss://busy"), 3);
        assert_eq!(report.failures[0].attempts, 3);
        assert!(report.failures[0].error.is_rate_limited());
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn unreachable_without_rate_shape_is_not_retried() {
        let transport = Arc::new(
            ScriptedTransport::new().always("wss://down", Reply::Unreachable("connection refused".into())),
        );
        let report = publish(
            transport.clone(),
            &signed(),
            &relays(&["wss://down", "wss://up"]),
            RetryPolicy::default(),
        )
        .await;

        assert_eq!(report.accepted, vec!["wss://up"]);
        assert_eq!(transport.send_count_to("wss://down"), 1);
        assert!(matches!(
            report.failures[0].error,
            RelayError::Unreachable { .. }
        ));
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn total_failure_reports_every_relay() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .always("wss://a", Reply::reject("invalid: bad sig"))
                .always("wss://b", Reply::reject("blocked")),
        );
        let report = publish(
            transport,
            &signed(),
            &relays(&["wss://a", "wss://b"]),
            RetryPolicy::default(),
        )
        .await;

        assert!(!report.is_success());
        let failed: Vec<_> = report.failures.iter().map(|f| f.relay.as_str()).collect();
        assert_eq!(failed, vec!["wss://a", "wss://b"]);
        assert!(report.failure_summary().contains("bad sig"));
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn relays_are_attempted_concurrently() {
        // Both relays back off once; run sequentially this would take 10s.
        let transport = Arc::new(
            ScriptedTransport::new()
                .script("wss://a", [Reply::rate_limited(), Reply::Accept])
                .script("wss://b", [Reply::rate_limited(), Reply::Accept]),
        );
        let start = Instant::now();
        let report = publish(
            transport,
            &signed(),
            &relays(&["wss://a", "wss://b"]),
            RetryPolicy::default(),
        )
        .await;

        assert_eq!(report.accepted, vec!["wss://a", "wss://b"]);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn empty_relay_list_is_a_failure() {
        let report = publish(
            Arc::new(ScriptedTransport::new()),
            &signed(),
            &[],
            RetryPolicy::default(),
        )
        .await;
        assert!(!report.is_success());
        assert_eq!(report.failure_summary(), "no relays");
    }
}
