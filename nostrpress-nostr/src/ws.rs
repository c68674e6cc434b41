//! WebSocket relay pool.
//!
//! Connections are opened lazily, one per relay URL, and reused for every
//! send and query of a batch. A connection that fails is dropped from the
//! pool so the next attempt (e.g. a retry) reconnects. [`RelayPool::close`]
//! sends close frames and empties the pool.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::{NostrError, RelayError};
use crate::event::Event;
use crate::filter::Filter;
use crate::transport::{merge_by_id, RelayTransport, RemoteEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Connection = Arc<Mutex<WsStream>>;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RelayPool {
    connections: Mutex<HashMap<String, Connection>>,
    timeout: Duration,
    next_sub: AtomicU64,
}

impl Default for RelayPool {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl RelayPool {
    /// `timeout` bounds connecting, waiting for `OK`, and waiting for `EOSE`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            timeout,
            next_sub: AtomicU64::new(0),
        }
    }

    async fn connection(&self, relay: &str) -> Result<Connection, String> {
        if let Some(conn) = self.connections.lock().await.get(relay) {
            return Ok(conn.clone());
        }

        tracing::debug!("connecting to {relay}");
        let (ws, _) = timeout(self.timeout, connect_async(relay))
            .await
            .map_err(|_| "connect timed out".to_owned())?
            .map_err(|e| e.to_string())?;

        let conn = Arc::new(Mutex::new(ws));
        // Another task may have connected meanwhile; keep whichever landed first.
        let mut pool = self.connections.lock().await;
        Ok(pool.entry(relay.to_owned()).or_insert(conn).clone())
    }

    async fn forget(&self, relay: &str) {
        self.connections.lock().await.remove(relay);
    }

    async fn send_inner(&self, relay: &str, event: &Event) -> Result<(), RelayError> {
        let unreachable = |reason: String| RelayError::Unreachable {
            relay: relay.to_owned(),
            reason,
        };

        let conn = self.connection(relay).await.map_err(unreachable)?;
        let mut ws = conn.lock().await;

        let frame = serde_json::json!(["EVENT", event]).to_string();
        ws.send(Message::Text(frame))
            .await
            .map_err(|e| unreachable(e.to_string()))?;

        let deadline = Instant::now() + self.timeout;
        loop {
            let msg = next_json(&mut ws, deadline).await.map_err(unreachable)?;
            let Some(arr) = msg.as_array() else { continue };
            match arr.first().and_then(Value::as_str) {
                Some("OK") if arr.get(1).and_then(Value::as_str) == Some(event.id.as_str()) => {
                    let accepted = arr.get(2).and_then(Value::as_bool).unwrap_or(false);
                    let message = arr
                        .get(3)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_owned();
                    return if accepted {
                        Ok(())
                    } else {
                        Err(RelayError::Rejected {
                            relay: relay.to_owned(),
                            reason: message,
                        })
                    };
                }
                Some("NOTICE") => {
                    let notice = arr.get(1).map(Value::to_string).unwrap_or_default();
                    tracing::debug!("{relay} notice: {notice}");
                }
                _ => {}
            }
        }
    }

    async fn query_one(&self, relay: &str, filter: &Filter) -> Result<Vec<Event>, String> {
        let conn = self.connection(relay).await?;
        let mut ws = conn.lock().await;

        let sub = format!("nostrpress-{}", self.next_sub.fetch_add(1, Ordering::Relaxed));
        let req = serde_json::json!(["REQ", sub, filter.to_json()]).to_string();
        ws.send(Message::Text(req)).await.map_err(|e| e.to_string())?;

        let deadline = Instant::now() + self.timeout;
        let mut events = Vec::new();
        loop {
            let msg = match next_json(&mut ws, deadline).await {
                Ok(msg) => msg,
                // Relays that never send EOSE still count with what they sent.
                Err(reason) if !events.is_empty() => {
                    tracing::debug!("{relay}: {reason}, keeping {} events", events.len());
                    break;
                }
                Err(reason) => return Err(reason),
            };
            let Some(arr) = msg.as_array() else { continue };
            let for_us = arr.get(1).and_then(Value::as_str) == Some(sub.as_str());
            match arr.first().and_then(Value::as_str) {
                Some("EVENT") if for_us => {
                    if let Some(ev) = arr
                        .get(2)
                        .and_then(|v| serde_json::from_value::<Event>(v.clone()).ok())
                    {
                        events.push(ev);
                    }
                }
                Some("EOSE") if for_us => break,
                Some("CLOSED") if for_us => {
                    return Err(format!(
                        "subscription closed: {}",
                        arr.get(2).and_then(Value::as_str).unwrap_or_default()
                    ))
                }
                _ => {}
            }
        }

        let close = serde_json::json!(["CLOSE", sub]).to_string();
        if let Err(e) = ws.send(Message::Text(close)).await {
            tracing::debug!("{relay}: failed to close subscription: {e}");
        }
        Ok(events)
    }
}

/// Next JSON text frame before `deadline`. Non-JSON frames are skipped.
async fn next_json(ws: &mut WsStream, deadline: Instant) -> Result<Value, String> {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let frame = timeout(remaining, ws.next())
            .await
            .map_err(|_| "timed out waiting for relay".to_owned())?;
        match frame {
            Some(Ok(Message::Text(txt))) => {
                if let Ok(val) = serde_json::from_str::<Value>(&txt) {
                    return Ok(val);
                }
            }
            Some(Ok(Message::Close(_))) | None => return Err("connection closed".to_owned()),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.to_string()),
        }
    }
}

#[async_trait]
impl RelayTransport for RelayPool {
    async fn send(&self, relay: &str, event: &Event) -> Result<(), RelayError> {
        let result = self.send_inner(relay, event).await;
        if let Err(RelayError::Unreachable { .. }) = &result {
            self.forget(relay).await;
        }
        result
    }

    async fn query(
        &self,
        relays: &[String],
        filter: &Filter,
    ) -> Result<Vec<RemoteEvent>, NostrError> {
        let attempts = join_all(relays.iter().map(|relay| async move {
            let result = self.query_one(relay, filter).await;
            (relay.clone(), result)
        }))
        .await;

        let mut answered = Vec::new();
        let mut errors = Vec::new();
        for (relay, result) in attempts {
            match result {
                Ok(events) => {
                    tracing::debug!("{relay}: {} events", events.len());
                    answered.push((relay, events));
                }
                Err(reason) => {
                    tracing::warn!("query failed on {relay}: {reason}");
                    self.forget(&relay).await;
                    errors.push(format!("{relay}: {reason}"));
                }
            }
        }

        if answered.is_empty() {
            return Err(NostrError::QueryFailed(errors.join("; ")));
        }
        Ok(merge_by_id(answered))
    }

    async fn close(&self) {
        let drained: Vec<(String, Connection)> = self.connections.lock().await.drain().collect();
        for (relay, conn) in drained {
            let mut ws = conn.lock().await;
            if let Err(e) = ws.close(None).await {
                tracing::debug!("closing {relay}: {e}");
            }
        }
    }
}
