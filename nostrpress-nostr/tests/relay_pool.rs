//! RelayPool against a local WebSocket relay.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use nostrpress_nostr::{
    Filter, Keys, RelayError, RelayPool, RelayTransport, Tag, UnsignedEvent, KIND_ARTICLE,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_tungstenite::{accept_async, tungstenite::Message as TMsg};

fn signed(slug: &str) -> nostrpress_nostr::Event {
    Keys::from_secret_bytes(&[3u8; 32])
        .unwrap()
        .sign(UnsignedEvent {
            kind: KIND_ARTICLE,
            created_at: 1_700_000_000,
            tags: vec![Tag::new("d", slug)],
            content: "body".into(),
        })
        .unwrap()
}

/// Relay that answers every EVENT with `["OK", id, accepted, reason]`.
async fn ok_relay(accepted: bool, reason: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(Ok(TMsg::Text(txt))) = ws.next().await {
            let val: Value = serde_json::from_str(&txt).unwrap();
            if val[0] == "EVENT" {
                let id = val[1]["id"].as_str().unwrap().to_owned();
                ws.send(TMsg::Text(
                    serde_json::json!(["NOTICE", "hello"]).to_string(),
                ))
                .await
                .unwrap();
                ws.send(TMsg::Text(
                    serde_json::json!(["OK", id, accepted, reason]).to_string(),
                ))
                .await
                .unwrap();
            }
        }
    });
    url
}

#[tokio::test]
async fn send_waits_for_ok() {
    let url = ok_relay(true, "").await;
    let pool = RelayPool::default();
    pool.send(&url, &signed("a")).await.unwrap();
    // Second send reuses the same connection (the server accepts only one).
    pool.send(&url, &signed("b")).await.unwrap();
    pool.close().await;
}

#[tokio::test]
async fn send_surfaces_rejection_reason() {
    let url = ok_relay(false, "rate-limited: slow down").await;
    let pool = RelayPool::default();
    let err = pool.send(&url, &signed("a")).await.unwrap_err();
    match &err {
        RelayError::Rejected { reason, .. } => assert_eq!(reason, "rate-limited: slow down"),
        other => panic!("unexpected: {other:?}"),
    }
    assert!(err.is_rate_limited());
}

#[tokio::test]
async fn unreachable_relay_is_reported() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let pool = RelayPool::new(Duration::from_secs(2));
    let err = pool.send(&url, &signed("a")).await.unwrap_err();
    assert!(matches!(err, RelayError::Unreachable { .. }));
}

#[tokio::test]
async fn silent_relay_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while ws.next().await.is_some() {}
    });

    let pool = RelayPool::new(Duration::from_millis(200));
    let err = pool.send(&url, &signed("a")).await.unwrap_err();
    assert!(matches!(err, RelayError::Unreachable { .. }));
}

#[tokio::test]
async fn query_collects_until_eose_and_closes_subscription() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let stored = vec![signed("one"), signed("two")];
    let served = stored.clone();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let Some(Ok(TMsg::Text(txt))) = ws.next().await else {
            panic!("expected REQ");
        };
        let req: Value = serde_json::from_str(&txt).unwrap();
        assert_eq!(req[0], "REQ");
        assert_eq!(req[2]["kinds"], serde_json::json!([30023]));
        let sub = req[1].as_str().unwrap().to_owned();
        for ev in &served {
            ws.send(TMsg::Text(serde_json::json!(["EVENT", sub, ev]).to_string()))
                .await
                .unwrap();
        }
        ws.send(TMsg::Text(serde_json::json!(["EOSE", sub]).to_string()))
            .await
            .unwrap();
        let Some(Ok(TMsg::Text(txt))) = ws.next().await else {
            panic!("expected CLOSE");
        };
        let close: Value = serde_json::from_str(&txt).unwrap();
        assert_eq!(close, serde_json::json!(["CLOSE", sub]));
    });

    let pool = RelayPool::default();
    let events = pool
        .query(&[url.clone()], &Filter::new().kind(KIND_ARTICLE))
        .await
        .unwrap();
    server.await.unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event, stored[0]);
    assert_eq!(events[0].seen_on, vec![url]);
}

#[tokio::test]
async fn query_fails_when_no_relay_answers() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let pool = RelayPool::new(Duration::from_secs(2));
    let result = pool.query(&[url], &Filter::new()).await;
    assert!(result.is_err());
}
