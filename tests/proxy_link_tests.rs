// ABOUTME: Integration tests for ProxyLink against a real WebSocket server.
// ABOUTME: Covers the wire format, the bounded retry schedule, and close/recv teardown.

mod common;

use bridge_core::link::{LinkState, ProxyLink, RetryPolicy};
use common::ProxyServer;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// WebSocket server that completes the handshake and then goes silent: the
/// connection stays open but no frame (not even the close reply) is serviced.
async fn spawn_stalled_server() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
            return;
        };
        let _hold = ws;
        futures_util::future::pending::<()>().await
    });
    addr
}

#[tokio::test]
async fn test_connect_send_and_receive_roundtrip() {
    let server = ProxyServer::spawn().await;
    let link = ProxyLink::new(&server.url);

    link.connect().await.unwrap();
    assert_eq!(link.state(), LinkState::Connected);

    assert!(link.send_text("what's your name").await);
    let inbound = server.wait_for_inbound(1).await;
    assert_eq!(inbound[0], r#"{"type":"text-input","text":"what's your name"}"#);

    server.push_frame(r#"{"type":"final-text","text":"I'm Mao."}"#);
    let raw = link.recv().await.unwrap();
    assert!(raw.contains("final-text"));

    link.close().await;
}

#[tokio::test]
async fn test_connect_stops_after_max_attempts() {
    // Accepts TCP connections but drops them before the WebSocket handshake,
    // so every connect attempt fails.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&accepts);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });

    let link = ProxyLink::with_retry(
        format!("ws://{addr}"),
        RetryPolicy {
            max_attempts: 5,
            backoff_base: Duration::from_millis(1),
        },
    );
    let err = link.connect().await.unwrap_err();
    assert!(err.to_string().contains("after 5 attempts"));
    assert_eq!(accepts.load(Ordering::SeqCst), 5);
    assert_eq!(link.state(), LinkState::Disconnected);
}

#[tokio::test]
async fn test_send_after_close_returns_false() {
    let server = ProxyServer::spawn().await;
    let link = ProxyLink::new(&server.url);

    link.connect().await.unwrap();
    link.close().await;

    assert!(!link.send_text("hello").await);
    assert_eq!(link.state(), LinkState::Disconnected);
}

#[tokio::test]
async fn test_close_is_idempotent_after_connect() {
    let server = ProxyServer::spawn().await;
    let link = ProxyLink::new(&server.url);

    link.connect().await.unwrap();
    link.close().await;
    link.close().await;
    assert_eq!(link.state(), LinkState::Disconnected);
}

#[tokio::test]
async fn test_close_unblocks_pending_recv_with_unresponsive_peer() {
    let addr = spawn_stalled_server().await;
    let link = Arc::new(ProxyLink::new(format!("ws://{addr}")));
    link.connect().await.unwrap();

    let receiver = tokio::spawn({
        let link = Arc::clone(&link);
        async move { link.recv().await }
    });
    // Let recv park on the idle connection before closing.
    tokio::time::sleep(Duration::from_millis(50)).await;
    link.close().await;

    let received = tokio::time::timeout(Duration::from_secs(2), receiver)
        .await
        .expect("close must unblock the pending recv")
        .unwrap();
    assert!(received.is_none());
    assert_eq!(link.state(), LinkState::Disconnected);
}

#[tokio::test]
async fn test_recv_ends_when_server_goes_away() {
    let server = ProxyServer::spawn().await;
    let link = ProxyLink::new(&server.url);

    link.connect().await.unwrap();

    // Dropping the server's frame channel makes its loop exit and the
    // connection drop, which must terminate the receive side exactly once.
    drop(server);
    assert!(link.recv().await.is_none());
    assert_eq!(link.state(), LinkState::Disconnected);
    assert!(link.recv().await.is_none());
}
