// ABOUTME: Shared helpers for integration tests: in-memory ChatSink fake and
// ABOUTME: a single-connection WebSocket proxy stand-in recording inbound frames

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use bridge_core::config::{DiscordConfig, TwitchConfig};
use bridge_core::traits::{ChatEvent, ChatSink, ChatUser, MessageRef};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;

// =============================================================================
// Recording sink
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOp {
    Send { channel_id: String, text: String },
    Delete { channel_id: String, message_id: String },
}

/// ChatSink fake that records every operation in order and hands out
/// sequential message ids starting at "1".
#[derive(Clone, Default)]
pub struct FakeSink {
    ops: Arc<Mutex<Vec<SinkOp>>>,
    next_id: Arc<AtomicU64>,
}

impl FakeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn ops(&self) -> Vec<SinkOp> {
        self.ops.lock().await.clone()
    }

    /// Poll until at least `count` operations were recorded.
    pub async fn wait_for_ops(&self, count: usize) -> Vec<SinkOp> {
        for _ in 0..200 {
            let ops = self.ops.lock().await.clone();
            if ops.len() >= count {
                return ops;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("sink never recorded {count} operations: {:?}", self.ops.lock().await);
    }
}

#[async_trait]
impl ChatSink for FakeSink {
    async fn send(&self, channel_id: &str, text: &str) -> Result<MessageRef> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.ops.lock().await.push(SinkOp::Send {
            channel_id: channel_id.to_string(),
            text: text.to_string(),
        });
        Ok(MessageRef::new(channel_id, id.to_string()))
    }

    async fn delete(&self, message: &MessageRef) -> Result<()> {
        self.ops.lock().await.push(SinkOp::Delete {
            channel_id: message.channel_id.clone(),
            message_id: message.message_id.clone(),
        });
        Ok(())
    }
}

// =============================================================================
// Fake proxy server
// =============================================================================

/// WebSocket server standing in for the inference proxy. Accepts one
/// connection, records every inbound text frame, and relays frames pushed
/// via [`ProxyServer::push_frame`] to the client.
pub struct ProxyServer {
    pub url: String,
    inbound: Arc<Mutex<Vec<String>>>,
    frame_tx: mpsc::UnboundedSender<String>,
}

impl ProxyServer {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let inbound = Arc::new(Mutex::new(Vec::new()));
        let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<String>();

        let recorded = Arc::clone(&inbound);
        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                return;
            };
            let (mut write, mut read) = ws.split();
            loop {
                tokio::select! {
                    msg = read.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            recorded.lock().await.push(text.to_string());
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    },
                    frame = frame_rx.recv() => match frame {
                        Some(frame) => {
                            if write.send(Message::Text(frame.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        });

        Self {
            url: format!("ws://{addr}"),
            inbound,
            frame_tx,
        }
    }

    /// Queue a frame for delivery to the connected client.
    pub fn push_frame(&self, frame: &str) {
        let _ = self.frame_tx.send(frame.to_string());
    }

    pub async fn received(&self) -> Vec<String> {
        self.inbound.lock().await.clone()
    }

    /// Poll until at least `count` inbound frames arrived.
    pub async fn wait_for_inbound(&self, count: usize) -> Vec<String> {
        for _ in 0..200 {
            let msgs = self.inbound.lock().await.clone();
            if msgs.len() >= count {
                return msgs;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "proxy never received {count} frames: {:?}",
            self.inbound.lock().await
        );
    }
}

// =============================================================================
// Fixture builders
// =============================================================================

pub fn chat_event(channel_id: &str, sender_id: &str, body: &str) -> ChatEvent {
    ChatEvent {
        channel_id: channel_id.to_string(),
        sender: ChatUser::new(sender_id),
        body: body.to_string(),
        is_direct: false,
    }
}

pub fn discord_config(friend_ids: Vec<u64>) -> DiscordConfig {
    DiscordConfig {
        token: "test-token".to_string(),
        bot_nick: "DiscordBot".to_string(),
        character_name: "Mao".to_string(),
        friend_ids,
    }
}

pub fn twitch_config() -> TwitchConfig {
    TwitchConfig {
        channel: "maochannel".to_string(),
        token: "oauth:test-token".to_string(),
        bot_nick: "TwitchBot".to_string(),
        character_name: "Mao".to_string(),
    }
}
