// ABOUTME: ProxyLink owns the single persistent WebSocket connection to the local proxy
// ABOUTME: Connect-with-retry, fire-and-forget JSON send, blocking receive, idempotent close

use crate::parser::TEXT_INPUT_TYPE;
use anyhow::Result;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Notify};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// Connection lifecycle state. Transitions:
/// `Disconnected → Connecting → Connected → Disconnected` (on close or
/// receive error). The link never reconnects on its own; callers decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

/// Bounded connect retry schedule: `max_attempts` tries with a delay of
/// `attempt * backoff_base` between consecutive failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay applied after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_base * attempt
    }

    /// The full backoff schedule, one entry per gap between attempts.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..self.max_attempts).map(|attempt| self.delay_after(attempt))
    }
}

#[derive(Serialize)]
struct TextInput<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

/// The single persistent connection to the local proxy.
///
/// The underlying transport halves are owned exclusively by this type. The
/// send side and receive side fail independently: a receive error only ends
/// the receive stream, the send side reports `false` on its own failures.
pub struct ProxyLink {
    endpoint: String,
    retry: RetryPolicy,
    writer: Mutex<Option<WsWriter>>,
    reader: Mutex<Option<WsReader>>,
    state: AtomicU8,
    closed: Notify,
}

impl ProxyLink {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_retry(endpoint, RetryPolicy::default())
    }

    pub fn with_retry(endpoint: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            endpoint: endpoint.into(),
            retry,
            writer: Mutex::new(None),
            reader: Mutex::new(None),
            state: AtomicU8::new(LinkState::Disconnected as u8),
            closed: Notify::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> LinkState {
        match self.state.load(Ordering::Acquire) {
            2 => LinkState::Connected,
            1 => LinkState::Connecting,
            _ => LinkState::Disconnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    fn set_state(&self, state: LinkState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Attempt to connect, retrying per the [`RetryPolicy`]. Individual
    /// attempt failures are logged; only exhaustion surfaces as an error.
    pub async fn connect(&self) -> Result<()> {
        self.set_state(LinkState::Connecting);
        for attempt in 1..=self.retry.max_attempts {
            match connect_async(&self.endpoint).await {
                Ok((stream, _response)) => {
                    let (writer, reader) = stream.split();
                    *self.writer.lock().await = Some(writer);
                    *self.reader.lock().await = Some(reader);
                    self.set_state(LinkState::Connected);
                    tracing::info!(endpoint = %self.endpoint, attempt, "Connected to proxy");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        endpoint = %self.endpoint,
                        attempt,
                        error = %e,
                        "Failed to connect to proxy"
                    );
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.delay_after(attempt)).await;
                    }
                }
            }
        }
        self.set_state(LinkState::Disconnected);
        anyhow::bail!(
            "could not connect to proxy at {} after {} attempts",
            self.endpoint,
            self.retry.max_attempts
        )
    }

    /// Forward user text to the proxy as a `text-input` frame.
    ///
    /// Returns `false` (never errors) when the link is absent/closed or the
    /// transport write fails.
    pub async fn send_text(&self, text: &str) -> bool {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            tracing::error!("Cannot send to proxy: link is not connected");
            return false;
        };
        let payload = match serde_json::to_string(&TextInput {
            kind: TEXT_INPUT_TYPE,
            text,
        }) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize text-input frame");
                return false;
            }
        };
        match writer.send(Message::Text(payload.into())).await {
            Ok(()) => {
                tracing::debug!(len = text.len(), "Forwarded text to proxy");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Error sending to proxy");
                false
            }
        }
    }

    /// Block until the next text frame arrives. Returns `None` once on
    /// transport error or close, ending the receive side; the send side is
    /// unaffected until the caller reacts.
    pub async fn recv(&self) -> Option<String> {
        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut()?;
        loop {
            tokio::select! {
                msg = reader.next() => match msg {
                    Some(Ok(Message::Text(text))) => return Some(text.to_string()),
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("Proxy closed the connection");
                        break;
                    }
                    Some(Ok(_)) => continue, // ping/pong/binary keep-alive noise
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "Error receiving from proxy");
                        break;
                    }
                    None => break,
                },
                _ = self.closed.notified() => {
                    // A stored permit can predate this connection; only an
                    // actual close ends the receive side.
                    if self.state() != LinkState::Connected {
                        tracing::debug!("Receive side interrupted by close");
                        break;
                    }
                }
            }
        }
        guard.take();
        self.set_state(LinkState::Disconnected);
        None
    }

    /// Close the connection. Idempotent; unblocks any pending `recv`.
    pub async fn close(&self) {
        self.set_state(LinkState::Disconnected);
        self.closed.notify_one();
        let mut guard = self.writer.lock().await;
        if let Some(mut writer) = guard.take() {
            if let Err(e) = writer.close().await {
                tracing::debug!(error = %e, "Error closing proxy connection");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
