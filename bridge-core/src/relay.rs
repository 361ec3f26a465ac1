// ABOUTME: Per-adapter relay state: the single pending turn, its indicator, and response handlers
// ABOUTME: ReplyRelay applies the outbound gating policy and delivers final replies to the sink

use crate::parser::{FrameKind, ProxyFrame, MAX_REPLY_LENGTH};
use crate::traits::{ChatSink, ChatUser, MessageRef};
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Instant;
use tokio::sync::{Mutex, MutexGuard};

/// Placeholder posted while a reply is pending. Also the literal guarded
/// against echo loops: a final frame whose trimmed, case-folded text equals
/// this is never relayed back to the platform.
pub const THINKING_MESSAGE: &str = "Thinking...";

static EMOTE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]").expect("emote pattern is valid"));

/// Strip bracketed emote markup (`[wave]`, `[smile]`) and surrounding
/// whitespace from a reply.
pub fn clean_reply_text(text: &str) -> String {
    EMOTE_PATTERN.replace_all(text, "").trim().to_string()
}

// =============================================================================
// Pending Turn
// =============================================================================

/// The bridge's record of the one in-flight platform-to-proxy exchange.
///
/// Invariant: the indicator never outlives the turn. Both are cleared
/// together, under the same lock acquisition.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    /// Channel/conversation the reply goes back to
    pub channel_id: String,
    /// User whose message started the turn
    pub sender: ChatUser,
    /// Handle to the indicator message, once shown
    pub indicator: Option<MessageRef>,
    /// When the turn was recorded
    pub created_at: Instant,
}

impl PendingTurn {
    pub fn new(channel_id: impl Into<String>, sender: ChatUser) -> Self {
        Self {
            channel_id: channel_id.into(),
            sender,
            indicator: None,
            created_at: Instant::now(),
        }
    }
}

/// Mutable relay state shared between the platform-event task and the proxy
/// receive task. One mutex guards every PendingTurn/indicator read-modify-write
/// sequence; at most one turn exists at a time.
#[derive(Default)]
pub struct RelayState {
    pending: Mutex<Option<PendingTurn>>,
}

impl RelayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the turn lock. Held for the full duration of any sequence that
    /// reads and then mutates the turn or its indicator.
    pub async fn lock(&self) -> MutexGuard<'_, Option<PendingTurn>> {
        self.pending.lock().await
    }

    /// Take the current turn, if any, leaving none pending.
    pub async fn take_turn(&self) -> Option<PendingTurn> {
        self.pending.lock().await.take()
    }

    pub async fn has_pending_turn(&self) -> bool {
        self.pending.lock().await.is_some()
    }
}

// =============================================================================
// Handler Registry
// =============================================================================

/// A consumer of decoded proxy frames.
#[async_trait]
pub trait ResponseHandler: Send + Sync {
    async fn handle(&self, frame: &ProxyFrame) -> Result<()>;
}

/// Ordered set of response handlers, populated once at adapter construction.
/// Handlers run in registration order; a failing handler is logged and does
/// not stop the rest.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn ResponseHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn ResponseHandler>) {
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub async fn dispatch(&self, frame: &ProxyFrame) {
        for handler in &self.handlers {
            if let Err(e) = handler.handle(frame).await {
                tracing::error!(error = %e, "Error in response handler");
            }
        }
    }
}

// =============================================================================
// Reply Relay
// =============================================================================

/// The outbound half of the bridge: turns qualifying final frames into
/// platform replies for the pending turn.
///
/// Drop policy (frame is ignored, turn stays pending unless noted):
/// - no pending turn: nothing to reply to
/// - control/unparseable frames
/// - non-final frames (streaming partials are not surfaced)
/// - text longer than [`MAX_REPLY_LENGTH`] chars (discarded, not truncated)
/// - text equal to the thinking indicator (echo-loop guard)
///
/// On delivery: emote markup stripped, indicator deleted best-effort, cleaned
/// text sent to the originating channel, turn cleared after a successful send.
pub struct ReplyRelay<S: ChatSink> {
    state: Arc<RelayState>,
    sink: Arc<S>,
    platform: &'static str,
}

impl<S: ChatSink> ReplyRelay<S> {
    pub fn new(state: Arc<RelayState>, sink: Arc<S>, platform: &'static str) -> Self {
        Self {
            state,
            sink,
            platform,
        }
    }

    async fn deliver(&self, frame: &ProxyFrame) -> Result<()> {
        if frame.kind != FrameKind::FinalText {
            return Ok(());
        }

        let mut pending = self.state.lock().await;
        if pending.is_none() {
            tracing::debug!(platform = self.platform, "No pending turn, dropping frame");
            return Ok(());
        }
        if !frame.is_final {
            tracing::debug!(platform = self.platform, "Skipping partial frame");
            return Ok(());
        }
        if frame.text.chars().count() > MAX_REPLY_LENGTH {
            tracing::info!(
                platform = self.platform,
                len = frame.text.len(),
                "Skipping oversized reply"
            );
            metrics::counter!("bridge_replies_dropped_total", "platform" => self.platform)
                .increment(1);
            return Ok(());
        }
        if frame.text.trim().eq_ignore_ascii_case(THINKING_MESSAGE) {
            tracing::warn!(
                platform = self.platform,
                "Dropping reply that echoes the thinking indicator"
            );
            return Ok(());
        }

        let Some(turn) = pending.as_mut() else {
            return Ok(());
        };
        let reply = clean_reply_text(&frame.text);

        if let Some(indicator) = turn.indicator.take() {
            if let Err(e) = self.sink.delete(&indicator).await {
                tracing::error!(
                    platform = self.platform,
                    error = %e,
                    "Failed to delete indicator message"
                );
            }
        }

        // The turn is cleared only after a successful send; a failed delivery
        // keeps it as the reply target for the next frame.
        let channel_id = turn.channel_id.clone();
        self.sink
            .send(&channel_id, &reply)
            .await
            .with_context(|| {
                format!(
                    "failed to deliver reply to {} channel {}",
                    self.platform, channel_id
                )
            })?;
        pending.take();

        metrics::counter!("bridge_replies_relayed_total", "platform" => self.platform)
            .increment(1);
        tracing::info!(
            platform = self.platform,
            channel = %channel_id,
            len = reply.len(),
            "Relayed final reply"
        );
        Ok(())
    }
}

#[async_trait]
impl<S: ChatSink> ResponseHandler for ReplyRelay<S> {
    async fn handle(&self, frame: &ProxyFrame) -> Result<()> {
        self.deliver(frame).await
    }
}

// =============================================================================
// Tests
// =============================================================================
