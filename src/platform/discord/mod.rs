// ABOUTME: Discord platform adapter: gating policy, pending-turn bookkeeping, run loop
// ABOUTME: Generic over ChatSink so tests can drive it with in-memory fakes

pub mod client;

use anyhow::{Context, Result};
use bridge_core::config::DiscordConfig;
use bridge_core::link::ProxyLink;
use bridge_core::live::LiveStatus;
use bridge_core::parser::parse;
use bridge_core::relay::{HandlerRegistry, PendingTurn, RelayState, ReplyRelay, THINKING_MESSAGE};
use bridge_core::traits::{ChatEvent, ChatSink, EventStream};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;

/// Indicator shown instead of "Thinking..." while a competing stream is live.
pub const STREAMING_MESSAGE: &str = "can't talk right now streaming!";

/// Discord adapter. Gating policy: every non-echo message from an allowed
/// sender is forwarded to the proxy; there is no content filter. While the
/// live flag is set, a busy indicator is posted and nothing is forwarded.
pub struct DiscordAdapter<S: ChatSink> {
    config: DiscordConfig,
    sink: Arc<S>,
    link: Arc<ProxyLink>,
    state: Arc<RelayState>,
    registry: Arc<HandlerRegistry>,
    live: LiveStatus,
    bot_user_id: String,
}

impl<S: ChatSink + 'static> DiscordAdapter<S> {
    pub fn new(
        config: DiscordConfig,
        sink: S,
        link: ProxyLink,
        live: LiveStatus,
        bot_user_id: impl Into<String>,
    ) -> Self {
        let sink = Arc::new(sink);
        let state = Arc::new(RelayState::new());
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(ReplyRelay::new(
            Arc::clone(&state),
            Arc::clone(&sink),
            "discord",
        )));
        Self {
            config,
            sink,
            link: Arc::new(link),
            state,
            registry: Arc::new(registry),
            live,
            bot_user_id: bot_user_id.into(),
        }
    }

    fn is_sender_allowed(&self, sender_id: &str) -> bool {
        if self.config.friend_ids.is_empty() {
            return true; // Empty allowlist means allow all
        }
        sender_id
            .parse::<u64>()
            .map(|id| self.config.friend_ids.contains(&id))
            .unwrap_or(false)
    }

    /// Apply the inbound gating policy to one platform event.
    pub async fn handle_event(&self, event: ChatEvent) {
        if event.sender.id == self.bot_user_id {
            tracing::trace!("Ignoring own message");
            return;
        }
        if event.body.is_empty() {
            return;
        }
        if !self.is_sender_allowed(&event.sender.id) {
            tracing::debug!(
                platform = "discord",
                sender = %event.sender.id,
                "Skipping message from non-allowed sender"
            );
            return;
        }

        tracing::info!(
            platform = "discord",
            channel = %event.channel_id,
            sender = %event.sender.id,
            dm = event.is_direct,
            "Received platform message"
        );

        let live_now = self.live.is_live();
        {
            let mut pending = self.state.lock().await;
            if let Some(turn) = pending.as_ref() {
                // Reuse the existing turn and its indicator; never orphan it.
                tracing::debug!(
                    platform = "discord",
                    channel = %turn.channel_id,
                    "Turn already pending, reusing reply target"
                );
            } else {
                let mut turn = PendingTurn::new(&event.channel_id, event.sender.clone());
                let indicator_text = if live_now {
                    STREAMING_MESSAGE
                } else {
                    THINKING_MESSAGE
                };
                match self.sink.send(&event.channel_id, indicator_text).await {
                    Ok(indicator) => turn.indicator = Some(indicator),
                    Err(e) => {
                        tracing::error!(
                            platform = "discord",
                            error = %e,
                            "Failed to send indicator message"
                        );
                    }
                }
                *pending = Some(turn);
            }
        }

        if live_now {
            // Busy: the indicator already told the user; nothing is forwarded.
            metrics::counter!("bridge_messages_suppressed_total", "platform" => "discord")
                .increment(1);
            return;
        }

        if self.link.send_text(&event.body).await {
            metrics::counter!("bridge_messages_forwarded_total", "platform" => "discord")
                .increment(1);
        } else {
            tracing::warn!(platform = "discord", "Message not forwarded, proxy link is down");
        }
    }

    /// Connect to the proxy and drive both loops until the link drops or the
    /// platform event stream ends.
    pub async fn run(&self, mut events: EventStream) -> Result<()> {
        self.link
            .connect()
            .await
            .context("Discord adapter could not reach the proxy")?;

        let link = Arc::clone(&self.link);
        let registry = Arc::clone(&self.registry);
        let receive_loop = tokio::spawn(async move {
            while let Some(raw) = link.recv().await {
                let frame = parse(&raw);
                registry.dispatch(&frame).await;
            }
            tracing::info!(platform = "discord", "Proxy receive loop ended");
        });

        let mut tick = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                maybe_event = events.next() => match maybe_event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        tracing::info!(platform = "discord", "Platform event stream ended");
                        break;
                    }
                },
                _ = tick.tick() => {
                    if !self.link.is_connected() {
                        tracing::warn!(platform = "discord", "Proxy link lost");
                        break;
                    }
                }
            }
        }

        self.disconnect().await;
        let _ = receive_loop.await;
        Ok(())
    }

    /// Close the proxy link and clean up any pending turn, deleting its
    /// indicator best-effort so no placeholder outlives the adapter.
    pub async fn disconnect(&self) {
        if let Some(turn) = self.state.take_turn().await {
            if let Some(indicator) = &turn.indicator {
                if let Err(e) = self.sink.delete(indicator).await {
                    tracing::debug!(
                        platform = "discord",
                        error = %e,
                        "Failed to delete indicator during disconnect"
                    );
                }
            }
        }
        self.link.close().await;
    }
}
