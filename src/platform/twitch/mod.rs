// ABOUTME: Twitch platform adapter: character-name gating, live suppression, run loop
// ABOUTME: Generic over ChatSink; Twitch turns carry no indicator message

pub mod client;

use anyhow::{Context, Result};
use bridge_core::config::TwitchConfig;
use bridge_core::link::ProxyLink;
use bridge_core::live::LiveStatus;
use bridge_core::parser::parse;
use bridge_core::relay::{HandlerRegistry, PendingTurn, RelayState, ReplyRelay};
use bridge_core::traits::{ChatEvent, ChatSink, EventStream};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;

/// Logged when inbound chat is suppressed because a stream is live.
pub const STREAMING_MESSAGE: &str = "Currently live, can't talk atm (Twitch)";

/// Twitch adapter. Gating policy: forward only messages that mention the
/// configured character name (case-insensitive substring); while the live
/// flag is set, suppress entirely and only log. No placeholder message is
/// posted, so turns carry no indicator.
pub struct TwitchAdapter<S: ChatSink> {
    config: TwitchConfig,
    sink: Arc<S>,
    link: Arc<ProxyLink>,
    state: Arc<RelayState>,
    registry: Arc<HandlerRegistry>,
    live: LiveStatus,
}

impl<S: ChatSink + 'static> TwitchAdapter<S> {
    pub fn new(config: TwitchConfig, sink: S, link: ProxyLink, live: LiveStatus) -> Self {
        let sink = Arc::new(sink);
        let state = Arc::new(RelayState::new());
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(ReplyRelay::new(
            Arc::clone(&state),
            Arc::clone(&sink),
            "twitch",
        )));
        Self {
            config,
            sink,
            link: Arc::new(link),
            state,
            registry: Arc::new(registry),
            live,
        }
    }

    fn mentions_character(&self, body: &str) -> bool {
        body.to_lowercase()
            .contains(&self.config.character_name.to_lowercase())
    }

    /// Apply the inbound gating policy to one platform event.
    pub async fn handle_event(&self, event: ChatEvent) {
        if event.sender.id.eq_ignore_ascii_case(&self.config.bot_nick) {
            tracing::trace!("Ignoring own message");
            return;
        }
        if event.body.is_empty() {
            return;
        }
        if self.live.is_live() {
            tracing::info!(platform = "twitch", "{}", STREAMING_MESSAGE);
            metrics::counter!("bridge_messages_suppressed_total", "platform" => "twitch")
                .increment(1);
            return;
        }
        if !self.mentions_character(&event.body) {
            tracing::trace!(
                platform = "twitch",
                character = %self.config.character_name,
                "Message does not mention the character, skipping"
            );
            return;
        }

        tracing::info!(
            platform = "twitch",
            channel = %event.channel_id,
            sender = %event.sender.id,
            "Received qualifying platform message"
        );

        {
            let mut pending = self.state.lock().await;
            if pending.is_none() {
                *pending = Some(PendingTurn::new(&event.channel_id, event.sender.clone()));
            }
        }

        if self.link.send_text(&event.body).await {
            metrics::counter!("bridge_messages_forwarded_total", "platform" => "twitch")
                .increment(1);
        } else {
            tracing::warn!(platform = "twitch", "Message not forwarded, proxy link is down");
        }
    }

    /// Connect to the proxy and drive both loops until the link drops or the
    /// platform event stream ends.
    pub async fn run(&self, mut events: EventStream) -> Result<()> {
        self.link
            .connect()
            .await
            .context("Twitch adapter could not reach the proxy")?;

        let link = Arc::clone(&self.link);
        let registry = Arc::clone(&self.registry);
        let receive_loop = tokio::spawn(async move {
            while let Some(raw) = link.recv().await {
                let frame = parse(&raw);
                registry.dispatch(&frame).await;
            }
            tracing::info!(platform = "twitch", "Proxy receive loop ended");
        });

        let mut tick = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                maybe_event = events.next() => match maybe_event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        tracing::info!(platform = "twitch", "Platform event stream ended");
                        break;
                    }
                },
                _ = tick.tick() => {
                    if !self.link.is_connected() {
                        tracing::warn!(platform = "twitch", "Proxy link lost");
                        break;
                    }
                }
            }
        }

        self.disconnect().await;
        let _ = receive_loop.await;
        Ok(())
    }

    /// Close the proxy link and drop any pending turn, deleting its
    /// indicator if one was ever attached.
    pub async fn disconnect(&self) {
        if let Some(turn) = self.state.take_turn().await {
            if let Some(indicator) = &turn.indicator {
                if let Err(e) = self.sink.delete(indicator).await {
                    tracing::debug!(
                        platform = "twitch",
                        error = %e,
                        "Failed to delete indicator during disconnect"
                    );
                }
            }
        }
        self.link.close().await;
    }
}
