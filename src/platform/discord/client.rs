// ABOUTME: serenity SDK glue: forwards gateway messages into an EventStream
// ABOUTME: and implements ChatSink over the Discord HTTP API

use anyhow::{Context as AnyhowContext, Result};
use async_trait::async_trait;
use bridge_core::config::DiscordConfig;
use bridge_core::traits::{ChatEvent, ChatSink, ChatUser, EventStream, MessageRef};
use serenity::all::{
    ChannelId, Client, Context, EventHandler, GatewayIntents, Message, MessageId, Ready,
};
use serenity::http::Http;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

/// ChatSink over the Discord HTTP API.
pub struct DiscordSink {
    http: Arc<Http>,
}

#[async_trait]
impl ChatSink for DiscordSink {
    async fn send(&self, channel_id: &str, text: &str) -> Result<MessageRef> {
        let channel = ChannelId::new(
            channel_id
                .parse::<u64>()
                .context("Invalid Discord channel ID")?,
        );
        let message = channel
            .say(&self.http, text)
            .await
            .context("Failed to send Discord message")?;
        Ok(MessageRef::new(channel_id, message.id.get().to_string()))
    }

    async fn delete(&self, message: &MessageRef) -> Result<()> {
        let channel = ChannelId::new(
            message
                .channel_id
                .parse::<u64>()
                .context("Invalid Discord channel ID")?,
        );
        let id = MessageId::new(
            message
                .message_id
                .parse::<u64>()
                .context("Invalid Discord message ID")?,
        );
        self.http
            .delete_message(channel, id, None)
            .await
            .context("Failed to delete Discord message")?;
        Ok(())
    }
}

struct ForwardingHandler {
    tx: mpsc::Sender<ChatEvent>,
    ready_tx: std::sync::Mutex<Option<oneshot::Sender<String>>>,
}

#[serenity::async_trait]
impl EventHandler for ForwardingHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        tracing::info!(
            user = %ready.user.name,
            id = %ready.user.id,
            "Discord bot connected"
        );
        let sender = self.ready_tx.lock().ok().and_then(|mut guard| guard.take());
        if let Some(sender) = sender {
            let _ = sender.send(ready.user.id.get().to_string());
        }
    }

    async fn message(&self, _ctx: Context, message: Message) {
        if message.author.bot {
            return;
        }
        let event = ChatEvent {
            channel_id: message.channel_id.get().to_string(),
            sender: ChatUser::with_name(
                message.author.id.get().to_string(),
                message.author.name.clone(),
            ),
            body: message.content.clone(),
            is_direct: message.guild_id.is_none(),
        };
        if self.tx.send(event).await.is_err() {
            tracing::warn!(platform = "discord", "Event stream receiver dropped");
        }
    }
}

/// Start the Discord client in the background. Returns the platform event
/// stream, the outbound sink, and the bot's own user ID (for echo
/// suppression) once the gateway reports ready.
pub async fn start(config: &DiscordConfig) -> Result<(EventStream, DiscordSink, String)> {
    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let (tx, rx) = mpsc::channel(256);
    let (ready_tx, ready_rx) = oneshot::channel();
    let handler = ForwardingHandler {
        tx,
        ready_tx: std::sync::Mutex::new(Some(ready_tx)),
    };

    let mut client = Client::builder(&config.token, intents)
        .event_handler(handler)
        .await
        .context("Failed to build Discord client")?;
    let http = Arc::clone(&client.http);

    tokio::spawn(async move {
        if let Err(e) = client.start().await {
            tracing::error!(error = %e, "Discord client stopped");
        }
    });

    let bot_user_id = ready_rx
        .await
        .context("Discord client closed before becoming ready")?;

    let stream: EventStream = Box::pin(ReceiverStream::new(rx));
    Ok((stream, DiscordSink { http }, bot_user_id))
}
