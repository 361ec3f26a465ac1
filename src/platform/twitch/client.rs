// ABOUTME: twitch-irc SDK glue: forwards channel PRIVMSGs into an EventStream
// ABOUTME: and implements ChatSink over the IRC client (say; no deletable messages)

use anyhow::{Context, Result};
use async_trait::async_trait;
use bridge_core::config::TwitchConfig;
use bridge_core::traits::{ChatEvent, ChatSink, ChatUser, EventStream, MessageRef};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use twitch_irc::login::StaticLoginCredentials;
use twitch_irc::message::ServerMessage;
use twitch_irc::{ClientConfig, SecureTCPTransport, TwitchIRCClient};

type IrcClient = TwitchIRCClient<SecureTCPTransport, StaticLoginCredentials>;

/// ChatSink over the Twitch IRC client. Twitch chat offers the bot no way to
/// delete its own messages, so `delete` is a logged no-op and `send` returns
/// a handle with an empty message ID.
pub struct TwitchSink {
    client: IrcClient,
}

#[async_trait]
impl ChatSink for TwitchSink {
    async fn send(&self, channel_id: &str, text: &str) -> Result<MessageRef> {
        self.client
            .say(channel_id.to_owned(), text.to_owned())
            .await
            .context("Failed to send Twitch message")?;
        Ok(MessageRef::new(channel_id, ""))
    }

    async fn delete(&self, _message: &MessageRef) -> Result<()> {
        tracing::debug!(platform = "twitch", "Twitch messages cannot be deleted, skipping");
        Ok(())
    }
}

/// Start the Twitch IRC client in the background and join the configured
/// channel. Returns the platform event stream and the outbound sink.
pub fn start(config: &TwitchConfig) -> Result<(EventStream, TwitchSink)> {
    let login = config.bot_nick.to_lowercase();
    // twitch-irc expects the token without the legacy "oauth:" prefix
    let token = config.token.trim_start_matches("oauth:").to_string();
    let client_config =
        ClientConfig::new_simple(StaticLoginCredentials::new(login.clone(), Some(token)));
    let (mut incoming, client) = IrcClient::new(client_config);

    client
        .join(config.channel.to_lowercase())
        .context("Failed to join Twitch channel")?;
    tracing::info!(channel = %config.channel, "Twitch client joining channel");

    let (tx, rx) = mpsc::channel(256);
    tokio::spawn(async move {
        while let Some(message) = incoming.recv().await {
            match message {
                ServerMessage::Privmsg(msg) => {
                    // Skip our own messages
                    if msg.sender.login.eq_ignore_ascii_case(&login) {
                        continue;
                    }
                    let event = ChatEvent {
                        channel_id: msg.channel_login.clone(),
                        sender: ChatUser::with_name(
                            msg.sender.login.clone(),
                            msg.sender.name.clone(),
                        ),
                        body: msg.message_text.clone(),
                        is_direct: false,
                    };
                    if tx.send(event).await.is_err() {
                        tracing::warn!(platform = "twitch", "Event stream receiver dropped");
                        break;
                    }
                }
                ServerMessage::Join(join) => {
                    tracing::info!(channel = %join.channel_login, "Joined Twitch channel");
                }
                _ => {}
            }
        }
        tracing::info!(platform = "twitch", "Twitch IRC stream ended");
    });

    let stream: EventStream = Box::pin(ReceiverStream::new(rx));
    Ok((stream, TwitchSink { client }))
}
