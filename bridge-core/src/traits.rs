// ABOUTME: Core types and traits at the seam between platform SDK glue and bridge logic
// ABOUTME: ChatEvent (inbound), ChatSink (outbound send/delete), and the opaque MessageRef handle

use anyhow::Result;
use async_trait::async_trait;
use std::pin::Pin;
use tokio_stream::Stream;

// =============================================================================
// User Identity
// =============================================================================

/// Identity of a chat user
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatUser {
    /// Unique identifier (e.g., a Discord snowflake, a Twitch login)
    pub id: String,
    /// Display name
    pub display_name: Option<String>,
}

impl ChatUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
        }
    }

    pub fn with_name(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: Some(name.into()),
        }
    }
}

// =============================================================================
// Incoming Event
// =============================================================================

/// Incoming chat message from a platform
#[derive(Debug, Clone)]
pub struct ChatEvent {
    /// The channel/conversation this message was sent in
    pub channel_id: String,
    /// The user who sent the message
    pub sender: ChatUser,
    /// Message body (text content)
    pub body: String,
    /// Whether this is a direct message (1:1 conversation). Surfaced in the
    /// adapters' structured logs; gating does not depend on it.
    pub is_direct: bool,
}

/// Boxed stream type for platform events
pub type EventStream = Pin<Box<dyn Stream<Item = ChatEvent> + Send>>;

// =============================================================================
// Outbound Sink
// =============================================================================

/// Opaque handle to a message the bridge posted on a platform.
///
/// The bridge never assumes ownership or lifetime of the underlying platform
/// object beyond "valid until explicitly deleted or replaced".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    /// Channel the message was posted in
    pub channel_id: String,
    /// Platform-specific message identifier (may be empty on platforms
    /// that do not return one)
    pub message_id: String,
}

impl MessageRef {
    pub fn new(channel_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            message_id: message_id.into(),
        }
    }
}

/// Message sink for a chat platform: post a message, delete a posted message.
///
/// SDK glue implements this over the real platform API; tests implement it
/// with in-memory fakes.
#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Send `text` to a channel, returning a handle to the posted message.
    async fn send(&self, channel_id: &str, text: &str) -> Result<MessageRef>;

    /// Delete a previously posted message.
    async fn delete(&self, message: &MessageRef) -> Result<()>;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_user_new() {
        let user = ChatUser::new("123456");
        assert_eq!(user.id, "123456");
        assert!(user.display_name.is_none());
    }

    #[test]
    fn test_chat_user_with_name() {
        let user = ChatUser::with_name("123456", "Mao Fan");
        assert_eq!(user.id, "123456");
        assert_eq!(user.display_name, Some("Mao Fan".to_string()));
    }

    #[test]
    fn test_message_ref_construction() {
        let msg = MessageRef::new("chan-1", "987");
        assert_eq!(msg.channel_id, "chan-1");
        assert_eq!(msg.message_id, "987");
    }

    #[test]
    fn test_message_ref_empty_message_id() {
        // IRC-style platforms return no message ID
        let msg = MessageRef::new("#somechannel", "");
        assert!(msg.message_id.is_empty());
    }

    #[test]
    fn test_chat_event_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<ChatEvent>();
        assert_send::<MessageRef>();
    }
}
