// ABOUTME: Platform-agnostic bridge core between chat adapters and the local inference proxy
// ABOUTME: Provides the proxy link, response parser, relay state, and adapter seams

pub mod config;
pub mod link;
pub mod live;
pub mod parser;
pub mod relay;
pub mod traits;

// Re-export core types for convenient access
pub use link::{LinkState, ProxyLink, RetryPolicy};
pub use live::LiveStatus;
pub use parser::{parse, FrameKind, ProxyFrame, MAX_REPLY_LENGTH};
pub use relay::{
    clean_reply_text, HandlerRegistry, PendingTurn, RelayState, ReplyRelay, ResponseHandler,
    THINKING_MESSAGE,
};
pub use traits::{ChatEvent, ChatSink, ChatUser, EventStream, MessageRef};
