// ABOUTME: Stateless decoder for raw proxy messages into typed ProxyFrame outcomes
// ABOUTME: Structured-first decode with a legacy plain-text fallback; never fails

use serde_json::Value;

/// Maximum reply length the bridge will relay to a chat platform, in
/// characters. Oversized replies are discarded, not truncated.
pub const MAX_REPLY_LENGTH: usize = 4000;

/// Inbound discriminator for a user-visible text frame.
pub const FINAL_TEXT_TYPE: &str = "final-text";

/// Outbound discriminator for forwarded user text.
pub const TEXT_INPUT_TYPE: &str = "text-input";

/// Classification of one decoded proxy message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// User-visible text (check `is_final` before relaying)
    FinalText,
    /// Structured frame with a non-text discriminator; adapters ignore these
    Control,
    /// Neither structured nor acceptable as legacy plain text; dropped
    Unparseable,
}

/// One decoded message from the proxy. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyFrame {
    pub kind: FrameKind,
    pub text: String,
    pub is_final: bool,
}

impl ProxyFrame {
    pub fn final_text(text: impl Into<String>, is_final: bool) -> Self {
        Self {
            kind: FrameKind::FinalText,
            text: text.into(),
            is_final,
        }
    }

    pub fn control() -> Self {
        Self {
            kind: FrameKind::Control,
            text: String::new(),
            is_final: false,
        }
    }

    pub fn unparseable() -> Self {
        Self {
            kind: FrameKind::Unparseable,
            text: String::new(),
            is_final: false,
        }
    }
}

/// Decode a raw proxy message. Total: every input maps to exactly one frame.
///
/// Two-tier policy, preserved so the proxy can evolve its wire format without
/// breaking older adapters:
/// 1. A JSON object with `"type": "final-text"` yields `FinalText` (text from
///    the `text` field, finality from `is_final`, defaulting to true).
/// 2. Any other JSON object is a `Control` frame.
/// 3. Everything else falls back to legacy plain text: relayed as final iff
///    non-empty, shorter than [`MAX_REPLY_LENGTH`], and not starting with a
///    structured-data opener (`{` or `[`).
pub fn parse(raw: &str) -> ProxyFrame {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(fields)) => {
            if fields.get("type").and_then(Value::as_str) == Some(FINAL_TEXT_TYPE) {
                let text = fields
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let is_final = fields
                    .get("is_final")
                    .and_then(Value::as_bool)
                    .unwrap_or(true);
                ProxyFrame::final_text(text, is_final)
            } else {
                let frame_type = fields
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("<none>");
                tracing::debug!(frame_type, "Ignoring non-text proxy frame");
                ProxyFrame::control()
            }
        }
        _ => plain_text_fallback(raw),
    }
}

fn plain_text_fallback(raw: &str) -> ProxyFrame {
    let trimmed = raw.trim();
    let looks_structured = trimmed.starts_with('{') || trimmed.starts_with('[');
    if !raw.is_empty() && raw.chars().count() < MAX_REPLY_LENGTH && !looks_structured {
        tracing::debug!(len = raw.len(), "Treating non-JSON proxy payload as legacy plain text");
        ProxyFrame::final_text(raw, true)
    } else {
        tracing::warn!(len = raw.len(), "Dropping unparseable proxy payload");
        ProxyFrame::unparseable()
    }
}

// =============================================================================
// Tests
// =============================================================================
