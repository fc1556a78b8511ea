//! Event contract toward downstream consumers.
//!
//! The capture core publishes exactly three event kinds; stats aggregation,
//! persistence and UI panels all hang off these. Names and payload shapes
//! are stable.

use serde::{Deserialize, Serialize};

use crate::{Conversation, Message};

/// Events published by the capture core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CaptureEvent {
    /// An assistant response was reconstructed from a stream. Sent with
    /// `is_complete = false` for progress snapshots during long responses
    /// and exactly once with `is_complete = true` per logical completion.
    AssistantResponse {
        platform: String,
        message: Message,
        is_complete: bool,
    },
    /// A message was extracted and normalized (user prompt from a request,
    /// or a finished assistant reply).
    MessageExtracted { platform: String, message: Message },
    /// A full conversation payload was fetched and normalized.
    ConversationLoaded {
        conversation: Conversation,
        messages: Vec<Message>,
    },
}
