//! Normalized message records emitted by the capture core.
//!
//! Platforms disagree about almost everything: id fields, role labels,
//! timestamp units, content shapes. Everything downstream of the adapters
//! works with these platform-agnostic records instead.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person typing into the composer
    User,
    /// The platform's model
    Assistant,
}

/// The platform-agnostic message record.
///
/// This is the entire contract toward downstream consumers; adapters must
/// not leak platform-specific shapes past this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Provider-side message identifier (generated when the platform
    /// does not supply one)
    pub message_id: String,
    /// Provider-side conversation identifier, empty when unknown
    pub conversation_id: String,
    /// Full text content
    pub content: String,
    /// Who authored the message
    pub role: Role,
    /// Model slug, platform default when not reported
    pub model: String,
    /// Milliseconds since Unix epoch
    pub timestamp: u64,
    /// Provider id of the parent message, if the platform tracks threading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_message_provider_id: Option<String>,
    /// Seconds the model spent in thinking steps before answering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_time: Option<f64>,
}

impl Message {
    /// Create a user message with a generated id.
    pub fn user(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            message_id: format!("user-{}", uuid::Uuid::new_v4()),
            conversation_id: conversation_id.into(),
            content: content.into(),
            role: Role::User,
            model: String::new(),
            timestamp: now_ms(),
            parent_message_provider_id: None,
            thinking_time: None,
        }
    }

    /// Create an assistant message with a generated id.
    pub fn assistant(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            message_id: format!("assistant-{}", uuid::Uuid::new_v4()),
            conversation_id: conversation_id.into(),
            content: content.into(),
            role: Role::Assistant,
            model: String::new(),
            timestamp: now_ms(),
            parent_message_provider_id: None,
            thinking_time: None,
        }
    }
}

/// A conversation descriptor as reported by a platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Provider-side conversation identifier
    pub provider_id: String,
    /// Display title
    pub title: String,
    /// Platform name ("ChatGPT", "Claude", ...)
    pub provider_name: String,
}

/// Current time in milliseconds since Unix epoch.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Parse an ISO-8601 timestamp into milliseconds since Unix epoch.
///
/// Returns `None` on any parse failure; platforms occasionally send
/// timestamps in formats they never documented.
pub fn timestamp_from_iso(raw: &str) -> Option<u64> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.timestamp_millis().max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_has_generated_id() {
        let msg = Message::user("conv-1", "Hello");
        assert!(msg.message_id.starts_with("user-"));
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.conversation_id, "conv-1");
        assert!(msg.timestamp > 0);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
    }

    #[test]
    fn test_timestamp_from_iso() {
        let ms = timestamp_from_iso("2024-03-01T12:00:00.500Z").unwrap();
        assert_eq!(ms, 1_709_294_400_500);
        assert!(timestamp_from_iso("yesterday").is_none());
    }

    #[test]
    fn test_optional_fields_skipped_when_absent() {
        let msg = Message::user("", "hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("thinking_time").is_none());
        assert!(json.get("parent_message_provider_id").is_none());
    }
}
