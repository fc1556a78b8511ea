//! Copilot-like platform adapter.
//!
//! Completion traffic on this platform is not interceptable, so both
//! message extractors decline and everything is derived from the fetched
//! conversation endpoints instead.

use chatlens_types::{now_ms, timestamp_from_iso, Conversation, Message, Role};
use serde_json::Value;

use crate::config::PlatformConfig;
use crate::context::CaptureContext;
use super::PlatformAdapter;

pub struct CopilotAdapter {
    config: PlatformConfig,
}

impl CopilotAdapter {
    pub fn new() -> Self {
        Self {
            config: PlatformConfig::copilot(),
        }
    }
}

impl Default for CopilotAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformAdapter for CopilotAdapter {
    fn name(&self) -> &'static str {
        "copilot"
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }

    fn extract_user_message(
        &self,
        _ctx: &CaptureContext,
        _body: &Value,
        _url: Option<&str>,
    ) -> Option<Message> {
        None
    }

    fn extract_assistant_message(&self, _ctx: &CaptureContext, _data: &Message) -> Option<Message> {
        None
    }

    fn extract_conversation(&self, data: &Value) -> Option<Conversation> {
        let id = data.get("id").and_then(Value::as_str)?;
        Some(Conversation {
            provider_id: id.to_string(),
            title: data
                .get("title")
                .and_then(Value::as_str)
                .filter(|t| !t.trim().is_empty())
                .unwrap_or("Conversation")
                .to_string(),
            provider_name: "Copilot".to_string(),
        })
    }

    fn extract_messages_from_conversation(&self, payload: &Value) -> Vec<Message> {
        let Some(results) = payload.get("results").and_then(Value::as_array) else {
            return Vec::new();
        };
        let conversation_id = payload
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default();

        results
            .iter()
            .filter_map(|entry| {
                let id = entry.get("id").and_then(Value::as_str)?;
                let role = match entry.get("author").and_then(Value::as_str)? {
                    "human" => Role::User,
                    "ai" | "assistant" => Role::Assistant,
                    _ => return None,
                };
                let content = match entry.get("content") {
                    Some(Value::Array(parts)) => parts
                        .iter()
                        .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
                        .filter_map(|p| p.get("text").and_then(Value::as_str))
                        .collect::<Vec<_>>()
                        .join("\n"),
                    Some(Value::String(text)) => text.clone(),
                    _ => String::new(),
                };
                Some(Message {
                    message_id: id.to_string(),
                    conversation_id: conversation_id.to_string(),
                    content,
                    role,
                    model: "copilot".to_string(),
                    timestamp: entry
                        .get("createdAt")
                        .and_then(Value::as_str)
                        .and_then(timestamp_from_iso)
                        .unwrap_or_else(now_ms),
                    parent_message_provider_id: None,
                    thinking_time: None,
                })
            })
            .collect()
    }

    /// The list endpoint mixes chats with other session types; only real
    /// chats survive.
    fn handle_conversation_list(&self, payload: &Value) -> Vec<Conversation> {
        let Some(results) = payload.get("results").and_then(Value::as_array) else {
            return Vec::new();
        };
        results
            .iter()
            .filter(|chat| chat.get("type").and_then(Value::as_str) == Some("chat"))
            .filter_map(|chat| self.extract_conversation(chat))
            .collect()
    }

    /// Fresh conversations legitimately have no messages yet; publish the
    /// descriptor anyway so the reader sees the conversation exists.
    fn handle_specific_conversation(&self, ctx: &CaptureContext, payload: &Value) {
        let Some(conversation) = self.extract_conversation(payload) else {
            return;
        };
        let messages = self.extract_messages_from_conversation(payload);
        ctx.dispatcher
            .dispatch(chatlens_types::CaptureEvent::ConversationLoaded {
                conversation,
                messages,
            });
    }
}
