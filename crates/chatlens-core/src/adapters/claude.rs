//! Claude-like platform adapter.
//!
//! Request bodies carry the user prompt directly; the conversation id
//! lives in the request URL rather than the body. Conversation payloads
//! are a flat `chat_messages` array ordered by an explicit `index`.

use chatlens_types::{now_ms, timestamp_from_iso, Conversation, Message, Role};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::config::PlatformConfig;
use crate::context::CaptureContext;
use super::PlatformAdapter;

static CONVERSATION_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/chat_conversations/([a-f0-9-]+)").expect("static regex"));
static MODEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Claude\s+([\d.]+\s+\w+)").expect("static regex"));

pub struct ClaudeAdapter {
    config: PlatformConfig,
}

impl ClaudeAdapter {
    pub fn new() -> Self {
        Self {
            config: PlatformConfig::claude(),
        }
    }

    /// Turn the model picker label ("Claude 3.7 Sonnet") into a slug
    /// ("claude-3.7-sonnet").
    fn model_from_ui(&self, ctx: &CaptureContext) -> String {
        let text = ctx
            .host
            .query_text(self.config.model_selector)
            .ok()
            .flatten()
            .unwrap_or_default();
        MODEL_RE
            .captures(&text)
            .and_then(|c| c.get(1))
            .map(|m| format!("claude-{}", m.as_str().to_lowercase().replace(' ', "-")))
            .unwrap_or_else(|| "unknown".to_string())
    }
}

impl Default for ClaudeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn conversation_id_from_url(url: &str) -> Option<String> {
    CONVERSATION_ID_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Message text is an array of typed blocks; only `text` blocks carry
/// visible content.
fn content_text(content: &Value) -> String {
    match content {
        Value::Array(blocks) => blocks
            .iter()
            .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::String(text) => text.clone(),
        _ => String::new(),
    }
}

impl PlatformAdapter for ClaudeAdapter {
    fn name(&self) -> &'static str {
        "claude"
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }

    fn extract_user_message(
        &self,
        _ctx: &CaptureContext,
        body: &Value,
        url: Option<&str>,
    ) -> Option<Message> {
        let prompt = body.get("prompt").and_then(Value::as_str)?;
        if prompt.trim().is_empty() {
            return None;
        }

        Some(Message {
            message_id: format!("user-{}", uuid::Uuid::new_v4()),
            conversation_id: url
                .and_then(conversation_id_from_url)
                .unwrap_or_default(),
            content: prompt.to_string(),
            role: Role::User,
            model: "unknown".to_string(),
            timestamp: now_ms(),
            parent_message_provider_id: body
                .get("parent_message_uuid")
                .and_then(Value::as_str)
                .map(str::to_string),
            thinking_time: None,
        })
    }

    fn extract_assistant_message(&self, ctx: &CaptureContext, data: &Message) -> Option<Message> {
        let mut message = data.clone();
        if message.model.is_empty() || message.model == "unknown" {
            message.model = self.model_from_ui(ctx);
        }
        Some(message)
    }

    fn extract_conversation(&self, data: &Value) -> Option<Conversation> {
        let id = data.get("uuid").and_then(Value::as_str)?;
        Some(Conversation {
            provider_id: id.to_string(),
            title: data
                .get("name")
                .and_then(Value::as_str)
                .filter(|n| !n.trim().is_empty())
                .unwrap_or("Conversation")
                .to_string(),
            provider_name: "Claude".to_string(),
        })
    }

    fn extract_messages_from_conversation(&self, payload: &Value) -> Vec<Message> {
        let Some(entries) = payload.get("chat_messages").and_then(Value::as_array) else {
            return Vec::new();
        };
        let conversation_id = payload
            .get("uuid")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let mut indexed: Vec<(i64, Message)> = entries
            .iter()
            .filter_map(|entry| {
                let id = entry.get("uuid").and_then(Value::as_str)?;
                let role = match entry.get("sender").and_then(Value::as_str)? {
                    "human" => Role::User,
                    "assistant" => Role::Assistant,
                    _ => return None,
                };
                let message = Message {
                    message_id: id.to_string(),
                    conversation_id: conversation_id.to_string(),
                    content: entry.get("content").map(content_text).unwrap_or_default(),
                    role,
                    model: "unknown".to_string(),
                    timestamp: entry
                        .get("created_at")
                        .and_then(Value::as_str)
                        .and_then(timestamp_from_iso)
                        .unwrap_or_else(now_ms),
                    parent_message_provider_id: entry
                        .get("parent_message_uuid")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    thinking_time: None,
                };
                let index = entry.get("index").and_then(Value::as_i64).unwrap_or(i64::MAX);
                Some((index, message))
            })
            .collect();

        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, message)| message).collect()
    }

    fn handle_conversation_list(&self, payload: &Value) -> Vec<Conversation> {
        let Some(chats) = payload.as_array() else {
            return Vec::new();
        };
        chats
            .iter()
            .filter_map(|chat| self.extract_conversation(chat))
            .collect()
    }
}
