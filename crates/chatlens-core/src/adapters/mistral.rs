//! Mistral-like platform adapter.
//!
//! Responses stream as newline-delimited `key:value` token lines rather
//! than SSE, with the full text wrapped in a `safe...null` sentinel pair.
//! Request bodies carry the conversation and parent ids, which we seed
//! into the accumulator before the stream starts.

use chatlens_types::{now_ms, Conversation, Message, Role};
use serde_json::Value;
use tracing::debug;

use crate::accumulator::ResponseAccumulator;
use crate::config::PlatformConfig;
use crate::context::CaptureContext;
use crate::decoder::WireDialect;
use super::PlatformAdapter;

pub struct MistralAdapter {
    config: PlatformConfig,
}

impl MistralAdapter {
    pub fn new() -> Self {
        Self {
            config: PlatformConfig::mistral(),
        }
    }
}

impl Default for MistralAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Join content parts that arrive either as plain strings or as
/// `{text}` objects.
fn join_text_parts(parts: &[Value]) -> String {
    parts
        .iter()
        .map(|part| {
            part.as_str()
                .or_else(|| part.get("text").and_then(Value::as_str))
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Read a string field, preferring the first-turn wrapper over the
/// top-level body.
fn field(body: &Value, wrapper: Option<&Value>, key: &str) -> Option<String> {
    wrapper
        .and_then(|json| json.get(key))
        .and_then(Value::as_str)
        .or_else(|| body.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

fn user_message(
    body: &Value,
    wrapper: Option<&Value>,
    content: String,
    parent: Option<String>,
) -> Message {
    Message {
        message_id: field(body, wrapper, "messageId")
            .unwrap_or_else(|| format!("user-{}", uuid::Uuid::new_v4())),
        conversation_id: field(body, wrapper, "chatId").unwrap_or_default(),
        content,
        role: Role::User,
        model: field(body, wrapper, "model").unwrap_or_else(|| "mistral".to_string()),
        timestamp: now_ms(),
        parent_message_provider_id: parent,
        thinking_time: None,
    }
}

/// The token stream brackets the real text with literal `safe` and
/// `null` markers; strip them when both are present.
fn strip_sentinels(content: &str) -> &str {
    if content.len() >= 8 && content.starts_with("safe") && content.ends_with("null") {
        &content[4..content.len() - 4]
    } else {
        content
    }
}

impl PlatformAdapter for MistralAdapter {
    fn name(&self) -> &'static str {
        "mistral"
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }

    fn extract_user_message(
        &self,
        ctx: &CaptureContext,
        body: &Value,
        _url: Option<&str>,
    ) -> Option<Message> {
        // A "start" body carries a placeholder instead of the text; the
        // composer still holds it, and when even that is gone the message
        // goes out with empty content rather than being dropped.
        if body.get("mode").and_then(Value::as_str) == Some("start") {
            let content = ctx
                .host
                .query_text("div.select-text span")
                .ok()
                .flatten()
                .unwrap_or_default();
            return Some(user_message(body, None, content, Some("start".to_string())));
        }

        // The first message of a conversation wraps everything under an
        // index key; ids live inside the wrapper when present.
        if let Some(json) = body.get("0").and_then(|v| v.get("json")) {
            let content = json
                .get("content")
                .and_then(Value::as_array)
                .map(|parts| join_text_parts(parts))
                .unwrap_or_default();
            let parent = field(body, Some(json), "parentMessageId");
            return Some(user_message(body, Some(json), content, parent));
        }

        let content = match body.get("messageInput") {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Array(parts)) => join_text_parts(parts),
            _ => {
                debug!(target: "chatlens::adapter", "mistral request body shape not recognized");
                return None;
            }
        };
        let parent = field(body, None, "parentMessageId");
        Some(user_message(body, None, content, parent))
    }

    fn extract_assistant_message(&self, _ctx: &CaptureContext, data: &Message) -> Option<Message> {
        let mut message = data.clone();
        message.content = strip_sentinels(&message.content).to_string();
        if message.content.trim().is_empty() {
            return None;
        }
        if message.message_id.is_empty() {
            message.message_id = format!("mistral-{}", uuid::Uuid::new_v4());
        }
        if message.model.is_empty() || message.model == "unknown" {
            message.model = "mistral".to_string();
        }
        Some(message)
    }

    fn extract_conversation(&self, data: &Value) -> Option<Conversation> {
        // List payloads arrive wrapped under a "0" key with a json field.
        let inner = data
            .get("0")
            .and_then(|v| v.get("json"))
            .unwrap_or(data);
        let id = inner.get("chatId").or_else(|| inner.get("id")).and_then(Value::as_str)?;
        Some(Conversation {
            provider_id: id.to_string(),
            title: inner
                .get("title")
                .and_then(Value::as_str)
                .filter(|t| !t.trim().is_empty())
                .unwrap_or("Conversation")
                .to_string(),
            provider_name: "Mistral".to_string(),
        })
    }

    fn extract_messages_from_conversation(&self, payload: &Value) -> Vec<Message> {
        let inner = payload
            .get("0")
            .and_then(|v| v.get("json"))
            .unwrap_or(payload);
        let Some(entries) = inner.get("messages").and_then(Value::as_array) else {
            return Vec::new();
        };
        let conversation_id = inner
            .get("chatId")
            .and_then(Value::as_str)
            .unwrap_or_default();

        entries
            .iter()
            .filter_map(|entry| {
                let id = entry.get("id").and_then(Value::as_str)?;
                let role = match entry.get("role").and_then(Value::as_str)? {
                    "user" => Role::User,
                    "assistant" => Role::Assistant,
                    _ => return None,
                };
                let content = entry
                    .get("content")
                    .and_then(Value::as_str)
                    .map(strip_sentinels)
                    .unwrap_or_default()
                    .to_string();
                Some(Message {
                    message_id: id.to_string(),
                    conversation_id: conversation_id.to_string(),
                    content,
                    role,
                    model: "mistral".to_string(),
                    timestamp: now_ms(),
                    parent_message_provider_id: entry
                        .get("parentId")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    thinking_time: None,
                })
            })
            .collect()
    }

    /// Mistral streams never carry a message id, so the blanket id guard
    /// would drop every emission; only content matters here.
    fn handle_assistant_response(&self, ctx: &CaptureContext, data: &Message, is_complete: bool) {
        if data.content.is_empty() || !is_complete {
            return;
        }
        if let Some(message) = self.extract_assistant_message(ctx, data) {
            ctx.dispatcher.dispatch(chatlens_types::CaptureEvent::MessageExtracted {
                platform: self.name().to_string(),
                message,
            });
        }
    }

    fn stream_dialect(&self) -> Option<WireDialect> {
        Some(WireDialect::TokenLines)
    }

    fn seed_response(&self, accumulator: &mut ResponseAccumulator, request_body: &Value) {
        if let Some(chat_id) = request_body.get("chatId").and_then(Value::as_str) {
            accumulator.set_conversation_id(chat_id.to_string());
        }
        if let Some(parent) = request_body.get("parentMessageId").and_then(Value::as_str) {
            accumulator.set_parent_message_id(parent.to_string());
        }
    }
}
