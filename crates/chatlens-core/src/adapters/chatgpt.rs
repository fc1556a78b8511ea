//! ChatGPT-like platform adapter.
//!
//! Completion responses stream as SSE blocks carrying the operation-tagged
//! payloads the accumulator understands natively (message-add, append,
//! patch, `message_stream_complete`, `[DONE]`). Conversation payloads are
//! a `mapping` tree keyed by message id.

use chatlens_types::{now_ms, Conversation, Message, Role};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::config::PlatformConfig;
use crate::context::CaptureContext;
use crate::decoder::WireDialect;
use super::PlatformAdapter;

static MODEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(GPT-\d+(\.\d+)?)").expect("static regex"));

/// Nodes the mapping tree contains that are not real messages.
const ROOT_NODE_ID: &str = "client-created-root";

pub struct ChatGptAdapter {
    config: PlatformConfig,
}

impl ChatGptAdapter {
    pub fn new() -> Self {
        Self {
            config: PlatformConfig::chatgpt(),
        }
    }

    /// Read the model name off the model picker, lowercase slug or
    /// "unknown".
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
            .map(|m| m.as_str().to_lowercase())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

impl Default for ChatGptAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Message text arrives either as a `parts` array or a plain string.
fn content_text(content: &Value) -> String {
    if let Some(parts) = content.get("parts").and_then(Value::as_array) {
        parts
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    } else if let Some(text) = content.as_str() {
        text.to_string()
    } else {
        String::new()
    }
}

impl PlatformAdapter for ChatGptAdapter {
    fn name(&self) -> &'static str {
        "chatgpt"
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }

    fn extract_user_message(
        &self,
        _ctx: &CaptureContext,
        body: &Value,
        _url: Option<&str>,
    ) -> Option<Message> {
        let messages = body.get("messages")?.as_array()?;
        let message = messages.iter().find(|m| {
            m.pointer("/author/role").and_then(Value::as_str) == Some("user")
                || m.get("role").and_then(Value::as_str) == Some("user")
        })?;

        let content = message.get("content").map(content_text).unwrap_or_default();

        Some(Message {
            message_id: message
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("user-{}", uuid::Uuid::new_v4())),
            conversation_id: body
                .get("conversation_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            content,
            role: Role::User,
            model: body
                .get("model")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            timestamp: message
                .get("create_time")
                .and_then(Value::as_f64)
                .map(|t| (t * 1000.0) as u64)
                .unwrap_or_else(now_ms),
            parent_message_provider_id: body
                .get("parent_message_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            thinking_time: None,
        })
    }

    fn extract_assistant_message(&self, ctx: &CaptureContext, data: &Message) -> Option<Message> {
        let mut message = data.clone();
        if message.model.is_empty() {
            message.model = self.model_from_ui(ctx);
        }
        Some(message)
    }

    fn extract_conversation(&self, data: &Value) -> Option<Conversation> {
        let id = data.get("conversation_id").and_then(Value::as_str)?;
        Some(Conversation {
            provider_id: id.to_string(),
            title: data
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or("Conversation")
                .to_string(),
            provider_name: "ChatGPT".to_string(),
        })
    }

    fn extract_messages_from_conversation(&self, payload: &Value) -> Vec<Message> {
        let Some(mapping) = payload.get("mapping").and_then(Value::as_object) else {
            return Vec::new();
        };
        let conversation_id = payload
            .get("conversation_id")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let mut messages: Vec<Message> = Vec::new();
        for (message_id, node) in mapping {
            if message_id == ROOT_NODE_ID {
                continue;
            }
            let Some(role) = node.pointer("/message/author/role").and_then(Value::as_str) else {
                continue;
            };
            let role = match role {
                "user" => Role::User,
                "assistant" => Role::Assistant,
                _ => continue,
            };

            let content = match node.pointer("/message/content/content_type").and_then(Value::as_str)
            {
                Some("text") => node
                    .pointer("/message/content")
                    .map(content_text)
                    .unwrap_or_default(),
                _ => String::new(),
            };

            messages.push(Message {
                message_id: message_id.clone(),
                conversation_id: conversation_id.to_string(),
                content,
                role,
                model: node
                    .pointer("/message/metadata/model_slug")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                timestamp: node
                    .pointer("/message/create_time")
                    .and_then(Value::as_f64)
                    .map(|t| (t * 1000.0) as u64)
                    .unwrap_or_else(now_ms),
                parent_message_provider_id: node
                    .get("parent")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                thinking_time: None,
            });
        }

        messages.sort_by_key(|m| m.timestamp);
        messages
    }

    fn handle_conversation_list(&self, payload: &Value) -> Vec<Conversation> {
        let Some(items) = payload.get("items").and_then(Value::as_array) else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|chat| {
                let id = chat.get("id").and_then(Value::as_str)?;
                if id.trim().is_empty() {
                    return None;
                }
                Some(Conversation {
                    provider_id: id.to_string(),
                    title: chat
                        .get("title")
                        .and_then(Value::as_str)
                        .unwrap_or("Unnamed Conversation")
                        .to_string(),
                    provider_name: "ChatGPT".to_string(),
                })
            })
            .collect()
    }

    fn stream_dialect(&self) -> Option<WireDialect> {
        Some(WireDialect::SseBlocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> CaptureContext {
        CaptureContext::headless()
    }

    #[test]
    fn test_extract_user_message_from_parts() {
        let adapter = ChatGptAdapter::new();
        let body = json!({
            "messages": [{
                "id": "u1",
                "author": {"role": "user"},
                "content": {"content_type": "text", "parts": ["first", "second"]},
                "create_time": 1700000000.5
            }],
            "conversation_id": "conv-1",
            "model": "gpt-4o",
            "parent_message_id": "p1"
        });

        let msg = adapter.extract_user_message(&ctx(), &body, None).unwrap();
        assert_eq!(msg.message_id, "u1");
        assert_eq!(msg.content, "first\nsecond");
        assert_eq!(msg.conversation_id, "conv-1");
        assert_eq!(msg.model, "gpt-4o");
        assert_eq!(msg.timestamp, 1_700_000_000_500);
        assert_eq!(msg.parent_message_provider_id.as_deref(), Some("p1"));
    }

    #[test]
    fn test_extract_user_message_plain_string_content() {
        let adapter = ChatGptAdapter::new();
        let body = json!({
            "messages": [{"role": "user", "content": "plain text"}]
        });
        let msg = adapter.extract_user_message(&ctx(), &body, None).unwrap();
        assert_eq!(msg.content, "plain text");
        assert!(msg.message_id.starts_with("user-"));
    }

    #[test]
    fn test_extract_user_message_none_without_user_entry() {
        let adapter = ChatGptAdapter::new();
        let body = json!({"messages": [{"author": {"role": "system"}}]});
        assert!(adapter.extract_user_message(&ctx(), &body, None).is_none());
        assert!(adapter.extract_user_message(&ctx(), &json!({}), None).is_none());
    }

    #[test]
    fn test_conversation_mapping_sorted_by_create_time() {
        let adapter = ChatGptAdapter::new();
        let payload = json!({
            "conversation_id": "conv-1",
            "title": "Test",
            "mapping": {
                "client-created-root": {},
                "m2": {
                    "parent": "m1",
                    "message": {
                        "author": {"role": "assistant"},
                        "content": {"content_type": "text", "parts": ["reply"]},
                        "create_time": 200.0,
                        "metadata": {"model_slug": "gpt-4o"}
                    }
                },
                "m1": {
                    "message": {
                        "author": {"role": "user"},
                        "content": {"content_type": "text", "parts": ["question"]},
                        "create_time": 100.0
                    }
                },
                "sys": {
                    "message": {
                        "author": {"role": "system"},
                        "content": {"content_type": "text", "parts": ["ignored"]},
                        "create_time": 50.0
                    }
                }
            }
        });

        let messages = adapter.extract_messages_from_conversation(&payload);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].message_id, "m1");
        assert_eq!(messages[1].message_id, "m2");
        assert_eq!(messages[1].model, "gpt-4o");
        assert_eq!(messages[1].parent_message_provider_id.as_deref(), Some("m1"));

        // deterministic: same payload, same order
        assert_eq!(adapter.extract_messages_from_conversation(&payload), messages);
    }

    #[test]
    fn test_conversation_list_filters_blank_ids() {
        let adapter = ChatGptAdapter::new();
        let payload = json!({
            "items": [
                {"id": "c1", "title": "First"},
                {"id": "  ", "title": "Blank"},
                {"title": "No id"}
            ]
        });
        let chats = adapter.handle_conversation_list(&payload);
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].provider_id, "c1");
    }

    #[test]
    fn test_streams_sse() {
        let adapter = ChatGptAdapter::new();
        assert!(adapter.supports_streaming());
        assert_eq!(adapter.stream_dialect(), Some(WireDialect::SseBlocks));
    }
}
