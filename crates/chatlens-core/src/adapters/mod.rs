//! Per-platform adapters.
//!
//! One adapter per platform implements the shared capability set against
//! that platform's request/response shapes. Extraction functions never
//! fail loudly: a shape mismatch yields `None` (or an empty list) and the
//! caller emits nothing. DOM-dependent operations degrade to a safe
//! default through the [`ComposerHost`](crate::host::ComposerHost) seam.

mod chatgpt;
mod claude;
mod copilot;
mod mistral;

pub use chatgpt::ChatGptAdapter;
pub use claude::ClaudeAdapter;
pub use copilot::CopilotAdapter;
pub use mistral::MistralAdapter;

use chatlens_types::{CaptureEvent, Conversation, Message};
use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};

use crate::accumulator::ResponseAccumulator;
use crate::config::PlatformConfig;
use crate::context::CaptureContext;
use crate::decoder::{StreamDecoder, WireDialect};
use crate::host::insert_with_fallbacks;
use crate::Result;

/// The per-platform capability set.
///
/// Held behind `Arc<dyn PlatformAdapter>` in the registry. Streaming
/// platforms advertise a [`WireDialect`]; the shared pull loop in
/// [`process_streaming_response`] does the rest.
pub trait PlatformAdapter: Send + Sync {
    fn name(&self) -> &'static str;
    fn config(&self) -> &PlatformConfig;

    /// Normalize the user message out of an intercepted completion request.
    ///
    /// Tolerates the platform's assorted body shapes; the URL is consulted
    /// when the conversation id lives only there. `None` means the body
    /// carried nothing extractable.
    fn extract_user_message(
        &self,
        ctx: &CaptureContext,
        body: &Value,
        url: Option<&str>,
    ) -> Option<Message>;

    /// Clean up the accumulator's terminal output for this platform
    /// (wrapper sentinels, missing ids, model defaults).
    fn extract_assistant_message(&self, ctx: &CaptureContext, data: &Message) -> Option<Message>;

    /// Normalize a conversation descriptor from a fetched payload.
    fn extract_conversation(&self, data: &Value) -> Option<Conversation>;

    /// Normalize every message in a fetched conversation payload, ordered
    /// by the platform's native ordering key. Pure; same payload, same
    /// output.
    fn extract_messages_from_conversation(&self, payload: &Value) -> Vec<Message>;

    /// An intercepted completion request: extract and publish the user
    /// message.
    fn handle_chat_completion(&self, ctx: &CaptureContext, body: &Value, url: Option<&str>) {
        if let Some(message) = self.extract_user_message(ctx, body, url) {
            ctx.dispatcher.dispatch(CaptureEvent::MessageExtracted {
                platform: self.name().to_string(),
                message,
            });
        }
    }

    /// A reconstructed assistant response: publish it once complete.
    fn handle_assistant_response(&self, ctx: &CaptureContext, data: &Message, is_complete: bool) {
        if data.message_id.is_empty() || data.content.is_empty() {
            return;
        }
        if !is_complete {
            return;
        }
        if let Some(message) = self.extract_assistant_message(ctx, data) {
            ctx.dispatcher.dispatch(CaptureEvent::MessageExtracted {
                platform: self.name().to_string(),
                message,
            });
        }
    }

    /// Normalize a fetched conversation list.
    ///
    /// Persistence is the embedder's concern; the adapter only returns the
    /// well-formed descriptors.
    fn handle_conversation_list(&self, payload: &Value) -> Vec<Conversation> {
        let _ = payload;
        Vec::new()
    }

    /// A fetched full-conversation payload: normalize and publish it.
    fn handle_specific_conversation(&self, ctx: &CaptureContext, payload: &Value) {
        let Some(conversation) = self.extract_conversation(payload) else {
            debug!(target: "chatlens::adapter", platform = self.name(), "Conversation payload not recognized");
            return;
        };
        let messages = self.extract_messages_from_conversation(payload);
        if messages.is_empty() {
            return;
        }
        ctx.dispatcher.dispatch(CaptureEvent::ConversationLoaded {
            conversation,
            messages,
        });
    }

    /// Write content into this platform's composer. Never throws; `false`
    /// means every insertion strategy failed.
    fn insert_prompt(&self, ctx: &CaptureContext, content: &str) -> bool {
        if content.is_empty() {
            warn!(target: "chatlens::adapter", platform = self.name(), "No content to insert");
            return false;
        }
        insert_with_fallbacks(ctx.host.as_ref(), self.config().composer_selector, content)
    }

    /// Whether completion responses on this platform stream through the
    /// decoder. Non-streaming platforms derive messages from the fetched
    /// conversation payload instead.
    fn supports_streaming(&self) -> bool {
        self.stream_dialect().is_some()
    }

    /// Wire framing of this platform's completion endpoint, if it streams.
    fn stream_dialect(&self) -> Option<WireDialect> {
        None
    }

    /// Seed the accumulator from the intercepted request body before the
    /// first chunk arrives.
    fn seed_response(&self, accumulator: &mut ResponseAccumulator, request_body: &Value) {
        let _ = (accumulator, request_body);
    }
}

/// Drive one in-flight streaming response to completion.
///
/// The pull loop suspends only at chunk boundaries; between suspensions
/// all mutation is synchronous on this response's own decoder +
/// accumulator pair, so concurrent streams need no locks. Reader end or
/// abort triggers the salvage policy: accumulated content is emitted, not
/// discarded. A transport error attempts the same salvage before
/// propagating.
pub async fn process_streaming_response<S>(
    adapter: &dyn PlatformAdapter,
    ctx: &CaptureContext,
    request_body: &Value,
    mut chunks: S,
) -> Result<()>
where
    S: Stream<Item = Result<String>> + Unpin,
{
    let Some(dialect) = adapter.stream_dialect() else {
        return Ok(());
    };

    let mut decoder = StreamDecoder::new(dialect);
    let mut accumulator = ResponseAccumulator::new(adapter.name(), ctx.dispatcher.clone());
    adapter.seed_response(&mut accumulator, request_body);

    while let Some(chunk) = chunks.next().await {
        match chunk {
            Ok(chunk) => {
                for frame in decoder.feed(&chunk) {
                    accumulator.handle(frame);
                }
            }
            Err(e) => {
                warn!(target: "chatlens::adapter", platform = adapter.name(), "Stream failed mid-response: {}", e);
                accumulator.finish();
                return Err(e);
            }
        }
    }

    accumulator.finish();
    Ok(())
}

/// Lenient parse of an intercepted request body.
///
/// Anything that does not look like a JSON object yields `None`; request
/// bodies come in as opaque text and are frequently not ours to read.
pub fn parse_request_body(body: &str) -> Option<Value> {
    let trimmed = body.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(target: "chatlens::adapter", "Unparseable request body: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_request_body_object() {
        let body = parse_request_body(" {\"chatId\": \"c1\"} ").unwrap();
        assert_eq!(body, json!({"chatId": "c1"}));
    }

    #[test]
    fn test_parse_request_body_rejects_non_objects() {
        assert!(parse_request_body("chatId=c1&mode=start").is_none());
        assert!(parse_request_body("[1,2,3]").is_none());
        assert!(parse_request_body("{broken").is_none());
        assert!(parse_request_body("").is_none());
    }

    #[tokio::test]
    async fn test_non_streaming_adapter_ignores_stream() {
        let ctx = CaptureContext::headless();
        let mut rx = ctx.subscribe();
        let adapter = ClaudeAdapter::new();
        let chunks = futures::stream::iter(vec![Ok("data: {\"v\":\"x\"}\n\n".to_string())]);
        process_streaming_response(&adapter, &ctx, &json!({}), chunks)
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
    }
}
