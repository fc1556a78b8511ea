//! Per-response accumulation state machine.
//!
//! One accumulator owns the reconstruction of a single in-flight response:
//! it consumes [`FramedEvent`]s, tracks the ordered list of thinking steps,
//! mirrors assistant-authored text into the draft, and emits normalized
//! messages through the dispatcher. Payload schemas differ per platform and
//! per protocol revision, so events are classified by shape, not by a fixed
//! type: each recognized shape becomes a [`StreamOp`] variant and one match
//! dispatches it.

use chatlens_types::{now_ms, CaptureEvent, Message, Role};
use serde_json::Value;
use tracing::{debug, trace};

use crate::decoder::FramedEvent;
use crate::dispatcher::EventDispatcher;

/// Emit a non-final progress snapshot each time accumulated content
/// crosses another multiple of this many characters.
const PROGRESS_CADENCE: usize = 500;

/// Lifecycle of one in-flight response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccumulatorState {
    /// No frame seen yet
    Empty,
    /// Reconstructing steps and draft content
    Accumulating,
    /// Terminal; later completion signals are swallowed
    Complete,
}

/// An intermediate reasoning/tool-authored segment of a response.
///
/// Steps are append-only and ordered; a step's content only grows until it
/// is superseded by the next message-add or the stream completes.
#[derive(Debug, Clone)]
pub struct ThinkingStep {
    pub id: String,
    pub role: String,
    pub content: String,
    /// Platform-reported creation time, seconds since epoch
    pub create_time: Option<f64>,
    pub parent_message_id: Option<String>,
    pub initial_text: String,
    pub finished_text: String,
}

/// Mutable draft of the assistant reply being reconstructed.
#[derive(Debug, Default)]
struct AssistantDraft {
    message_id: Option<String>,
    conversation_id: Option<String>,
    model: Option<String>,
    content: String,
    is_complete: bool,
    create_time: Option<f64>,
    parent_message_id: Option<String>,
    /// Index into the steps list of the step currently receiving deltas
    current_step: Option<usize>,
}

/// Recognized payload shapes, discriminated before dispatch.
#[derive(Debug)]
enum StreamOp<'a> {
    /// Explicit end-of-response marker, highest priority
    StreamComplete { conversation_id: Option<&'a str> },
    /// A new message object opened (thinking step or final answer)
    MessageAdd(&'a Value),
    /// Content delta targeting the current step's content path
    Append(&'a str),
    /// String delta with no operation tag (dialect compatibility path)
    BareDelta(&'a str),
    /// Batch of sub-operations
    Patch(&'a [Value]),
    /// Anything else; ignored
    Unknown,
}

const CONTENT_PATH: &str = "/message/content/parts/0";

fn classify(payload: &Value) -> StreamOp<'_> {
    if payload.get("type").and_then(Value::as_str) == Some("message_stream_complete") {
        return StreamOp::StreamComplete {
            conversation_id: payload.get("conversation_id").and_then(Value::as_str),
        };
    }
    if payload.pointer("/v/message").is_some() {
        return StreamOp::MessageAdd(&payload["v"]);
    }
    let op = payload.get("o").and_then(Value::as_str);
    if op == Some("append") && payload.get("p").and_then(Value::as_str) == Some(CONTENT_PATH) {
        if let Some(delta) = payload.get("v").and_then(Value::as_str) {
            return StreamOp::Append(delta);
        }
    }
    if op.is_none() {
        if let Some(delta) = payload.get("v").and_then(Value::as_str) {
            return StreamOp::BareDelta(delta);
        }
    }
    if op == Some("patch") {
        if let Some(ops) = payload.get("v").and_then(Value::as_array) {
            return StreamOp::Patch(ops);
        }
    }
    StreamOp::Unknown
}

/// Reconstructs one response from framed events.
///
/// Owns a draft plus the ordered thinking steps; every emission goes
/// through the dispatcher as an `assistant-response` event.
pub struct ResponseAccumulator {
    platform: String,
    state: AccumulatorState,
    draft: AssistantDraft,
    steps: Vec<ThinkingStep>,
    emitted_final: bool,
    progress_bucket: usize,
    dispatcher: EventDispatcher,
}

impl ResponseAccumulator {
    pub fn new(platform: impl Into<String>, dispatcher: EventDispatcher) -> Self {
        Self {
            platform: platform.into(),
            state: AccumulatorState::Empty,
            draft: AssistantDraft::default(),
            steps: Vec::new(),
            emitted_final: false,
            progress_bucket: 0,
            dispatcher,
        }
    }

    /// Seed the conversation id from the intercepted request body.
    pub fn set_conversation_id(&mut self, id: impl Into<String>) {
        self.draft.conversation_id = Some(id.into());
    }

    /// Seed the parent message id from the intercepted request body.
    pub fn set_parent_message_id(&mut self, id: impl Into<String>) {
        self.draft.parent_message_id = Some(id.into());
    }

    /// Accumulated assistant content so far.
    pub fn content(&self) -> &str {
        &self.draft.content
    }

    /// Whether a completion signal was observed (or salvage forced one).
    pub fn is_complete(&self) -> bool {
        self.draft.is_complete
    }

    /// Ordered thinking steps reconstructed so far.
    pub fn steps(&self) -> &[ThinkingStep] {
        &self.steps
    }

    /// Consume one framed event.
    pub fn handle(&mut self, frame: FramedEvent) {
        match frame {
            FramedEvent::Json { payload, .. } => {
                self.apply_payload(&payload);
                self.maybe_emit_progress();
            }
            FramedEvent::Delta(delta) => {
                self.apply_bare_delta(&delta);
                self.maybe_emit_progress();
            }
            FramedEvent::Done => self.on_done(),
        }
    }

    /// Transport ended; salvage whatever accumulated.
    ///
    /// A stream that ends without any completion signal but with non-empty
    /// content is force-completed and emitted rather than silently dropped.
    /// Aborted readers land here too, so a cancelled response still yields
    /// its partial text.
    pub fn finish(&mut self) {
        if self.emitted_final || self.draft.content.is_empty() {
            return;
        }
        debug!(
            target: "chatlens::accumulator",
            "Salvaging {} chars without completion signal", self.draft.content.len()
        );
        self.draft.is_complete = true;
        self.state = AccumulatorState::Complete;
        self.emit_final();
    }

    fn apply_payload(&mut self, payload: &Value) {
        match classify(payload) {
            StreamOp::StreamComplete { conversation_id } => {
                if self.state == AccumulatorState::Complete {
                    return;
                }
                self.draft.is_complete = true;
                if let Some(id) = conversation_id {
                    self.draft.conversation_id = Some(id.to_string());
                }
                self.state = AccumulatorState::Complete;
                // The explicit marker wins over every other heuristic
                if self.draft.message_id.is_some() && !self.draft.content.is_empty() {
                    self.emit_final();
                }
            }
            StreamOp::MessageAdd(envelope) => self.open_step(envelope),
            StreamOp::Append(delta) => self.apply_append(delta),
            StreamOp::BareDelta(delta) => self.apply_bare_delta(delta),
            StreamOp::Patch(ops) => self.apply_patch(ops),
            StreamOp::Unknown => {
                trace!(target: "chatlens::accumulator", "Unhandled payload shape");
            }
        }
    }

    /// A message object opened: start a new thinking step and point the
    /// cursor at it.
    fn open_step(&mut self, envelope: &Value) {
        let message = &envelope["message"];
        self.state = AccumulatorState::Accumulating;

        if let Some(id) = message.get("id").and_then(Value::as_str) {
            self.draft.message_id = Some(id.to_string());
        }
        if let Some(id) = envelope.get("conversation_id").and_then(Value::as_str) {
            self.draft.conversation_id = Some(id.to_string());
        }
        if let Some(slug) = message.pointer("/metadata/model_slug").and_then(Value::as_str) {
            self.draft.model = Some(slug.to_string());
        }
        if let Some(t) = message.get("create_time").and_then(Value::as_f64) {
            self.draft.create_time = Some(t);
        }
        if let Some(parent) = message.pointer("/metadata/parent_id").and_then(Value::as_str) {
            self.draft.parent_message_id = Some(parent.to_string());
        }

        let role = message
            .pointer("/author/role")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        self.steps.push(ThinkingStep {
            id: message
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            role: role.clone(),
            content: String::new(),
            create_time: message.get("create_time").and_then(Value::as_f64),
            parent_message_id: message
                .pointer("/metadata/parent_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            initial_text: message
                .pointer("/metadata/initial_text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            finished_text: message
                .pointer("/metadata/finished_text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
        self.draft.current_step = Some(self.steps.len() - 1);

        // The final answer starts fresh; earlier step text stays in steps
        if role == "assistant" {
            self.draft.content.clear();
        }
    }

    fn apply_append(&mut self, delta: &str) {
        let Some(idx) = self.draft.current_step else {
            return;
        };
        let Some(step) = self.steps.get_mut(idx) else {
            return;
        };
        step.content.push_str(delta);
        if step.role == "assistant" {
            self.draft.content.push_str(delta);
        }
    }

    /// Bare deltas carry no operation tag. Dialects that stream this way
    /// never send a message-add either, so the first delta opens an
    /// implicit assistant step.
    fn apply_bare_delta(&mut self, delta: &str) {
        if self.draft.current_step.is_none() {
            self.state = AccumulatorState::Accumulating;
            self.steps.push(ThinkingStep {
                id: format!("step-{}", uuid::Uuid::new_v4()),
                role: "assistant".to_string(),
                content: String::new(),
                create_time: None,
                parent_message_id: None,
                initial_text: String::new(),
                finished_text: String::new(),
            });
            self.draft.current_step = Some(self.steps.len() - 1);
        }
        self.apply_append(delta);
    }

    fn apply_patch(&mut self, ops: &[Value]) {
        for op in ops {
            let path = op.get("p").and_then(Value::as_str);
            match path {
                // Step finished: bookkeeping only, the response may go on
                Some("/message/status") => {}
                Some("/message/metadata/finished_text") => {
                    if let (Some(idx), Some(text)) = (
                        self.draft.current_step,
                        op.get("v").and_then(Value::as_str),
                    ) {
                        if let Some(step) = self.steps.get_mut(idx) {
                            step.finished_text = text.to_string();
                        }
                    }
                }
                Some(CONTENT_PATH) => {
                    if op.get("o").and_then(Value::as_str) == Some("append") {
                        if let Some(delta) = op.get("v").and_then(Value::as_str) {
                            self.apply_append(delta);
                        }
                    }
                }
                // Unknown sub-ops are ignored
                _ => {}
            }
        }
        // Some responses finish with only non-assistant steps carrying
        // content; surface the last step's text rather than nothing
        if self.draft.content.is_empty() {
            if let Some(last) = self.steps.last() {
                self.draft.content = last.content.clone();
            }
        }
    }

    /// Literal done sentinel from either dialect.
    fn on_done(&mut self) {
        if self.state == AccumulatorState::Complete {
            return;
        }
        // Some platforms send a trailing done before any content; ignore it
        if self.draft.content.is_empty() {
            trace!(target: "chatlens::accumulator", "Done sentinel with no content, ignoring");
            return;
        }
        self.draft.is_complete = true;
        self.state = AccumulatorState::Complete;
        self.emit_final();
    }

    fn maybe_emit_progress(&mut self) {
        if self.emitted_final || self.draft.message_id.is_none() {
            return;
        }
        let bucket = self.draft.content.len() / PROGRESS_CADENCE;
        if bucket > self.progress_bucket && !self.draft.content.is_empty() {
            self.progress_bucket = bucket;
            let message = self.snapshot();
            self.dispatcher.dispatch(CaptureEvent::AssistantResponse {
                platform: self.platform.clone(),
                message,
                is_complete: false,
            });
        }
    }

    fn emit_final(&mut self) {
        if self.emitted_final {
            return;
        }
        self.emitted_final = true;
        let message = self.snapshot();
        self.dispatcher.dispatch(CaptureEvent::AssistantResponse {
            platform: self.platform.clone(),
            message,
            is_complete: true,
        });
    }

    fn snapshot(&self) -> Message {
        Message {
            message_id: self.draft.message_id.clone().unwrap_or_default(),
            conversation_id: self.draft.conversation_id.clone().unwrap_or_default(),
            content: self.draft.content.clone(),
            role: Role::Assistant,
            model: self.draft.model.clone().unwrap_or_default(),
            timestamp: self
                .draft
                .create_time
                .map(|t| (t * 1000.0) as u64)
                .unwrap_or_else(now_ms),
            parent_message_provider_id: self.draft.parent_message_id.clone(),
            thinking_time: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(payload: Value) -> FramedEvent {
        FramedEvent::Json {
            event: None,
            payload,
        }
    }

    fn message_add(id: &str, role: &str) -> FramedEvent {
        frame(json!({
            "v": {
                "message": {
                    "id": id,
                    "author": {"role": role},
                    "create_time": 1700000000.0,
                    "metadata": {"model_slug": "gpt-4o"}
                },
                "conversation_id": "conv-1"
            }
        }))
    }

    fn append(delta: &str) -> FramedEvent {
        frame(json!({"o": "append", "p": "/message/content/parts/0", "v": delta}))
    }

    fn harness() -> (ResponseAccumulator, tokio::sync::broadcast::Receiver<CaptureEvent>) {
        let dispatcher = EventDispatcher::new();
        let rx = dispatcher.subscribe();
        (ResponseAccumulator::new("chatgpt", dispatcher), rx)
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<CaptureEvent>) -> Vec<CaptureEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[test]
    fn test_add_append_done_emits_once() {
        let (mut acc, mut rx) = harness();
        acc.handle(message_add("m1", "assistant"));
        acc.handle(append("Hello"));
        acc.handle(FramedEvent::Done);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            CaptureEvent::AssistantResponse {
                message,
                is_complete,
                platform,
            } => {
                assert_eq!(message.message_id, "m1");
                assert_eq!(message.content, "Hello");
                assert_eq!(message.conversation_id, "conv-1");
                assert_eq!(message.model, "gpt-4o");
                assert!(is_complete);
                assert_eq!(platform, "chatgpt");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_done_with_no_content_emits_nothing() {
        let (mut acc, mut rx) = harness();
        acc.handle(message_add("m1", "assistant"));
        acc.handle(FramedEvent::Done);
        assert!(drain(&mut rx).is_empty());
        // and the stream may keep going afterwards
        acc.handle(append("late"));
        assert_eq!(acc.content(), "late");
    }

    #[test]
    fn test_tool_step_content_not_mirrored_into_draft() {
        let (mut acc, mut rx) = harness();
        acc.handle(message_add("t1", "tool"));
        acc.handle(append("thinking..."));
        assert_eq!(acc.content(), "");
        assert_eq!(acc.steps()[0].content, "thinking...");

        acc.handle(message_add("m1", "assistant"));
        acc.handle(append("Answer"));
        assert_eq!(acc.content(), "Answer");
        assert_eq!(acc.steps().len(), 2);

        acc.handle(FramedEvent::Done);
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            CaptureEvent::AssistantResponse { message, .. } => {
                assert_eq!(message.content, "Answer");
                assert_eq!(message.message_id, "m1");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_patch_finished_text_and_append() {
        let (mut acc, _rx) = harness();
        acc.handle(message_add("t1", "tool"));
        acc.handle(frame(json!({
            "o": "patch",
            "v": [
                {"p": "/message/status", "v": "finished_successfully"},
                {"p": "/message/metadata/finished_text", "v": "Thought for 12s"},
                {"p": "/message/content/parts/0", "o": "append", "v": "step text"},
                {"p": "/message/never/seen", "o": "replace", "v": "ignored"}
            ]
        })));
        assert_eq!(acc.steps()[0].finished_text, "Thought for 12s");
        assert_eq!(acc.steps()[0].content, "step text");
        // assistant content was empty, so the last step's content backfills
        assert_eq!(acc.content(), "step text");
    }

    #[test]
    fn test_bare_delta_opens_implicit_assistant_step() {
        let (mut acc, mut rx) = harness();
        acc.handle(FramedEvent::Delta("Hel".into()));
        acc.handle(FramedEvent::Delta("lo".into()));
        assert_eq!(acc.content(), "Hello");
        assert_eq!(acc.steps().len(), 1);
        assert_eq!(acc.steps()[0].role, "assistant");

        acc.handle(FramedEvent::Done);
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_untagged_string_payload_appends() {
        let (mut acc, _rx) = harness();
        acc.handle(message_add("m1", "assistant"));
        acc.handle(frame(json!({"v": "compat delta"})));
        assert_eq!(acc.content(), "compat delta");
    }

    #[test]
    fn test_stream_complete_marker_takes_priority() {
        let (mut acc, mut rx) = harness();
        acc.handle(message_add("m1", "assistant"));
        acc.handle(append("Hi"));
        acc.handle(frame(json!({
            "type": "message_stream_complete",
            "conversation_id": "conv-9"
        })));

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            CaptureEvent::AssistantResponse {
                message,
                is_complete,
                ..
            } => {
                assert!(is_complete);
                assert_eq!(message.conversation_id, "conv-9");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_double_completion_emits_once() {
        let (mut acc, mut rx) = harness();
        acc.handle(message_add("m1", "assistant"));
        acc.handle(append("Hi"));
        acc.handle(frame(json!({"type": "message_stream_complete"})));
        acc.handle(FramedEvent::Done);
        acc.finish();
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_salvage_on_unterminated_stream() {
        let (mut acc, mut rx) = harness();
        acc.handle(message_add("m1", "assistant"));
        acc.handle(append("partial answer"));
        acc.finish();

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            CaptureEvent::AssistantResponse {
                message,
                is_complete,
                ..
            } => {
                assert!(is_complete);
                assert_eq!(message.content, "partial answer");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        // finishing again must not emit again
        acc.finish();
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_finish_with_no_content_is_silent() {
        let (mut acc, mut rx) = harness();
        acc.handle(message_add("m1", "assistant"));
        acc.finish();
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_progress_snapshot_cadence() {
        let (mut acc, mut rx) = harness();
        acc.handle(message_add("m1", "assistant"));
        // 520 chars in uneven deltas; exactly one snapshot near 500
        for delta in ["a".repeat(260), "b".repeat(130), "c".repeat(130)] {
            acc.handle(append(&delta));
        }
        acc.finish();

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        match &events[0] {
            CaptureEvent::AssistantResponse { is_complete, message, .. } => {
                assert!(!is_complete);
                assert!(message.content.len() >= 500);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match &events[1] {
            CaptureEvent::AssistantResponse { is_complete, message, .. } => {
                assert!(is_complete);
                assert_eq!(message.content.len(), 520);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_seeded_ids_survive_to_emission() {
        let dispatcher = EventDispatcher::new();
        let mut rx = dispatcher.subscribe();
        let mut acc = ResponseAccumulator::new("mistral", dispatcher);
        acc.set_conversation_id("chat-42");
        acc.set_parent_message_id("parent-1");

        acc.handle(FramedEvent::Delta("Bonjour".into()));
        acc.handle(FramedEvent::Done);

        match rx.try_recv().unwrap() {
            CaptureEvent::AssistantResponse { message, .. } => {
                assert_eq!(message.conversation_id, "chat-42");
                assert_eq!(message.parent_message_provider_id.as_deref(), Some("parent-1"));
                assert_eq!(message.content, "Bonjour");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
