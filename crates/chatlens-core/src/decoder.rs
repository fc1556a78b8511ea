//! Incremental frame decoding for platform streaming responses.
//!
//! Network chunk boundaries never line up with frame boundaries, so the
//! decoder keeps any trailing partial frame buffered between `feed` calls.
//! Parsing is best-effort per frame: one malformed payload is skipped, the
//! rest of the stream keeps decoding.

use serde_json::Value;
use tracing::debug;

/// Wire framing used by a platform's completion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireDialect {
    /// SSE-style blocks separated by a blank line: an optional `event:`
    /// line plus a mandatory `data:` line carrying JSON or `[DONE]`.
    SseBlocks,
    /// Newline-delimited `key:value` token lines, values optionally
    /// JSON-quoted; a line ending in a literal `:null` closes the segment.
    TokenLines,
}

/// One decoded unit extracted from buffered stream text.
#[derive(Debug, Clone, PartialEq)]
pub enum FramedEvent {
    /// A JSON payload, with the SSE event tag when one was present.
    Json {
        event: Option<String>,
        payload: Value,
    },
    /// A bare content token with no operation attached.
    Delta(String),
    /// Literal end-of-stream sentinel (`[DONE]`, or a `:null` line).
    Done,
}

/// Turns raw text chunks into framed events.
///
/// Stateful per response instance; never share one decoder between
/// concurrent streams.
#[derive(Debug)]
pub struct StreamDecoder {
    dialect: WireDialect,
    buffer: String,
}

impl StreamDecoder {
    /// Create a decoder for one in-flight response.
    pub fn new(dialect: WireDialect) -> Self {
        Self {
            dialect,
            buffer: String::new(),
        }
    }

    /// Feed one chunk and drain every frame it completes.
    ///
    /// A trailing partial frame stays buffered for the next call.
    pub fn feed(&mut self, chunk: &str) -> Vec<FramedEvent> {
        self.buffer.push_str(chunk);
        match self.dialect {
            WireDialect::SseBlocks => self.drain_sse_blocks(),
            WireDialect::TokenLines => self.drain_token_lines(),
        }
    }

    /// Discard any buffered partial frame.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    fn drain_sse_blocks(&mut self) -> Vec<FramedEvent> {
        let mut events = Vec::new();
        while let Some(end) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..end + 2).collect();
            if let Some(event) = parse_sse_block(&block) {
                events.push(event);
            }
        }
        events
    }

    fn drain_token_lines(&mut self) -> Vec<FramedEvent> {
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..pos + 1).collect();
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            parse_token_line(line, &mut events);
        }
        events
    }
}

fn parse_sse_block(block: &str) -> Option<FramedEvent> {
    let mut event_tag = None;
    let mut data = None;
    for line in block.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event_tag = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data = Some(rest.trim().to_string());
        }
    }
    // Blocks without a data line carry nothing we care about
    let data = data?;

    // The done marker is not JSON; recognize it before parsing
    if data == "[DONE]" {
        return Some(FramedEvent::Done);
    }

    match serde_json::from_str::<Value>(&data) {
        Ok(payload) => Some(FramedEvent::Json {
            event: event_tag,
            payload,
        }),
        Err(e) => {
            debug!(target: "chatlens::decoder", "Skipping malformed frame: {}: {}", e, data);
            None
        }
    }
}

/// Decode one `key:value` token line.
///
/// The token after the first colon is always surfaced (platform wrapper
/// sentinels ride along as plain tokens and are stripped later by the
/// adapter); a trailing `:null` additionally signals segment end.
fn parse_token_line(line: &str, events: &mut Vec<FramedEvent>) {
    if let Some(colon) = line.find(':') {
        let raw = line[colon + 1..].trim();
        if !raw.is_empty() {
            events.push(FramedEvent::Delta(unquote_token(raw)));
        }
    }
    if line.ends_with(":null") {
        events.push(FramedEvent::Done);
    }
}

fn unquote_token(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        match serde_json::from_str::<String>(raw) {
            Ok(s) => s,
            // Bad escape sequences happen; keep the inner text as-is
            Err(_) => raw[1..raw.len() - 1].to_string(),
        }
    } else {
        raw.to_string()
    }
}
