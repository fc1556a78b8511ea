//! Protocol decoding and message reconstruction for AI chat platforms.
//!
//! Four chat platforms, four partially-documented wire framings, one
//! normalized output contract. This crate turns raw response chunks into
//! [`chatlens_types::Message`] records: a [`StreamDecoder`] frames the
//! bytes, a [`ResponseAccumulator`] reconstructs the assistant reply and
//! its thinking steps, and a per-platform [`PlatformAdapter`] normalizes
//! extraction and prompt insertion. Everything downstream listens on the
//! [`EventDispatcher`].

mod accumulator;
mod adapters;
mod config;
mod context;
mod decoder;
mod dispatcher;
mod error;
mod host;
mod registry;

pub use accumulator::{ResponseAccumulator, ThinkingStep};
pub use adapters::{
    parse_request_body, process_streaming_response, ChatGptAdapter, ClaudeAdapter, CopilotAdapter,
    MistralAdapter, PlatformAdapter,
};
pub use config::{EndpointKind, EndpointPattern, PlatformConfig};
pub use context::CaptureContext;
pub use decoder::{FramedEvent, StreamDecoder, WireDialect};
pub use dispatcher::EventDispatcher;
pub use error::CaptureError;
pub use host::{insert_with_fallbacks, ComposerHost, NullHost};
pub use registry::AdapterRegistry;

/// Result type for capture operations.
pub type Result<T> = std::result::Result<T, CaptureError>;
