//! Error types for the capture core.

use thiserror::Error;

/// Failures inside the capture pipeline.
///
/// Most of these are recovered close to where they occur: decode failures
/// skip a frame, extraction failures yield nothing, DOM failures fall back
/// to a safe default. Only transport failures stop a stream, and even then
/// only after a salvage emission.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("DOM interaction error: {0}")]
    DomInteraction(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Channel send error")]
    ChannelSend,
}
