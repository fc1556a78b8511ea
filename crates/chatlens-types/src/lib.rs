//! Shared types for the chatlens capture core.

mod events;
mod message;

pub use events::*;
pub use message::*;
