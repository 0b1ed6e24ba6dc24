//! Chat hub protocol message types.
//!
//! This module defines the records exchanged with the chat backend and
//! the messages handed to the caller.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `ChatRequest` | Local → Remote | The single request of an ask |
//! | `Event` | Remote → Local | Partial update or terminal record |
//! | `Message` | Crate → Caller | Reconstructed answer stream |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | Inbound record classification and message views |
//! | `message` | Caller-facing [`Message`] union |
//! | `request` | Outbound [`ChatRequest`] builder |

// ============================================================================
// Submodules
// ============================================================================

/// Inbound event records.
pub mod event;

/// Caller-facing messages.
pub mod message;

/// Outbound chat request.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{
    BotMessage, Event, MessageSubtype, RECORD_SEPARATOR, RESULT_SUCCESS, TYPE_COMPLETION,
    TYPE_UPDATE,
};
pub use message::{GeneratedImage, Message, MessageKind};
pub use request::{ChatRequest, RequestContext};
