//! WebSocket transport layer.
//!
//! This module owns the connection of one ask: dialing, protocol
//! negotiation, sending the request and framed reads with keep-alives.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Ask (Rust)     │                              │  Chat backend   │
//! │                 │         WebSocket            │                 │
//! │  Dialer         │─────────────────────────────►│  ChatHub        │
//! │  → Session-     │◄─────────────────────────────│  (SignalR JSON) │
//! │    Transport    │      records + 0x1E          │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `SessionTransport::dial` - Upgrade through a [`Dialer`]
//! 2. `SessionTransport::negotiate` - Select the JSON protocol
//! 3. `SessionTransport::send_request` - Send the chat request
//! 4. `SessionTransport::read_frame` - Stream frames, keep-alive on cadence
//! 5. Drop - Connection released
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Session transport state machine |
//! | `dialer` | Connection establishment seam |

// ============================================================================
// Submodules
// ============================================================================

/// Session transport state machine.
pub mod connection;

/// WebSocket dialing.
pub mod dialer;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{
    KEEP_ALIVE_FRAME, PROTOCOL_FRAME, SessionTransport, TransportConfig, TransportState,
    keep_alive_due,
};
pub use dialer::{Dialer, DirectDialer, WsStream};
