//! Sydney Stream - Streaming client for the Sydney chat backend.
//!
//! This library sends one prompt to the chat backend over a WebSocket hub
//! connection and turns the backend's stream of partial, revisable updates
//! into a clean, ordered sequence of messages.
//!
//! # Architecture
//!
//! Every ask owns a fresh connection and runs three tasks:
//!
//! - **Transport**: dial, protocol negotiation, request, framed reads and
//!   periodic keep-alives
//! - **Demux**: split frames into records, validate and classify them,
//!   detect the terminal record
//! - **Translate**: reconstruct answer text from full-text snapshots and
//!   interleave search, loading, image and suggestion side channels
//!
//! Key design principles:
//!
//! - Capacity-one handoffs give backpressure from the caller to the socket
//! - At most one error per stream, always last
//! - Cancellation is silent and checked before every blocking read
//!
//! # Quick Start
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use sydney_stream::{AskOptions, Client, Conversation, Message, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::builder()
//!         .header("Cookie", "_U=...")
//!         .locale("en-US")
//!         .build()?;
//!
//!     let conversation = Conversation::new("conversation-id", "client-id");
//!     let mut stream = client.ask_stream(AskOptions::new(conversation, "Hi!"));
//!
//!     while let Some(message) = stream.next().await {
//!         match message {
//!             Message::Text(delta) => print!("{delta}"),
//!             Message::Error(err) => eprintln!("\n{} error: {err}", err.category()),
//!             _ => {}
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`Client`], [`ClientBuilder`] and ask parameters |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Hub records and caller-facing [`Message`] |
//! | [`stream`] | Demux and translate stages, [`AskStream`] |
//! | [`transport`] | WebSocket session transport |

// ============================================================================
// Modules
// ============================================================================

/// Client entry point and configuration.
///
/// Use [`Client::builder()`] to create a configured client.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Hub protocol message types.
pub mod protocol;

/// Ask stream pipeline.
pub mod stream;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{AskOptions, Client, ClientBuilder, Conversation, ConversationStyle};

// Error types
pub use error::{Error, ErrorCategory, Result};

// Identifier types
pub use identifiers::{MessageId, TraceId};

// Protocol types
pub use protocol::{ChatRequest, Event, GeneratedImage, Message, MessageKind};

// Stream types
pub use stream::{AskStream, RawEvent, RawEventStream};

// Transport types
pub use transport::{Dialer, DirectDialer};

// Cancellation signal accepted by AskOptions
pub use tokio_util::sync::CancellationToken;
