//! Chat client entry point.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | Starts asks |
//! | [`ClientBuilder`] | Fluent configuration builder |
//! | [`ConversationStyle`] | Answer tone and option sets |
//! | [`Conversation`] | Session identity |
//! | [`AskOptions`] | Per-ask parameters |
//!
//! # Example
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use sydney_stream::{AskOptions, Client, Conversation, Message};
//!
//! # async fn example() -> sydney_stream::Result<()> {
//! let client = Client::builder().header("Cookie", "_U=...").build()?;
//! let conversation = Conversation::new("conversation-id", "client-id");
//!
//! let mut stream = client.ask_stream(AskOptions::new(conversation, "Hello"));
//! while let Some(message) = stream.next().await {
//!     if let Message::Text(delta) = message {
//!         print!("{delta}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Session identity and ask parameters.
pub mod ask;

/// Fluent builder pattern for client configuration.
pub mod builder;

/// Core client implementation.
pub mod core;

/// Conversation style and request defaults.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use ask::{AskOptions, Conversation};
pub use builder::ClientBuilder;
pub use core::Client;
pub use options::{ConversationStyle, DEFAULT_LOCALE, DEFAULT_WSS_URL, NO_SEARCH_OPTION};
