//! Error types for the Sydney streaming client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`].
//! Errors that end an ask mid-stream are delivered as the last
//! [`Message::Error`](crate::Message::Error) of the stream instead:
//!
//! ```ignore
//! use sydney_stream::{ErrorCategory, Message};
//!
//! while let Some(message) = stream.next().await {
//!     if let Message::Error(err) = message {
//!         if err.category() == ErrorCategory::MessageRevoked {
//!             // discard the partially shown answer
//!         }
//!     }
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Transport | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::UpgradeRejected`], [`Error::ConnectionClosed`], [`Error::Timeout`], [`Error::WebSocket`], [`Error::Json`] |
//! | Malformed event | [`Error::MalformedEvent`] |
//! | Backend | [`Error::Backend`] |
//! | Content policy | [`Error::MessageFiltered`], [`Error::MessageRevoked`] |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client configuration or ask parameters are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// WebSocket connection failed.
    ///
    /// Returned when the dial or the upgrade handshake fails.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Dial did not complete in time.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// The server answered the upgrade request with something other than 101.
    #[error("Cannot establish a websocket connection: HTTP {status}")]
    UpgradeRejected {
        /// HTTP status code of the response.
        status: u16,
    },

    /// WebSocket connection closed by the remote end.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A framed read or write did not complete in time.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// A record in the event stream was not valid JSON.
    #[error("Malformed event: {message}")]
    MalformedEvent {
        /// Parser message.
        message: String,
    },

    /// The backend finished the exchange with a non-success status.
    #[error("{code}: {message}")]
    Backend {
        /// Backend result value (e.g. `Throttled`).
        code: String,
        /// Backend result message.
        message: String,
    },

    // ========================================================================
    // Content Policy Errors
    // ========================================================================
    /// The prompt was rejected before any answer text was produced.
    #[error("Looks like the user's message has triggered the Bing filter")]
    MessageFiltered,

    /// The answer was withdrawn after part of it had been streamed.
    #[error("Message revoke detected")]
    MessageRevoked,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// ErrorCategory
// ============================================================================

/// Machine-distinguishable error category.
///
/// Stream consumers branch on this instead of matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Invalid configuration or ask parameters.
    Config,
    /// Dial, upgrade, read or write failure.
    Transport,
    /// Unparseable record in the event stream.
    MalformedEvent,
    /// Non-success terminal status reported by the backend.
    Backend,
    /// Content policy rejection before any output.
    MessageFiltered,
    /// Content policy rejection after partial output.
    MessageRevoked,
}

impl ErrorCategory {
    /// Returns the stable string name of the category.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Transport => "transport",
            Self::MalformedEvent => "malformed_event",
            Self::Backend => "backend",
            Self::MessageFiltered => "message_filtered",
            Self::MessageRevoked => "message_revoked",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates a malformed event error.
    #[inline]
    pub fn malformed_event(message: impl Into<String>) -> Self {
        Self::MalformedEvent {
            message: message.into(),
        }
    }

    /// Creates a backend error.
    #[inline]
    pub fn backend(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            code: code.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns the category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config { .. } => ErrorCategory::Config,
            Self::Connection { .. }
            | Self::ConnectionTimeout { .. }
            | Self::UpgradeRejected { .. }
            | Self::ConnectionClosed
            | Self::Timeout { .. }
            | Self::Json(_)
            | Self::WebSocket(_) => ErrorCategory::Transport,
            Self::MalformedEvent { .. } => ErrorCategory::MalformedEvent,
            Self::Backend { .. } => ErrorCategory::Backend,
            Self::MessageFiltered => ErrorCategory::MessageFiltered,
            Self::MessageRevoked => ErrorCategory::MessageRevoked,
        }
    }

    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::Timeout { .. }
        )
    }

    /// Returns `true` if this is a transport error.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        self.category() == ErrorCategory::Transport
    }

    /// Returns `true` if the backend refused the content.
    #[inline]
    #[must_use]
    pub fn is_content_policy(&self) -> bool {
        matches!(self, Self::MessageFiltered | Self::MessageRevoked)
    }
}

// ============================================================================
// Tests
// ============================================================================
