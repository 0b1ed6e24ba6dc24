//! Inbound event records.
//!
//! The backend speaks a SignalR-style JSON hub protocol: every record is a
//! JSON object terminated by [`RECORD_SEPARATOR`], and one WebSocket frame
//! may carry several records.
//!
//! # Record Types
//!
//! | `type` | Meaning | Payload |
//! |--------|---------|---------|
//! | `1` | Partial update | `arguments[0].messages`, optional `arguments[0].cursor` |
//! | `2` | Terminal | `item.result.value`, `item.result.message`, `item.messages` |
//! | other | Ping, invocation ack, ... | ignored |

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

// ============================================================================
// Constants
// ============================================================================

/// Terminates every record on the wire.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Record type of a partial update.
pub const TYPE_UPDATE: i64 = 1;

/// Record type of the terminal record.
pub const TYPE_COMPLETION: i64 = 2;

/// Terminal result value of a successful exchange.
pub const RESULT_SUCCESS: &str = "Success";

// ============================================================================
// Event
// ============================================================================

/// A classified backend record.
///
/// Records of any other type never make it past the demuxer.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// `type: 1` record with at least one message.
    Update(Value),

    /// Successful `type: 2` record.
    Completion(Value),
}

impl Event {
    /// Returns the underlying JSON record.
    #[inline]
    #[must_use]
    pub fn record(&self) -> &Value {
        match self {
            Self::Update(record) | Self::Completion(record) => record,
        }
    }

    /// Returns `true` for the terminal record.
    #[inline]
    #[must_use]
    pub fn is_completion(&self) -> bool {
        matches!(self, Self::Completion(_))
    }

    /// Returns the message an update is about.
    ///
    /// The backend puts the most recent entry first in an update.
    #[must_use]
    pub fn latest_message(&self) -> Option<BotMessage<'_>> {
        match self {
            Self::Update(record) => record
                .pointer("/arguments/0/messages/0")
                .map(BotMessage::new),
            Self::Completion(_) => None,
        }
    }

    /// Returns `true` if this update opens a new answer segment.
    #[must_use]
    pub fn starts_segment(&self) -> bool {
        match self {
            Self::Update(record) => record.pointer("/arguments/0/cursor").is_some(),
            Self::Completion(_) => false,
        }
    }

    /// Returns the last message of the terminal snapshot.
    #[must_use]
    pub fn final_message(&self) -> Option<BotMessage<'_>> {
        match self {
            Self::Completion(record) => record
                .pointer("/item/messages")
                .and_then(Value::as_array)
                .and_then(|messages| messages.last())
                .map(BotMessage::new),
            Self::Update(_) => None,
        }
    }
}

// ============================================================================
// MessageSubtype
// ============================================================================

/// The `messageType` of a bot message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageSubtype {
    /// `InternalSearchQuery`: the backend is searching the web.
    SearchQuery,
    /// `InternalSearchResult`: citations found by the search.
    SearchResult,
    /// `InternalLoaderMessage`: progress status.
    Loader,
    /// `GenerateContentQuery`: image generation request.
    GenerateContent,
    /// No `messageType`: plain answer text.
    Answer,
    /// Anything else.
    Unsupported(String),
}

impl MessageSubtype {
    /// Maps a wire `messageType` to a subtype.
    #[must_use]
    pub fn from_wire(message_type: &str) -> Self {
        match message_type {
            "InternalSearchQuery" => Self::SearchQuery,
            "InternalSearchResult" => Self::SearchResult,
            "InternalLoaderMessage" => Self::Loader,
            "GenerateContentQuery" => Self::GenerateContent,
            "" => Self::Answer,
            other => Self::Unsupported(other.to_string()),
        }
    }
}

// ============================================================================
// BotMessage
// ============================================================================

/// Borrowed view of one entry of a `messages` array.
#[derive(Debug, Clone, Copy)]
pub struct BotMessage<'a>(&'a Value);

impl<'a> BotMessage<'a> {
    /// Wraps a JSON message entry.
    #[inline]
    #[must_use]
    pub const fn new(value: &'a Value) -> Self {
        Self(value)
    }

    /// Returns the subtype of the message.
    #[must_use]
    pub fn subtype(&self) -> MessageSubtype {
        MessageSubtype::from_wire(self.get_str("messageType").unwrap_or_default())
    }

    /// Returns the visible text, empty if absent.
    #[inline]
    #[must_use]
    pub fn text(&self) -> &'a str {
        self.get_str("text").unwrap_or_default()
    }

    /// Returns the visible text only if the field exists.
    #[inline]
    #[must_use]
    pub fn text_field(&self) -> Option<&'a str> {
        self.get_str("text")
    }

    /// Returns the hidden annotation text only if the field exists.
    #[inline]
    #[must_use]
    pub fn hidden_text(&self) -> Option<&'a str> {
        self.get_str("hiddenText")
    }

    /// Returns the `contentType` field.
    #[inline]
    #[must_use]
    pub fn content_type(&self) -> Option<&'a str> {
        self.get_str("contentType")
    }

    /// Returns the `messageId` field, empty if absent.
    #[inline]
    #[must_use]
    pub fn message_id(&self) -> &'a str {
        self.get_str("messageId").unwrap_or_default()
    }

    /// Returns `true` if the content-policy filter produced this message.
    #[inline]
    #[must_use]
    pub fn is_apology(&self) -> bool {
        self.get_str("contentOrigin") == Some("Apology")
    }

    /// Returns the suggested follow-ups, if the message carries any.
    #[must_use]
    pub fn suggested_responses(&self) -> Option<Vec<String>> {
        let suggestions = self.0.get("suggestedResponses")?;
        let texts = suggestions
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|item| {
                        item.get("text")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string()
                    })
                    .collect()
            })
            .unwrap_or_default();
        Some(texts)
    }

    /// Returns the message serialized back to JSON.
    #[must_use]
    pub fn raw(&self) -> String {
        self.0.to_string()
    }

    /// Gets a string field.
    #[inline]
    fn get_str(&self, key: &str) -> Option<&'a str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

// ============================================================================
// Tests
// ============================================================================
