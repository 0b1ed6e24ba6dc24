//! Caller-facing messages produced from the event stream.
//!
//! # Wire Form
//!
//! [`Message`] serializes to the flat `{"type", "text"}` document that
//! front ends consume:
//!
//! | Variant | `type` | `text` |
//! |---------|--------|--------|
//! | [`Message::Text`] | `message` | answer delta |
//! | [`Message::SearchQuery`] | `search_query` | query |
//! | [`Message::SearchResult`] | `search_result` | footnote links |
//! | [`Message::Loading`] | `loading` | status |
//! | [`Message::GeneratedImage`] | `generative_image` | `{"text","url"}` JSON |
//! | [`Message::SuggestedResponses`] | `suggested_responses` | JSON string array |
//! | [`Message::Error`] | `error` | error display |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::error::Error;

// ============================================================================
// Constants
// ============================================================================

/// Image creation page embedded for generated images.
const IMAGE_CREATE_URL: &str = "https://www.bing.com/images/create?\
partner=sydney&re=1&showselective=1&sude=1&kseed=8500&SFX=4";

// ============================================================================
// Message
// ============================================================================

/// One message of an ask stream.
///
/// Arrival order is authoritative; [`Message::Error`] is always the last
/// message of its stream.
#[derive(Debug)]
pub enum Message {
    /// New answer text to append.
    Text(String),
    /// The backend searched for this query.
    SearchQuery(String),
    /// Formatted citations, or the backend's "no result" notice.
    SearchResult(String),
    /// Progress status.
    Loading(String),
    /// An image is being generated.
    GeneratedImage(GeneratedImage),
    /// Suggested follow-up prompts.
    SuggestedResponses(Vec<String>),
    /// Terminal failure.
    Error(Error),
}

impl Message {
    /// Returns the discriminant of this message.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Text(_) => MessageKind::Text,
            Self::SearchQuery(_) => MessageKind::SearchQuery,
            Self::SearchResult(_) => MessageKind::SearchResult,
            Self::Loading(_) => MessageKind::Loading,
            Self::GeneratedImage(_) => MessageKind::GeneratedImage,
            Self::SuggestedResponses(_) => MessageKind::SuggestedResponses,
            Self::Error(_) => MessageKind::Error,
        }
    }

    /// Returns `true` for [`Message::Error`].
    #[inline]
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Returns the text payload in its flat string form.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Text(text)
            | Self::SearchQuery(text)
            | Self::SearchResult(text)
            | Self::Loading(text) => text.clone(),
            Self::GeneratedImage(image) => image.to_json(),
            Self::SuggestedResponses(suggestions) => {
                serde_json::to_string(suggestions).unwrap_or_default()
            }
            Self::Error(err) => err.to_string(),
        }
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Message", 2)?;
        state.serialize_field("type", self.kind().as_str())?;
        state.serialize_field("text", &self.text())?;
        state.end()
    }
}

// ============================================================================
// MessageKind
// ============================================================================

/// Discriminant of [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// [`Message::Text`].
    Text,
    /// [`Message::SearchQuery`].
    SearchQuery,
    /// [`Message::SearchResult`].
    SearchResult,
    /// [`Message::Loading`].
    Loading,
    /// [`Message::GeneratedImage`].
    GeneratedImage,
    /// [`Message::SuggestedResponses`].
    SuggestedResponses,
    /// [`Message::Error`].
    Error,
}

impl MessageKind {
    /// Returns the stable wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "message",
            Self::SearchQuery => "search_query",
            Self::SearchResult => "search_result",
            Self::Loading => "loading",
            Self::GeneratedImage => "generative_image",
            Self::SuggestedResponses => "suggested_responses",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// GeneratedImage
// ============================================================================

/// Reference to an image the backend is generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    /// Image prompt.
    pub text: String,
    /// Image creation page that renders the result.
    pub url: String,
}

impl GeneratedImage {
    /// Builds the reference for an image prompt.
    ///
    /// The prompt is form-encoded into the query and the backend message id
    /// becomes the iframe id.
    #[must_use]
    pub fn new(text: impl Into<String>, message_id: &str) -> Self {
        let text = text.into();
        let url = format!(
            "{IMAGE_CREATE_URL}&q={}&iframeid={message_id}",
            query_escape(&text)
        );
        Self { text, url }
    }

    /// Returns the `{"text","url"}` JSON form.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Form-encodes a query value, keeping `~` and escaping `*`.
fn query_escape(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('*', "%2A")
        .replace("%7E", "~")
}

// ============================================================================
// Tests
// ============================================================================
