//! Session identity and per-ask parameters.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Conversation
// ============================================================================

/// Session identity for one conversation.
///
/// Obtained by the caller from the backend's conversation-creation
/// endpoint; the JSON it returns deserializes directly into this type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Conversation id.
    pub conversation_id: String,

    /// Client (participant) id.
    pub client_id: String,

    /// Signature of the previous exchange, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_signature: Option<String>,

    /// Short-lived access token appended to the dial URL.
    #[serde(
        default,
        alias = "encryptedConversationSignature",
        skip_serializing_if = "Option::is_none"
    )]
    pub sec_access_token: Option<String>,
}

impl Conversation {
    /// Creates a conversation identity without signature or token.
    #[must_use]
    pub fn new(conversation_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            client_id: client_id.into(),
            conversation_signature: None,
            sec_access_token: None,
        }
    }

    /// Sets the conversation signature.
    #[inline]
    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.conversation_signature = Some(signature.into());
        self
    }

    /// Sets the access token.
    #[inline]
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.sec_access_token = Some(token.into());
        self
    }
}

// ============================================================================
// AskOptions
// ============================================================================

/// Parameters of a single ask.
///
/// # Example
///
/// ```ignore
/// let options = AskOptions::new(conversation, "What's new in Rust?")
///     .with_webpage_context("[user](#message)\nHi")
///     .with_cancel(token.clone());
/// ```
#[derive(Debug, Clone)]
pub struct AskOptions {
    /// Session identity.
    pub conversation: Conversation,

    /// Prompt text.
    pub prompt: String,

    /// Uploaded image URL, if any.
    pub image_url: Option<String>,

    /// Text injected as the synthetic previous web-page turn.
    pub webpage_context: Option<String>,

    /// Cooperative cancellation signal.
    pub cancel: CancellationToken,
}

impl AskOptions {
    /// Creates ask options with a fresh cancellation token.
    #[must_use]
    pub fn new(conversation: Conversation, prompt: impl Into<String>) -> Self {
        Self {
            conversation,
            prompt: prompt.into(),
            image_url: None,
            webpage_context: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Attaches an uploaded image.
    #[inline]
    #[must_use]
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Sets the web-page context text.
    #[inline]
    #[must_use]
    pub fn with_webpage_context(mut self, context: impl Into<String>) -> Self {
        self.webpage_context = Some(context.into());
        self
    }

    /// Uses the given cancellation token.
    #[inline]
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
