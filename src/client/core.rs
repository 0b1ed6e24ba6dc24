//! Client core implementation.
//!
//! The [`Client`] holds validated configuration and starts asks. Each ask
//! gets its own connection, cursor state and pipeline tasks; nothing is
//! shared between concurrent asks except the read-only configuration.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::Result;
use crate::protocol::{ChatRequest, RequestContext};
use crate::stream::{self, AskStream, RawEventStream, TransportStage};
use crate::transport::{Dialer, TransportConfig};

use super::ask::AskOptions;
use super::builder::ClientBuilder;
use super::options::ConversationStyle;

// ============================================================================
// ClientSettings
// ============================================================================

/// Validated configuration produced by [`ClientBuilder`].
#[derive(Debug, Clone)]
pub(crate) struct ClientSettings {
    pub transport: TransportConfig,
    pub locale: String,
    pub style: ConversationStyle,
    pub options_sets: FxHashMap<ConversationStyle, Vec<String>>,
    pub no_search: bool,
    pub allowed_message_types: Vec<String>,
    pub slice_ids: Vec<String>,
    pub location_hints: FxHashMap<String, Vec<Value>>,
}

// ============================================================================
// Client
// ============================================================================

/// Streaming chat client.
///
/// Cheap to clone; clones share configuration.
#[derive(Clone)]
pub struct Client {
    /// Shared configuration.
    settings: Arc<ClientSettings>,
    /// Connection factory.
    dialer: Arc<dyn Dialer>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client from validated settings.
    pub(crate) fn new(settings: ClientSettings, dialer: Arc<dyn Dialer>) -> Self {
        Self {
            settings: Arc::new(settings),
            dialer,
        }
    }

    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Returns the conversation style.
    #[inline]
    #[must_use]
    pub fn style(&self) -> ConversationStyle {
        self.settings.style
    }

    /// Returns the locale.
    #[inline]
    #[must_use]
    pub fn locale(&self) -> &str {
        &self.settings.locale
    }

    /// Builds the chat request an ask would send.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the locale is invalid.
    pub fn build_request(&self, ask: &AskOptions) -> Result<ChatRequest> {
        let settings = &self.settings;
        let default_options;
        let options_sets = match settings.options_sets.get(&settings.style) {
            Some(options) => options.as_slice(),
            None => {
                default_options = settings.style.default_options();
                default_options.as_slice()
            }
        };

        let ctx = RequestContext {
            style: settings.style,
            options_sets,
            no_search: settings.no_search,
            locale: &settings.locale,
            location_hints: settings
                .location_hints
                .get(&settings.locale)
                .map(Vec::as_slice)
                .unwrap_or_default(),
            allowed_message_types: &settings.allowed_message_types,
            slice_ids: &settings.slice_ids,
        };

        ChatRequest::build(&ctx, ask)
    }

    /// Starts an ask and returns its classified backend records.
    ///
    /// Must be called within a Tokio runtime.
    #[must_use]
    pub fn ask_stream_raw(&self, ask: AskOptions) -> RawEventStream {
        info!(style = %self.settings.style, "Ask stream raw started");

        let request = match self.build_request(&ask) {
            Ok(request) => request,
            Err(e) => return stream::failed_raw(e),
        };
        debug!(message_id = ?request.message_id(), "Chat request built");

        stream::spawn_raw(TransportStage {
            dialer: Arc::clone(&self.dialer),
            config: self.settings.transport.clone(),
            access_token: ask.conversation.sec_access_token.clone(),
            request,
            cancel: ask.cancel,
        })
    }

    /// Starts an ask and returns the reconstructed answer stream.
    ///
    /// Must be called within a Tokio runtime.
    #[must_use]
    pub fn ask_stream(&self, ask: AskOptions) -> AskStream {
        let prompt = ask.prompt.clone();
        let cancel = ask.cancel.clone();
        let raw = self.ask_stream_raw(ask);

        stream::spawn_translate(raw, prompt, cancel)
    }
}

// ============================================================================
// Tests
// ============================================================================
