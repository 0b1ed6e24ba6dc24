//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and creating [`Client`] instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use sydney_stream::{Client, ConversationStyle};
//!
//! # fn example() -> sydney_stream::Result<()> {
//! let client = Client::builder()
//!     .header("Cookie", "_U=...")
//!     .locale("en-GB")
//!     .style(ConversationStyle::Precise)
//!     .read_timeout(Duration::from_secs(90))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashMap;
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};
use crate::transport::{DirectDialer, Dialer, TransportConfig};

use super::core::{Client, ClientSettings};
use super::options::{
    ConversationStyle, DEFAULT_LOCALE, DEFAULT_WSS_URL, default_allowed_message_types,
    default_location_hints, default_options_sets, default_slice_ids,
};

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`Client`] instance.
///
/// Use [`Client::builder()`] to create a new builder.
#[derive(Clone)]
pub struct ClientBuilder {
    /// Transport endpoint, headers and timeouts.
    transport: TransportConfig,
    /// Locale such as `en-US`.
    locale: String,
    /// Conversational tone.
    style: ConversationStyle,
    /// Option sets per style.
    options_sets: FxHashMap<ConversationStyle, Vec<String>>,
    /// Disable web search.
    no_search: bool,
    /// Message types the backend may stream back.
    allowed_message_types: Vec<String>,
    /// Backend feature slice ids.
    slice_ids: Vec<String>,
    /// Location hints per locale.
    location_hints: FxHashMap<String, Vec<Value>>,
    /// Connection factory.
    dialer: Arc<dyn Dialer>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            transport: TransportConfig::new(DEFAULT_WSS_URL),
            locale: DEFAULT_LOCALE.to_string(),
            style: ConversationStyle::default(),
            options_sets: default_options_sets(),
            no_search: false,
            allowed_message_types: default_allowed_message_types(),
            slice_ids: default_slice_ids(),
            location_hints: default_location_hints(),
            dialer: Arc::new(DirectDialer),
        }
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("transport", &self.transport)
            .field("locale", &self.locale)
            .field("style", &self.style)
            .field("no_search", &self.no_search)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a new builder with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the WebSocket endpoint.
    #[inline]
    #[must_use]
    pub fn wss_url(mut self, url: impl Into<String>) -> Self {
        self.transport.url = url.into();
        self
    }

    /// Adds a header to the upgrade request.
    ///
    /// Typically the authentication cookie and a browser user agent.
    #[inline]
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.transport.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the locale; the region is its last two characters.
    #[inline]
    #[must_use]
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Sets the conversation style.
    #[inline]
    #[must_use]
    pub fn style(mut self, style: ConversationStyle) -> Self {
        self.style = style;
        self
    }

    /// Overrides the option sets sent for `style`.
    #[inline]
    #[must_use]
    pub fn options_sets(
        mut self,
        style: ConversationStyle,
        options: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.options_sets
            .insert(style, options.into_iter().map(Into::into).collect());
        self
    }

    /// Disables web search for every ask.
    #[inline]
    #[must_use]
    pub fn no_search(mut self, no_search: bool) -> Self {
        self.no_search = no_search;
        self
    }

    /// Replaces the allowed message types.
    #[inline]
    #[must_use]
    pub fn allowed_message_types(
        mut self,
        types: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.allowed_message_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the slice ids.
    #[inline]
    #[must_use]
    pub fn slice_ids(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.slice_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the location hints sent for `locale`.
    #[inline]
    #[must_use]
    pub fn location_hints(mut self, locale: impl Into<String>, hints: Vec<Value>) -> Self {
        self.location_hints.insert(locale.into(), hints);
        self
    }

    /// Sets the dial timeout.
    #[inline]
    #[must_use]
    pub fn dial_timeout(mut self, timeout: Duration) -> Self {
        self.transport.dial_timeout = timeout;
        self
    }

    /// Sets the per-read timeout.
    #[inline]
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.transport.read_timeout = timeout;
        self
    }

    /// Sets the per-write timeout.
    #[inline]
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.transport.write_timeout = timeout;
        self
    }

    /// Traces every frame sent and received.
    #[inline]
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.transport.debug = debug;
        self
    }

    /// Uses a custom dialer, e.g. one that tunnels through a proxy.
    #[inline]
    #[must_use]
    pub fn dialer(mut self, dialer: impl Dialer + 'static) -> Self {
        self.dialer = Arc::new(dialer);
        self
    }

    /// Builds the client with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the endpoint is not a `ws`/`wss` URL
    /// - [`Error::Config`] if the locale is not at least two ASCII characters
    /// - [`Error::Config`] if a timeout is zero
    pub fn build(self) -> Result<Client> {
        self.validate_url()?;
        self.validate_locale()?;
        self.validate_timeouts()?;

        Ok(Client::new(
            ClientSettings {
                transport: self.transport,
                locale: self.locale,
                style: self.style,
                options_sets: self.options_sets,
                no_search: self.no_search,
                allowed_message_types: self.allowed_message_types,
                slice_ids: self.slice_ids,
                location_hints: self.location_hints,
            },
            self.dialer,
        ))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientBuilder {
    /// Validates the endpoint URL.
    fn validate_url(&self) -> Result<()> {
        let url = Url::parse(&self.transport.url).map_err(|e| {
            Error::config(format!("Invalid endpoint {}: {e}", self.transport.url))
        })?;

        match url.scheme() {
            "ws" | "wss" => Ok(()),
            other => Err(Error::config(format!(
                "Endpoint scheme must be ws or wss, got {other}"
            ))),
        }
    }

    /// Validates the locale.
    fn validate_locale(&self) -> Result<()> {
        if self.locale.len() < 2 || !self.locale.is_ascii() {
            return Err(Error::config(format!(
                "Locale must be at least two ASCII characters, got {:?}",
                self.locale
            )));
        }
        Ok(())
    }

    /// Validates the timeouts.
    fn validate_timeouts(&self) -> Result<()> {
        let timeouts = [
            ("dial", self.transport.dial_timeout),
            ("read", self.transport.read_timeout),
            ("write", self.transport.write_timeout),
        ];

        for (name, timeout) in timeouts {
            if timeout.is_zero() {
                return Err(Error::config(format!("The {name} timeout must be non-zero")));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let builder = ClientBuilder::new();
        assert_eq!(builder.transport.url, DEFAULT_WSS_URL);
        assert_eq!(builder.locale, "en-US");
        assert_eq!(builder.style, ConversationStyle::Creative);
        assert!(!builder.no_search);
    }

    #[test]
    fn test_setters() {
        let builder = ClientBuilder::new()
            .wss_url("ws://127.0.0.1:9000/hub")
            .header("Cookie", "_U=abc")
            .locale("zh-CN")
            .style(ConversationStyle::Balanced)
            .no_search(true)
            .debug(true);

        assert_eq!(builder.transport.url, "ws://127.0.0.1:9000/hub");
        assert_eq!(builder.transport.headers, vec![("Cookie".into(), "_U=abc".into())]);
        assert_eq!(builder.locale, "zh-CN");
        assert_eq!(builder.style, ConversationStyle::Balanced);
        assert!(builder.no_search);
        assert!(builder.transport.debug);
    }

    #[test]
    fn test_options_sets_override() {
        let builder = ClientBuilder::new().options_sets(ConversationStyle::Precise, ["a", "b"]);
        assert_eq!(
            builder.options_sets[&ConversationStyle::Precise],
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_build_succeeds_with_defaults() {
        assert!(ClientBuilder::new().build().is_ok());
    }

    #[test]
    fn test_build_fails_with_http_url() {
        let err = ClientBuilder::new()
            .wss_url("https://example.com")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("scheme"));
    }

    #[test]
    fn test_build_fails_with_short_locale() {
        let err = ClientBuilder::new().locale("e").build().unwrap_err();
        assert!(err.to_string().contains("Locale"));
    }

    #[test]
    fn test_build_fails_with_zero_timeout() {
        let err = ClientBuilder::new()
            .read_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("read timeout"));
    }

    #[test]
    fn test_builder_is_clone() {
        let builder = ClientBuilder::new().locale("en-GB");
        let cloned = builder.clone();
        assert_eq!(builder.locale, cloned.locale);
    }
}
