//! Session transport over one WebSocket connection.
//!
//! A [`SessionTransport`] lives for exactly one ask and walks through
//! [`TransportState`]:
//!
//! ```text
//! Dialing → Negotiating → Sending → Streaming → Closed
//!    │           │            │          │
//!    └───────────┴────────────┴──────────┴──→ Closed (error or cancel)
//! ```
//!
//! Every outbound record is terminated with [`RECORD_SEPARATOR`]. The
//! connection is released when the transport is dropped, whatever path
//! led there.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::RECORD_SEPARATOR;

use super::dialer::{Dialer, WsStream};

// ============================================================================
// Constants
// ============================================================================

/// Protocol-selection record sent first.
pub const PROTOCOL_FRAME: &str = r#"{"protocol": "json", "version": 1}"#;

/// Keep-alive record.
pub const KEEP_ALIVE_FRAME: &str = r#"{"type": 6}"#;

/// Keep-alives go out when the Unix second is a multiple of this.
const KEEP_ALIVE_PERIOD_SECS: u64 = 6;

/// Default timeout for the dial and upgrade.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for a single framed read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Default timeout for a single framed write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// TransportConfig
// ============================================================================

/// Endpoint and timeout policy of a [`SessionTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// WebSocket endpoint.
    pub url: String,
    /// Extra headers for the upgrade request.
    pub headers: Vec<(String, String)>,
    /// Dial and upgrade timeout.
    pub dial_timeout: Duration,
    /// Per-read timeout.
    pub read_timeout: Duration,
    /// Per-write timeout.
    pub write_timeout: Duration,
    /// Trace every frame sent and received.
    pub debug: bool,
}

impl TransportConfig {
    /// Creates a config with default timeouts and no headers.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            debug: false,
        }
    }

    /// Builds the upgrade request, appending the access token if present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL or a header is invalid.
    pub fn upgrade_request(&self, access_token: Option<&str>) -> Result<Request> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| Error::config(format!("Invalid endpoint {}: {e}", self.url)))?;

        if let Some(token) = access_token.filter(|t| !t.is_empty()) {
            url.query_pairs_mut().append_pair("sec_access_token", token);
        }

        let mut request = url.as_str().into_client_request()?;
        let headers = request.headers_mut();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::config(format!("Invalid header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::config(format!("Invalid value for header {name}: {e}")))?;
            headers.insert(name, value);
        }

        Ok(request)
    }
}

// ============================================================================
// TransportState
// ============================================================================

/// Lifecycle state of a [`SessionTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Opening the connection.
    Dialing,
    /// Selecting the hub protocol.
    Negotiating,
    /// Sending the chat request.
    Sending,
    /// Reading event frames.
    Streaming,
    /// Released.
    Closed,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dialing => "dialing",
            Self::Negotiating => "negotiating",
            Self::Sending => "sending",
            Self::Streaming => "streaming",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// SessionTransport
// ============================================================================

/// One WebSocket connection, owned by one ask.
pub struct SessionTransport {
    /// The upgraded stream.
    ws: WsStream,
    /// Current lifecycle state.
    state: TransportState,
    /// Per-read timeout.
    read_timeout: Duration,
    /// Per-write timeout.
    write_timeout: Duration,
    /// Trace every frame.
    debug: bool,
    /// Wall clock for the keep-alive cadence.
    clock: fn() -> SystemTime,
}

impl SessionTransport {
    /// Dials the endpoint and completes the WebSocket upgrade.
    ///
    /// Returns `Ok(None)` if `cancel` fires before, during or right after the dial.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the dial exceeds the dial timeout
    /// - [`Error::UpgradeRejected`] if the server does not switch protocols
    /// - [`Error::Connection`] for any other dial failure
    pub async fn dial(
        dialer: &dyn Dialer,
        config: &TransportConfig,
        access_token: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Option<Self>> {
        if cancel.is_cancelled() {
            info!("Ask cancelled before dial");
            return Ok(None);
        }

        let request = config.upgrade_request(access_token)?;
        let dial = timeout(config.dial_timeout, dialer.dial(request));

        let (ws, response) = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!("Ask cancelled during dial");
                return Ok(None);
            }
            result = dial => result
                .map_err(|_| Error::connection_timeout(config.dial_timeout.as_millis() as u64))??,
        };

        if cancel.is_cancelled() {
            info!("Ask cancelled after dial");
            return Ok(None);
        }

        if response.status() != StatusCode::SWITCHING_PROTOCOLS {
            return Err(Error::UpgradeRejected {
                status: response.status().as_u16(),
            });
        }

        debug!("WebSocket connection established");

        Ok(Some(Self {
            ws,
            state: TransportState::Negotiating,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            debug: config.debug,
            clock: SystemTime::now,
        }))
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> TransportState {
        self.state
    }

    /// Replaces the wall clock used for the keep-alive cadence.
    #[cfg(test)]
    pub(crate) fn with_clock(mut self, clock: fn() -> SystemTime) -> Self {
        self.clock = clock;
        self
    }

    /// Selects the JSON hub protocol.
    ///
    /// The server's handshake reply is read and discarded; the handshake
    /// ends with a keep-alive. Returns `Ok(false)` without sending the
    /// keep-alive if `cancel` fires before or during the reply read.
    ///
    /// # Errors
    ///
    /// Returns the first write failure.
    pub async fn negotiate(&mut self, cancel: &CancellationToken) -> Result<bool> {
        self.send_record(PROTOCOL_FRAME).await?;

        if cancel.is_cancelled() {
            info!("Ask cancelled during negotiation");
            return Ok(false);
        }

        let reply = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!("Ask cancelled during negotiation");
                return Ok(false);
            }
            reply = self.next_frame() => reply,
        };

        match reply {
            Ok(reply) => trace!(reply = %reply, "Handshake reply"),
            Err(e) => debug!(error = %e, "Ignoring handshake read failure"),
        }

        self.send_record(KEEP_ALIVE_FRAME).await?;
        self.transition(TransportState::Sending);
        Ok(true)
    }

    /// Sends the chat request as one record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails, or the write failure.
    pub async fn send_request<T: Serialize>(&mut self, request: &T) -> Result<()> {
        let body = serde_json::to_string(request)?;
        self.send_record(&body).await?;
        self.transition(TransportState::Streaming);
        Ok(())
    }

    /// Reads the next data frame.
    ///
    /// Returns `Ok(None)` if `cancel` fires before or during the read.
    /// A keep-alive follows the read when one is due.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if no frame arrives within the read timeout
    /// - [`Error::ConnectionClosed`] if the server closed the connection
    /// - [`Error::WebSocket`] for socket failures
    pub async fn read_frame(&mut self, cancel: &CancellationToken) -> Result<Option<String>> {
        if cancel.is_cancelled() {
            info!("Exit ask stream on cancel signal");
            return Ok(None);
        }

        let frame = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!("Exit ask stream on cancel signal");
                return Ok(None);
            }
            frame = self.next_frame() => frame?,
        };

        if keep_alive_due((self.clock)()) {
            self.send_record(KEEP_ALIVE_FRAME).await?;
        }

        Ok(Some(frame))
    }

    /// Marks the transport closed and closes the socket.
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
        self.transition(TransportState::Closed);
    }

    /// Reads one text frame, skipping control frames.
    async fn next_frame(&mut self) -> Result<String> {
        loop {
            let message = timeout(self.read_timeout, self.ws.next())
                .await
                .map_err(|_| Error::timeout("read frame", self.read_timeout.as_millis() as u64))?;

            let text = match message {
                Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                Some(Ok(Message::Binary(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "WebSocket closed by remote");
                    return Err(Error::ConnectionClosed);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(Error::ConnectionClosed),
            };

            if self.debug {
                trace!(frame = %text, "Received");
            }
            return Ok(text);
        }
    }

    /// Writes one record terminated by the record separator.
    async fn send_record(&mut self, body: &str) -> Result<()> {
        if self.debug {
            trace!(frame = %body, "Sending");
        }

        let mut record = String::with_capacity(body.len() + 1);
        record.push_str(body);
        record.push(RECORD_SEPARATOR);

        timeout(self.write_timeout, self.ws.send(Message::Text(record.into())))
            .await
            .map_err(|_| Error::timeout("write frame", self.write_timeout.as_millis() as u64))??;
        Ok(())
    }

    /// Moves to `next`, logging the transition.
    fn transition(&mut self, next: TransportState) {
        debug!(from = %self.state, to = %next, "Transport state");
        self.state = next;
    }
}

impl Drop for SessionTransport {
    fn drop(&mut self) {
        if self.state != TransportState::Closed {
            debug!(state = %self.state, "Releasing transport");
        }
    }
}

/// Returns `true` when a keep-alive should follow the current read.
///
/// Fires on every Unix second divisible by the keep-alive period, so
/// several reads within that second each send one.
#[must_use]
pub fn keep_alive_due(now: SystemTime) -> bool {
    now.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() % KEEP_ALIVE_PERIOD_SECS == 0)
        .unwrap_or(false)
}

// ============================================================================
// Tests
// ============================================================================
