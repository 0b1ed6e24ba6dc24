//! WebSocket dialing.
//!
//! The [`Dialer`] trait is the seam for network policy. [`DirectDialer`]
//! connects straight to the endpoint; callers that need an HTTP proxy
//! open the tunnel themselves and finish the upgrade with
//! [`tokio_tungstenite::client_async_tls`].

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::handshake::client::{Request, Response};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// WebSocket stream produced by a [`Dialer`].
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// Dialer
// ============================================================================

/// Opens the WebSocket connection for one ask.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Performs the TCP/TLS connect and the HTTP upgrade.
    ///
    /// # Errors
    ///
    /// - [`Error::UpgradeRejected`] if the server answers with a non-101 status
    /// - [`Error::Connection`] for any other dial failure
    async fn dial(&self, request: Request) -> Result<(WsStream, Response)>;
}

// ============================================================================
// DirectDialer
// ============================================================================

/// Dials the endpoint directly, without a proxy.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectDialer;

#[async_trait]
impl Dialer for DirectDialer {
    async fn dial(&self, request: Request) -> Result<(WsStream, Response)> {
        debug!(uri = %request.uri(), "Dialing");

        connect_async(request).await.map_err(|e| match e {
            WsError::Http(response) => Error::UpgradeRejected {
                status: response.status().as_u16(),
            },
            other => Error::connection(other.to_string()),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
