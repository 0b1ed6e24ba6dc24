//! Ask stream pipeline.
//!
//! Each ask runs as three tasks joined by capacity-one channels:
//!
//! ```text
//! ┌───────────┐  Result<String>  ┌─────────────┐  RawEvent  ┌────────────────────┐  Message
//! │ transport │ ───────────────► │ EventDemuxer│ ─────────► │ ResponseTranslator │ ────────► caller
//! └───────────┘                  └─────────────┘            └────────────────────┘
//! ```
//!
//! A stage blocks until its consumer takes the value, so the transport
//! never reads far ahead of the caller. Every stage ends by dropping its
//! sender; the caller sees the end of the stream as `None`. At most one
//! error travels down the pipeline and it is always the last value.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `demux` | Frame splitting and record classification |
//! | `translator` | Incremental answer reconstruction |

// ============================================================================
// Submodules
// ============================================================================

/// Frame demultiplexing.
pub mod demux;

/// Incremental answer reconstruction.
pub mod translator;

// ============================================================================
// Imports
// ============================================================================

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::Result;
use crate::protocol::{ChatRequest, Message};
use crate::transport::{Dialer, SessionTransport, TransportConfig};

pub use demux::{EventDemuxer, RawEvent, classify, split_records};
pub use translator::{ResponseTranslator, format_citations};

// ============================================================================
// Constants
// ============================================================================

/// Capacity of every handoff channel.
const HANDOFF_CAPACITY: usize = 1;

// ============================================================================
// TransportStage
// ============================================================================

/// Inputs of the transport task of one ask.
pub(crate) struct TransportStage {
    /// Opens the connection.
    pub dialer: Arc<dyn Dialer>,
    /// Endpoint and timeouts.
    pub config: TransportConfig,
    /// Token appended to the dial URL.
    pub access_token: Option<String>,
    /// The request to send after negotiation.
    pub request: ChatRequest,
    /// Caller's cancellation signal.
    pub cancel: CancellationToken,
}

impl TransportStage {
    /// Runs the transport until the stream ends.
    ///
    /// A failure is forwarded as the last frame unless the ask was
    /// cancelled.
    async fn run(self, frames: mpsc::Sender<Result<String>>) {
        let cancel = self.cancel.clone();

        if let Err(e) = self.stream_frames(&frames).await {
            if cancel.is_cancelled() {
                debug!(error = %e, "Dropping transport error after cancel");
            } else {
                let _ = frames.send(Err(e)).await;
            }
        }

        info!("Transport stage finished");
    }

    /// Dials, negotiates, sends the request and forwards frames.
    async fn stream_frames(self, frames: &mpsc::Sender<Result<String>>) -> Result<()> {
        let Some(mut transport) = SessionTransport::dial(
            self.dialer.as_ref(),
            &self.config,
            self.access_token.as_deref(),
            &self.cancel,
        )
        .await?
        else {
            return Ok(());
        };

        if !transport.negotiate(&self.cancel).await? || self.cancel.is_cancelled() {
            transport.close().await;
            return Ok(());
        }
        transport.send_request(&self.request).await?;

        loop {
            let frame = tokio::select! {
                biased;
                () = frames.closed() => {
                    debug!("Frame receiver dropped");
                    break;
                }
                frame = transport.read_frame(&self.cancel) => frame?,
            };
            let Some(frame) = frame else { break };

            if frames.send(Ok(frame)).await.is_err() {
                debug!("Frame receiver dropped");
                break;
            }
        }

        transport.close().await;
        Ok(())
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Spawns the transport and demux stages.
pub(crate) fn spawn_raw(stage: TransportStage) -> RawEventStream {
    let (frame_tx, frame_rx) = mpsc::channel(HANDOFF_CAPACITY);
    let (event_tx, event_rx) = mpsc::channel(HANDOFF_CAPACITY);

    tokio::spawn(stage.run(frame_tx));
    tokio::spawn(EventDemuxer::new().run(frame_rx, event_tx));

    RawEventStream { rx: event_rx }
}

/// Spawns the translate stage on top of a raw stream.
pub(crate) fn spawn_translate(
    raw: RawEventStream,
    prompt: String,
    cancel: CancellationToken,
) -> AskStream {
    let (message_tx, message_rx) = mpsc::channel(HANDOFF_CAPACITY);

    tokio::spawn(ResponseTranslator::new(prompt).run(raw.rx, message_tx, cancel));

    AskStream { rx: message_rx }
}

/// Returns a raw stream that yields only `err`.
pub(crate) fn failed_raw(err: crate::Error) -> RawEventStream {
    let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);
    let _ = tx.try_send(Err(err));
    RawEventStream { rx }
}

// ============================================================================
// RawEventStream
// ============================================================================

/// Classified records of one ask.
///
/// Ends after the terminal record, or after a single error.
#[derive(Debug)]
pub struct RawEventStream {
    rx: mpsc::Receiver<RawEvent>,
}

impl RawEventStream {
    /// Receives the next event, or `None` at the end of the stream.
    pub async fn recv(&mut self) -> Option<RawEvent> {
        self.rx.recv().await
    }
}

impl Stream for RawEventStream {
    type Item = RawEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// ============================================================================
// AskStream
// ============================================================================

/// Caller-facing messages of one ask.
///
/// Finite and not restartable. Dropping it tears the pipeline down.
#[derive(Debug)]
pub struct AskStream {
    rx: mpsc::Receiver<Message>,
}

impl AskStream {
    /// Receives the next message, or `None` at the end of the stream.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Drains the stream into a vector.
    pub async fn collect_all(mut self) -> Vec<Message> {
        let mut messages = Vec::new();
        while let Some(message) = self.rx.recv().await {
            messages.push(message);
        }
        messages
    }
}

impl Stream for AskStream {
    type Item = Message;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// ============================================================================
// Tests
// ============================================================================
