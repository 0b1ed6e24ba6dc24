//! Frame demultiplexing.
//!
//! Splits transport frames into records, validates them as JSON and keeps
//! only partial updates and the terminal record. A malformed record or a
//! failed terminal record ends the stream with one error.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::{Event, RECORD_SEPARATOR, RESULT_SUCCESS, TYPE_COMPLETION, TYPE_UPDATE};

// ============================================================================
// Types
// ============================================================================

/// A classified record, or the error that ended the stream.
pub type RawEvent = Result<Event>;

// ============================================================================
// EventDemuxer
// ============================================================================

/// Turns frames into classified events.
///
/// Once a terminal outcome has been produced the demuxer is finished and
/// ignores further frames.
#[derive(Debug, Default)]
pub struct EventDemuxer {
    /// Set after the terminal record or the first error.
    finished: bool,
}

impl EventDemuxer {
    /// Creates a demuxer for a new ask.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once the stream has reached its end.
    #[inline]
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Demultiplexes one frame.
    ///
    /// Records after a terminal outcome in the same frame are dropped.
    pub fn push_frame(&mut self, frame: &str) -> Vec<RawEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        for record in split_records(frame) {
            match classify(record) {
                Ok(Some(event)) => {
                    let terminal = event.is_completion();
                    events.push(Ok(event));
                    if terminal {
                        self.finished = true;
                        break;
                    }
                }
                Ok(None) => trace!(record, "Ignoring record"),
                Err(e) => {
                    events.push(Err(e));
                    self.finished = true;
                    break;
                }
            }
        }

        events
    }

    /// Runs the demux stage until the stream ends.
    ///
    /// Reads frames from `frames` and forwards events to `events`. Returns
    /// when the terminal outcome has been forwarded, the upstream closes or
    /// the downstream goes away.
    pub async fn run(
        mut self,
        mut frames: mpsc::Receiver<Result<String>>,
        events: mpsc::Sender<RawEvent>,
    ) {
        loop {
            let frame = tokio::select! {
                biased;
                () = events.closed() => {
                    debug!("Event receiver dropped");
                    return;
                }
                frame = frames.recv() => frame,
            };
            let Some(frame) = frame else { break };

            let batch = match frame {
                Ok(frame) => self.push_frame(&frame),
                Err(e) => vec![Err(e)],
            };

            for event in batch {
                let is_err = event.is_err();
                if events.send(event).await.is_err() {
                    debug!("Event receiver dropped");
                    return;
                }
                if is_err {
                    return;
                }
            }

            if self.finished {
                break;
            }
        }

        debug!("Demux stage finished");
    }
}

// ============================================================================
// Record Handling
// ============================================================================

/// Splits a frame into its non-empty records.
pub fn split_records(frame: &str) -> impl Iterator<Item = &str> {
    frame
        .split(RECORD_SEPARATOR)
        .filter(|record| !record.trim().is_empty())
}

/// Validates and classifies one record.
///
/// Returns `Ok(None)` for records that carry nothing for the caller.
///
/// # Errors
///
/// - [`Error::MalformedEvent`] if the record is not valid JSON
/// - [`Error::Backend`] if a terminal record reports a non-success result
pub fn classify(record: &str) -> Result<Option<Event>> {
    let value: Value =
        serde_json::from_str(record).map_err(|e| Error::malformed_event(e.to_string()))?;

    match value.get("type").and_then(Value::as_i64) {
        Some(TYPE_UPDATE) => {
            let has_messages = value
                .pointer("/arguments/0/messages")
                .and_then(Value::as_array)
                .is_some_and(|messages| !messages.is_empty());

            Ok(has_messages.then_some(Event::Update(value)))
        }
        Some(TYPE_COMPLETION) => {
            let status = value.pointer("/item/result/value");
            if status.and_then(Value::as_str) != Some(RESULT_SUCCESS) {
                let code = field_text(status);
                let message = field_text(value.pointer("/item/result/message"));
                warn!(%code, %message, "Backend reported failure");
                return Err(Error::backend(code, message));
            }
            Ok(Some(Event::Completion(value)))
        }
        _ => Ok(None),
    }
}

/// Renders a result field for an error message.
fn field_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const UPDATE: &str = r#"{"type":1,"target":"update","arguments":[{"messages":[{"text":"Hi"}]}]}"#;
    const SUCCESS: &str = r#"{"type":2,"invocationId":"0","item":{"messages":[],"result":{"value":"Success"}}}"#;

    fn frame(records: &[&str]) -> String {
        records
            .iter()
            .map(|r| format!("{r}{RECORD_SEPARATOR}"))
            .collect()
    }

    #[test]
    fn test_split_skips_empty_records() {
        let records: Vec<_> = split_records("{}\u{1e}\u{1e}{\"a\":1}\u{1e}").collect();
        assert_eq!(records, vec!["{}", "{\"a\":1}"]);
    }

    #[test]
    fn test_classify_update() {
        let event = classify(UPDATE).expect("valid").expect("forwarded");
        assert!(matches!(event, Event::Update(_)));
    }

    #[test]
    fn test_classify_update_without_messages_ignored() {
        let record = r#"{"type":1,"target":"update","arguments":[{"throttling":{}}]}"#;
        assert!(classify(record).expect("valid").is_none());

        let empty = r#"{"type":1,"arguments":[{"messages":[]}]}"#;
        assert!(classify(empty).expect("valid").is_none());
    }

    #[test]
    fn test_classify_other_types_ignored() {
        assert!(classify(r#"{"type":6}"#).expect("valid").is_none());
        assert!(classify(r#"{"type":3,"invocationId":"0"}"#).expect("valid").is_none());
        assert!(classify("{}").expect("valid").is_none());
    }

    #[test]
    fn test_classify_backend_failure() {
        let record = r#"{"type":2,"item":{"result":{"value":"Throttled","message":"Request is throttled."}}}"#;
        match classify(record) {
            Err(Error::Backend { code, message }) => {
                assert_eq!(code, "Throttled");
                assert_eq!(message, "Request is throttled.");
            }
            other => panic!("expected backend error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_completion_without_result_fails() {
        let record = r#"{"type":2,"item":{"messages":[]}}"#;
        assert!(matches!(classify(record), Err(Error::Backend { .. })));
    }

    #[test]
    fn test_classify_malformed() {
        assert!(matches!(
            classify("{\"type\":1,"),
            Err(Error::MalformedEvent { .. })
        ));
    }

    #[test]
    fn test_push_frame_batched_records() {
        let mut demuxer = EventDemuxer::new();
        let events = demuxer.push_frame(&frame(&[UPDATE, r#"{"type":6}"#, UPDATE]));

        assert_eq!(events.len(), 2);
        assert!(events.iter().all(Result::is_ok));
        assert!(!demuxer.is_finished());
    }

    #[test]
    fn test_push_frame_stops_after_completion() {
        let mut demuxer = EventDemuxer::new();
        let events = demuxer.push_frame(&frame(&[UPDATE, SUCCESS, UPDATE]));

        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Ok(Event::Completion(_))));
        assert!(demuxer.is_finished());
        assert!(demuxer.push_frame(&frame(&[UPDATE])).is_empty());
    }

    #[test]
    fn test_push_frame_stops_after_malformed() {
        let mut demuxer = EventDemuxer::new();
        let events = demuxer.push_frame(&frame(&[UPDATE, "not json", UPDATE]));

        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Err(Error::MalformedEvent { .. })));
        assert!(demuxer.is_finished());
    }

    #[tokio::test]
    async fn test_run_forwards_transport_error_and_stops() {
        let (frame_tx, frame_rx) = mpsc::channel(1);
        let (event_tx, mut event_rx) = mpsc::channel(1);
        let stage = tokio::spawn(EventDemuxer::new().run(frame_rx, event_tx));

        frame_tx.send(Ok(frame(&[UPDATE]))).await.expect("send");
        assert!(matches!(event_rx.recv().await, Some(Ok(Event::Update(_)))));

        frame_tx.send(Err(Error::ConnectionClosed)).await.expect("send");
        assert!(matches!(event_rx.recv().await, Some(Err(Error::ConnectionClosed))));
        assert!(event_rx.recv().await.is_none());

        stage.await.expect("stage");
    }

    #[tokio::test]
    async fn test_run_closes_after_completion() {
        let (frame_tx, frame_rx) = mpsc::channel(1);
        let (event_tx, mut event_rx) = mpsc::channel(1);
        let stage = tokio::spawn(EventDemuxer::new().run(frame_rx, event_tx));

        frame_tx.send(Ok(frame(&[SUCCESS]))).await.expect("send");
        assert!(matches!(event_rx.recv().await, Some(Ok(Event::Completion(_)))));
        assert!(event_rx.recv().await.is_none());

        stage.await.expect("stage");
    }
}
