//! Incremental answer reconstruction.
//!
//! The backend re-sends the full text of the current answer segment on
//! every update. [`ResponseTranslator`] keeps a cursor of how much of the
//! segment the caller has already seen and emits only the new suffix.
//! The cursor follows the backend when it trims text and restarts when a
//! new segment begins.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Error;
use crate::protocol::{BotMessage, Event, GeneratedImage, Message, MessageSubtype};

use super::demux::RawEvent;

// ============================================================================
// Constants
// ============================================================================

/// Hidden text of a search that found nothing.
const NO_SEARCH_RESULT: &str = "Web search returned no relevant result";

/// `contentType` of an image generation request.
const IMAGE_CONTENT_TYPE: &str = "IMAGE";

// ============================================================================
// ResponseTranslator
// ============================================================================

/// Turns classified events into caller-facing messages.
///
/// One translator serves exactly one ask.
#[derive(Debug, Default)]
pub struct ResponseTranslator {
    /// Characters of the current segment already emitted.
    emitted: usize,
    /// Prompt of the ask, for diagnostics.
    prompt: String,
}

impl ResponseTranslator {
    /// Creates a translator for the ask with the given prompt.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            emitted: 0,
            prompt: prompt.into(),
        }
    }

    /// Returns how many characters of the current segment were emitted.
    #[inline]
    #[must_use]
    pub const fn emitted_len(&self) -> usize {
        self.emitted
    }

    /// Translates one event.
    ///
    /// If the returned batch contains a [`Message::Error`] it is the last
    /// element and the stream must end there.
    pub fn translate(&mut self, event: &Event) -> Vec<Message> {
        let mut out = Vec::new();

        match event {
            Event::Update(_) => {
                if let Some(message) = event.latest_message() {
                    self.translate_update(event.starts_segment(), message, &mut out);
                }
            }
            Event::Completion(_) => {
                if let Some(message) = event.final_message() {
                    push_suggestions(message, &mut out);
                }
            }
        }

        out
    }

    /// Handles the latest message of a partial update.
    fn translate_update(
        &mut self,
        new_segment: bool,
        message: BotMessage<'_>,
        out: &mut Vec<Message>,
    ) {
        match message.subtype() {
            MessageSubtype::SearchQuery => {
                out.push(Message::SearchQuery(
                    message.hidden_text().unwrap_or_default().to_string(),
                ));
            }
            MessageSubtype::SearchResult => {
                if let Some(result) = search_result(message) {
                    out.push(Message::SearchResult(result));
                }
            }
            MessageSubtype::Loader => {
                let status = message
                    .hidden_text()
                    .or_else(|| message.text_field())
                    .map_or_else(|| message.raw(), str::to_string);
                out.push(Message::Loading(status));
            }
            MessageSubtype::GenerateContent => {
                if message.content_type() == Some(IMAGE_CONTENT_TYPE) {
                    out.push(Message::GeneratedImage(GeneratedImage::new(
                        message.text(),
                        message.message_id(),
                    )));
                }
            }
            MessageSubtype::Answer => self.translate_answer(new_segment, message, out),
            MessageSubtype::Unsupported(kind) => {
                warn!(
                    message_type = %kind,
                    prompt = %self.prompt,
                    response = %message.raw(),
                    "Unsupported message type"
                );
            }
        }
    }

    /// Applies the cursor to plain answer text.
    fn translate_answer(
        &mut self,
        new_segment: bool,
        message: BotMessage<'_>,
        out: &mut Vec<Message>,
    ) {
        if new_segment {
            self.emitted = 0;
        }

        if message.is_apology() {
            let err = if self.emitted != 0 {
                Error::MessageRevoked
            } else {
                Error::MessageFiltered
            };
            debug!(emitted = self.emitted, error = %err, "Answer rejected by content filter");
            out.push(Message::Error(err));
            return;
        }

        if let Some(delta) = self.advance(message.text()) {
            out.push(Message::Text(delta));
        }

        push_suggestions(message, out);
    }

    /// Moves the cursor to the end of `text`, returning any new suffix.
    fn advance(&mut self, text: &str) -> Option<String> {
        let len = text.chars().count();
        let delta = (len > self.emitted).then(|| text.chars().skip(self.emitted).collect());
        self.emitted = len;
        delta
    }

    /// Runs the translate stage until the stream ends.
    ///
    /// Stops after forwarding an error, when `events` closes, when the
    /// receiver goes away, or silently once `cancel` fires.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<RawEvent>,
        out: mpsc::Sender<Message>,
        cancel: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                biased;
                () = out.closed() => {
                    debug!("Message receiver dropped");
                    return;
                }
                event = events.recv() => event,
            };
            let Some(event) = event else { break };

            let batch = match event {
                Ok(event) => self.translate(&event),
                Err(e) => {
                    warn!(error = %e, "Ask stream failed");
                    vec![Message::Error(e)]
                }
            };

            for message in batch {
                if cancel.is_cancelled() {
                    debug!("Translate stage cancelled");
                    return;
                }

                let is_error = message.is_error();
                if out.send(message).await.is_err() {
                    debug!("Message receiver dropped");
                    return;
                }
                if is_error {
                    return;
                }
            }
        }

        debug!("Translate stage finished");
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Emits the suggested follow-ups attached to a message, if any.
fn push_suggestions(message: BotMessage<'_>, out: &mut Vec<Message>) {
    if let Some(suggestions) = message.suggested_responses() {
        out.push(Message::SuggestedResponses(suggestions));
    }
}

/// Builds the search result text, or `None` if the payload is malformed.
fn search_result(message: BotMessage<'_>) -> Option<String> {
    if let Some(hidden) = message.hidden_text()
        && hidden.contains(NO_SEARCH_RESULT)
    {
        return Some(hidden.to_string());
    }

    match format_citations(message.text()) {
        Ok(links) => Some(links),
        Err(e) => {
            warn!(error = %e, text = %message.text(), "Error when parsing search result");
            None
        }
    }
}

/// Formats citation groups as footnote links.
///
/// The payload is an array of groups; each group is an object whose values
/// are arrays of `{title, url}` citations. Numbering restarts at 1 for
/// every group.
///
/// # Errors
///
/// Returns [`serde_json::Error`] if the payload is not valid JSON, is not
/// an array, or holds a group that is not an object of citation arrays.
pub fn format_citations(payload: &str) -> serde_json::Result<String> {
    let groups: Value = serde_json::from_str(payload)?;
    let groups = groups
        .as_array()
        .ok_or_else(|| malformed_citations("citation groups must be an array"))?;
    let mut links = Vec::new();

    for group in groups {
        let group = group
            .as_object()
            .ok_or_else(|| malformed_citations("citation group must be an object"))?;
        let mut index = 1;
        for citations in group.values() {
            let citations = citations
                .as_array()
                .ok_or_else(|| malformed_citations("citations must be an array"))?;
            for citation in citations {
                let title = citation.get("title").and_then(Value::as_str).unwrap_or_default();
                let url = citation.get("url").and_then(Value::as_str).unwrap_or_default();
                links.push(format!("[^{index}^][{title}]({url})"));
                index += 1;
            }
        }
    }

    Ok(links.join("\n\n"))
}

fn malformed_citations(reason: &str) -> serde_json::Error {
    serde::de::Error::custom(reason)
}

// ============================================================================
// Tests
// ============================================================================
