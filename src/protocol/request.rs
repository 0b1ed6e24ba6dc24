//! Outbound chat request document.
//!
//! One [`ChatRequest`] is built per ask and sent as a single record right
//! after the handshake.
//!
//! # Format
//!
//! ```json
//! {
//!   "arguments": [{ "optionsSets": [...], "message": { ... }, ... }],
//!   "invocationId": "0",
//!   "target": "chat",
//!   "type": 4
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use rand::Rng;
use serde::Serialize;
use serde_json::Value;

use crate::client::{AskOptions, ConversationStyle, NO_SEARCH_OPTION};
use crate::error::{Error, Result};
use crate::identifiers::{MessageId, TraceId};

// ============================================================================
// Constants
// ============================================================================

/// Invocation type code of a chat request.
const INVOCATION_TYPE: u8 = 4;

/// Message-kind tags the backend accepts for a user turn.
const MESSAGE_KINDS: [&str; 2] = ["Chat", "SearchQuery"];

/// Fixed id of the synthetic web-page context turn.
const CONTEXT_MESSAGE_ID: &str = "discover-web--page-ping-mriduna-----";

// ============================================================================
// RequestContext
// ============================================================================

/// Client-level settings that shape every request.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    /// Conversational tone.
    pub style: ConversationStyle,
    /// Option sets of the selected style.
    pub options_sets: &'a [String],
    /// Append [`NO_SEARCH_OPTION`] to the option sets.
    pub no_search: bool,
    /// Locale such as `en-US`.
    pub locale: &'a str,
    /// Location hints for the locale.
    pub location_hints: &'a [Value],
    /// Message types the backend may stream back.
    pub allowed_message_types: &'a [String],
    /// Backend feature slice ids.
    pub slice_ids: &'a [String],
}

// ============================================================================
// ChatRequest
// ============================================================================

/// The single outbound chat request of an ask.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Exactly one argument block.
    pub arguments: Vec<Argument>,
    /// Invocation id, always `"0"`.
    pub invocation_id: String,
    /// Target hub method, always `"chat"`.
    pub target: String,
    /// Invocation type code.
    #[serde(rename = "type")]
    pub kind: u8,
}

/// Argument block of a [`ChatRequest`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Argument {
    pub options_sets: Vec<String>,
    pub source: String,
    pub allowed_message_types: Vec<String>,
    pub slice_ids: Vec<String>,
    pub verbosity: String,
    pub scenario: String,
    pub trace_id: TraceId,
    pub request_id: MessageId,
    pub is_start_of_session: bool,
    pub message: ArgumentMessage,
    pub tone: String,
    /// Serialized as `null` when absent.
    pub conversation_signature: Option<String>,
    pub participant: Participant,
    pub spoken_text_mode: String,
    pub conversation_id: String,
    pub previous_messages: Vec<PreviousMessage>,
}

/// The user turn carried by an [`Argument`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgumentMessage {
    pub locale: String,
    pub market: String,
    pub region: String,
    pub location_hints: Vec<Value>,
    pub author: String,
    pub input_method: String,
    pub text: String,
    pub message_type: String,
    pub request_id: MessageId,
    pub message_id: MessageId,
    /// Serialized as `null` when absent.
    pub image_url: Option<String>,
}

/// Conversation participant.
#[derive(Debug, Clone, Serialize)]
pub struct Participant {
    pub id: String,
}

/// Synthetic prior turn carrying the web-page context.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousMessage {
    pub author: String,
    pub description: String,
    pub context_type: String,
    pub message_type: String,
    pub message_id: String,
}

impl ChatRequest {
    /// Builds the request document for one ask.
    ///
    /// A fresh [`MessageId`] and [`TraceId`] are generated on every call and
    /// the message-kind tag is picked at random.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the locale is shorter than two characters.
    pub fn build(ctx: &RequestContext<'_>, ask: &AskOptions) -> Result<Self> {
        let region = region_of(ctx.locale)?;
        let message_id = MessageId::generate();

        let mut options_sets = ctx.options_sets.to_vec();
        if ctx.no_search {
            options_sets.push(NO_SEARCH_OPTION.to_string());
        }

        let message_kind = MESSAGE_KINDS[rand::thread_rng().gen_range(0..MESSAGE_KINDS.len())];

        let message = ArgumentMessage {
            locale: ctx.locale.to_string(),
            market: ctx.locale.to_string(),
            region: region.to_string(),
            location_hints: ctx.location_hints.to_vec(),
            author: "user".to_string(),
            input_method: "Keyboard".to_string(),
            text: ask.prompt.clone(),
            message_type: message_kind.to_string(),
            request_id: message_id,
            message_id,
            image_url: ask.image_url.clone().filter(|url| !url.is_empty()),
        };

        let argument = Argument {
            options_sets,
            source: "cib".to_string(),
            allowed_message_types: ctx.allowed_message_types.to_vec(),
            slice_ids: ctx.slice_ids.to_vec(),
            verbosity: "verbose".to_string(),
            scenario: "SERP".to_string(),
            trace_id: TraceId::generate(),
            request_id: message_id,
            is_start_of_session: true,
            message,
            tone: ctx.style.tone().to_string(),
            conversation_signature: ask
                .conversation
                .conversation_signature
                .clone()
                .filter(|sig| !sig.is_empty()),
            participant: Participant {
                id: ask.conversation.client_id.clone(),
            },
            spoken_text_mode: "None".to_string(),
            conversation_id: ask.conversation.conversation_id.clone(),
            previous_messages: vec![PreviousMessage {
                author: "user".to_string(),
                description: ask.webpage_context.clone().unwrap_or_default(),
                context_type: "WebPage".to_string(),
                message_type: "Context".to_string(),
                message_id: CONTEXT_MESSAGE_ID.to_string(),
            }],
        };

        Ok(Self {
            arguments: vec![argument],
            invocation_id: "0".to_string(),
            target: "chat".to_string(),
            kind: INVOCATION_TYPE,
        })
    }

    /// Returns the id shared by the request and its user message.
    #[must_use]
    pub fn message_id(&self) -> Option<MessageId> {
        self.arguments.first().map(|arg| arg.message.message_id)
    }
}

/// Returns the two-letter region at the end of a locale.
fn region_of(locale: &str) -> Result<&str> {
    let start = locale.len().checked_sub(2).ok_or_else(|| {
        Error::config(format!("Locale too short: {locale:?}"))
    })?;

    locale
        .get(start..)
        .ok_or_else(|| Error::config(format!("Locale is not ASCII: {locale:?}")))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::client::Conversation;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn build(no_search: bool, ask: &AskOptions) -> Value {
        let options_sets = strings(&["deepleo", "h3precise"]);
        let allowed = strings(&["Chat"]);
        let slices = strings(&["schurmsg"]);
        let ctx = RequestContext {
            style: ConversationStyle::Precise,
            options_sets: &options_sets,
            no_search,
            locale: "en-GB",
            location_hints: &[],
            allowed_message_types: &allowed,
            slice_ids: &slices,
        };

        let request = ChatRequest::build(&ctx, ask).expect("build");
        serde_json::to_value(&request).expect("serialize")
    }

    #[test]
    fn test_request_envelope() {
        let ask = AskOptions::new(Conversation::new("conv", "client"), "hello");
        let json = build(false, &ask);

        assert_eq!(json["invocationId"], "0");
        assert_eq!(json["target"], "chat");
        assert_eq!(json["type"], 4);
        assert_eq!(json["arguments"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_request_argument_fields() {
        let ask = AskOptions::new(Conversation::new("conv", "client"), "hello")
            .with_webpage_context("[user](#message)\nearlier turn");
        let json = build(false, &ask);
        let arg = &json["arguments"][0];

        assert_eq!(arg["source"], "cib");
        assert_eq!(arg["tone"], "Precise");
        assert_eq!(arg["conversationId"], "conv");
        assert_eq!(arg["participant"]["id"], "client");
        assert_eq!(arg["isStartOfSession"], true);
        assert_eq!(arg["spokenTextMode"], "None");
        assert_eq!(arg["message"]["text"], "hello");
        assert_eq!(arg["message"]["market"], "en-GB");
        assert_eq!(arg["message"]["region"], "GB");
        assert_eq!(arg["message"]["requestId"], arg["requestId"]);
        assert_eq!(arg["message"]["messageId"], arg["requestId"]);
        assert_eq!(arg["previousMessages"][0]["contextType"], "WebPage");
        assert_eq!(
            arg["previousMessages"][0]["description"],
            "[user](#message)\nearlier turn"
        );
    }

    #[test]
    fn test_absent_optionals_serialize_as_null() {
        let ask = AskOptions::new(Conversation::new("conv", "client"), "hello");
        let json = build(false, &ask);
        let arg = &json["arguments"][0];

        assert!(arg["conversationSignature"].is_null());
        assert!(arg["message"]["imageUrl"].is_null());
        assert!(arg.as_object().expect("object").contains_key("conversationSignature"));
    }

    #[test]
    fn test_present_optionals() {
        let conversation = Conversation::new("conv", "client").with_signature("sig");
        let ask = AskOptions::new(conversation, "hello").with_image_url("https://img/1");
        let json = build(false, &ask);
        let arg = &json["arguments"][0];

        assert_eq!(arg["conversationSignature"], "sig");
        assert_eq!(arg["message"]["imageUrl"], "https://img/1");
    }

    #[test]
    fn test_no_search_appends_option() {
        let ask = AskOptions::new(Conversation::new("conv", "client"), "hello");

        let with = build(true, &ask);
        let options = with["arguments"][0]["optionsSets"].as_array().expect("array");
        assert_eq!(options.last().and_then(Value::as_str), Some(NO_SEARCH_OPTION));

        let without = build(false, &ask);
        let options = without["arguments"][0]["optionsSets"].as_array().expect("array");
        assert_eq!(options.len(), 2);
    }

    #[test]
    fn test_message_kind_is_accepted_tag() {
        let ask = AskOptions::new(Conversation::new("conv", "client"), "hello");
        for _ in 0..16 {
            let json = build(false, &ask);
            let kind = json["arguments"][0]["message"]["messageType"]
                .as_str()
                .expect("string");
            assert!(MESSAGE_KINDS.contains(&kind));
        }
    }

    #[test]
    fn test_fresh_ids_per_request() {
        let ask = AskOptions::new(Conversation::new("conv", "client"), "hello");
        let a = build(false, &ask);
        let b = build(false, &ask);

        assert_ne!(a["arguments"][0]["requestId"], b["arguments"][0]["requestId"]);
        assert_ne!(a["arguments"][0]["traceId"], b["arguments"][0]["traceId"]);
    }

    #[test]
    fn test_short_locale_rejected() {
        assert!(region_of("e").is_err());
        assert_eq!(region_of("zh-CN").expect("region"), "CN");
    }
}
