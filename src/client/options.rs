//! Conversation style and backend request defaults.
//!
//! The backend selects its answer mode from a list of opaque option-set
//! flags; each [`ConversationStyle`] maps to one such list.
//!
//! # Example
//!
//! ```ignore
//! use sydney_stream::ConversationStyle;
//!
//! let style: ConversationStyle = "precise".parse()?;
//! assert_eq!(style.tone(), "Precise");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Option set appended when search is disabled.
pub const NO_SEARCH_OPTION: &str = "nosearchall";

/// Default backend endpoint.
pub const DEFAULT_WSS_URL: &str = "wss://sydney.bing.com/sydney/ChatHub";

/// Default locale.
pub const DEFAULT_LOCALE: &str = "en-US";

/// Option sets shared by every style.
const COMMON_OPTIONS: &[&str] = &[
    "nlu_direct_response_filter",
    "deepleo",
    "disable_emoji_spoken_text",
    "responsible_ai_policy_235",
    "enablemm",
    "dv3sugg",
    "iyxapbing",
    "iycapbing",
    "gencontentv3",
    "fluxv1",
    "rai278",
    "replaceurl",
    "nojbfedge",
];

/// Message types the backend is allowed to stream back.
const ALLOWED_MESSAGE_TYPES: &[&str] = &[
    "ActionRequest",
    "Chat",
    "ConfirmationCard",
    "Context",
    "InternalSearchQuery",
    "InternalSearchResult",
    "Disengaged",
    "InternalLoaderMessage",
    "Progress",
    "RenderCardRequest",
    "RenderContentRequest",
    "AdsQuery",
    "SemanticSerp",
    "GenerateContentQuery",
    "SearchQuery",
    "GeneratedCode",
    "InternalTasksMessage",
];

/// Backend feature slice ids.
const SLICE_IDS: &[&str] = &[
    "schurmsg",
    "ntbkcf",
    "rankcf",
    "bgstreamcf",
    "cmcallapptf",
    "vnextvoicecf",
    "tts5cf",
    "abv2mobcf",
    "ctvismctrl",
    "suppsm240-t",
    "translrefctrl",
    "defgrey",
    "ssrrcache",
    "wrapuxslimc",
];

// ============================================================================
// ConversationStyle
// ============================================================================

/// Conversational tone of the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConversationStyle {
    /// Imaginative answers.
    #[default]
    Creative,
    /// Middle ground between creative and precise.
    Balanced,
    /// Short, factual answers.
    Precise,
}

impl ConversationStyle {
    /// All styles, in declaration order.
    pub const ALL: [Self; 3] = [Self::Creative, Self::Balanced, Self::Precise];

    /// Returns the tone string sent to the backend.
    #[inline]
    #[must_use]
    pub const fn tone(self) -> &'static str {
        match self {
            Self::Creative => "Creative",
            Self::Balanced => "Balanced",
            Self::Precise => "Precise",
        }
    }

    /// Returns the style-specific option sets.
    fn extra_options(self) -> &'static [&'static str] {
        match self {
            Self::Creative => &["h3imaginative", "clgalileo"],
            Self::Balanced => &["galileo", "saharagenconv5"],
            Self::Precise => &["h3precise", "clgalileo"],
        }
    }

    /// Returns the default option sets for this style.
    #[must_use]
    pub fn default_options(self) -> Vec<String> {
        COMMON_OPTIONS
            .iter()
            .chain(self.extra_options())
            .map(|s| (*s).to_string())
            .collect()
    }
}

impl fmt::Display for ConversationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tone())
    }
}

impl FromStr for ConversationStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "creative" => Ok(Self::Creative),
            "balanced" => Ok(Self::Balanced),
            "precise" => Ok(Self::Precise),
            other => Err(Error::config(format!(
                "Unknown conversation style: {other}. Expected creative, balanced or precise"
            ))),
        }
    }
}

// ============================================================================
// Defaults
// ============================================================================

/// Returns the default option sets for every style.
#[must_use]
pub fn default_options_sets() -> FxHashMap<ConversationStyle, Vec<String>> {
    ConversationStyle::ALL
        .into_iter()
        .map(|style| (style, style.default_options()))
        .collect()
}

/// Returns the default allowed message types.
#[must_use]
pub fn default_allowed_message_types() -> Vec<String> {
    ALLOWED_MESSAGE_TYPES.iter().map(|s| (*s).to_string()).collect()
}

/// Returns the default slice ids.
#[must_use]
pub fn default_slice_ids() -> Vec<String> {
    SLICE_IDS.iter().map(|s| (*s).to_string()).collect()
}

/// Returns the default location hints, keyed by locale.
#[must_use]
pub fn default_location_hints() -> FxHashMap<String, Vec<Value>> {
    let mut hints = FxHashMap::default();
    hints.insert(
        "en-US".to_string(),
        vec![json!({
            "country": "United States",
            "state": "California",
            "city": "Los Angeles",
            "timezoneoffset": 8,
            "countryConfidence": 8,
            "Center": { "Latitude": 34.0536909, "Longitude": -118.242766 },
            "RegionType": 2,
            "SourceType": 1
        })],
    );
    hints.insert(
        "en-GB".to_string(),
        vec![json!({
            "country": "United Kingdom",
            "state": "England",
            "city": "London",
            "timezoneoffset": 0,
            "countryConfidence": 8,
            "Center": { "Latitude": 51.5074, "Longitude": -0.1278 },
            "RegionType": 2,
            "SourceType": 1
        })],
    );
    hints
}

// ============================================================================
// Tests
// ============================================================================
