use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Categorized terms extracted by the server from the final transcript.
/// Category keys are server-defined; empty categories are valid and kept.
pub type ExtractedEntities = BTreeMap<String, Vec<String>>;

/// Recording language, fixed for the lifetime of a session. Selects the
/// path segment of the session URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Ml,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ml => "ml",
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::En
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en" => Ok(Language::En),
            "ml" => Ok(Language::Ml),
            other => Err(format!("Unknown language code: {}", other)),
        }
    }
}

/// Messages received from the recognizer, discriminated by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Recognition text. Non-final text supersedes the previous live text
    /// in full; final text is appended permanently.
    Transcript { text: String, is_final: bool },

    /// Terminal message carrying the extracted entity set and, when the
    /// server supplies one, the normalized final transcript.
    Entities { data: EntitiesPayload },

    /// Terminal, non-recoverable server error for this session.
    Error { message: String },
}

/// Payload of the terminal `entities` message. All fields tolerate absence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntitiesPayload {
    #[serde(default)]
    pub extracted_terms: ExtractedEntities,

    /// Normalized final transcript; the incrementally committed text is
    /// only a fallback when this is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_english_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,

    /// Non-fatal server-side processing error; partial terms still apply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Control messages sent to the recognizer over the open socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Signals the server to finalize processing. Sent at most once per
    /// session, only while the socket is open.
    EndStream,
}
