use serde::Serialize;
use std::fmt;

use crate::protocol::{ExtractedEntities, Language};

/// User-visible failure taxonomy. Exactly one message is shown per failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// Transport never opened, or closed before any result arrived.
    ConnectionFailure,
    /// Capture permission refused or no usable input device.
    DeviceAccessDenied,
    /// Explicit terminal `error` message from the server.
    ServerReported(String),
    /// The connection dropped after streaming succeeded but before the
    /// final results arrived.
    UnexpectedClose,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::ConnectionFailure => {
                write!(
                    f,
                    "Connection to server failed. Please ensure the backend is running."
                )
            }
            FailureKind::DeviceAccessDenied => {
                write!(f, "Microphone access was denied or no input device is available.")
            }
            FailureKind::ServerReported(message) => write!(f, "{}", message),
            FailureKind::UnexpectedClose => {
                write!(f, "Connection closed before final results were received.")
            }
        }
    }
}

/// Session lifecycle. Exactly one value is active at any time; invalid flag
/// combinations of the boolean-flag design are unrepresentable here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    Idle,
    Connecting,
    Streaming,
    AwaitingFinal,
    Completed,
    Failed(FailureKind),
}

impl SessionStatus {
    /// A session is active from connect until a terminal state; starting a
    /// new one while active is a no-op.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionStatus::Connecting | SessionStatus::Streaming | SessionStatus::AwaitingFinal
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed(_))
    }
}

/// Live and committed transcript text.
///
/// `live_text` is unstable and replaced wholesale by each partial update;
/// `committed_text` grows append-only until the final entities message
/// replaces it with the server's normalized text (when supplied).
#[derive(Debug, Clone, Default, Serialize)]
pub struct TranscriptState {
    pub live_text: String,
    pub committed_text: String,
}

impl TranscriptState {
    /// Non-final update: the server is the source of truth for in-progress
    /// text, so this replaces rather than appends.
    pub fn apply_partial(&mut self, text: &str) {
        self.live_text = text.to_string();
    }

    /// Final update: append permanently with a separating space, clear the
    /// live text.
    pub fn apply_final(&mut self, text: &str) {
        self.committed_text.push_str(text);
        self.committed_text.push(' ');
        self.live_text.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.live_text.trim().is_empty() && self.committed_text.trim().is_empty()
    }

    pub fn clear(&mut self) {
        self.live_text.clear();
        self.committed_text.clear();
    }
}

/// Read-only view of session state for the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub status: SessionStatus,
    pub live_text: String,
    pub committed_text: String,
    pub entities: ExtractedEntities,
    pub error: Option<String>,
    pub language: Language,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            status: SessionStatus::Idle,
            live_text: String::new(),
            committed_text: String::new(),
            entities: ExtractedEntities::new(),
            error: None,
            language: Language::default(),
        }
    }
}
