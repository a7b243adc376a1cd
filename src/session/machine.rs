// Protocol state machine for one transcription session.
//
// Pure and synchronous: transport and capture events come in, state changes
// and side-effect requests come out. All I/O lives in the session
// orchestrator, which keeps every transition unit-testable.

use chrono::Utc;
use std::str::FromStr;
use tracing::{debug, warn};
use uuid::Uuid;

use super::state::{FailureKind, SessionSnapshot, SessionStatus, TranscriptState};
use crate::history::HistoryRecord;
use crate::protocol::{ExtractedEntities, Language, ServerMessage};

/// Side effects requested by a transition, executed by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Halt capture and release the device.
    StopCapture,
    /// Send the end-of-stream control message over the open transport.
    SendEndStream,
    /// Close the transport connection.
    CloseTransport,
    /// Append one record to the session history.
    Persist(HistoryRecord),
}

pub struct SessionStateMachine {
    session_id: String,
    status: SessionStatus,
    transcript: TranscriptState,
    entities: ExtractedEntities,
    error: Option<String>,
    language: Language,
    end_stream_sent: bool,
    persisted: bool,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self {
            session_id: String::new(),
            status: SessionStatus::Idle,
            transcript: TranscriptState::default(),
            entities: ExtractedEntities::new(),
            error: None,
            language: Language::default(),
            end_stream_sent: false,
            persisted: false,
        }
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Begin a new session. Returns false (no-op) while a session is
    /// already active; otherwise resets all result state and enters
    /// Connecting.
    pub fn start(&mut self, language: Language) -> bool {
        if self.status.is_active() {
            warn!("Session already active, ignoring start");
            return false;
        }

        self.session_id = format!("session-{}", Uuid::new_v4());
        self.status = SessionStatus::Connecting;
        self.transcript.clear();
        self.entities.clear();
        self.error = None;
        self.language = language;
        self.end_stream_sent = false;
        self.persisted = false;

        true
    }

    /// Transport handshake completed; streaming may begin.
    pub fn on_connected(&mut self) {
        if self.status == SessionStatus::Connecting {
            self.status = SessionStatus::Streaming;
        }
    }

    /// Transport connect attempt failed, or the connection errored while in
    /// use. No automatic retry.
    pub fn on_transport_error(&mut self, error: &str) -> Vec<SessionAction> {
        if self.status.is_terminal() || self.status == SessionStatus::Idle {
            return Vec::new();
        }

        warn!("Transport error while {:?}: {}", self.status, error);

        let was_streaming = self.status == SessionStatus::Streaming;
        self.fail(FailureKind::ConnectionFailure);

        if was_streaming {
            vec![SessionAction::StopCapture, SessionAction::CloseTransport]
        } else {
            vec![SessionAction::CloseTransport]
        }
    }

    /// Capture device could not be acquired; the session cannot proceed.
    pub fn on_device_error(&mut self, error: &str) -> Vec<SessionAction> {
        if self.status.is_terminal() || self.status == SessionStatus::Idle {
            return Vec::new();
        }

        warn!("Capture device error: {}", error);
        self.fail(FailureKind::DeviceAccessDenied);

        vec![SessionAction::StopCapture, SessionAction::CloseTransport]
    }

    /// The socket closed without a terminal message.
    ///
    /// While streaming with no committed text this is a connection failure;
    /// with accumulated text it is treated as an implicit end-of-stream
    /// (the server may have finalized on its own). A close while already
    /// awaiting final results means those results will never arrive: the
    /// stream itself succeeded, so that is an unexpected close rather than
    /// a connection failure.
    pub fn on_transport_closed(&mut self) -> Vec<SessionAction> {
        match self.status {
            SessionStatus::Streaming => {
                if self.transcript.committed_text.trim().is_empty() {
                    self.fail(FailureKind::ConnectionFailure);
                } else {
                    self.status = SessionStatus::AwaitingFinal;
                }
                vec![SessionAction::StopCapture]
            }
            SessionStatus::AwaitingFinal => {
                self.fail(FailureKind::UnexpectedClose);
                Vec::new()
            }
            SessionStatus::Connecting => {
                self.fail(FailureKind::ConnectionFailure);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Dispatch one raw server message.
    ///
    /// A message that fails to decode is surfaced as an error string but
    /// does not terminate the session; dropping one message must not
    /// corrupt the stream state.
    pub fn on_raw_message(&mut self, raw: &str) -> Vec<SessionAction> {
        if self.status.is_terminal() || self.status == SessionStatus::Idle {
            return Vec::new();
        }

        match serde_json::from_str::<ServerMessage>(raw) {
            Ok(message) => self.on_message(message),
            Err(e) => {
                warn!("Failed to decode server message: {}", e);
                self.error = Some("Failed to process server response".to_string());
                Vec::new()
            }
        }
    }

    fn on_message(&mut self, message: ServerMessage) -> Vec<SessionAction> {
        match message {
            ServerMessage::Transcript { text, is_final } => {
                if is_final {
                    debug!("Final transcript segment: {:?}", text);
                    self.transcript.apply_final(&text);
                } else {
                    self.transcript.apply_partial(&text);
                }
                Vec::new()
            }
            ServerMessage::Entities { data } => {
                let was_streaming = self.status == SessionStatus::Streaming;
                self.status = SessionStatus::Completed;

                // Wholesale replacement, never a merge.
                self.entities = data.extracted_terms;

                // Server-normalized text wins; incrementally committed text
                // is the fallback.
                let final_text = data
                    .final_english_text
                    .unwrap_or_else(|| self.transcript.committed_text.trim_end().to_string());
                self.transcript.committed_text = final_text.clone();
                self.transcript.live_text.clear();

                if let Some(language) = data
                    .source_language
                    .as_deref()
                    .and_then(|code| Language::from_str(code).ok())
                {
                    self.language = language;
                }

                let mut actions = Vec::new();
                if was_streaming {
                    actions.push(SessionAction::StopCapture);
                }
                actions.push(SessionAction::CloseTransport);

                match data.error {
                    Some(server_error) => {
                        // Non-fatal: keep the partial entity data, surface
                        // the message, skip history.
                        self.error = Some(format!("Processing error: {}", server_error));
                    }
                    None => {
                        self.error = None;
                        if !self.persisted {
                            self.persisted = true;
                            actions.push(SessionAction::Persist(HistoryRecord {
                                id: self.session_id.clone(),
                                text: final_text,
                                terms: self.entities.clone(),
                                language: self.language,
                                timestamp: Utc::now(),
                            }));
                        }
                    }
                }

                actions
            }
            ServerMessage::Error { message } => {
                warn!("Server reported fatal error: {}", message);
                self.error = Some(message.clone());
                self.status = SessionStatus::Failed(FailureKind::ServerReported(message));
                vec![SessionAction::StopCapture, SessionAction::CloseTransport]
            }
        }
    }

    /// Explicit user stop. Idempotent: only a streaming session transitions;
    /// capture is released immediately and end-of-stream is sent once.
    pub fn stop(&mut self) -> Vec<SessionAction> {
        if self.status != SessionStatus::Streaming {
            return Vec::new();
        }

        self.status = SessionStatus::AwaitingFinal;

        let mut actions = vec![SessionAction::StopCapture];
        if !self.end_stream_sent {
            self.end_stream_sent = true;
            actions.push(SessionAction::SendEndStream);
        }
        actions
    }

    /// Append a trimmed, non-empty term to a category, creating the category
    /// if absent. Local-only, post-completion.
    pub fn add_term(&mut self, category: &str, value: &str) {
        if self.status != SessionStatus::Completed {
            return;
        }
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return;
        }
        self.entities
            .entry(category.to_string())
            .or_default()
            .push(trimmed.to_string());
    }

    /// Remove the first term equal to `value` from a category. Removing an
    /// absent term is a no-op. Local-only, post-completion.
    pub fn remove_term(&mut self, category: &str, value: &str) {
        if self.status != SessionStatus::Completed {
            return;
        }
        if let Some(terms) = self.entities.get_mut(category) {
            if let Some(index) = terms.iter().position(|term| term == value) {
                terms.remove(index);
            }
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            status: self.status.clone(),
            live_text: self.transcript.live_text.clone(),
            committed_text: self.transcript.committed_text.clone(),
            entities: self.entities.clone(),
            error: self
                .error
                .clone()
                .or_else(|| match &self.status {
                    SessionStatus::Failed(kind) => Some(kind.to_string()),
                    _ => None,
                }),
            language: self.language,
        }
    }

    fn fail(&mut self, kind: FailureKind) {
        self.error = Some(kind.to_string());
        self.status = SessionStatus::Failed(kind);
    }
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
