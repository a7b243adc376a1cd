pub mod audio;
pub mod config;
pub mod history;
pub mod protocol;
pub mod session;
pub mod transport;

pub use audio::{AudioCapture, AudioCaptureFactory, AudioFrame, CaptureConfig};
pub use config::Config;
pub use history::{HistoryRecord, HistoryStore, HISTORY_CAPACITY};
pub use protocol::{ControlMessage, EntitiesPayload, ExtractedEntities, Language, ServerMessage};
pub use session::{
    FailureKind, Session, SessionSnapshot, SessionStateMachine, SessionStatus, TranscriptState,
};
pub use transport::{SessionTransport, TransportEvent};
