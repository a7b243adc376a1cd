pub mod machine;
pub mod session;
pub mod state;

pub use machine::{SessionAction, SessionStateMachine};
pub use session::{forward_frames, Session};
pub use state::{FailureKind, SessionSnapshot, SessionStatus, TranscriptState};
