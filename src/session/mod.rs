//! Voice session orchestration — state machine, shared snapshot and the
//! command loop the UI talks to.

pub mod runner;
pub mod state;

#[cfg(test)]
mod fakes;

pub use runner::{SessionCommand, SessionError, VoiceSession};
pub use state::{
    lock_state, new_shared_state, ConnectionState, RecordingState, SessionSnapshot, SessionStatus,
    SharedState,
};
