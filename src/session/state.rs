//! Session state machine and the snapshot shared with the UI.
//!
//! [`SessionStatus`] pairs the connection and recording flags.  The UI reads
//! it through [`SharedState`] every frame to label its buttons.
//!
//! ```text
//! Disconnected ──start──▶ Connecting ──ok──▶ Connected ◀──toggle──▶ Recording
//!      ▲                      │                  │                      │
//!      └────────── failure ───┘◀───── stop / remote close ──────────────┘
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// ---------------------------------------------------------------------------
// ConnectionState / RecordingState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    #[default]
    Idle,
    Recording,
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// The `(connection, recording)` pair observed by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStatus {
    pub connection: ConnectionState,
    pub recording: RecordingState,
}

impl SessionStatus {
    pub const DISCONNECTED: Self = Self::new(ConnectionState::Disconnected, RecordingState::Idle);
    pub const CONNECTING: Self = Self::new(ConnectionState::Connecting, RecordingState::Idle);
    pub const CONNECTED: Self = Self::new(ConnectionState::Connected, RecordingState::Idle);
    pub const RECORDING: Self = Self::new(ConnectionState::Connected, RecordingState::Recording);

    pub const fn new(connection: ConnectionState, recording: RecordingState) -> Self {
        Self {
            connection,
            recording,
        }
    }

    /// `Recording` only ever happens on a connected session.
    pub fn is_consistent(&self) -> bool {
        self.recording == RecordingState::Idle || self.connection == ConnectionState::Connected
    }

    pub fn is_recording(&self) -> bool {
        self.recording == RecordingState::Recording
    }

    /// Short status text for the UI.
    pub fn label(&self) -> &'static str {
        match (self.connection, self.recording) {
            (ConnectionState::Disconnected, _) => "Disconnected",
            (ConnectionState::Connecting, _) => "Connecting…",
            (ConnectionState::Connected, RecordingState::Idle) => "Connected",
            (ConnectionState::Connected, RecordingState::Recording) => "Recording",
        }
    }

    /// Caption of the primary button.
    ///
    /// ```
    /// use voice_chat::session::SessionStatus;
    ///
    /// assert_eq!(SessionStatus::DISCONNECTED.button_label(), "Start Voice Chat");
    /// assert_eq!(SessionStatus::CONNECTED.button_label(), "Start Recording");
    /// assert_eq!(SessionStatus::RECORDING.button_label(), "Stop Recording");
    /// ```
    pub fn button_label(&self) -> &'static str {
        match (self.connection, self.recording) {
            (ConnectionState::Disconnected, _) => "Start Voice Chat",
            (ConnectionState::Connecting, _) => "Connecting…",
            (ConnectionState::Connected, RecordingState::Idle) => "Start Recording",
            (ConnectionState::Connected, RecordingState::Recording) => "Stop Recording",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// SessionSnapshot
// ---------------------------------------------------------------------------

/// Everything the UI renders about the session.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    /// Most recent failure, cleared by a successful `start`.
    pub last_error: Option<String>,
    /// Assistant transcript accumulated from text and transcript deltas.
    pub transcript: String,
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`SessionSnapshot`].
///
/// The session task writes it; the egui update loop reads it.  Never hold the
/// lock across an `.await`.
pub type SharedState = Arc<Mutex<SessionSnapshot>>;

pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(SessionSnapshot::default()))
}

/// Lock `state`, recovering from a poisoned mutex.
pub fn lock_state(state: &SharedState) -> MutexGuard<'_, SessionSnapshot> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_disconnected() {
        assert_eq!(SessionStatus::default(), SessionStatus::DISCONNECTED);
        assert_eq!(SessionSnapshot::default().status, SessionStatus::DISCONNECTED);
    }

    #[test]
    fn recording_requires_connection() {
        assert!(SessionStatus::DISCONNECTED.is_consistent());
        assert!(SessionStatus::CONNECTING.is_consistent());
        assert!(SessionStatus::CONNECTED.is_consistent());
        assert!(SessionStatus::RECORDING.is_consistent());
        assert!(
            !SessionStatus::new(ConnectionState::Disconnected, RecordingState::Recording)
                .is_consistent()
        );
        assert!(
            !SessionStatus::new(ConnectionState::Connecting, RecordingState::Recording)
                .is_consistent()
        );
    }

    #[test]
    fn labels() {
        assert_eq!(SessionStatus::DISCONNECTED.label(), "Disconnected");
        assert_eq!(SessionStatus::CONNECTING.label(), "Connecting…");
        assert_eq!(SessionStatus::RECORDING.to_string(), "Recording");
        assert_eq!(SessionStatus::CONNECTING.button_label(), "Connecting…");
    }

    #[test]
    fn shared_state_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedState>();
    }

    #[test]
    fn shared_state_can_be_cloned_and_mutated() {
        let state = new_shared_state();
        let other = Arc::clone(&state);

        lock_state(&state).status = SessionStatus::RECORDING;
        assert!(lock_state(&other).status.is_recording());
    }
}
