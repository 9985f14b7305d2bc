//! Voice session orchestrator — owns the devices and the channel and drives
//! the state machine.
//!
//! [`VoiceSession`] is the only component that touches capture, playback
//! and the channel; none of the three know about each other.
//!
//! # Flow
//!
//! ```text
//! SessionCommand::Start
//!   └─▶ resolve credential (spawn_blocking)                 [Disconnected]
//!         └─▶ capture.begin → playback.connect → channel.connect   [Connecting]
//!               ├─ Ok  → take events, greeting text turn           [Connected]
//!               └─ Err → release everything                        [Disconnected]
//!
//! SessionCommand::ToggleRecording
//!   ├─ Connected → capture.record(frame → session)                 [Recording]
//!   └─ Recording → capture.pause → flush frames → request_response [Connected]
//!
//! ChannelEvent::ConversationUpdated { audio } ─▶ playback.enqueue(samples, item.id)
//!
//! SessionCommand::Stop / remote close / UI gone
//!   └─▶ flags first, then channel.disconnect → capture.end
//!         → playback.interrupt → playback.close                   [Disconnected]
//! ```

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::audio::{AudioFrame, CaptureDevice, DeviceError, PlaybackDevice};
use crate::credential::{Credential, CredentialProvider};
use crate::realtime::{ChannelEvent, ConversationChannel, ItemDelta, SessionParameters};

use super::state::{lock_state, ConnectionState, SessionStatus, SharedState};

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

/// Failures surfaced to the caller of a session operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no API key available")]
    CredentialMissing,

    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("capture is already recording")]
    AlreadyRecording,

    #[error("cannot {operation} while {status}")]
    InvalidStateTransition {
        operation: &'static str,
        status: SessionStatus,
    },
}

// ---------------------------------------------------------------------------
// SessionCommand
// ---------------------------------------------------------------------------

/// Actions the presentation layer can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// "Start Voice Chat"
    Start,
    /// "Start Recording" / "Stop Recording"
    ToggleRecording,
    /// "Disconnect"
    Stop,
}

/// What woke the run loop.
enum Wake {
    Command(Option<SessionCommand>),
    Event(Option<ChannelEvent>),
    Frame(AudioFrame),
}

async fn next_event(
    events: &mut Option<mpsc::UnboundedReceiver<ChannelEvent>>,
) -> Option<ChannelEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// VoiceSession
// ---------------------------------------------------------------------------

/// One voice conversation: at most one active per UI.
pub struct VoiceSession {
    state: SharedState,
    credentials: Arc<CredentialProvider>,
    capture: Box<dyn CaptureDevice>,
    playback: Box<dyn PlaybackDevice>,
    channel: Box<dyn ConversationChannel>,
    greeting: Option<String>,
    events: Option<mpsc::UnboundedReceiver<ChannelEvent>>,
    frame_tx: mpsc::UnboundedSender<AudioFrame>,
    frame_rx: mpsc::UnboundedReceiver<AudioFrame>,
}

impl VoiceSession {
    /// Build a session.  `params` are handed to the channel right away, so
    /// they are in place before the first turn.
    pub fn new(
        state: SharedState,
        credentials: Arc<CredentialProvider>,
        capture: Box<dyn CaptureDevice>,
        playback: Box<dyn PlaybackDevice>,
        mut channel: Box<dyn ConversationChannel>,
        params: SessionParameters,
        greeting: Option<String>,
    ) -> Self {
        channel.configure(params);
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        Self {
            state,
            credentials,
            capture,
            playback,
            channel,
            greeting: greeting.filter(|g| !g.trim().is_empty()),
            events: None,
            frame_tx,
            frame_rx,
        }
    }

    pub fn status(&self) -> SessionStatus {
        lock_state(&self.state).status
    }

    fn set_status(&self, status: SessionStatus) {
        debug_assert!(status.is_consistent());
        lock_state(&self.state).status = status;
    }

    fn set_error(&self, message: impl Into<String>) {
        lock_state(&self.state).last_error = Some(message.into());
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until `commands` is closed, then tear the session down.
    ///
    /// Spawn this as a tokio task from `main()`; dropping every command
    /// sender (the UI closing) is what ends it.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        loop {
            let wake = tokio::select! {
                command = commands.recv() => Wake::Command(command),
                event = next_event(&mut self.events) => Wake::Event(event),
                Some(frame) = self.frame_rx.recv() => Wake::Frame(frame),
            };

            match wake {
                Wake::Command(Some(command)) => self.dispatch(command).await,
                Wake::Command(None) => break,
                Wake::Event(Some(event)) => self.handle_event(event).await,
                Wake::Event(None) => {
                    self.events = None;
                    if self.status().connection != ConnectionState::Disconnected {
                        log::warn!("session: event stream ended unexpectedly");
                        self.set_error("connection lost");
                        self.stop().await;
                    }
                }
                Wake::Frame(frame) => self.forward_frame(&frame),
            }
        }

        log::info!("session: command channel closed, shutting down");
        self.stop().await;
    }

    async fn dispatch(&mut self, command: SessionCommand) {
        log::debug!("session: {command:?} while {}", self.status());
        let result = match command {
            SessionCommand::Start => self.start().await,
            SessionCommand::ToggleRecording => self.toggle_recording().await,
            SessionCommand::Stop => {
                self.stop().await;
                Ok(())
            }
        };
        match result {
            Ok(()) => {}
            // Repeated clicks while a start is in flight land here.
            Err(e @ SessionError::InvalidStateTransition { .. }) => {
                log::debug!("session: {command:?} ignored: {e}");
            }
            Err(e) => {
                log::warn!("session: {command:?} failed: {e}");
                self.set_error(e.to_string());
            }
        }
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Connect: credential, microphone, speaker, channel.
    ///
    /// Only valid while disconnected.  On any failure everything acquired so
    /// far is released and the session is disconnected again.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        let status = self.status();
        if status.connection != ConnectionState::Disconnected {
            return Err(SessionError::InvalidStateTransition {
                operation: "start",
                status,
            });
        }

        let provider = Arc::clone(&self.credentials);
        let credential = match tokio::task::spawn_blocking(move || provider.resolve()).await {
            Ok(Ok(credential)) => credential,
            Ok(Err(e)) => {
                log::error!("session: {e}");
                return Err(SessionError::CredentialMissing);
            }
            Err(e) => {
                log::error!("session: credential task failed: {e}");
                return Err(SessionError::CredentialMissing);
            }
        };

        self.set_status(SessionStatus::CONNECTING);
        log::info!("session: connecting");

        if let Err(e) = self.acquire(&credential).await {
            log::error!("session: start failed: {e}");
            self.release().await;
            self.set_status(SessionStatus::DISCONNECTED);
            return Err(e);
        }

        self.events = self.channel.take_events();
        if let Some(greeting) = self.greeting.as_deref() {
            self.channel.send_text(greeting);
        }

        {
            let mut snapshot = lock_state(&self.state);
            snapshot.status = SessionStatus::CONNECTED;
            snapshot.last_error = None;
        }
        log::info!("session: connected");
        Ok(())
    }

    async fn acquire(&mut self, credential: &Credential) -> Result<(), SessionError> {
        self.capture
            .begin()
            .await
            .map_err(|e| SessionError::ConnectionFailed(format!("microphone: {e}")))?;
        self.playback
            .connect()
            .await
            .map_err(|e| SessionError::ConnectionFailed(format!("speaker: {e}")))?;
        self.channel
            .connect(credential)
            .await
            .map_err(|e| SessionError::ConnectionFailed(e.to_string()))?;
        Ok(())
    }

    /// Start or finish a recording segment.  A no-op unless connected.
    pub async fn toggle_recording(&mut self) -> Result<(), SessionError> {
        let status = self.status();
        if status == SessionStatus::CONNECTED {
            let frames = self.frame_tx.clone();
            self.capture
                .record(Box::new(move |frame| {
                    let _ = frames.send(frame);
                }))
                .await
                .map_err(|e| match e {
                    DeviceError::AlreadyRecording => SessionError::AlreadyRecording,
                    other => SessionError::DeviceUnavailable(other.to_string()),
                })?;
            self.set_status(SessionStatus::RECORDING);
            log::info!("session: recording");
        } else if status == SessionStatus::RECORDING {
            if let Err(e) = self.capture.pause().await {
                log::warn!("session: capture pause failed: {e}");
            }
            // Frames delivered before the pause still belong to this turn.
            while let Ok(frame) = self.frame_rx.try_recv() {
                self.forward_frame(&frame);
            }
            self.channel.request_response();
            self.set_status(SessionStatus::CONNECTED);
            log::info!("session: recording finished, response requested");
        } else {
            log::debug!("session: toggle ignored while {status}");
        }
        Ok(())
    }

    /// Disconnect from any state.  Never fails and is safe to repeat.
    pub async fn stop(&mut self) {
        let previous = self.status();
        self.set_status(SessionStatus::DISCONNECTED);
        self.events = None;

        self.release().await;
        while self.frame_rx.try_recv().is_ok() {}

        if previous != SessionStatus::DISCONNECTED {
            log::info!("session: disconnected");
        }
    }

    /// Best-effort release in the fixed order channel → capture → playback.
    async fn release(&mut self) {
        self.channel.disconnect();
        if let Err(e) = self.capture.end().await {
            log::warn!("session: capture release failed: {e}");
        }
        if let Err(e) = self.playback.interrupt().await {
            log::warn!("session: playback interrupt failed: {e}");
        }
        if let Err(e) = self.playback.close().await {
            log::warn!("session: playback release failed: {e}");
        }
    }

    // -----------------------------------------------------------------------
    // Routing
    // -----------------------------------------------------------------------

    fn forward_frame(&mut self, frame: &AudioFrame) {
        if self.status().is_recording() {
            self.channel.send_audio_frame(frame);
        } else {
            log::trace!("session: dropping frame outside a recording segment");
        }
    }

    async fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::ConversationUpdated { item, delta } => match delta {
                Some(ItemDelta::Audio(samples)) => self.playback.enqueue(&samples, &item.id),
                Some(ItemDelta::Transcript(text)) | Some(ItemDelta::Text(text)) => {
                    lock_state(&self.state).transcript.push_str(&text);
                }
                None => {
                    log::debug!("session: item {} ({:?}) created", item.id, item.role);
                    if item.role.as_deref() == Some("assistant") {
                        let mut snapshot = lock_state(&self.state);
                        if !snapshot.transcript.is_empty() && !snapshot.transcript.ends_with('\n')
                        {
                            snapshot.transcript.push('\n');
                        }
                    }
                }
            },
            ChannelEvent::Connected => log::debug!("session: channel open"),
            ChannelEvent::Disconnected { reason } => {
                if self.status().connection != ConnectionState::Disconnected {
                    log::warn!("session: remote closed the channel: {reason}");
                    self.set_error(format!("connection lost: {reason}"));
                    self.stop().await;
                }
            }
            ChannelEvent::Error { message } => {
                log::error!("session: remote error: {message}");
                self.set_error(message);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
