//! The duplex conversation channel seen by the session.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::events::SessionParameters;
use crate::audio::AudioFrame;
use crate::credential::Credential;

// ---------------------------------------------------------------------------
// ChannelState
// ---------------------------------------------------------------------------

/// `Closed → Connecting → Open → Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Closed,
    Connecting,
    Open,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::Connecting => "connecting",
            Self::Open => "open",
        })
    }
}

// ---------------------------------------------------------------------------
// ChannelEvent
// ---------------------------------------------------------------------------

/// Conversation item a delta belongs to.  `id` is the response item
/// identifier used as the playback track key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationItem {
    pub id: String,
    pub role: Option<String>,
}

impl ConversationItem {
    pub fn assistant(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Some("assistant".into()),
        }
    }
}

/// Incremental payload attached to a conversation update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemDelta {
    /// Mono PCM16 samples at the session rate.
    Audio(Vec<i16>),
    Transcript(String),
    Text(String),
}

/// Everything the channel reports back to its single consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    ConversationUpdated {
        item: ConversationItem,
        delta: Option<ItemDelta>,
    },
    Connected,
    /// The remote end went away while the channel was open.
    Disconnected { reason: String },
    Error { message: String },
}

// ---------------------------------------------------------------------------
// ChannelError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connection attempt timed out")]
    Timeout,

    #[error("channel is {0}, connect requires closed")]
    NotClosed(ChannelState),
}

// ---------------------------------------------------------------------------
// ConversationChannel
// ---------------------------------------------------------------------------

/// Capability interface for the remote conversational service.
///
/// Sends are fire-and-forget: anything sent while the channel is not
/// [`ChannelState::Open`] is dropped and logged, never queued.
#[async_trait]
pub trait ConversationChannel: Send {
    /// Open the channel.  On failure the state returns to `Closed`.
    async fn connect(&mut self, credential: &Credential) -> Result<(), ChannelError>;

    /// Set conversation parameters.  Applied before any turn is sent.
    fn configure(&mut self, params: SessionParameters);

    /// Inject a user text turn and ask for a response.
    fn send_text(&mut self, text: &str);

    fn send_audio_frame(&mut self, frame: &AudioFrame);

    /// End the current utterance and ask the service to respond.
    fn request_response(&mut self);

    /// The event stream of the current connection.  Only the first call
    /// after a connect returns `Some`.
    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<ChannelEvent>>;

    /// Close the channel and stop dispatching events.  Idempotent.
    fn disconnect(&mut self);

    fn state(&self) -> ChannelState;
}
