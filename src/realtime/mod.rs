//! Duplex event channel to the realtime conversational service.
//!
//! ```text
//! VoiceSession ──configure / send_text / send_audio_frame / request_response──▶ ConversationChannel
//! VoiceSession ◀──────────────── ChannelEvent stream (take_events) ──────────────┘
//! ```
//!
//! [`RealtimeClient`] speaks the JSON event protocol over a WebSocket; the
//! session depends only on the [`ConversationChannel`] trait.

pub mod channel;
pub mod client;
pub mod events;

pub use channel::{
    ChannelError, ChannelEvent, ChannelState, ConversationChannel, ConversationItem, ItemDelta,
};
pub use client::RealtimeClient;
pub use events::{ClientEvent, ServerEvent, SessionParameters, TurnDetection};
