//! Voice chat control for a realtime conversational AI service.
//!
//! The crate streams microphone audio to the remote service over a duplex
//! WebSocket channel and plays back the synthesized answer as it arrives.
//!
//! ```text
//! app (egui) ──SessionCommand──▶ VoiceSession::run()
//!                                   ├─ CaptureDevice  ──frames──▶ ConversationChannel
//!                                   └─ ConversationChannel ──deltas──▶ PlaybackDevice
//! ```

pub mod app;
pub mod audio;
pub mod config;
pub mod credential;
pub mod hotkey;
pub mod realtime;
pub mod session;
