//! Audio devices — microphone capture and per-track speaker playback.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → FrameAssembler (downmix → StreamResampler → PCM16)
//!            → AudioFrame (24 kHz mono) → FrameSink
//!
//! AudioDelta (PCM16, item id) → CpalPlayback::enqueue → TrackMixer → cpal callback → Speaker
//! ```
//!
//! The session only sees the [`CaptureDevice`] and [`PlaybackDevice`]
//! traits, so tests swap in fakes without touching audio hardware.

pub mod capture;
pub mod frame;
pub mod mixer;
pub mod playback;
pub mod resample;
pub mod stream;

pub use capture::{CaptureDevice, CpalCapture, FrameSink};
pub use frame::{AudioFrame, FrameAssembler};
pub use mixer::TrackMixer;
pub use playback::{CpalPlayback, PlaybackDevice};
pub use resample::{downmix, f32_to_pcm16, pcm16_to_f32, StreamResampler};
pub use stream::{DeviceError, StreamThread};
