//! Speaker playback via `cpal`.
//!
//! [`PlaybackDevice`] accepts PCM16 chunks tagged with a track identifier.
//! [`CpalPlayback`] converts them to the device format and queues them on a
//! shared [`TrackMixer`] that the output callback drains:
//!
//! ```text
//! enqueue(pcm16 @ 24 kHz, id) ─▶ f32 ─▶ StreamResampler[id] ─▶ TrackMixer[id]
//!                                                                │
//!                     cpal output callback ◀── fill ─────────────┘ ─▶ every channel ─▶ speaker
//! ```
//!
//! Each track keeps its own resampler so consecutive deltas of one response
//! join without a seam.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::mixer::TrackMixer;
use super::resample::{pcm16_to_f32, StreamResampler};
use super::stream::{DeviceError, StreamThread};

// ---------------------------------------------------------------------------
// PlaybackDevice
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PlaybackDevice: Send {
    /// Prepare the output sink.
    async fn connect(&mut self) -> Result<(), DeviceError>;

    /// Queue `samples` on the track `track_id`.  Unseen ids start a new track;
    /// playback begins with the first chunk.
    fn enqueue(&mut self, samples: &[i16], track_id: &str);

    /// Stop all playback and discard queued audio on every track.
    async fn interrupt(&mut self) -> Result<(), DeviceError>;

    /// Release the output sink.  Idempotent.
    async fn close(&mut self) -> Result<(), DeviceError>;
}

/// Copy each mono sample into every channel of the interleaved `data`,
/// without allocating.  Slots past the end of `mono` are silenced.
fn spread(mono: &[f32], data: &mut [f32], channels: u16) {
    data.fill(0.0);
    for (slots, &sample) in data.chunks_exact_mut(channels.max(1) as usize).zip(mono) {
        slots.fill(sample);
    }
}

// ---------------------------------------------------------------------------
// CpalPlayback
// ---------------------------------------------------------------------------

/// [`PlaybackDevice`] backed by the system default output device.
pub struct CpalPlayback {
    /// Rate of the PCM16 chunks handed to `enqueue`.
    source_rate: u32,
    mixer: Arc<Mutex<TrackMixer>>,
    /// Resampler state per track id, pruned when a new track starts.
    resamplers: HashMap<String, StreamResampler>,
    /// Output thread plus the device's sample rate.
    stream: Option<(StreamThread, u32)>,
}

impl CpalPlayback {
    pub fn new(source_rate: u32) -> Self {
        Self {
            source_rate,
            mixer: Arc::new(Mutex::new(TrackMixer::new())),
            resamplers: HashMap::new(),
            stream: None,
        }
    }

    fn lock_mixer(&self) -> std::sync::MutexGuard<'_, TrackMixer> {
        self.mixer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Convert `samples` to `device_rate` with the track's own resampler and
    /// hand them to the mixer.
    fn queue_on_track(&mut self, device_rate: u32, samples: &[i16], track_id: &str) {
        let source_rate = self.source_rate;
        let mut mixer = self.mixer.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.resamplers.contains_key(track_id) {
            // Finished responses never receive more deltas.
            self.resamplers.retain(|id, _| mixer.contains(id));
        }
        let converted = self
            .resamplers
            .entry(track_id.to_string())
            .or_insert_with(|| StreamResampler::new(source_rate, device_rate))
            .process(&pcm16_to_f32(samples));
        log::trace!("playback: {} samples queued on {track_id}", converted.len());
        mixer.enqueue(track_id, &converted);
    }

    #[cfg(test)]
    fn queued(&self) -> usize {
        self.lock_mixer().queued()
    }
}

#[async_trait]
impl PlaybackDevice for CpalPlayback {
    async fn connect(&mut self) -> Result<(), DeviceError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let mixer = Arc::clone(&self.mixer);
        let (thread, device_rate) = StreamThread::spawn("playback-stream", move || {
            let device = cpal::default_host()
                .default_output_device()
                .ok_or(DeviceError::NoDevice("output"))?;
            let config: cpal::StreamConfig = device.default_output_config()?.into();
            let channels = config.channels;
            let device_rate = config.sample_rate.0;

            let mut mono = Vec::new();
            let stream = device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    mono.resize(data.len() / channels.max(1) as usize, 0.0);
                    mixer
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .fill(&mut mono);
                    spread(&mono, data, channels);
                },
                |err: cpal::StreamError| log::error!("playback: stream error: {err}"),
                None,
            )?;
            stream.play()?;
            Ok((stream, device_rate))
        })
        .await?;

        log::info!("playback: output open ({device_rate} Hz)");
        self.stream = Some((thread, device_rate));
        Ok(())
    }

    fn enqueue(&mut self, samples: &[i16], track_id: &str) {
        let device_rate = match &self.stream {
            Some((_, rate)) => *rate,
            None => {
                log::debug!(
                    "playback: dropping {} samples for {track_id}, output not connected",
                    samples.len()
                );
                return;
            }
        };
        self.queue_on_track(device_rate, samples, track_id);
    }

    async fn interrupt(&mut self) -> Result<(), DeviceError> {
        self.resamplers.clear();
        let dropped = self.lock_mixer().interrupt();
        if dropped > 0 {
            log::info!("playback: interrupted, {dropped} queued samples discarded");
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        self.resamplers.clear();
        self.lock_mixer().interrupt();
        if let Some((mut thread, _)) = self.stream.take() {
            thread.stop();
            log::info!("playback: output released");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
