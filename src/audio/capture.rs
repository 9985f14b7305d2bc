//! Microphone capture via `cpal`.
//!
//! [`CaptureDevice`] is the capability the session drives:
//!
//! ```text
//! begin ─▶ record(sink) ─▶ pause ─▶ record(sink) ─▶ … ─▶ end
//! ```
//!
//! [`CpalCapture`] opens the default input device on `begin` and keeps the
//! stream running; frames only reach the sink between `record` and `pause`.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::frame::{AudioFrame, FrameAssembler};
use super::stream::{DeviceError, StreamThread};

/// Callback receiving each captured frame.  Runs on the audio thread, so it
/// must not block.
pub type FrameSink = Box<dyn FnMut(AudioFrame) + Send>;

// ---------------------------------------------------------------------------
// CaptureDevice
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CaptureDevice: Send {
    /// Acquire the microphone.
    async fn begin(&mut self) -> Result<(), DeviceError>;

    /// Start delivering frames to `on_frame` until [`pause`](Self::pause).
    ///
    /// Fails with [`DeviceError::AlreadyRecording`] while a segment is active
    /// and [`DeviceError::NotStarted`] before `begin`.
    async fn record(&mut self, on_frame: FrameSink) -> Result<(), DeviceError>;

    /// Stop delivering frames.  The partial frame still buffered is handed to
    /// the sink before it is dropped.  No-op when not recording.
    async fn pause(&mut self) -> Result<(), DeviceError>;

    /// Release the microphone.  Safe without `begin` and safe to repeat.
    async fn end(&mut self) -> Result<(), DeviceError>;
}

// ---------------------------------------------------------------------------
// CpalCapture
// ---------------------------------------------------------------------------

/// Active recording segment: the assembler and the sink it feeds.
struct Segment {
    assembler: FrameAssembler,
    sink: FrameSink,
}

/// Negotiated input format.
#[derive(Debug, Clone, Copy)]
struct InputFormat {
    sample_rate: u32,
    channels: u16,
}

/// [`CaptureDevice`] backed by the system default input device.
pub struct CpalCapture {
    target_rate: u32,
    frame_samples: usize,
    segment: Arc<Mutex<Option<Segment>>>,
    stream: Option<(StreamThread, InputFormat)>,
}

impl CpalCapture {
    /// * `target_rate`   — rate of emitted frames (24 kHz for the realtime API).
    /// * `frame_samples` — samples per emitted frame.
    pub fn new(target_rate: u32, frame_samples: usize) -> Self {
        Self {
            target_rate,
            frame_samples,
            segment: Arc::new(Mutex::new(None)),
            stream: None,
        }
    }

    fn lock_segment(&self) -> std::sync::MutexGuard<'_, Option<Segment>> {
        self.segment.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn is_recording(&self) -> bool {
        self.lock_segment().is_some()
    }
}

#[async_trait]
impl CaptureDevice for CpalCapture {
    async fn begin(&mut self) -> Result<(), DeviceError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let segment = Arc::clone(&self.segment);
        let (thread, format) = StreamThread::spawn("capture-stream", move || {
            let device = cpal::default_host()
                .default_input_device()
                .ok_or(DeviceError::NoDevice("input"))?;
            let supported = device.default_input_config()?;
            let format = InputFormat {
                sample_rate: supported.sample_rate().0,
                channels: supported.channels(),
            };
            let config: cpal::StreamConfig = supported.into();

            let stream = device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mut guard = segment.lock().unwrap_or_else(PoisonError::into_inner);
                    if let Some(seg) = guard.as_mut() {
                        for frame in seg.assembler.push(data) {
                            (seg.sink)(frame);
                        }
                    }
                },
                |err: cpal::StreamError| log::error!("capture: stream error: {err}"),
                None,
            )?;
            stream.play()?;
            Ok((stream, format))
        })
        .await?;

        log::info!(
            "capture: microphone open ({} Hz, {} ch)",
            format.sample_rate,
            format.channels
        );
        self.stream = Some((thread, format));
        Ok(())
    }

    async fn record(&mut self, on_frame: FrameSink) -> Result<(), DeviceError> {
        let format = match &self.stream {
            Some((_, format)) => *format,
            None => return Err(DeviceError::NotStarted),
        };
        let (target_rate, frame_samples) = (self.target_rate, self.frame_samples);

        let mut segment = self.lock_segment();
        if segment.is_some() {
            return Err(DeviceError::AlreadyRecording);
        }
        *segment = Some(Segment {
            assembler: FrameAssembler::new(
                format.sample_rate,
                format.channels,
                target_rate,
                frame_samples,
            ),
            sink: on_frame,
        });
        log::debug!("capture: recording");
        Ok(())
    }

    async fn pause(&mut self) -> Result<(), DeviceError> {
        let taken = self.lock_segment().take();
        if let Some(mut seg) = taken {
            if let Some(tail) = seg.assembler.flush() {
                (seg.sink)(tail);
            }
            log::debug!("capture: paused");
        }
        Ok(())
    }

    async fn end(&mut self) -> Result<(), DeviceError> {
        self.lock_segment().take();
        if let Some((mut thread, _)) = self.stream.take() {
            thread.stop();
            log::info!("capture: microphone released");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
